//! Error types for the allocator

use core::fmt;

/// Errors that can surface from allocation operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocError {
    /// The backing source has no more pages, or the request asked for
    /// alignment beyond the two-word ceiling the frame layout grants.
    OutOfMemory,
    /// A payload pointer did not recover to a valid frame: misaligned
    /// frame start, or a size field that is neither a power of two nor a
    /// page multiple. Double frees and foreign pointers surface here.
    UnalignedMemory,
}

impl fmt::Display for AllocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfMemory => write!(f, "out of memory"),
            Self::UnalignedMemory => write!(f, "pointer does not recover to a valid frame"),
        }
    }
}
