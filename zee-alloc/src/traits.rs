//! Trait definition for the backing page provider
//!
//! The allocator is agnostic to where its pages come from. The provider
//! is grow-only: memory handed out is kept by the allocator forever, so
//! the contract has a single operation and no free path.

use core::ptr::NonNull;

use crate::error::AllocError;

/// A coarse, grow-only source of page-granularity memory.
///
/// The canonical implementation grows wasm linear memory; fixed-region
/// bump providers cover native hosts and pre-reserved heaps.
pub trait PageSource {
    /// Hand out a fresh region of exactly `bytes` bytes.
    ///
    /// `bytes` is always a positive multiple of
    /// [`PAGE_SIZE`](crate::config::PAGE_SIZE) and the returned region is
    /// aligned to it. The region stays owned by the caller for the rest of
    /// the program; there is no way to give it back.
    ///
    /// On failure the provider returns [`AllocError::OutOfMemory`] and
    /// must leave itself unchanged.
    fn allocate_pages(&mut self, bytes: usize) -> Result<NonNull<u8>, AllocError>;
}
