//! Allocator configuration: layout constants, bucket derivation, and policies

/// Page size constant (one wasm linear-memory page).
///
/// Every backing request is a multiple of this and every returned region is
/// aligned to it. Must be a power of two no smaller than the platform's own
/// page granularity.
pub const PAGE_SIZE: usize = 64 * 1024;

/// Machine word size in bytes (8 on 64-bit hosts, 4 on wasm32).
pub const WORD_SIZE: usize = core::mem::size_of::<usize>();

/// Frame header size: a `next` word plus a `frame_size` word.
pub const HEADER_SIZE: usize = 2 * WORD_SIZE;

/// Smallest payload a frame can carry.
pub const MIN_PAYLOAD_SIZE: usize = 2 * WORD_SIZE;

/// Smallest addressable frame (32 bytes on 64-bit hosts, 16 on wasm32).
pub const MIN_FRAME_SIZE: usize = HEADER_SIZE + MIN_PAYLOAD_SIZE;

/// Number of free-list buckets: one jumbo bucket plus one bucket per
/// power-of-two frame size in `[MIN_FRAME_SIZE, PAGE_SIZE]`.
pub const BUCKET_COUNT: usize = (PAGE_SIZE.ilog2() - MIN_FRAME_SIZE.ilog2()) as usize + 2;

/// Bucket holding frames strictly larger than [`PAGE_SIZE`].
pub const JUMBO_BUCKET: usize = 0;

/// Bucket holding frames of exactly [`PAGE_SIZE`].
pub const PAGE_BUCKET: usize = 1;

/// Bucket holding frames of exactly [`MIN_FRAME_SIZE`].
pub const MIN_BUCKET: usize = BUCKET_COUNT - 1;

const _: () = {
    assert!(PAGE_SIZE.is_power_of_two());
    assert!(MIN_FRAME_SIZE.is_power_of_two());
    assert!(PAGE_SIZE > MIN_FRAME_SIZE);
};

/// What `deallocate` does with a freed frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreeStrategy {
    /// Prepend to the matching free list immediately.
    Fast,
    /// Walk the buddy chain and merge equal-sized free neighbours.
    Compact,
}

/// How the jumbo bucket is searched for a fitting frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JumboMatchStrategy {
    /// Only a frame of exactly the padded size is taken.
    Exact,
    /// The smallest frame that fits; an exact match short-circuits the scan.
    Closest,
    /// The first frame that fits.
    First,
}

/// Scope of runtime metadata checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validation {
    /// Full checks, including internal invariants. Violations abort.
    Dev,
    /// Payload-recovery checks at the `deallocate`/`resize` boundary only.
    External,
    /// No checks. Corrupt or foreign pointers are undefined behaviour.
    Unsafe,
}

/// Policy configuration fixed at construction time.
#[derive(Debug, Clone, Copy)]
pub struct AllocatorConfig {
    /// Free-path behaviour. `Compact` keeps fragmentation down; `Fast`
    /// trades it for an O(1) free.
    pub free_strategy: FreeStrategy,
    /// Jumbo bucket search policy.
    pub jumbo_match_strategy: JumboMatchStrategy,
    /// Runtime metadata check scope.
    pub validation: Validation,
}

impl AllocatorConfig {
    /// Default policies: coalescing frees, best-fit jumbo matching, and
    /// full checks in debug builds / boundary checks in release builds.
    pub const fn new() -> Self {
        Self {
            free_strategy: FreeStrategy::Compact,
            jumbo_match_strategy: JumboMatchStrategy::Closest,
            validation: if cfg!(debug_assertions) {
                Validation::Dev
            } else {
                Validation::External
            },
        }
    }
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self::new()
    }
}
