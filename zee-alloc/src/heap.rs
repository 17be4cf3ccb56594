//! Backing page providers
//!
//! Three grow-only sources behind the [`PageSource`] trait: the wasm
//! linear-memory grower, a bump provider over a caller-supplied region,
//! and a feature-gated static-array fallback for hosts without a
//! platform page provider.

use core::ptr::NonNull;

use crate::config::PAGE_SIZE;
use crate::error::AllocError;
use crate::traits::PageSource;

cfg_if::cfg_if! {
    if #[cfg(target_arch = "wasm32")] {
        /// Size of one wasm linear-memory page.
        const WASM_PAGE_SIZE: usize = 64 * 1024;

        // PAGE_SIZE requests must translate to whole wasm pages.
        const _: () = assert!(PAGE_SIZE % WASM_PAGE_SIZE == 0);

        /// Page provider over wasm linear memory.
        ///
        /// Each request grows memory by exactly the number of wasm pages
        /// needed; `memory.grow` returns the old size in pages, which is
        /// the start of the fresh region. Pages are never returned: wasm
        /// memory only grows.
        pub struct WasmPageSource {
            _private: (),
        }

        impl WasmPageSource {
            pub const fn new() -> Self {
                Self { _private: () }
            }
        }

        impl Default for WasmPageSource {
            fn default() -> Self {
                Self::new()
            }
        }

        impl PageSource for WasmPageSource {
            fn allocate_pages(&mut self, bytes: usize) -> Result<NonNull<u8>, AllocError> {
                debug_assert!(bytes > 0 && bytes % PAGE_SIZE == 0);

                let delta = bytes / WASM_PAGE_SIZE;
                let previous = core::arch::wasm32::memory_grow(0, delta);
                if previous == usize::MAX {
                    return Err(AllocError::OutOfMemory);
                }
                // Address zero is never handed out; the free-list null
                // encoding relies on it. A module whose memory starts
                // empty would land here, which no linked module does.
                NonNull::new((previous * WASM_PAGE_SIZE) as *mut u8)
                    .ok_or(AllocError::OutOfMemory)
            }
        }
    }
}

/// Bump provider over a caller-supplied region.
///
/// Covers embedders with a pre-reserved heap and the test suite. Hands
/// out page-aligned chunks front to back and reports [`AllocError::OutOfMemory`]
/// once the region is exhausted.
pub struct FixedPageSource {
    base: usize,
    len: usize,
    tail: usize,
}

impl FixedPageSource {
    /// Wrap `len` bytes starting at `base`.
    ///
    /// # Safety
    ///
    /// `base` must be aligned to [`PAGE_SIZE`], `len` a multiple of it,
    /// and the region exclusively owned by this provider for as long as
    /// the allocator above it lives.
    pub unsafe fn new(base: NonNull<u8>, len: usize) -> Self {
        debug_assert!(base.as_ptr() as usize % PAGE_SIZE == 0);
        debug_assert!(len % PAGE_SIZE == 0);
        Self {
            base: base.as_ptr() as usize,
            len,
            tail: 0,
        }
    }

    /// Bytes handed out so far.
    pub fn used(&self) -> usize {
        self.tail
    }

    /// Bytes still available.
    pub fn remaining(&self) -> usize {
        self.len - self.tail
    }
}

impl PageSource for FixedPageSource {
    fn allocate_pages(&mut self, bytes: usize) -> Result<NonNull<u8>, AllocError> {
        debug_assert!(bytes > 0 && bytes % PAGE_SIZE == 0);

        if bytes > self.len - self.tail {
            return Err(AllocError::OutOfMemory);
        }
        let chunk = self.base + self.tail;
        self.tail += bytes;
        // SAFETY: base is non-null and the offset stays inside the region
        Ok(unsafe { NonNull::new_unchecked(chunk as *mut u8) })
    }
}

cfg_if::cfg_if! {
    if #[cfg(feature = "static-heap")] {
        use core::cell::UnsafeCell;

        /// Capacity of the built-in static heap.
        pub const STATIC_HEAP_PAGES: usize = 256;

        // The align attribute below must cover PAGE_SIZE.
        const _: () = assert!(PAGE_SIZE <= 65536);

        #[repr(C, align(65536))]
        struct StaticHeap(UnsafeCell<[u8; STATIC_HEAP_PAGES * PAGE_SIZE]>);

        // SAFETY: all access goes through the single StaticPageSource,
        // whose constructor contract forbids a second instance.
        unsafe impl Sync for StaticHeap {}

        static STATIC_HEAP: StaticHeap =
            StaticHeap(UnsafeCell::new([0; STATIC_HEAP_PAGES * PAGE_SIZE]));

        /// Bump provider over a built-in static array.
        ///
        /// Lets the C ABI exports link on hosts without wasm linear
        /// memory. The capacity is fixed at [`STATIC_HEAP_PAGES`] pages.
        pub struct StaticPageSource {
            tail: usize,
        }

        impl StaticPageSource {
            /// # Safety
            ///
            /// At most one instance may exist per program; two would hand
            /// out the same static bytes twice.
            pub const unsafe fn new() -> Self {
                Self { tail: 0 }
            }
        }

        impl PageSource for StaticPageSource {
            fn allocate_pages(&mut self, bytes: usize) -> Result<NonNull<u8>, AllocError> {
                debug_assert!(bytes > 0 && bytes % PAGE_SIZE == 0);

                let len = STATIC_HEAP_PAGES * PAGE_SIZE;
                if bytes > len - self.tail {
                    return Err(AllocError::OutOfMemory);
                }
                let chunk = STATIC_HEAP.0.get() as usize + self.tail;
                self.tail += bytes;
                // SAFETY: the offset stays inside the static array
                Ok(unsafe { NonNull::new_unchecked(chunk as *mut u8) })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_source_bumps_by_pages() {
        let mut backing = std::vec![0u8; 4 * PAGE_SIZE];
        let base = (backing.as_mut_ptr() as usize + PAGE_SIZE - 1) & !(PAGE_SIZE - 1);
        let mut source =
            unsafe { FixedPageSource::new(NonNull::new(base as *mut u8).unwrap(), 3 * PAGE_SIZE) };

        let first = source.allocate_pages(PAGE_SIZE).unwrap();
        let second = source.allocate_pages(2 * PAGE_SIZE).unwrap();

        assert_eq!(first.as_ptr() as usize % PAGE_SIZE, 0);
        assert_eq!(second.as_ptr() as usize, first.as_ptr() as usize + PAGE_SIZE);
        assert_eq!(source.used(), 3 * PAGE_SIZE);
        assert_eq!(source.remaining(), 0);
    }

    #[test]
    fn test_fixed_source_exhaustion() {
        let mut backing = std::vec![0u8; 2 * PAGE_SIZE];
        let base = (backing.as_mut_ptr() as usize + PAGE_SIZE - 1) & !(PAGE_SIZE - 1);
        let mut source =
            unsafe { FixedPageSource::new(NonNull::new(base as *mut u8).unwrap(), PAGE_SIZE) };

        assert!(source.allocate_pages(PAGE_SIZE).is_ok());
        assert_eq!(
            source.allocate_pages(PAGE_SIZE),
            Err(AllocError::OutOfMemory)
        );
        // A failed request leaves the cursor untouched.
        assert_eq!(source.used(), PAGE_SIZE);
    }

    #[cfg(feature = "static-heap")]
    #[test]
    fn test_static_source_basics() {
        let mut source = unsafe { StaticPageSource::new() };

        let chunk = source.allocate_pages(PAGE_SIZE).unwrap();
        assert_eq!(chunk.as_ptr() as usize % PAGE_SIZE, 0);
        assert!(source
            .allocate_pages((STATIC_HEAP_PAGES + 1) * PAGE_SIZE)
            .is_err());
    }
}
