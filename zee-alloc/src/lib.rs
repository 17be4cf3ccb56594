//! Zee heap allocator
//!
//! A buddy-system heap allocator for environments whose memory only grows,
//! wasm linear memory first among them. A grow-only page source hands out
//! whole pages; the allocator turns them into a `malloc`/`free`/`realloc`
//! surface for small and medium allocations while keeping its compiled
//! footprint small and fragmentation bounded.
//!
//! # Design
//!
//! - **In-band metadata**: every block carries a two-word header (free-list
//!   link plus size), so a bare pointer recovers its own metadata with no
//!   side table.
//! - **Power-of-two size classes**: one free list per class from the
//!   minimum frame up to one page, plus a jumbo list for page multiples.
//! - **Split on allocate, coalesce on free**: frames halve down to the
//!   requested class and merge back with their buddies when freed.
//! - **Memory is never returned** to the page source; freed frames feed
//!   future allocations for the lifetime of the program.
//!
//! # Usage
//!
//! ```ignore
//! use zee_alloc::{LockedAllocator, WasmPageSource};
//!
//! #[global_allocator]
//! static HEAP: LockedAllocator<WasmPageSource> =
//!     LockedAllocator::new(WasmPageSource::new());
//! ```
//!
//! # Optional features
//!
//! - `static-heap`: a built-in static-array page source for hosts without
//!   a platform provider
//! - `stats`: live/committed byte counters and operation statistics

#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]

#[cfg(test)]
extern crate std;

pub mod allocator;
pub mod config;
pub mod error;
pub mod frame;
pub mod freelist;
pub mod heap;
pub mod lock;
pub mod size_class;
pub mod traits;

#[cfg(feature = "stats")]
pub mod stats;

use core::alloc::{GlobalAlloc, Layout};
use core::ptr::{self, NonNull};

pub use allocator::Allocator;
pub use config::{AllocatorConfig, FreeStrategy, JumboMatchStrategy, Validation};
pub use error::AllocError;
pub use heap::FixedPageSource;
pub use traits::PageSource;

#[cfg(target_arch = "wasm32")]
pub use heap::WasmPageSource;

#[cfg(feature = "static-heap")]
pub use heap::StaticPageSource;

#[cfg(feature = "stats")]
pub use stats::HeapStats;

use lock::{SpinLock, SpinLockGuard};

/// A [`SpinLock`]-wrapped allocator usable as the global allocator.
///
/// The core takes `&mut self`; this wrapper serialises access so a single
/// instance can live in a `static` and back `#[global_allocator]` or the
/// C ABI exports.
pub struct LockedAllocator<S: PageSource> {
    inner: SpinLock<Allocator<S>>,
}

impl<S: PageSource> LockedAllocator<S> {
    /// Wrap an allocator with default policies over `source`.
    pub const fn new(source: S) -> Self {
        Self {
            inner: SpinLock::new(Allocator::new(source)),
        }
    }

    /// Wrap an allocator with explicit policies over `source`.
    pub const fn with_config(source: S, config: AllocatorConfig) -> Self {
        Self {
            inner: SpinLock::new(Allocator::with_config(source, config)),
        }
    }

    /// Lock and access the allocator directly.
    pub fn lock(&self) -> SpinLockGuard<'_, Allocator<S>> {
        self.inner.lock()
    }
}

unsafe impl<S: PageSource> GlobalAlloc for LockedAllocator<S> {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        // Zero-size allocations get a dangling aligned pointer.
        if layout.size() == 0 {
            return layout.align() as *mut u8;
        }

        match self.inner.lock().allocate(layout.size(), layout.align()) {
            Ok(payload) => payload.cast::<u8>().as_ptr(),
            Err(_) => ptr::null_mut(),
        }
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        if layout.size() == 0 {
            return;
        }
        let Some(payload) = NonNull::new(ptr) else {
            return;
        };
        // SAFETY: caller guarantees ptr came from this allocator
        unsafe { self.inner.lock().deallocate(payload) };
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        // A zero-size "allocation" holds no frame to resize.
        if layout.size() == 0 {
            // SAFETY: same contract as alloc
            return unsafe { self.alloc(Layout::from_size_align_unchecked(new_size, layout.align())) };
        }
        let Some(payload) = NonNull::new(ptr) else {
            return ptr::null_mut();
        };

        // Routing through resize keeps shrinking in place.
        // SAFETY: caller guarantees ptr came from this allocator
        match unsafe { self.inner.lock().resize(payload, new_size, layout.align()) } {
            Ok(payload) => payload.cast::<u8>().as_ptr(),
            Err(_) => ptr::null_mut(),
        }
    }
}
