//! Core allocator
//!
//! Owns the per-bucket free lists and the backing page source. Allocation
//! picks a bucket, scans upward for a fitting free frame, asks the source
//! for fresh pages on a miss, then splits the frame down to the target
//! size. Freeing walks the buddy chain and merges equal-sized free
//! neighbours (under the default `Compact` strategy).

use core::ptr;
use core::ptr::NonNull;

use crate::config::{
    AllocatorConfig, BUCKET_COUNT, FreeStrategy, HEADER_SIZE, JUMBO_BUCKET, JumboMatchStrategy,
    MIN_FRAME_SIZE, PAGE_BUCKET, PAGE_SIZE, Validation,
};
use crate::error::AllocError;
use crate::frame::Frame;
use crate::freelist::FreeList;
use crate::size_class;
use crate::traits::PageSource;

#[cfg(feature = "stats")]
use crate::stats::HeapStats;

/// Buddy allocator over a grow-only page source.
///
/// Single-threaded: all operations take `&mut self` and callers needing a
/// shared instance wrap it in [`LockedAllocator`](crate::LockedAllocator).
pub struct Allocator<S: PageSource> {
    source: S,
    free_lists: [FreeList; BUCKET_COUNT],
    config: AllocatorConfig,

    #[cfg(feature = "stats")]
    stats: HeapStats,
}

// SAFETY: the frame pointers in the free lists refer to memory owned by
// the page source, so moving the allocator between threads moves the whole
// heap with it.
unsafe impl<S: PageSource + Send> Send for Allocator<S> {}

impl<S: PageSource> Allocator<S> {
    /// Create an allocator with default policies.
    pub const fn new(source: S) -> Self {
        Self::with_config(source, AllocatorConfig::new())
    }

    /// Create an allocator with explicit policies.
    pub const fn with_config(source: S, config: AllocatorConfig) -> Self {
        Self {
            source,
            free_lists: [const { FreeList::new() }; BUCKET_COUNT],
            config,
            #[cfg(feature = "stats")]
            stats: HeapStats::new(),
        }
    }

    /// The backing page source.
    pub fn page_source(&self) -> &S {
        &self.source
    }

    /// Current counters. Feature `stats`.
    #[cfg(feature = "stats")]
    pub fn stats(&self) -> HeapStats {
        self.stats.clone()
    }

    /// Allocate `size` bytes aligned to `align`.
    ///
    /// Payloads are always aligned to [`HEADER_SIZE`]; anything stricter
    /// is refused with [`AllocError::OutOfMemory`]. The returned slice is
    /// exactly `size` bytes long even when the underlying frame is larger.
    pub fn allocate(&mut self, size: usize, align: usize) -> Result<NonNull<[u8]>, AllocError> {
        if align > HEADER_SIZE {
            return Err(AllocError::OutOfMemory);
        }
        let target = size_class::pad_to_frame_size(size).ok_or(AllocError::OutOfMemory)?;

        let frame = match self.take_free_frame(target) {
            Some(frame) => frame,
            None => self.request_fresh_frame(target)?,
        };
        let mut frame = self.split_to_fit(frame, target);

        // SAFETY: the frame is detached from every list and owned here
        unsafe {
            frame.as_mut().mark_allocated();

            #[cfg(feature = "stats")]
            {
                self.stats.live_bytes += frame.as_ref().frame_size();
                self.stats.total_allocs += 1;
                self.stats.update_peak();
            }

            Ok(frame.as_ref().payload_slice(0, size))
        }
    }

    /// Resize the allocation behind `payload` to `new_size` bytes.
    ///
    /// Shrinking stays in place: the frame is split down to the smallest
    /// class that still fits and the remainders go back on the free lists.
    /// Growing allocates fresh, copies, and frees the old frame; there is
    /// no in-place grow even when the neighbouring buddy is free.
    ///
    /// # Safety
    ///
    /// `payload` must point at an allocation handed out by this allocator
    /// and not yet freed.
    pub unsafe fn resize(
        &mut self,
        payload: NonNull<u8>,
        new_size: usize,
        new_align: usize,
    ) -> Result<NonNull<[u8]>, AllocError> {
        if new_align > HEADER_SIZE {
            return Err(AllocError::OutOfMemory);
        }
        // SAFETY: caller guarantees payload came from this allocator
        let frame = unsafe { self.recover_allocated_frame(payload) };
        let payload_size = unsafe { frame.as_ref().payload_size() };

        if new_size <= payload_size {
            let target = size_class::pad_to_frame_size(new_size).ok_or(AllocError::OutOfMemory)?;

            #[cfg(feature = "stats")]
            let before = unsafe { frame.as_ref().frame_size() };

            let frame = self.split_to_fit(frame, target);

            #[cfg(feature = "stats")]
            {
                self.stats.live_bytes -= before - unsafe { frame.as_ref().frame_size() };
            }

            return Ok(unsafe { frame.as_ref() }.payload_slice(0, new_size));
        }

        let new = self.allocate(new_size, new_align)?;
        // SAFETY: both regions are live and at least payload_size bytes;
        // they never overlap because the old frame is still allocated.
        unsafe {
            ptr::copy_nonoverlapping(payload.as_ptr(), new.cast::<u8>().as_ptr(), payload_size);
            self.deallocate(payload);
        }
        Ok(new)
    }

    /// Return the allocation behind `payload` to the free lists.
    ///
    /// # Safety
    ///
    /// `payload` must point at an allocation handed out by this allocator
    /// and not yet freed.
    pub unsafe fn deallocate(&mut self, payload: NonNull<u8>) {
        // SAFETY: caller guarantees payload came from this allocator
        let mut frame = unsafe { self.recover_allocated_frame(payload) };

        // SAFETY: the frame is valid and detached from every list
        unsafe { frame.as_mut().mark_free() };
        let size = unsafe { frame.as_ref().frame_size() };

        #[cfg(feature = "stats")]
        {
            self.stats.live_bytes -= size;
            self.stats.total_frees += 1;
        }

        let frame = if self.config.free_strategy == FreeStrategy::Fast || size >= PAGE_SIZE {
            frame
        } else {
            self.coalesce(frame)
        };

        let size = unsafe { frame.as_ref().frame_size() };
        // SAFETY: the frame is free and unlinked
        unsafe { self.free_lists[size_class::bucket_of(size)].prepend(frame) };
    }

    /// Find and detach a free frame of at least `target` bytes, or report
    /// a miss so the caller can grow the backing.
    fn take_free_frame(&mut self, target: usize) -> Option<NonNull<Frame>> {
        if target > PAGE_SIZE {
            return self.take_jumbo(target);
        }

        let mut search = target;
        loop {
            let bucket = size_class::bucket_of(search);
            // Non-jumbo buckets hold one size only, so the head always fits.
            // SAFETY: listed frames are live
            if let Some(frame) = unsafe { self.free_lists[bucket].pop() } {
                return Some(frame);
            }
            if bucket <= PAGE_BUCKET {
                return None;
            }
            search *= 2;
        }
    }

    /// Scan the jumbo bucket under the configured match strategy.
    fn take_jumbo(&mut self, target: usize) -> Option<NonNull<Frame>> {
        let strategy = self.config.jumbo_match_strategy;
        let list = &mut self.free_lists[JUMBO_BUCKET];

        let mut cursor: Option<NonNull<Frame>> = None;
        let mut current = list.head();
        // Cursor preceding the best fit seen so far, and that fit's size.
        let mut best: Option<(Option<NonNull<Frame>>, usize)> = None;

        while let Some(frame) = current {
            // SAFETY: listed frames are live
            let size = unsafe { frame.as_ref().frame_size() };

            if size == target {
                // SAFETY: cursor precedes frame on this list
                return unsafe { list.remove_after(cursor) };
            }
            if size > target {
                match strategy {
                    JumboMatchStrategy::Exact => {}
                    // SAFETY: cursor precedes frame on this list
                    JumboMatchStrategy::First => return unsafe { list.remove_after(cursor) },
                    JumboMatchStrategy::Closest => {
                        if best.map_or(true, |(_, best_size)| size < best_size) {
                            best = Some((cursor, size));
                        }
                    }
                }
            }

            cursor = current;
            // SAFETY: listed frames are live
            current = unsafe { frame.as_ref().next_free() };
        }

        let (best_cursor, _) = best?;
        // SAFETY: best_cursor precedes the recorded frame on this list
        unsafe { list.remove_after(best_cursor) }
    }

    /// Grow the backing by enough whole pages to carry `target` bytes and
    /// lay a fresh frame over the new region.
    fn request_fresh_frame(&mut self, target: usize) -> Result<NonNull<Frame>, AllocError> {
        let bytes = target.max(PAGE_SIZE);
        let region = self.source.allocate_pages(bytes)?;

        #[cfg(feature = "stats")]
        {
            self.stats.committed_bytes += bytes;
        }

        // SAFETY: the source contract gives a page-aligned region of
        // exactly `bytes` bytes
        Ok(unsafe { Frame::init(region.as_ptr() as usize, bytes) })
    }

    /// Split `frame` down until it is the smallest legal size covering
    /// `target`, prepending each carved upper half to its bucket. Jumbo
    /// frames are never split.
    fn split_to_fit(&mut self, mut frame: NonNull<Frame>, target: usize) -> NonNull<Frame> {
        let floor = target.max(MIN_FRAME_SIZE);

        // SAFETY: the frame is owned here and carved regions stay inside it
        unsafe {
            while frame.as_ref().frame_size() > floor && frame.as_ref().frame_size() <= PAGE_SIZE {
                let half = frame.as_ref().frame_size() / 2;
                let upper = Frame::init(frame.as_ref().addr() + half, half);
                self.free_lists[size_class::bucket_of(half)].prepend(upper);
                frame.as_mut().set_frame_size(half);

                #[cfg(feature = "stats")]
                {
                    self.stats.frames_split += 1;
                }
            }
        }
        frame
    }

    /// Merge `frame` with its buddy while both are free and of equal
    /// size, stopping at one page. Returns the merged frame, unlinked.
    fn coalesce(&mut self, mut frame: NonNull<Frame>) -> NonNull<Frame> {
        // SAFETY: the freed frame is owned here; buddy addresses of
        // non-jumbo frames always carry a frame header (they descend from
        // the same page by halving)
        unsafe {
            loop {
                let size = frame.as_ref().frame_size();
                if size >= PAGE_SIZE {
                    break;
                }

                let addr = frame.as_ref().addr();
                let buddy_addr = size_class::buddy_addr(addr, size);
                let buddy = Frame::from_addr(buddy_addr);

                // An allocated buddy is in use no matter what its size
                // field appears to say; a different size means the buddy
                // is split finer and this is a coalescing frontier.
                if buddy.as_ref().is_allocated() || buddy.as_ref().frame_size() != size {
                    break;
                }

                let removed = self.free_lists[size_class::bucket_of(size)].remove(buddy);
                if self.config.validation == Validation::Dev {
                    assert!(removed, "free buddy frame missing from its bucket");
                }

                let mut merged = Frame::from_addr(addr.min(buddy_addr));
                merged.as_mut().set_frame_size(size * 2);
                frame = merged;

                #[cfg(feature = "stats")]
                {
                    self.stats.frames_merged += 1;
                }
            }
        }
        frame
    }

    /// Recover and validate the frame behind a user payload pointer.
    ///
    /// Under `Dev` and `External` validation a pointer that does not
    /// recover to an allocated frame aborts; under `Unsafe` it is trusted.
    ///
    /// # Safety
    ///
    /// `payload` must point into memory handed out by this allocator.
    unsafe fn recover_allocated_frame(&self, payload: NonNull<u8>) -> NonNull<Frame> {
        if self.config.validation == Validation::Unsafe {
            // SAFETY: caller guarantees a valid payload pointer
            return unsafe { Frame::from_payload_unchecked(payload) };
        }

        // SAFETY: caller guarantees the pointer came from this allocator
        let frame = match unsafe { Frame::from_payload(payload) } {
            Ok(frame) => frame,
            Err(_) => panic!("pointer {:p} does not recover to a frame", payload),
        };
        // SAFETY: validated above
        if !unsafe { frame.as_ref().is_allocated() } {
            panic!("pointer {:p} was freed twice or never allocated", payload);
        }
        frame
    }
}
