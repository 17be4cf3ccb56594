//! Intrusive free lists
//!
//! A headed singly-linked list of free frames, threaded through the `next`
//! slot of each frame header. The allocator keeps one per size class plus
//! one for jumbo frames. Insertion is always at the head.

use core::ptr::NonNull;

use crate::frame::Frame;

/// One free list. The head is the only out-of-band word.
pub struct FreeList {
    head: Option<NonNull<Frame>>,
}

impl FreeList {
    pub const fn new() -> Self {
        Self { head: None }
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// First frame on the list, for cursor walks.
    pub fn head(&self) -> Option<NonNull<Frame>> {
        self.head
    }

    /// Push `frame` at the head.
    ///
    /// # Safety
    ///
    /// `frame` must be a live free frame that is not already on any list.
    pub unsafe fn prepend(&mut self, mut frame: NonNull<Frame>) {
        // SAFETY: caller guarantees the frame is live and unlinked
        unsafe { frame.as_mut().set_next_free(self.head) };
        self.head = Some(frame);
    }

    /// Detach and return the head frame.
    ///
    /// # Safety
    ///
    /// Every frame on the list must be live.
    pub unsafe fn pop(&mut self) -> Option<NonNull<Frame>> {
        // SAFETY: deferred to remove_after
        unsafe { self.remove_after(None) }
    }

    /// Detach and return the frame after `cursor`, where `None` means the
    /// head itself. Returns `None` when there is nothing to detach.
    ///
    /// # Safety
    ///
    /// `cursor` must be `None` or a frame currently on this list, and every
    /// frame on the list must be live.
    pub unsafe fn remove_after(&mut self, cursor: Option<NonNull<Frame>>) -> Option<NonNull<Frame>> {
        // SAFETY: caller guarantees list membership and liveness throughout
        unsafe {
            let mut taken = match cursor {
                None => {
                    let taken = self.head?;
                    self.head = taken.as_ref().next_free();
                    taken
                }
                Some(mut cursor) => {
                    let taken = cursor.as_ref().next_free()?;
                    cursor.as_mut().set_next_free(taken.as_ref().next_free());
                    taken
                }
            };
            taken.as_mut().set_next_free(None);
            Some(taken)
        }
    }

    /// Unlink `target` wherever it sits. Returns whether it was found.
    ///
    /// O(n) scan; only the buddy-coalescing path uses this.
    ///
    /// # Safety
    ///
    /// Every frame on the list must be live.
    pub unsafe fn remove(&mut self, target: NonNull<Frame>) -> bool {
        let mut cursor: Option<NonNull<Frame>> = None;
        let mut current = self.head;
        while let Some(frame) = current {
            if frame == target {
                // SAFETY: cursor precedes target on this list
                unsafe { self.remove_after(cursor) };
                return true;
            }
            cursor = current;
            // SAFETY: caller guarantees liveness
            current = unsafe { frame.as_ref().next_free() };
        }
        false
    }

    /// Number of frames on the list.
    pub fn len(&self) -> usize {
        let mut count = 0;
        let mut current = self.head;
        while let Some(frame) = current {
            count += 1;
            // SAFETY: frames on a list are live by the allocator's invariant
            current = unsafe { frame.as_ref().next_free() };
        }
        count
    }
}

impl Default for FreeList {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[repr(C, align(64))]
    struct Buf([u8; 512]);

    fn frames(buf: &mut Buf) -> [NonNull<Frame>; 4] {
        let base = buf.0.as_mut_ptr() as usize;
        core::array::from_fn(|i| unsafe { Frame::init(base + i * 128, 128) })
    }

    #[test]
    fn test_prepend_pop_lifo() {
        let mut buf = Buf([0; 512]);
        let [a, b, c, _] = frames(&mut buf);

        let mut list = FreeList::new();
        assert!(list.is_empty());
        unsafe {
            list.prepend(a);
            list.prepend(b);
            list.prepend(c);

            assert_eq!(list.len(), 3);
            assert_eq!(list.pop(), Some(c));
            assert_eq!(list.pop(), Some(b));
            assert_eq!(list.pop(), Some(a));
            assert_eq!(list.pop(), None);
        }
        assert!(list.is_empty());
    }

    #[test]
    fn test_remove_after_cursor() {
        let mut buf = Buf([0; 512]);
        let [a, b, c, _] = frames(&mut buf);

        let mut list = FreeList::new();
        unsafe {
            list.prepend(a);
            list.prepend(b);
            list.prepend(c);

            // List is c -> b -> a; detach b.
            assert_eq!(list.remove_after(Some(c)), Some(b));
            assert_eq!(list.len(), 2);
            assert_eq!(list.pop(), Some(c));
            assert_eq!(list.pop(), Some(a));

            // Cursor at the tail has nothing after it.
            list.prepend(a);
            assert_eq!(list.remove_after(Some(a)), None);
        }
    }

    #[test]
    fn test_remove_by_identity() {
        let mut buf = Buf([0; 512]);
        let [a, b, c, d] = frames(&mut buf);

        let mut list = FreeList::new();
        unsafe {
            list.prepend(a);
            list.prepend(b);
            list.prepend(c);

            assert!(list.remove(b));
            assert_eq!(list.len(), 2);
            assert!(!list.remove(d));

            assert!(list.remove(c));
            assert!(list.remove(a));
        }
        assert!(list.is_empty());
    }

    #[test]
    fn test_detached_frame_is_unlinked() {
        let mut buf = Buf([0; 512]);
        let [a, b, _, _] = frames(&mut buf);

        let mut list = FreeList::new();
        unsafe {
            list.prepend(a);
            list.prepend(b);

            let popped = list.pop().unwrap();
            assert_eq!(popped.as_ref().next_free(), None);
        }
    }
}
