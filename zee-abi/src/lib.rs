//! C ABI layer for the zee heap (`malloc`, `free`, `calloc`, `realloc`)
//!
//! Thin `extern "C"` wrappers over one static [`LockedAllocator`]. Each
//! export sits behind an on-by-default cargo feature so embedders can
//! drop the ones their module does not need. The shim carries no state of
//! its own; allocation failures map to null and corrupt pointers abort
//! through the core's validation checks.
//!
//! The payload pointer alone recovers the frame (the header sits right
//! before it), so `free` and `realloc` need nothing beyond the pointer
//! the caller hands back.
//!
//! In test mode the exports are suppressed: on a native host they would
//! interpose the system allocator and the test harness would allocate
//! through them from the first instruction. The behaviour behind them is
//! covered by the `zee-alloc` test suite.

#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]

#[cfg(not(test))]
use core::ffi::c_void;
#[cfg(not(test))]
use core::ptr::{self, NonNull};

#[cfg(not(test))]
use zee_alloc::LockedAllocator;

#[cfg(not(test))]
cfg_if::cfg_if! {
    if #[cfg(target_arch = "wasm32")] {
        use zee_alloc::WasmPageSource;

        static HEAP: LockedAllocator<WasmPageSource> =
            LockedAllocator::new(WasmPageSource::new());
    } else {
        use zee_alloc::StaticPageSource;

        // SAFETY: this is the only StaticPageSource in the program
        static HEAP: LockedAllocator<StaticPageSource> =
            LockedAllocator::new(unsafe { StaticPageSource::new() });
    }
}

/// C `malloc`: allocate `size` uninitialised bytes.
///
/// Returns null on exhaustion. A zero-size request returns a minimal
/// unique allocation, matching the common libc behaviour.
///
/// # Safety
///
/// The returned pointer must be released through `free` exactly once.
#[cfg(all(feature = "malloc", not(test)))]
#[no_mangle]
pub unsafe extern "C" fn malloc(size: usize) -> *mut c_void {
    let request = if size == 0 { 1 } else { size };
    match HEAP.lock().allocate(request, 1) {
        Ok(payload) => payload.cast::<u8>().as_ptr().cast(),
        Err(_) => ptr::null_mut(),
    }
}

/// C `free`: release a pointer from `malloc`, `calloc`, or `realloc`.
///
/// `free(NULL)` is a no-op.
///
/// # Safety
///
/// `ptr` must be null or a live allocation from this heap.
#[cfg(all(feature = "free", not(test)))]
#[no_mangle]
pub unsafe extern "C" fn free(ptr: *mut c_void) {
    let Some(payload) = NonNull::new(ptr.cast::<u8>()) else {
        return;
    };
    // SAFETY: caller guarantees the pointer came from this heap
    unsafe { HEAP.lock().deallocate(payload) };
}

/// C `calloc`: allocate a zeroed array of `count` elements of `size`
/// bytes. Returns null when the element count multiplication overflows
/// or memory runs out.
///
/// # Safety
///
/// The returned pointer must be released through `free` exactly once.
#[cfg(all(feature = "calloc", not(test)))]
#[no_mangle]
pub unsafe extern "C" fn calloc(count: usize, size: usize) -> *mut c_void {
    let Some(total) = count.checked_mul(size) else {
        return ptr::null_mut();
    };
    let request = if total == 0 { 1 } else { total };
    match HEAP.lock().allocate(request, 1) {
        Ok(payload) => {
            let ptr = payload.cast::<u8>().as_ptr();
            // SAFETY: the payload is at least `request` bytes
            unsafe { ptr.write_bytes(0, request) };
            ptr.cast()
        }
        Err(_) => ptr::null_mut(),
    }
}

/// C `realloc`: change the size of an allocation.
///
/// `realloc(NULL, n)` behaves like `malloc(n)`; `realloc(p, 0)` frees `p`
/// and returns null. Shrinking keeps the pointer; growing moves the block
/// and copies its contents.
///
/// # Safety
///
/// `ptr` must be null or a live allocation from this heap.
#[cfg(all(feature = "realloc", not(test)))]
#[no_mangle]
pub unsafe extern "C" fn realloc(ptr: *mut c_void, size: usize) -> *mut c_void {
    let Some(payload) = NonNull::new(ptr.cast::<u8>()) else {
        return match HEAP.lock().allocate(if size == 0 { 1 } else { size }, 1) {
            Ok(payload) => payload.cast::<u8>().as_ptr().cast(),
            Err(_) => ptr::null_mut(),
        };
    };
    if size == 0 {
        // SAFETY: caller guarantees the pointer came from this heap
        unsafe { HEAP.lock().deallocate(payload) };
        return ptr::null_mut();
    }

    // SAFETY: caller guarantees the pointer came from this heap
    match unsafe { HEAP.lock().resize(payload, size, 1) } {
        Ok(payload) => payload.cast::<u8>().as_ptr().cast(),
        Err(_) => ptr::null_mut(),
    }
}
