//! `vmalloc` and `vfree` backed by the host heap.
//!
//! Each allocation carries a small header with its size so `vfree` can
//! rebuild the layout. Failures can be injected with [`fail_next`].

use alloc::alloc::{Layout, alloc, dealloc};
use core::ffi::{c_ulong, c_void};
use core::sync::atomic::{AtomicUsize, Ordering};

use kmod::capi_fn;

const HEADER: usize = 16;

static LIVE: AtomicUsize = AtomicUsize::new(0);
static FAIL_NEXT: AtomicUsize = AtomicUsize::new(0);

/// Makes the next `count` calls to `vmalloc` fail.
pub fn fail_next(count: usize) {
    FAIL_NEXT.store(count, Ordering::SeqCst);
}

/// Number of `vmalloc` allocations not yet passed to `vfree`.
pub fn live_allocations() -> usize {
    LIVE.load(Ordering::SeqCst)
}

fn layout_for(size: usize) -> Option<Layout> {
    let total = size.checked_add(HEADER)?;
    Layout::from_size_align(total, HEADER).ok()
}

/// Allocates `size` bytes. Returns null for a zero size, an injected
/// failure, or when the heap is exhausted.
#[capi_fn]
pub unsafe extern "C" fn vmalloc(size: c_ulong) -> *mut c_void {
    let size = size as usize;
    if size == 0 {
        log::warn!("vmalloc: zero-size allocation request");
        return core::ptr::null_mut();
    }
    if FAIL_NEXT
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
    {
        log::debug!("vmalloc: injected failure for {} bytes", size);
        return core::ptr::null_mut();
    }
    let Some(layout) = layout_for(size) else {
        log::warn!("vmalloc: size {:#x} too large", size);
        return core::ptr::null_mut();
    };
    let base = alloc(layout);
    if base.is_null() {
        log::warn!("vmalloc: out of memory for {} bytes", size);
        return core::ptr::null_mut();
    }
    (base as *mut usize).write(size);
    LIVE.fetch_add(1, Ordering::SeqCst);
    base.add(HEADER) as *mut c_void
}

/// Releases memory obtained from [`vmalloc`]. Null is ignored.
#[capi_fn]
pub unsafe extern "C" fn vfree(addr: *const c_void) {
    if addr.is_null() {
        return;
    }
    let base = (addr as *mut u8).sub(HEADER);
    let size = (base as *const usize).read();
    if let Some(layout) = layout_for(size) {
        dealloc(base, layout);
        LIVE.fetch_sub(1, Ordering::SeqCst);
    }
}
