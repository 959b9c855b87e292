use core::ffi::{c_ulong, c_void};
use core::ptr::NonNull;

use crate::error::{Error, Result};

unsafe extern "C" {
    fn vmalloc(size: c_ulong) -> *mut c_void;
    fn vfree(addr: *const c_void);
}

/// A `vmalloc` allocation owned for the lifetime of the value and released
/// with `vfree` on drop.
pub struct VBuffer {
    ptr: NonNull<u8>,
    len: usize,
}

// SAFETY: the buffer is uniquely owned.
unsafe impl Send for VBuffer {}

impl VBuffer {
    /// Allocates `len` zeroed bytes. A zero-length buffer does not touch the
    /// allocator.
    pub fn try_new(len: usize) -> Result<Self> {
        if len == 0 {
            return Ok(VBuffer {
                ptr: NonNull::dangling(),
                len: 0,
            });
        }
        // SAFETY: plain allocation request, the result is checked for null.
        let raw = unsafe { vmalloc(len as c_ulong) };
        let ptr = NonNull::new(raw as *mut u8).ok_or(Error::ENOMEM)?;
        // SAFETY: the allocation is `len` bytes long.
        unsafe { core::ptr::write_bytes(ptr.as_ptr(), 0, len) };
        Ok(VBuffer { ptr, len })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_slice(&self) -> &[u8] {
        // SAFETY: `ptr` is valid and initialized for `len` bytes.
        unsafe { core::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: `ptr` is valid, initialized and uniquely borrowed.
        unsafe { core::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}

impl Drop for VBuffer {
    fn drop(&mut self) {
        if self.len != 0 {
            // SAFETY: `ptr` came from `vmalloc` and is freed exactly once.
            unsafe { vfree(self.ptr.as_ptr() as *const c_void) };
        }
    }
}
