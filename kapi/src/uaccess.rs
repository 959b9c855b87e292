//! Copies across the caller boundary.
//!
//! Both routines return the number of bytes that could *not* be copied, so
//! `0` means success. A range that is null or wraps the address space fails
//! as a whole.
//!
//! References: <https://elixir.bootlin.com/linux/v6.6/source/include/linux/uaccess.h>

use core::ffi::{c_ulong, c_void};

use kmod::capi_fn;

fn access_ok(addr: usize, size: usize) -> bool {
    size == 0 || (addr != 0 && addr.checked_add(size).is_some())
}

#[capi_fn]
pub unsafe extern "C" fn copy_to_user(to: *mut c_void, from: *const c_void, n: c_ulong) -> c_ulong {
    let size = n as usize;
    if !access_ok(to as usize, size) {
        return n;
    }
    if size != 0 {
        core::ptr::copy_nonoverlapping(from as *const u8, to as *mut u8, size);
    }
    0
}

#[capi_fn]
pub unsafe extern "C" fn copy_from_user(
    to: *mut c_void,
    from: *const c_void,
    n: c_ulong,
) -> c_ulong {
    let size = n as usize;
    if !access_ok(from as usize, size) {
        // Like the kernel, never leave stale bytes in the destination.
        if !to.is_null() && size != 0 {
            core::ptr::write_bytes(to as *mut u8, 0, size);
        }
        return n;
    }
    if size != 0 {
        core::ptr::copy_nonoverlapping(from as *const u8, to as *mut u8, size);
    }
    0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_copy_to_user() {
        let src = *b"Hello";
        let mut dst = [0u8; 5];
        let left = unsafe {
            copy_to_user(
                dst.as_mut_ptr() as *mut c_void,
                src.as_ptr() as *const c_void,
                5,
            )
        };
        assert_eq!(left, 0);
        assert_eq!(&dst, b"Hello");
    }

    #[test]
    fn test_copy_to_null_faults() {
        let src = *b"Hello";
        let left =
            unsafe { copy_to_user(core::ptr::null_mut(), src.as_ptr() as *const c_void, 5) };
        assert_eq!(left, 5);
    }

    #[test]
    fn test_copy_from_bad_range_clears_destination() {
        let mut dst = [0x55u8; 4];
        let left = unsafe {
            copy_from_user(
                dst.as_mut_ptr() as *mut c_void,
                usize::MAX as *const c_void,
                4,
            )
        };
        assert_eq!(left, 4);
        assert_eq!(dst, [0; 4]);
    }

    #[test]
    fn test_zero_length_copy_always_succeeds() {
        let left = unsafe { copy_from_user(core::ptr::null_mut(), core::ptr::null(), 0) };
        assert_eq!(left, 0);
    }
}
