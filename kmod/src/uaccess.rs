//! Access to caller-owned ("user") memory.
//!
//! A [`UserSlice`] is an address range handed in by the host. It is never
//! dereferenced directly: all transfers go through `copy_to_user` and
//! `copy_from_user`, which validate the range and report partial copies.

use core::ffi::{c_ulong, c_void};

use crate::error::{Error, Result};

unsafe extern "C" {
    fn copy_to_user(to: *mut c_void, from: *const c_void, n: c_ulong) -> c_ulong;
    fn copy_from_user(to: *mut c_void, from: *const c_void, n: c_ulong) -> c_ulong;
}

/// A caller address range of `len` bytes starting at `addr`.
pub struct UserSlice {
    addr: usize,
    len: usize,
}

impl UserSlice {
    /// # Safety
    ///
    /// The range must come from the host's dispatch of a read or write call;
    /// it is only touched through the host copy routines.
    pub unsafe fn new(addr: usize, len: usize) -> Self {
        UserSlice { addr, len }
    }

    pub fn reader(self) -> UserSliceReader {
        UserSliceReader {
            addr: self.addr,
            len: self.len,
        }
    }

    pub fn writer(self) -> UserSliceWriter {
        UserSliceWriter {
            addr: self.addr,
            len: self.len,
        }
    }
}

pub struct UserSliceReader {
    addr: usize,
    len: usize,
}

impl UserSliceReader {
    /// Bytes left to read.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Fills `out` from the front of the range and advances past it.
    ///
    /// Fails with `EFAULT` if `out` is longer than what is left or the host
    /// could not copy every byte.
    pub fn read_slice(&mut self, out: &mut [u8]) -> Result {
        if out.len() > self.len {
            return Err(Error::EFAULT);
        }
        // SAFETY: `out` is valid for writes of `out.len()` bytes.
        let left = unsafe {
            copy_from_user(
                out.as_mut_ptr() as *mut c_void,
                self.addr as *const c_void,
                out.len() as c_ulong,
            )
        };
        if left != 0 {
            return Err(Error::EFAULT);
        }
        self.addr = self.addr.wrapping_add(out.len());
        self.len -= out.len();
        Ok(())
    }
}

pub struct UserSliceWriter {
    addr: usize,
    len: usize,
}

impl UserSliceWriter {
    /// Room left in the caller's buffer.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Copies `data` to the front of the range and advances past it.
    pub fn write_slice(&mut self, data: &[u8]) -> Result {
        if data.len() > self.len {
            return Err(Error::EFAULT);
        }
        // SAFETY: `data` is valid for reads of `data.len()` bytes.
        let left = unsafe {
            copy_to_user(
                self.addr as *mut c_void,
                data.as_ptr() as *const c_void,
                data.len() as c_ulong,
            )
        };
        if left != 0 {
            return Err(Error::EFAULT);
        }
        self.addr = self.addr.wrapping_add(data.len());
        self.len -= data.len();
        Ok(())
    }
}
