//! Errors crossing the module boundary.
//!
//! Kernel APIs report failure as a negative errno in the return slot. On the
//! Rust side the same values are carried as [`Error`].

use core::ffi::c_int;

use kbindings::ssize_t;

pub use axerrno::LinuxError as Error;

pub type Result<T = ()> = core::result::Result<T, Error>;

/// Maps a positive errno value back to an [`Error`]. Values outside the
/// errno range collapse to `EIO`.
pub fn from_errno(errno: c_int) -> Error {
    Error::try_from(errno).unwrap_or(Error::EIO)
}

/// Maps a negative C status (`-errno`) to an [`Error`].
pub fn from_status(status: isize) -> Error {
    status
        .checked_neg()
        .and_then(|errno| c_int::try_from(errno).ok())
        .map_or(Error::EIO, from_errno)
}

/// Converts a byte count or an error into the `ssize_t` a read or write
/// callback returns.
pub fn from_result(result: Result<usize>) -> ssize_t {
    match result {
        Ok(count) => count as ssize_t,
        Err(err) => -(err as ssize_t),
    }
}

/// Return types accepted from a `#[init_fn]` function.
pub trait InitReturn {
    fn into_status(self) -> c_int;
}

impl InitReturn for c_int {
    fn into_status(self) -> c_int {
        self
    }
}

impl InitReturn for Result {
    fn into_status(self) -> c_int {
        match self {
            Ok(()) => 0,
            Err(err) => -(err as c_int),
        }
    }
}
