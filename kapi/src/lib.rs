//! The host side of the module ABI: the kernel functions a module links
//! against, the proc namespace those entries live in, and the bookkeeping to
//! run a module's init and exit hooks.
#![no_std]
#![allow(unsafe_op_in_unsafe_fn)]
extern crate alloc;

use axerrno::{LinuxError, LinuxResult};

type Result<T = ()> = LinuxResult<T>;
type KernelErr = LinuxError;

pub mod ksym;
pub mod module;
pub mod printk;
pub mod proc_fs;
pub mod uaccess;
pub mod vmalloc;

#[cfg(test)]
extern crate std;

/// Serialises tests that touch host-global state.
#[cfg(test)]
pub(crate) static TEST_LOCK: spin::Mutex<()> = spin::Mutex::new(());

#[cfg(test)]
pub(crate) fn init_test_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}
