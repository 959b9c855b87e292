//! Printing through the host kernel log.
//!
//! Messages are formatted module-side and handed to `printk` as one record,
//! prefixed with the name of the crate that emitted them. Formatting happens
//! on the stack and stops at [`LOG_LINE_MAX`] bytes.

use core::ffi::{c_char, c_int};
use core::fmt;

use kbindings::LOG_LINE_MAX;

unsafe extern "C" {
    fn printk(level: c_int, msg: *const c_char, len: usize) -> c_int;
}

/// Returns the crate part of a `module_path!()`.
pub fn module_name(path: &'static str) -> &'static str {
    path.split("::").next().unwrap_or(path)
}

/// A record being formatted. Text past `LOG_LINE_MAX` is dropped.
struct LineBuf {
    buf: [u8; LOG_LINE_MAX],
    len: usize,
}

impl LineBuf {
    const fn new() -> Self {
        LineBuf {
            buf: [0; LOG_LINE_MAX],
            len: 0,
        }
    }

    fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }
}

impl fmt::Write for LineBuf {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let mut n = s.len().min(LOG_LINE_MAX - self.len);
        while !s.is_char_boundary(n) {
            n -= 1;
        }
        self.buf[self.len..self.len + n].copy_from_slice(&s.as_bytes()[..n]);
        self.len += n;
        // Stops the formatter once the line is full.
        if n < s.len() { Err(fmt::Error) } else { Ok(()) }
    }
}

pub fn call_printk(level: c_int, module_name: &str, args: fmt::Arguments<'_>) {
    let mut line = LineBuf::new();
    // An `Err` only means the line was cut at `LOG_LINE_MAX`.
    let _ = fmt::write(&mut line, format_args!("{}: {}", module_name, args));
    let msg = line.as_bytes();
    // SAFETY: `msg` is valid for `len` bytes for the duration of the call.
    unsafe {
        printk(level, msg.as_ptr() as *const c_char, msg.len());
    }
}

#[doc(hidden)]
#[macro_export]
macro_rules! print_macro {
    ($level:expr, $($arg:tt)+) => {
        $crate::print::call_printk(
            $level,
            $crate::print::module_name(::core::module_path!()),
            ::core::format_args!($($arg)+),
        )
    };
}

#[macro_export]
macro_rules! pr_emerg {
    ($($arg:tt)+) => { $crate::print_macro!($crate::bindings::LOGLEVEL_EMERG, $($arg)+) };
}

#[macro_export]
macro_rules! pr_alert {
    ($($arg:tt)+) => { $crate::print_macro!($crate::bindings::LOGLEVEL_ALERT, $($arg)+) };
}

#[macro_export]
macro_rules! pr_crit {
    ($($arg:tt)+) => { $crate::print_macro!($crate::bindings::LOGLEVEL_CRIT, $($arg)+) };
}

#[macro_export]
macro_rules! pr_err {
    ($($arg:tt)+) => { $crate::print_macro!($crate::bindings::LOGLEVEL_ERR, $($arg)+) };
}

#[macro_export]
macro_rules! pr_warn {
    ($($arg:tt)+) => { $crate::print_macro!($crate::bindings::LOGLEVEL_WARNING, $($arg)+) };
}

#[macro_export]
macro_rules! pr_notice {
    ($($arg:tt)+) => { $crate::print_macro!($crate::bindings::LOGLEVEL_NOTICE, $($arg)+) };
}

#[macro_export]
macro_rules! pr_info {
    ($($arg:tt)+) => { $crate::print_macro!($crate::bindings::LOGLEVEL_INFO, $($arg)+) };
}

#[macro_export]
macro_rules! pr_debug {
    ($($arg:tt)+) => { $crate::print_macro!($crate::bindings::LOGLEVEL_DEBUG, $($arg)+) };
}
