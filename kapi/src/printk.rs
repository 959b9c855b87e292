//! Kernel log.
//!
//! `printk` records go to the `log` facade under the `kmsg` target and into
//! a bounded ring buffer that readers can scan by sequence number.

use alloc::{collections::VecDeque, string::String, vec::Vec};
use core::ffi::{c_char, c_int};

use kbindings::{LOG_LINE_MAX, LOGLEVEL_ERR, LOGLEVEL_INFO, LOGLEVEL_NOTICE, LOGLEVEL_WARNING};
use kmod::capi_fn;
use spin::Mutex;

/// Records kept before the oldest ones are dropped.
pub const KMSG_CAPACITY: usize = 512;

/// One `printk` record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub seq: u64,
    pub level: c_int,
    pub text: String,
}

struct Kmsg {
    records: VecDeque<Record>,
    next_seq: u64,
}

impl Kmsg {
    fn push(&mut self, level: c_int, text: String) {
        if self.records.len() == KMSG_CAPACITY {
            self.records.pop_front();
        }
        self.records.push_back(Record {
            seq: self.next_seq,
            level,
            text,
        });
        self.next_seq += 1;
    }
}

static KMSG: Mutex<Kmsg> = Mutex::new(Kmsg {
    records: VecDeque::new(),
    next_seq: 0,
});

fn log_level(level: c_int) -> log::Level {
    match level {
        l if l <= LOGLEVEL_ERR => log::Level::Error,
        LOGLEVEL_WARNING => log::Level::Warn,
        LOGLEVEL_NOTICE | LOGLEVEL_INFO => log::Level::Info,
        _ => log::Level::Debug,
    }
}

/// Logs `len` bytes at `msg` with the given `LOGLEVEL_*`. A trailing newline
/// ends the record and is not stored; text past `LOG_LINE_MAX` bytes is
/// dropped. Returns the number of bytes kept.
#[capi_fn]
pub unsafe extern "C" fn printk(level: c_int, msg: *const c_char, len: usize) -> c_int {
    if msg.is_null() {
        return 0;
    }
    let bytes = core::slice::from_raw_parts(msg as *const u8, len.min(LOG_LINE_MAX));
    let text = String::from_utf8_lossy(bytes);
    let text = text.strip_suffix('\n').unwrap_or(&text);

    log::log!(target: "kmsg", log_level(level), "{}", text);
    KMSG.lock().push(level, String::from(text));
    bytes.len() as c_int
}

/// Sequence number the next record will get.
pub fn next_seq() -> u64 {
    KMSG.lock().next_seq
}

/// Records with a sequence number of at least `seq` that are still buffered.
pub fn records_since(seq: u64) -> Vec<Record> {
    KMSG.lock()
        .records
        .iter()
        .filter(|record| record.seq >= seq)
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn emit(level: c_int, msg: &str) {
        unsafe { printk(level, msg.as_ptr() as *const c_char, msg.len()) };
    }

    #[test]
    fn test_printk_records_text_and_level() {
        crate::init_test_logger();
        let start = next_seq();
        emit(LOGLEVEL_WARNING, "printk-test: something odd\n");

        let records = records_since(start);
        let record = records
            .iter()
            .find(|r| r.text == "printk-test: something odd")
            .expect("record missing");
        assert_eq!(record.level, LOGLEVEL_WARNING);
        assert!(record.seq >= start);
    }

    #[test]
    fn test_printk_keeps_invalid_utf8_readable() {
        let start = next_seq();
        let msg = b"printk-test: \xff\xfe raw";
        unsafe { printk(LOGLEVEL_INFO, msg.as_ptr() as *const c_char, msg.len()) };
        assert!(
            records_since(start)
                .iter()
                .any(|r| r.text == "printk-test: \u{fffd}\u{fffd} raw")
        );
    }

    #[test]
    fn test_printk_cuts_long_records() {
        let start = next_seq();
        let msg = [b'a'; LOG_LINE_MAX * 3];
        let kept = unsafe { printk(LOGLEVEL_INFO, msg.as_ptr() as *const c_char, msg.len()) };
        assert_eq!(kept as usize, LOG_LINE_MAX);
        let records = records_since(start);
        let record = records
            .iter()
            .find(|r| r.text.starts_with("aaa"))
            .expect("record missing");
        assert_eq!(record.text.len(), LOG_LINE_MAX);
    }

    #[test]
    fn test_kmsg_drops_oldest_records() {
        let mut kmsg = Kmsg {
            records: VecDeque::new(),
            next_seq: 0,
        };
        for i in 0..KMSG_CAPACITY + 3 {
            kmsg.push(LOGLEVEL_INFO, alloc::format!("line {}", i));
        }
        assert_eq!(kmsg.records.len(), KMSG_CAPACITY);
        assert_eq!(kmsg.records.front().map(|r| r.seq), Some(3));
        assert_eq!(kmsg.next_seq, KMSG_CAPACITY as u64 + 3);
    }

    #[test]
    fn test_log_level_mapping() {
        assert_eq!(log_level(0), log::Level::Error);
        assert_eq!(log_level(LOGLEVEL_ERR), log::Level::Error);
        assert_eq!(log_level(LOGLEVEL_WARNING), log::Level::Warn);
        assert_eq!(log_level(LOGLEVEL_INFO), log::Level::Info);
        assert_eq!(log_level(7), log::Level::Debug);
    }
}
