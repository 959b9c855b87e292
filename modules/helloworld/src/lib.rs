#![no_std]
extern crate alloc;

use core::ffi::CStr;
use core::sync::atomic::{AtomicBool, Ordering};

use kmod::prelude::*;
use spin::Mutex;

// Links the host exports into the unit test binary.
#[cfg(test)]
#[used]
static HOST_SYMBOLS: &&[kapi::ksym::KernelSymbol] = &kapi::ksym::KSYMTAB;

const NAME: &str = "helloworld";
const ENTRY_NAME: &CStr = c"helloworld";
/// rw-r--r--
const PERMS: Mode = Mode::from_octal(0o644);

/// Returned by the first read of every open.
pub const GREETING: &[u8] = b"Hello world!\n";

/// Whether an open file has already handed out the greeting.
#[derive(Default)]
pub struct ReadCursor {
    done: AtomicBool,
}

impl ReadCursor {
    /// Returns `true` and rewinds if the greeting was already read.
    fn rewind_if_done(&self) -> bool {
        self.done.swap(false, Ordering::AcqRel)
    }

    fn mark_done(&self) {
        self.done.store(true, Ordering::Release);
    }
}

struct HelloProc;

impl ProcOperations for HelloProc {
    type Data = ReadCursor;

    const HAS_READ: bool = true;
    const HAS_WRITE: bool = true;

    fn open(_file: &File) -> Result<ReadCursor> {
        Ok(ReadCursor::default())
    }

    fn read(
        cursor: &ReadCursor,
        _file: &File,
        writer: &mut UserSliceWriter,
        _offset: u64,
    ) -> Result<usize> {
        pr_info!("/proc/{} read called.\n", NAME);
        // A zero-sized read consumes nothing.
        if writer.is_empty() {
            return Ok(0);
        }
        if cursor.rewind_if_done() {
            return Ok(0);
        }
        let len = GREETING.len().min(writer.len());
        writer.write_slice(&GREETING[..len])?;
        cursor.mark_done();
        Ok(len)
    }

    fn write(
        _cursor: &ReadCursor,
        _file: &File,
        reader: &mut UserSliceReader,
        _offset: u64,
    ) -> Result<usize> {
        let len = reader.len();
        let mut page = VBuffer::try_new(len)?;
        reader.read_slice(page.as_mut_slice())?;
        pr_info!(
            "User has sent the value of {}\n",
            page.as_slice().escape_ascii()
        );
        Ok(len)
    }
}

static ENTRY: Mutex<Option<ProcEntry<HelloProc>>> = Mutex::new(None);

#[init_fn]
fn helloworld_init() -> Result {
    let entry = ProcEntry::<HelloProc>::register(ENTRY_NAME, PERMS).inspect_err(|err| {
        pr_err!("failed to create /proc/{}: {:?}\n", NAME, err);
    })?;
    *ENTRY.lock() = Some(entry);
    pr_info!("/proc/{} created\n", NAME);
    Ok(())
}

#[exit_fn]
fn helloworld_exit() {
    let entry = ENTRY.lock().take();
    if let Some(entry) = entry {
        drop(entry);
        pr_info!("/proc/{} removed\n", NAME);
    }
}

module!(
    name: "helloworld",
    license: "GPL",
    description: "Greets readers of /proc/helloworld and logs what writers send",
    version: "0.1.0",
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_cycles() {
        let cursor = ReadCursor::default();
        assert!(!cursor.rewind_if_done());
        cursor.mark_done();
        assert!(cursor.rewind_if_done());
        assert!(!cursor.rewind_if_done());
    }

    #[test]
    fn test_entry_mode() {
        assert_eq!(PERMS.bits(), 0o644);
        assert_eq!(alloc::format!("{}", PERMS), "rw-r--r--");
    }

    #[test]
    fn test_modinfo() {
        assert_eq!(__this_module.name(), "helloworld");
    }
}
