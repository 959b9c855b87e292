//! Proc filesystem entries.
//!
//! C header: `include/linux/proc_fs.h`

use alloc::boxed::Box;
use core::ffi::{c_char, c_int, c_void, CStr};
use core::marker::PhantomData;
use core::ptr::{self, NonNull};

use bitflags::bitflags;
use kbindings::{loff_t, proc_dir_entry, proc_ops, ssize_t, umode_t};

use crate::error::{from_result, from_status, Error, Result};
use crate::uaccess::{UserSlice, UserSliceReader, UserSliceWriter};

unsafe extern "C" {
    fn proc_create_data(
        name: *const c_char,
        mode: umode_t,
        parent: *mut proc_dir_entry,
        proc_ops: *const proc_ops,
        data: *mut c_void,
    ) -> *mut proc_dir_entry;
    fn proc_remove(de: *mut proc_dir_entry);
}

bitflags! {
    /// Permission bits of a proc entry.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Mode: umode_t {
        const S_IRUSR = kbindings::S_IRUSR;
        const S_IWUSR = kbindings::S_IWUSR;
        const S_IXUSR = kbindings::S_IXUSR;
        const S_IRGRP = kbindings::S_IRGRP;
        const S_IWGRP = kbindings::S_IWGRP;
        const S_IXGRP = kbindings::S_IXGRP;
        const S_IROTH = kbindings::S_IROTH;
        const S_IWOTH = kbindings::S_IWOTH;
        const S_IXOTH = kbindings::S_IXOTH;
    }
}

impl Mode {
    /// Builds a mode from an octal permission value such as `0o644`; bits
    /// outside the nine permission bits are dropped.
    pub const fn from_octal(mode: umode_t) -> Self {
        Mode::from_bits_truncate(mode)
    }
}

impl core::fmt::Display for Mode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        const BITS: [(Mode, char); 9] = [
            (Mode::S_IRUSR, 'r'),
            (Mode::S_IWUSR, 'w'),
            (Mode::S_IXUSR, 'x'),
            (Mode::S_IRGRP, 'r'),
            (Mode::S_IWGRP, 'w'),
            (Mode::S_IXGRP, 'x'),
            (Mode::S_IROTH, 'r'),
            (Mode::S_IWOTH, 'w'),
            (Mode::S_IXOTH, 'x'),
        ];
        for (bit, c) in BITS {
            let c = if self.contains(bit) { c } else { '-' };
            core::fmt::Write::write_char(f, c)?;
        }
        Ok(())
    }
}

/// An open proc file, as seen by the callbacks.
#[repr(transparent)]
pub struct File {
    _raw: kbindings::file,
}

impl File {
    /// # Safety
    ///
    /// `ptr` must be valid for the returned lifetime.
    unsafe fn from_ptr<'a>(ptr: *const kbindings::file) -> &'a File {
        unsafe { &*(ptr as *const File) }
    }
}

/// Corresponds to the kernel's `struct proc_ops`.
///
/// Every open of the entry gets its own [`ProcOperations::Data`], created by
/// `open` and handed back to `release` when the file is closed.
pub trait ProcOperations: 'static {
    /// Per-open context.
    type Data: Send + Sync;

    /// Whether `read` is implemented.
    const HAS_READ: bool = false;
    /// Whether `write` is implemented.
    const HAS_WRITE: bool = false;

    /// Corresponds to the `proc_open` function pointer.
    fn open(file: &File) -> Result<Self::Data>;

    /// Corresponds to the `proc_release` function pointer. The context is
    /// dropped afterwards unless the implementation moves it elsewhere.
    fn release(_data: Self::Data, _file: &File) {}

    /// Corresponds to the `proc_read` function pointer.
    fn read(
        _data: &Self::Data,
        _file: &File,
        _writer: &mut UserSliceWriter,
        _offset: u64,
    ) -> Result<usize> {
        Err(Error::EINVAL)
    }

    /// Corresponds to the `proc_write` function pointer.
    fn write(
        _data: &Self::Data,
        _file: &File,
        _reader: &mut UserSliceReader,
        _offset: u64,
    ) -> Result<usize> {
        Err(Error::EINVAL)
    }
}

struct OperationsVtable<T>(PhantomData<T>);

impl<T: ProcOperations> OperationsVtable<T> {
    unsafe extern "C" fn open_callback(
        _inode: *mut kbindings::inode,
        file: *mut kbindings::file,
    ) -> c_int {
        // SAFETY: the host passes a valid `file` for the duration of the call.
        let fileref = unsafe { File::from_ptr(file) };
        match T::open(fileref) {
            Ok(data) => {
                let ptr = Box::into_raw(Box::new(data));
                // SAFETY: `private_data` belongs to the callbacks of this entry.
                unsafe { (*file).private_data = ptr as *mut c_void };
                0
            }
            Err(err) => -(err as c_int),
        }
    }

    /// # Safety
    ///
    /// `file.private_data` must have been set by `open_callback` and not yet
    /// released.
    unsafe fn data<'a>(file: *mut kbindings::file) -> &'a T::Data {
        unsafe { &*((*file).private_data as *const T::Data) }
    }

    unsafe extern "C" fn read_callback(
        file: *mut kbindings::file,
        buf: *mut c_char,
        len: usize,
        offset: *mut loff_t,
    ) -> ssize_t {
        // SAFETY: the host only dispatches reads between open and release.
        let data = unsafe { Self::data(file) };
        let mut writer = unsafe { UserSlice::new(buf as usize, len) }.writer();
        let pos = unsafe { *offset };
        let result = u64::try_from(pos)
            .map_err(|_| Error::EINVAL)
            .and_then(|pos| T::read(data, unsafe { File::from_ptr(file) }, &mut writer, pos));
        if let Ok(read) = result {
            unsafe { *offset += read as loff_t };
        }
        from_result(result)
    }

    unsafe extern "C" fn write_callback(
        file: *mut kbindings::file,
        buf: *const c_char,
        len: usize,
        offset: *mut loff_t,
    ) -> ssize_t {
        // SAFETY: the host only dispatches writes between open and release.
        let data = unsafe { Self::data(file) };
        let mut reader = unsafe { UserSlice::new(buf as usize, len) }.reader();
        let pos = unsafe { *offset };
        let result = u64::try_from(pos)
            .map_err(|_| Error::EINVAL)
            .and_then(|pos| T::write(data, unsafe { File::from_ptr(file) }, &mut reader, pos));
        if let Ok(written) = result {
            unsafe { *offset += written as loff_t };
        }
        from_result(result)
    }

    unsafe extern "C" fn release_callback(
        _inode: *mut kbindings::inode,
        file: *mut kbindings::file,
    ) -> c_int {
        let ptr = core::mem::replace(unsafe { &mut (*file).private_data }, ptr::null_mut());
        if !ptr.is_null() {
            // SAFETY: `ptr` was produced by `Box::into_raw` in `open_callback`.
            let data = unsafe { Box::from_raw(ptr as *mut T::Data) };
            T::release(*data, unsafe { File::from_ptr(file) });
        }
        0
    }

    const VTABLE: proc_ops = proc_ops {
        proc_flags: 0,
        proc_open: Some(Self::open_callback),
        proc_read: if T::HAS_READ {
            Some(Self::read_callback)
        } else {
            None
        },
        proc_write: if T::HAS_WRITE {
            Some(Self::write_callback)
        } else {
            None
        },
        proc_release: Some(Self::release_callback),
    };

    const fn build() -> &'static proc_ops {
        &Self::VTABLE
    }
}

/// A registered proc entry. Dropping it removes the entry again.
///
/// # Invariants
///
/// `ptr` is the live entry returned by `proc_create_data`.
pub struct ProcEntry<T> {
    ptr: NonNull<proc_dir_entry>,
    _marker: PhantomData<T>,
}

// SAFETY: the entry is only an identifier for host-side state, which the
// host serialises.
unsafe impl<T> Send for ProcEntry<T> {}
unsafe impl<T> Sync for ProcEntry<T> {}

impl<T: ProcOperations> ProcEntry<T> {
    /// Creates `/proc/<name>` served by `T`.
    ///
    /// The host answers with an entry, an `ERR_PTR` carrying the reason for
    /// a rejection (`EEXIST`, `EINVAL`), or null when it ran out of memory.
    pub fn register(name: &CStr, mode: Mode) -> Result<Self> {
        let ops = OperationsVtable::<T>::build();
        // SAFETY: `name` is NUL-terminated and `ops` is 'static.
        let ptr = unsafe {
            proc_create_data(
                name.as_ptr(),
                mode.bits(),
                ptr::null_mut(),
                ops,
                ptr::null_mut(),
            )
        };
        if kbindings::IS_ERR_VALUE(ptr as usize) {
            return Err(from_status(ptr as isize));
        }
        Ok(ProcEntry {
            ptr: NonNull::new(ptr).ok_or(Error::ENOMEM)?,
            _marker: PhantomData,
        })
    }
}

impl<T> Drop for ProcEntry<T> {
    fn drop(&mut self) {
        // SAFETY: `ptr` is valid by the type invariants.
        unsafe { proc_remove(self.ptr.as_ptr()) };
    }
}
