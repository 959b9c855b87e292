//! The proc namespace.
//!
//! Modules publish entries with [`proc_create_data`] and withdraw them with
//! [`proc_remove`]. Everything else in this file is the VFS side: resolving
//! a name, opening it, and dispatching reads and writes to the entry's
//! `proc_ops`.
//!
//! See <https://elixir.bootlin.com/linux/v6.6/source/fs/proc/generic.c>

use alloc::{
    collections::BTreeMap,
    string::{String, ToString},
    sync::Arc,
    vec::Vec,
};
use core::ffi::{CStr, c_char, c_int, c_void};
use core::sync::atomic::{AtomicBool, Ordering};

use kbindings::{
    FMODE_READ, FMODE_WRITE, MAX_RW_COUNT, O_ACCMODE, O_RDONLY, O_RDWR, O_WRONLY, S_IALLUGO,
    S_IFMT, S_IFREG, S_IRUGO, S_IRUSR, S_IWUSR, fmode_t, loff_t, proc_dir_entry, proc_ops,
    umode_t,
};
use kmod::{capi_fn, error::from_status};
use spin::Mutex;

use crate::{KernelErr, Result};

/// Longest name a proc entry may have.
pub const NAME_MAX: usize = 255;

/// Host view of a proc entry.
struct ProcDirEntry {
    name: String,
    mode: umode_t,
    ops: *const proc_ops,
    data: *mut c_void,
    removed: AtomicBool,
    openers: Mutex<Vec<Arc<OpenFile>>>,
}

// SAFETY: `ops` points to a 'static vtable and `data` is only handed back to
// the entry's own callbacks.
unsafe impl Send for ProcDirEntry {}
unsafe impl Sync for ProcDirEntry {}

impl ProcDirEntry {
    fn ops(&self) -> &proc_ops {
        // SAFETY: checked non-null at creation, valid until `proc_remove`.
        unsafe { &*self.ops }
    }
}

struct FileState {
    file: kbindings::file,
    inode: kbindings::inode,
    released: bool,
}

/// One open of an entry. The state sits behind a lock so a removal can run
/// the file down while another thread still holds the handle.
struct OpenFile {
    state: Mutex<FileState>,
}

// SAFETY: the raw pointers inside `FileState` only refer to the state itself
// and to entry data that outlives every open file.
unsafe impl Send for OpenFile {}
unsafe impl Sync for OpenFile {}

impl OpenFile {
    fn release(&self, pde: &ProcDirEntry) {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        if state.released {
            return;
        }
        state.released = true;
        if let Some(release) = pde.ops().proc_release {
            // SAFETY: `inode` and `file` are the ones passed to `proc_open`.
            unsafe { release(&mut state.inode, &mut state.file) };
        }
    }
}

static PROC_ROOT: Mutex<BTreeMap<String, Arc<ProcDirEntry>>> = Mutex::new(BTreeMap::new());

fn err_ptr(err: KernelErr) -> *mut proc_dir_entry {
    (-(err as isize)) as usize as *mut proc_dir_entry
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name.len() > NAME_MAX || name.contains('/') || name == "." || name == ".."
    {
        return Err(KernelErr::EINVAL);
    }
    Ok(())
}

/// Regular files only; no permission bits means world-readable.
fn normalize_mode(mode: umode_t) -> umode_t {
    let mut mode = mode;
    if mode & S_IFMT == 0 {
        mode |= S_IFREG;
    }
    if mode & S_IALLUGO == 0 {
        mode |= S_IRUGO;
    }
    mode
}

unsafe fn create_entry(
    name: *const c_char,
    mode: umode_t,
    parent: *mut proc_dir_entry,
    ops: *const proc_ops,
    data: *mut c_void,
) -> Result<Arc<ProcDirEntry>> {
    if name.is_null() || ops.is_null() {
        return Err(KernelErr::EINVAL);
    }
    if !parent.is_null() {
        log::warn!("proc: only the root directory is supported");
        return Err(KernelErr::EINVAL);
    }
    let name = CStr::from_ptr(name)
        .to_str()
        .map_err(|_| KernelErr::EINVAL)?;
    validate_name(name)?;

    let mode = normalize_mode(mode);
    if mode & S_IFMT != S_IFREG {
        log::warn!("proc: '{}' must be a regular file, mode {:#o}", name, mode);
        return Err(KernelErr::EINVAL);
    }

    let mut root = PROC_ROOT.lock();
    if root.contains_key(name) {
        log::warn!("proc_dir_entry '/proc/{}' already registered", name);
        return Err(KernelErr::EEXIST);
    }
    let pde = Arc::new(ProcDirEntry {
        name: name.to_string(),
        mode,
        ops,
        data,
        removed: AtomicBool::new(false),
        openers: Mutex::new(Vec::new()),
    });
    root.insert(pde.name.clone(), pde.clone());
    Ok(pde)
}

/// Creates `/proc/<name>`. Returns the entry, `ERR_PTR(-EINVAL)` for a bad
/// name, parent or mode, and `ERR_PTR(-EEXIST)` if the name is taken.
#[capi_fn]
pub unsafe extern "C" fn proc_create_data(
    name: *const c_char,
    mode: umode_t,
    parent: *mut proc_dir_entry,
    proc_ops: *const proc_ops,
    data: *mut c_void,
) -> *mut proc_dir_entry {
    match create_entry(name, mode, parent, proc_ops, data) {
        Ok(pde) => {
            log::info!("proc: created /proc/{} ({:#o})", pde.name, pde.mode);
            Arc::as_ptr(&pde) as *mut proc_dir_entry
        }
        Err(err) => err_ptr(err),
    }
}

/// Removes an entry created by [`proc_create_data`]. Files still open on it
/// are released now; their handles fail with `ENOENT` from then on.
#[capi_fn]
pub unsafe extern "C" fn proc_remove(de: *mut proc_dir_entry) {
    if de.is_null() || kbindings::IS_ERR_VALUE(de as usize) {
        return;
    }
    let pde = {
        let mut root = PROC_ROOT.lock();
        let name = root
            .iter()
            .find(|(_, pde)| Arc::as_ptr(pde) as *mut proc_dir_entry == de)
            .map(|(name, _)| name.clone());
        match name.and_then(|name| root.remove(&name)) {
            Some(pde) => pde,
            None => {
                log::warn!("proc_remove: unknown entry {:p}", de);
                return;
            }
        }
    };
    pde.removed.store(true, Ordering::SeqCst);

    let openers = core::mem::take(&mut *pde.openers.lock());
    if !openers.is_empty() {
        log::debug!(
            "proc: running down {} open file(s) of /proc/{}",
            openers.len(),
            pde.name
        );
    }
    for open in openers {
        open.release(&pde);
    }
    log::info!("proc: removed /proc/{}", pde.name);
}

fn lookup(path: &str) -> Result<Arc<ProcDirEntry>> {
    let name = path.strip_prefix("/proc/").unwrap_or(path);
    PROC_ROOT.lock().get(name).cloned().ok_or(KernelErr::ENOENT)
}

/// Whether `path` (`name` or `/proc/name`) is currently registered.
pub fn exists(path: &str) -> bool {
    lookup(path).is_ok()
}

/// File type and permission bits of `path`.
pub fn stat(path: &str) -> Result<umode_t> {
    lookup(path).map(|pde| pde.mode)
}

/// Names of all registered entries, sorted.
pub fn entries() -> Vec<String> {
    PROC_ROOT.lock().keys().cloned().collect()
}

/// Opens `path` with `O_RDONLY`, `O_WRONLY` or `O_RDWR`.
pub fn open(path: &str, flags: u32) -> Result<ProcFile> {
    let pde = lookup(path)?;
    let f_mode: fmode_t = match flags & O_ACCMODE {
        O_RDONLY => FMODE_READ,
        O_WRONLY => FMODE_WRITE,
        O_RDWR => FMODE_READ | FMODE_WRITE,
        _ => return Err(KernelErr::EINVAL),
    };
    if (f_mode & FMODE_READ != 0 && pde.mode & S_IRUSR == 0)
        || (f_mode & FMODE_WRITE != 0 && pde.mode & S_IWUSR == 0)
    {
        return Err(KernelErr::EACCES);
    }

    let open = Arc::new(OpenFile {
        state: Mutex::new(FileState {
            file: kbindings::file {
                f_pos: 0,
                f_flags: flags,
                f_mode,
                f_inode: core::ptr::null_mut(),
                private_data: core::ptr::null_mut(),
            },
            inode: kbindings::inode {
                i_mode: pde.mode,
                i_private: pde.data,
            },
            released: false,
        }),
    });

    // Holding `openers` keeps a concurrent `proc_remove` from missing us.
    let mut openers = pde.openers.lock();
    if pde.removed.load(Ordering::SeqCst) {
        return Err(KernelErr::ENOENT);
    }
    {
        let mut guard = open.state.lock();
        let state = &mut *guard;
        state.file.f_inode = &mut state.inode;
        if let Some(proc_open) = pde.ops().proc_open {
            // SAFETY: both pointers stay valid for as long as `open` lives.
            let ret = unsafe { proc_open(&mut state.inode, &mut state.file) };
            if ret < 0 {
                state.released = true;
                return Err(from_status(ret as isize));
            }
        }
    }
    openers.push(open.clone());
    drop(openers);

    Ok(ProcFile { pde, open })
}

/// An open handle on a proc entry. Closing happens on drop.
pub struct ProcFile {
    pde: Arc<ProcDirEntry>,
    open: Arc<OpenFile>,
}

impl ProcFile {
    /// Name of the entry this handle was opened on.
    pub fn name(&self) -> &str {
        &self.pde.name
    }

    /// Current file position.
    pub fn pos(&self) -> u64 {
        self.open.state.lock().file.f_pos as u64
    }

    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        // SAFETY: `buf` is valid for writes of `buf.len()` bytes.
        unsafe { self.read_raw(buf.as_mut_ptr(), buf.len()) }
    }

    /// Reads into an arbitrary caller address, as a system call would.
    ///
    /// # Safety
    ///
    /// If `buf` passes the user access check it must be valid for writes of
    /// `len` bytes.
    pub unsafe fn read_raw(&mut self, buf: *mut u8, len: usize) -> Result<usize> {
        let read = self.pde.ops().proc_read;
        self.transfer(FMODE_READ, |file, pos| match read {
            Some(read) => Ok(unsafe { read(file, buf as *mut c_char, len.min(MAX_RW_COUNT), pos) }),
            None => Err(KernelErr::EIO),
        })
    }

    pub fn write(&mut self, buf: &[u8]) -> Result<usize> {
        // SAFETY: `buf` is valid for reads of `buf.len()` bytes.
        unsafe { self.write_raw(buf.as_ptr(), buf.len()) }
    }

    /// Writes from an arbitrary caller address, as a system call would.
    ///
    /// # Safety
    ///
    /// If `buf` passes the user access check it must be valid for reads of
    /// `len` bytes.
    pub unsafe fn write_raw(&mut self, buf: *const u8, len: usize) -> Result<usize> {
        let write = self.pde.ops().proc_write;
        self.transfer(FMODE_WRITE, |file, pos| match write {
            Some(write) => {
                Ok(unsafe { write(file, buf as *const c_char, len.min(MAX_RW_COUNT), pos) })
            }
            None => Err(KernelErr::EIO),
        })
    }

    unsafe fn transfer<F>(&mut self, need: fmode_t, op: F) -> Result<usize>
    where
        F: FnOnce(*mut kbindings::file, *mut loff_t) -> Result<isize>,
    {
        let mut guard = self.open.state.lock();
        let state = &mut *guard;
        if state.released || self.pde.removed.load(Ordering::SeqCst) {
            return Err(KernelErr::ENOENT);
        }
        if state.file.f_mode & need == 0 {
            return Err(KernelErr::EBADF);
        }
        let mut pos = state.file.f_pos;
        let ret = op(&mut state.file as *mut kbindings::file, &mut pos as *mut loff_t)?;
        if ret < 0 {
            return Err(from_status(ret));
        }
        state.file.f_pos = pos;
        Ok(ret as usize)
    }
}

impl Drop for ProcFile {
    fn drop(&mut self) {
        self.pde
            .openers
            .lock()
            .retain(|open| !Arc::ptr_eq(open, &self.open));
        self.open.release(&self.pde);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::boxed::Box;
    use core::sync::atomic::AtomicUsize;

    static OPENS: AtomicUsize = AtomicUsize::new(0);
    static RELEASES: AtomicUsize = AtomicUsize::new(0);

    /// Echoes the file position as one byte per read and counts writes.
    unsafe extern "C" fn test_open(_inode: *mut kbindings::inode, file: *mut kbindings::file) -> c_int {
        OPENS.fetch_add(1, Ordering::SeqCst);
        (*file).private_data = Box::into_raw(Box::new(0usize)) as *mut c_void;
        0
    }

    unsafe extern "C" fn test_read(
        _file: *mut kbindings::file,
        buf: *mut c_char,
        len: usize,
        pos: *mut loff_t,
    ) -> isize {
        if len == 0 {
            return 0;
        }
        *buf = *pos as c_char;
        *pos += 1;
        1
    }

    unsafe extern "C" fn test_write(
        file: *mut kbindings::file,
        _buf: *const c_char,
        len: usize,
        pos: *mut loff_t,
    ) -> isize {
        match len {
            13 => return -(KernelErr::EFAULT as isize),
            30 => return -(KernelErr::EROFS as isize),
            31 => return isize::MIN,
            _ => {}
        }
        *((*file).private_data as *mut usize) += len;
        *pos += len as loff_t;
        len as isize
    }

    unsafe extern "C" fn test_release(
        _inode: *mut kbindings::inode,
        file: *mut kbindings::file,
    ) -> c_int {
        RELEASES.fetch_add(1, Ordering::SeqCst);
        drop(Box::from_raw((*file).private_data as *mut usize));
        0
    }

    static TEST_OPS: proc_ops = proc_ops {
        proc_flags: 0,
        proc_open: Some(test_open),
        proc_read: Some(test_read),
        proc_write: Some(test_write),
        proc_release: Some(test_release),
    };

    static READ_ONLY_OPS: proc_ops = proc_ops {
        proc_flags: 0,
        proc_open: None,
        proc_read: Some(test_read),
        proc_write: None,
        proc_release: None,
    };

    fn create(name: &CStr, mode: umode_t, ops: &'static proc_ops) -> *mut proc_dir_entry {
        unsafe {
            proc_create_data(
                name.as_ptr(),
                mode,
                core::ptr::null_mut(),
                ops,
                core::ptr::null_mut(),
            )
        }
    }

    #[test]
    fn test_create_open_read_write() {
        let _guard = crate::TEST_LOCK.lock();
        let pde = create(c"proc-test-rw", 0o644, &TEST_OPS);
        assert!(!kbindings::IS_ERR_VALUE(pde as usize));
        assert!(exists("/proc/proc-test-rw"));
        assert_eq!(stat("proc-test-rw"), Ok(S_IFREG | 0o644));

        let mut file = open("/proc/proc-test-rw", O_RDWR).unwrap();
        let mut buf = [0xffu8; 4];
        assert_eq!(file.read(&mut buf), Ok(1));
        assert_eq!(buf[0], 0);
        assert_eq!(file.read(&mut buf), Ok(1));
        assert_eq!(buf[0], 1);
        assert_eq!(file.pos(), 2);
        assert_eq!(file.write(b"abc"), Ok(3));
        assert_eq!(file.write(b"Hello world!\n"), Err(KernelErr::EFAULT));
        assert_eq!(file.write(&[0u8; 30]), Err(KernelErr::EROFS));
        assert_eq!(file.write(&[0u8; 31]), Err(KernelErr::EIO));
        assert_eq!(file.pos(), 5);

        drop(file);
        unsafe { proc_remove(pde) };
        assert!(!exists("proc-test-rw"));
    }

    #[test]
    fn test_name_collision_and_bad_names() {
        let _guard = crate::TEST_LOCK.lock();
        let pde = create(c"proc-test-dup", 0o644, &TEST_OPS);
        assert!(!kbindings::IS_ERR_VALUE(pde as usize));

        let dup = create(c"proc-test-dup", 0o644, &TEST_OPS);
        assert_eq!(dup, err_ptr(KernelErr::EEXIST));
        assert_eq!(create(c"", 0o644, &TEST_OPS), err_ptr(KernelErr::EINVAL));
        assert_eq!(create(c"a/b", 0o644, &TEST_OPS), err_ptr(KernelErr::EINVAL));
        assert_eq!(create(c"..", 0o644, &TEST_OPS), err_ptr(KernelErr::EINVAL));

        unsafe { proc_remove(pde) };
    }

    #[test]
    fn test_default_mode_and_permissions() {
        let _guard = crate::TEST_LOCK.lock();
        let pde = create(c"proc-test-ro", 0, &READ_ONLY_OPS);
        assert_eq!(stat("proc-test-ro"), Ok(S_IFREG | 0o444));

        assert_eq!(
            open("proc-test-ro", O_WRONLY).err(),
            Some(KernelErr::EACCES)
        );
        let mut file = open("proc-test-ro", O_RDONLY).unwrap();
        assert_eq!(file.write(b"x"), Err(KernelErr::EBADF));
        let mut buf = [0u8; 1];
        assert_eq!(file.read(&mut buf), Ok(1));

        drop(file);
        unsafe { proc_remove(pde) };
    }

    #[test]
    fn test_missing_handler_is_eio() {
        let _guard = crate::TEST_LOCK.lock();
        let pde = create(c"proc-test-nowrite", 0o644, &READ_ONLY_OPS);
        let mut file = open("proc-test-nowrite", O_RDWR).unwrap();
        assert_eq!(file.write(b"x"), Err(KernelErr::EIO));
        drop(file);
        unsafe { proc_remove(pde) };
    }

    #[test]
    fn test_remove_runs_down_open_files() {
        let _guard = crate::TEST_LOCK.lock();
        crate::init_test_logger();
        let pde = create(c"proc-test-rundown", 0o644, &TEST_OPS);
        let opens = OPENS.load(Ordering::SeqCst);
        let releases = RELEASES.load(Ordering::SeqCst);

        let mut file = open("proc-test-rundown", O_RDWR).unwrap();
        assert_eq!(OPENS.load(Ordering::SeqCst), opens + 1);

        unsafe { proc_remove(pde) };
        assert_eq!(RELEASES.load(Ordering::SeqCst), releases + 1);

        let mut buf = [0u8; 1];
        assert_eq!(file.read(&mut buf), Err(KernelErr::ENOENT));
        assert_eq!(file.write(b"x"), Err(KernelErr::ENOENT));
        assert_eq!(
            open("proc-test-rundown", O_RDONLY).err(),
            Some(KernelErr::ENOENT)
        );

        // Already released during the rundown.
        drop(file);
        assert_eq!(RELEASES.load(Ordering::SeqCst), releases + 1);
    }

    #[test]
    fn test_bad_open_flags() {
        let _guard = crate::TEST_LOCK.lock();
        let pde = create(c"proc-test-flags", 0o644, &TEST_OPS);
        assert_eq!(open("proc-test-flags", O_ACCMODE).err(), Some(KernelErr::EINVAL));
        unsafe { proc_remove(pde) };
    }

    #[test]
    fn test_remove_unknown_entry_is_ignored() {
        let _guard = crate::TEST_LOCK.lock();
        let before = entries();
        unsafe { proc_remove(0x1000 as *mut proc_dir_entry) };
        unsafe { proc_remove(core::ptr::null_mut()) };
        assert_eq!(entries(), before);
    }
}
