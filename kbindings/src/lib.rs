#![no_std]
#![allow(warnings)]

pub type __s32 = core::ffi::c_int;
pub type __u16 = core::ffi::c_ushort;
pub type __u32 = core::ffi::c_uint;
pub type __s64 = core::ffi::c_longlong;
pub type umode_t = __u16;
pub type fmode_t = __u32;
pub type loff_t = __s64;
pub type ssize_t = isize;

pub const module_state_MODULE_STATE_LIVE: module_state = 0;
pub const module_state_MODULE_STATE_COMING: module_state = 1;
pub const module_state_MODULE_STATE_GOING: module_state = 2;
pub const module_state_MODULE_STATE_UNFORMED: module_state = 3;
pub type module_state = core::ffi::c_uint;

pub const MODULE_NAME_LEN: usize = 64 - core::mem::size_of::<core::ffi::c_ulong>();

pub const S_IFMT: umode_t = 0o170000;
pub const S_IFREG: umode_t = 0o100000;
pub const S_IFDIR: umode_t = 0o040000;
pub const S_IRWXU: umode_t = 0o700;
pub const S_IRUSR: umode_t = 0o400;
pub const S_IWUSR: umode_t = 0o200;
pub const S_IXUSR: umode_t = 0o100;
pub const S_IRWXG: umode_t = 0o070;
pub const S_IRGRP: umode_t = 0o040;
pub const S_IWGRP: umode_t = 0o020;
pub const S_IXGRP: umode_t = 0o010;
pub const S_IRWXO: umode_t = 0o007;
pub const S_IROTH: umode_t = 0o004;
pub const S_IWOTH: umode_t = 0o002;
pub const S_IXOTH: umode_t = 0o001;
pub const S_IALLUGO: umode_t = 0o7777;
pub const S_IRUGO: umode_t = S_IRUSR | S_IRGRP | S_IROTH;

pub const FMODE_READ: fmode_t = 0x1;
pub const FMODE_WRITE: fmode_t = 0x2;

pub const O_RDONLY: __u32 = 0o0;
pub const O_WRONLY: __u32 = 0o1;
pub const O_RDWR: __u32 = 0o2;
pub const O_ACCMODE: __u32 = 0o3;

pub const LOGLEVEL_EMERG: __s32 = 0;
pub const LOGLEVEL_ALERT: __s32 = 1;
pub const LOGLEVEL_CRIT: __s32 = 2;
pub const LOGLEVEL_ERR: __s32 = 3;
pub const LOGLEVEL_WARNING: __s32 = 4;
pub const LOGLEVEL_NOTICE: __s32 = 5;
pub const LOGLEVEL_INFO: __s32 = 6;
pub const LOGLEVEL_DEBUG: __s32 = 7;

pub const MAX_ERRNO: usize = 4095;

/// Whether a pointer-sized return value encodes `-errno` (`ERR_PTR`).
///
/// See <https://elixir.bootlin.com/linux/v6.6/source/include/linux/err.h#L28>
#[inline]
pub const fn IS_ERR_VALUE(x: usize) -> bool {
    x >= usize::MAX - MAX_ERRNO + 1
}

/// Longest text a single `printk` record keeps; longer messages are cut.
///
/// See <https://elixir.bootlin.com/linux/v6.6/source/kernel/printk/internal.h#L34>
pub const LOG_LINE_MAX: usize = 1024 - 32;

pub const PAGE_SIZE: usize = 4096;
/// Largest byte count a single read or write is allowed to transfer.
///
/// See <https://elixir.bootlin.com/linux/v6.6/source/include/linux/fs.h#L2695>
pub const MAX_RW_COUNT: usize = (i32::MAX as usize) & !(PAGE_SIZE - 1);

/// See <https://elixir.bootlin.com/linux/v6.6/source/include/linux/module.h#L402>
#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct module {
    pub state: module_state,
    pub name: [core::ffi::c_char; MODULE_NAME_LEN],
    pub init: ::core::option::Option<unsafe extern "C" fn() -> core::ffi::c_int>,
    pub exit: ::core::option::Option<unsafe extern "C" fn()>,
}
impl Default for module {
    fn default() -> Self {
        let mut s = ::core::mem::MaybeUninit::<Self>::uninit();
        unsafe {
            ::core::ptr::write_bytes(s.as_mut_ptr(), 0, 1);
            s.assume_init()
        }
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct inode {
    pub i_mode: umode_t,
    pub i_private: *mut core::ffi::c_void,
}
impl Default for inode {
    fn default() -> Self {
        let mut s = ::core::mem::MaybeUninit::<Self>::uninit();
        unsafe {
            ::core::ptr::write_bytes(s.as_mut_ptr(), 0, 1);
            s.assume_init()
        }
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct file {
    pub f_pos: loff_t,
    pub f_flags: core::ffi::c_uint,
    pub f_mode: fmode_t,
    pub f_inode: *mut inode,
    pub private_data: *mut core::ffi::c_void,
}
impl Default for file {
    fn default() -> Self {
        let mut s = ::core::mem::MaybeUninit::<Self>::uninit();
        unsafe {
            ::core::ptr::write_bytes(s.as_mut_ptr(), 0, 1);
            s.assume_init()
        }
    }
}

/// Opaque to modules, only the host knows its layout.
#[repr(C)]
pub struct proc_dir_entry {
    _unused: [u8; 0],
}

/// See <https://elixir.bootlin.com/linux/v6.6/source/include/linux/proc_fs.h#L29>
#[repr(C)]
#[derive(Debug, Default, Copy, Clone)]
pub struct proc_ops {
    pub proc_flags: core::ffi::c_uint,
    pub proc_open:
        ::core::option::Option<unsafe extern "C" fn(*mut inode, *mut file) -> core::ffi::c_int>,
    pub proc_read: ::core::option::Option<
        unsafe extern "C" fn(*mut file, *mut core::ffi::c_char, usize, *mut loff_t) -> ssize_t,
    >,
    pub proc_write: ::core::option::Option<
        unsafe extern "C" fn(*mut file, *const core::ffi::c_char, usize, *mut loff_t) -> ssize_t,
    >,
    pub proc_release:
        ::core::option::Option<unsafe extern "C" fn(*mut inode, *mut file) -> core::ffi::c_int>,
}

unsafe impl Sync for proc_ops {}
