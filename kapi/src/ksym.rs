//! Symbols the host exports to modules.
//!
//! Modules import these by name; the table is what a loader consults to
//! resolve a module's undefined symbols, and it keeps every export linked
//! into the host image.

use core::ffi::c_void;

use crate::{printk, proc_fs, uaccess, vmalloc};

pub struct KernelSymbol {
    pub name: &'static str,
    pub addr: *const c_void,
}

// SAFETY: entries are immutable addresses of host functions.
unsafe impl Sync for KernelSymbol {}

pub static KSYMTAB: &[KernelSymbol] = &[
    KernelSymbol {
        name: "printk",
        addr: printk::printk as *const c_void,
    },
    KernelSymbol {
        name: "vmalloc",
        addr: vmalloc::vmalloc as *const c_void,
    },
    KernelSymbol {
        name: "vfree",
        addr: vmalloc::vfree as *const c_void,
    },
    KernelSymbol {
        name: "copy_to_user",
        addr: uaccess::copy_to_user as *const c_void,
    },
    KernelSymbol {
        name: "copy_from_user",
        addr: uaccess::copy_from_user as *const c_void,
    },
    KernelSymbol {
        name: "proc_create_data",
        addr: proc_fs::proc_create_data as *const c_void,
    },
    KernelSymbol {
        name: "proc_remove",
        addr: proc_fs::proc_remove as *const c_void,
    },
];

/// Resolve symbol name to address
pub fn resolve_symbol(name: &str) -> Option<*const c_void> {
    KSYMTAB
        .iter()
        .find(|sym| sym.name == name)
        .map(|sym| sym.addr)
}
