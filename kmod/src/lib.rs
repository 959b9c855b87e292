//! Module-side API for loadable kernel modules.
//!
//! Everything here is a thin, safe layer over the C ABI in [`bindings`]; the
//! symbols it calls (`printk`, `vmalloc`, `copy_to_user`, `proc_create_data`,
//! ...) are resolved against the host kernel when the module is linked.
#![no_std]
extern crate alloc;

pub mod error;
mod module;
pub mod print;
pub mod proc;
pub mod uaccess;
pub mod vmalloc;

pub use error::{Error, Result};
pub use kbindings as bindings;
pub use kmacro::{capi_fn, exit_fn, init_fn, module};
pub use module::Module;

/// The commonly used items for writing a module.
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::proc::{File, Mode, ProcEntry, ProcOperations};
    pub use crate::uaccess::{UserSliceReader, UserSliceWriter};
    pub use crate::vmalloc::VBuffer;
    pub use crate::{exit_fn, init_fn, module};
    pub use crate::{pr_alert, pr_crit, pr_debug, pr_emerg, pr_err, pr_info, pr_notice, pr_warn};
}
