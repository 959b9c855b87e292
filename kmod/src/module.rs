use core::ffi::{c_char, CStr};

use kbindings::{module_state_MODULE_STATE_UNFORMED, MODULE_NAME_LEN};

/// The `Module` struct represents a kernel module.
///
/// See <https://elixir.bootlin.com/linux/v6.6/source/include/linux/module.h#L402>
#[repr(transparent)]
pub struct Module(kbindings::module);

impl Default for Module {
    fn default() -> Self {
        Self(kbindings::module::default())
    }
}

impl Clone for Module {
    fn clone(&self) -> Self {
        Module(self.0)
    }
}

unsafe impl Send for Module {}
unsafe impl Sync for Module {}

impl Module {
    /// Creates a new `Module` with the given name, initialization and exit
    /// functions. Names longer than the record allows are truncated.
    pub const fn new(
        name: &[u8],
        init_fn: Option<unsafe extern "C" fn() -> core::ffi::c_int>,
        exit_fn: Option<unsafe extern "C" fn()>,
    ) -> Self {
        let mut module = kbindings::module {
            state: module_state_MODULE_STATE_UNFORMED,
            name: [0; MODULE_NAME_LEN],
            init: init_fn,
            exit: exit_fn,
        };
        let mut i = 0;
        while i < name.len() && i < MODULE_NAME_LEN - 1 {
            module.name[i] = name[i] as c_char;
            i += 1;
        }
        Module(module)
    }

    pub fn name(&self) -> &str {
        // SAFETY: `c_char` and `u8` have the same layout.
        let bytes = unsafe {
            core::slice::from_raw_parts(self.0.name.as_ptr() as *const u8, MODULE_NAME_LEN)
        };
        CStr::from_bytes_until_nul(bytes)
            .ok()
            .and_then(|name| name.to_str().ok())
            .unwrap_or_default()
    }

    pub fn state(&self) -> kbindings::module_state {
        self.0.state
    }

    pub fn set_state(&mut self, state: kbindings::module_state) {
        self.0.state = state;
    }

    pub fn take_init_fn(&mut self) -> Option<unsafe extern "C" fn() -> core::ffi::c_int> {
        self.0.init.take()
    }

    pub fn take_exit_fn(&mut self) -> Option<unsafe extern "C" fn()> {
        self.0.exit.take()
    }
}
