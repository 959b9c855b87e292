use kbindings::{
    module_state, module_state_MODULE_STATE_COMING, module_state_MODULE_STATE_GOING,
    module_state_MODULE_STATE_LIVE, module_state_MODULE_STATE_UNFORMED,
};
use kmod::{Module, error::from_status};

use crate::{KernelErr, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleState {
    /// Fully initialized and running.
    Live,
    /// Running its init hook.
    Coming,
    /// Running its exit hook, or its init hook failed.
    Going,
    /// Not set up yet, or torn down.
    Unformed,
}

impl From<module_state> for ModuleState {
    fn from(state: module_state) -> Self {
        match state {
            module_state_MODULE_STATE_LIVE => ModuleState::Live,
            module_state_MODULE_STATE_COMING => ModuleState::Coming,
            module_state_MODULE_STATE_GOING => ModuleState::Going,
            _ => ModuleState::Unformed,
        }
    }
}

/// A module the host has taken ownership of, driving its init and exit
/// hooks in the only order the kernel allows.
pub struct ModuleOwner {
    module: Module,
}

impl ModuleOwner {
    /// Takes a copy of a module's `__this_module` record.
    pub fn new(module: &Module) -> Self {
        let mut module = module.clone();
        module.set_state(module_state_MODULE_STATE_UNFORMED);
        ModuleOwner { module }
    }

    /// Get the name of the module
    pub fn name(&self) -> &str {
        self.module.name()
    }

    pub fn state(&self) -> ModuleState {
        self.module.state().into()
    }

    /// Call the module's init function. A negative status fails the load and
    /// leaves the module `Going`, so its exit function never runs.
    pub fn call_init(&mut self) -> Result<()> {
        if self.state() != ModuleState::Unformed {
            log::warn!("Module({}): the init function can only be called once.", self.name());
            return Err(KernelErr::EBUSY);
        }
        self.module.set_state(module_state_MODULE_STATE_COMING);
        let ret = match self.module.take_init_fn() {
            Some(init_fn) => unsafe { init_fn() },
            None => 0,
        };
        if ret < 0 {
            log::error!("Module({}): init failed with {}", self.name(), ret);
            self.module.set_state(module_state_MODULE_STATE_GOING);
            return Err(from_status(ret as isize));
        }
        if ret > 0 {
            log::warn!(
                "Module({}): suspicious return {} from init, it should follow 0/-E convention",
                self.name(),
                ret
            );
        }
        self.module.set_state(module_state_MODULE_STATE_LIVE);
        log::info!("Module({}) loaded successfully!", self.name());
        Ok(())
    }

    /// Call the module's exit function. Only a `Live` module can be
    /// unloaded, and only if it has an exit function.
    pub fn call_exit(&mut self) -> Result<()> {
        if self.state() != ModuleState::Live {
            log::warn!("Module({}) is not live, refusing to unload.", self.name());
            return Err(KernelErr::EBUSY);
        }
        let Some(exit_fn) = self.module.take_exit_fn() else {
            log::warn!("Module({}) has no exit function, refusing to unload.", self.name());
            return Err(KernelErr::EBUSY);
        };
        self.module.set_state(module_state_MODULE_STATE_GOING);
        unsafe { exit_fn() };
        self.module.set_state(module_state_MODULE_STATE_UNFORMED);
        log::info!("Module({}) unloaded.", self.name());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::sync::atomic::{AtomicUsize, Ordering};

    static INITS: AtomicUsize = AtomicUsize::new(0);
    static EXITS: AtomicUsize = AtomicUsize::new(0);

    unsafe extern "C" fn ok_init() -> core::ffi::c_int {
        INITS.fetch_add(1, Ordering::SeqCst);
        0
    }

    unsafe extern "C" fn failing_init() -> core::ffi::c_int {
        -(KernelErr::EEXIST as core::ffi::c_int)
    }

    unsafe extern "C" fn busy_init() -> core::ffi::c_int {
        -(KernelErr::EAGAIN as core::ffi::c_int)
    }

    unsafe extern "C" fn garbage_init() -> core::ffi::c_int {
        core::ffi::c_int::MIN
    }

    unsafe extern "C" fn counting_exit() {
        EXITS.fetch_add(1, Ordering::SeqCst);
    }

    static GOOD: Module = Module::new(b"good", Some(ok_init), Some(counting_exit));
    static BAD: Module = Module::new(b"bad", Some(failing_init), Some(counting_exit));
    static RETRY: Module = Module::new(b"retry", Some(busy_init), Some(counting_exit));
    static GARBAGE: Module = Module::new(b"garbage", Some(garbage_init), Some(counting_exit));
    static NO_EXIT: Module = Module::new(b"pinned", Some(ok_init), None);

    #[test]
    fn test_init_then_exit() {
        let _guard = crate::TEST_LOCK.lock();
        let inits = INITS.load(Ordering::SeqCst);
        let exits = EXITS.load(Ordering::SeqCst);

        let mut owner = ModuleOwner::new(&GOOD);
        assert_eq!(owner.name(), "good");
        assert_eq!(owner.state(), ModuleState::Unformed);
        assert_eq!(owner.call_exit(), Err(KernelErr::EBUSY));

        assert_eq!(owner.call_init(), Ok(()));
        assert_eq!(owner.state(), ModuleState::Live);
        assert_eq!(INITS.load(Ordering::SeqCst), inits + 1);
        assert_eq!(owner.call_init(), Err(KernelErr::EBUSY));

        assert_eq!(owner.call_exit(), Ok(()));
        assert_eq!(owner.state(), ModuleState::Unformed);
        assert_eq!(EXITS.load(Ordering::SeqCst), exits + 1);
        assert_eq!(owner.call_exit(), Err(KernelErr::EBUSY));
        assert_eq!(EXITS.load(Ordering::SeqCst), exits + 1);
    }

    #[test]
    fn test_failed_init_never_runs_exit() {
        let _guard = crate::TEST_LOCK.lock();
        let exits = EXITS.load(Ordering::SeqCst);

        let mut owner = ModuleOwner::new(&BAD);
        assert_eq!(owner.call_init(), Err(KernelErr::EEXIST));
        assert_eq!(owner.state(), ModuleState::Going);
        assert_eq!(owner.call_exit(), Err(KernelErr::EBUSY));
        assert_eq!(EXITS.load(Ordering::SeqCst), exits);
    }

    #[test]
    fn test_init_errno_is_preserved() {
        let _guard = crate::TEST_LOCK.lock();
        let mut owner = ModuleOwner::new(&RETRY);
        assert_eq!(owner.call_init(), Err(KernelErr::EAGAIN));
        assert_eq!(owner.state(), ModuleState::Going);
    }

    #[test]
    fn test_init_status_out_of_range() {
        let _guard = crate::TEST_LOCK.lock();
        let mut owner = ModuleOwner::new(&GARBAGE);
        assert_eq!(owner.call_init(), Err(KernelErr::EIO));
        assert_eq!(owner.state(), ModuleState::Going);
    }

    #[test]
    fn test_module_without_exit_stays_loaded() {
        let _guard = crate::TEST_LOCK.lock();
        let mut owner = ModuleOwner::new(&NO_EXIT);
        assert_eq!(owner.call_init(), Ok(()));
        assert_eq!(owner.call_exit(), Err(KernelErr::EBUSY));
        assert_eq!(owner.state(), ModuleState::Live);
    }

    #[test]
    fn test_long_names_are_truncated() {
        let long = [b'm'; 100];
        let module = Module::new(&long, None, None);
        assert_eq!(module.name().len(), kbindings::MODULE_NAME_LEN - 1);
    }
}
