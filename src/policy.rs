//! How the state machine turns "session needs the hardware" into power calls.

use enum_dispatch::enum_dispatch;

use crate::{
    err::{LogFault, Result},
    otg::Inner,
};

#[enum_dispatch]
pub(crate) trait PowerPolicyOp {
    /// Power taken at attach, before the first register access.
    fn attach(&self, ctrl: &Inner) -> Result;

    /// End of attach, the initial power reference is handed over.
    fn attach_done(&self, ctrl: &Inner);

    /// A session starts and needs the hardware awake.
    fn acquire(&self, ctrl: &Inner) -> Result;

    /// The session is gone.
    fn release(&self, ctrl: &Inner) -> Result;
}

/// Explicit arbitration: every vote goes through the [`crate::Arbiter`], the
/// glue performs the physical suspend and resume itself.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Arbitrated;

/// Runtime PM: votes are forwarded to the platform hooks, the framework calls
/// back into [`crate::Controller::runtime_suspend`] and
/// [`crate::Controller::runtime_resume`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RuntimePm;

#[enum_dispatch(PowerPolicyOp)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerPolicy {
    Arbitrated,
    RuntimePm,
}

impl Default for PowerPolicy {
    fn default() -> Self {
        if cfg!(feature = "runtime_pm") {
            RuntimePm.into()
        } else {
            Arbitrated.into()
        }
    }
}

impl PowerPolicyOp for Arbitrated {
    fn attach(&self, ctrl: &Inner) -> Result {
        // not fatal, the first session resume retries the enable
        let _ = ctrl
            .arbiter
            .async_resume(&ctrl.hw)
            .log_fault("initial power up");
        Ok(())
    }

    fn attach_done(&self, ctrl: &Inner) {
        // nothing to hand over if the initial power up failed
        if ctrl.arbiter.votes().is_awake() {
            ctrl.arbiter.reserve();
        }
    }

    fn acquire(&self, ctrl: &Inner) -> Result {
        ctrl.arbiter.async_resume(&ctrl.hw)
    }

    fn release(&self, ctrl: &Inner) -> Result {
        ctrl.arbiter.async_suspend(&ctrl.hw)
    }
}

impl PowerPolicyOp for RuntimePm {
    fn attach(&self, ctrl: &Inner) -> Result {
        ctrl.hooks.enable().log_fault("runtime get")
    }

    fn attach_done(&self, ctrl: &Inner) {
        ctrl.hooks.disable();
    }

    fn acquire(&self, ctrl: &Inner) -> Result {
        ctrl.hooks.enable().log_fault("runtime get")
    }

    fn release(&self, ctrl: &Inner) -> Result {
        // the reference from acquire is dropped even if marking fails
        let res = ctrl.hooks.mark_idle().log_fault("runtime mark busy");
        ctrl.hooks.disable();
        res
    }
}
