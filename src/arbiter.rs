use alloc::sync::Arc;

use otg_if::PowerHooks;
use spin::Mutex;

use crate::{
    err::{LogFault, Result},
    power::{PowerEdge, PowerRefCount},
};

/// Physical power sequences of the transceiver bus.
///
/// The arbiter calls these with its own mutex held; implementations take the
/// controller fast lock themselves.
pub trait PowerSequence {
    /// Transceiver wake, bus out of forced standby, interface select restored.
    fn wake(&self);

    /// Bus forced into standby, transceiver asleep.
    fn sleep(&self);
}

/// Serializes async suspend/resume requests from independent callers.
pub struct Arbiter {
    votes: Mutex<PowerRefCount>,
    hooks: Arc<dyn PowerHooks>,
}

impl Arbiter {
    pub fn new(hooks: Arc<dyn PowerHooks>) -> Self {
        Self {
            votes: Mutex::new(PowerRefCount::new()),
            hooks,
        }
    }

    pub fn votes(&self) -> PowerRefCount {
        *self.votes.lock()
    }

    /// Pre-arm one suspend vote, see [`PowerRefCount::reserve`].
    pub fn reserve(&self) {
        self.votes.lock().reserve();
    }

    /// Run `f` with suspend/resume excluded, e.g. across a core reset.
    pub fn exclusive<R>(&self, f: impl FnOnce() -> R) -> R {
        let _votes = self.votes.lock();
        f()
    }

    pub fn async_resume(&self, seq: &dyn PowerSequence) -> Result {
        let mut votes = self.votes.lock();
        info!("async resume, votes {} +", votes.count());

        if votes.is_awake() {
            votes.acquire();
        } else {
            self.hooks.enable().log_fault("power domain enable")?;
            seq.wake();
            let edge = votes.acquire();
            debug_assert_eq!(edge, PowerEdge::Wake);
        }

        info!("async resume, votes {} -", votes.count());
        Ok(())
    }

    pub fn async_suspend(&self, seq: &dyn PowerSequence) -> Result {
        let mut votes = self.votes.lock();
        info!("async suspend, votes {} +", votes.count());

        if votes.release()? == PowerEdge::Sleep {
            seq.sleep();
            self.hooks.mark_idle().log_fault("power domain idle")?;
        }

        info!("async suspend, votes {} -", votes.count());
        Ok(())
    }
}
