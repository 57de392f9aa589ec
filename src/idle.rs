use core::time::Duration;

/// Single delayed timer deciding when an inactive controller may idle.
///
/// Holds deadlines only; the platform fires it through
/// [`crate::Controller::poll_idle_timer`] and may read [`IdleTimer::deadline`]
/// to program a hardware timer.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IdleTimer {
    pending: Option<Duration>,
}

impl IdleTimer {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(3);

    pub const fn new() -> Self {
        Self { pending: None }
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.pending
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn cancel(&mut self) {
        self.pending = None;
    }

    /// Arm for `deadline`, keeping an already pending earlier one.
    ///
    /// Returns the deadline the timer is armed for.
    pub fn arm(&mut self, deadline: Duration) -> Duration {
        let armed = match self.pending {
            Some(pending) if pending <= deadline => {
                debug!("tighter idle timer already pending, keeping it");
                pending
            }
            _ => deadline,
        };
        self.pending = Some(armed);
        armed
    }

    /// Disarm and report `true` when the pending deadline has passed.
    pub fn expire(&mut self, now: Duration) -> bool {
        match self.pending {
            Some(deadline) if now >= deadline => {
                self.pending = None;
                true
            }
            _ => false,
        }
    }
}
