use core::{hint::spin_loop, time::Duration};

use crate::err::{OtgError, Result};

/// Services the glue needs from the surrounding kernel.
pub trait Kernel: Send + Sync + 'static {
    /// Busy or sleeping delay, the worker context may sleep.
    fn delay(&self, duration: Duration);

    /// Monotonic time since an arbitrary epoch.
    fn now(&self) -> Duration;

    /// Mask the controller interrupt on this CPU, returning the previous state.
    fn irq_save(&self) -> usize {
        0
    }

    fn irq_restore(&self, _flags: usize) {}
}

/// Iterations of [`SpinWhile`] before a hardware wait is declared failed.
pub(crate) const POLL_BUDGET: u32 = 1000;
pub(crate) const POLL_STEP: Duration = Duration::from_millis(1);

/// Bounded hardware settling wait.
///
/// Keeps polling while `condition` holds, one [`POLL_STEP`] apart, and gives
/// up after [`POLL_BUDGET`] steps. Iteration-bounded, not wall-clock bounded.
pub(crate) struct SpinWhile<'a, F>
where
    F: FnMut() -> bool,
{
    kernel: &'a dyn Kernel,
    condition: F,
    budget: u32,
}

impl<'a, F> SpinWhile<'a, F>
where
    F: FnMut() -> bool,
{
    #[must_use]
    pub fn new(kernel: &'a dyn Kernel, condition: F) -> Self {
        Self {
            kernel,
            condition,
            budget: POLL_BUDGET,
        }
    }

    pub fn wait(mut self, what: &'static str) -> Result {
        while (self.condition)() {
            spin_loop();
            if self.budget == 0 {
                return Err(OtgError::HardwareTimeout(what));
            }
            self.kernel.delay(POLL_STEP);
            self.budget -= 1;
        }
        Ok(())
    }
}
