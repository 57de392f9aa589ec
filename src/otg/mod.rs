//! OTG glue controller.
//!
//! [`Controller`] owns everything one OTG port needs: the register view and
//! [`OtgState`] behind the fast lock, the power arbiter, the idle timer and the
//! event queue. Cable events reach it through the transceiver notifier and are
//! handled by the [`EventWorker`] returned from [`Controller::worker`].
//!
//! Lock order is session, then arbiter, then the fast lock. The idle timer
//! lock is never held together with the fast lock, and upstream stacks are
//! only called with the fast lock released.

use alloc::sync::Arc;
use core::time::Duration;

use bitflags::bitflags;
use otg_if::{
    Event, InterfaceMode, PowerHooks, RegisterGateway, Role, TransceiverOp, TransceiverState,
    UpstreamOp,
};
use spin::Mutex;

use crate::{
    arbiter::{Arbiter, PowerSequence},
    dispatch::{EventQueue, EventWorker, Task, TaskHandler},
    err::{LogFault, OtgError, Result},
    idle::IdleTimer,
    osal::{Kernel, SpinWhile},
    policy::{PowerPolicy, PowerPolicyOp},
    power::PowerRefCount,
    reg::Regs,
    sync::{IrqLock, IrqLockGuard},
};

mod fsm;

/// Settle time after asserting the OTG soft reset.
const RESET_SETTLE: Duration = Duration::from_millis(20);

/// HNP restarts allowed before [`Controller::vbus_reset`] gives up.
const VBUS_RESET_LIMIT: u32 = 5;

bitflags! {
    /// Root port status as reported to the host stack.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
    pub struct PortStatus: u32 {
        const SUSPEND = 1 << 2;
        /// Suspend change, latched for the next hub status poll.
        const C_SUSPEND = 1 << 18;
        /// Resume signalling is being driven on the port.
        const RESUME = 1 << 31;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OtgConfig {
    /// PHY interface, fixed for the lifetime of the controller.
    pub interface: InterfaceMode,
    pub power: PowerPolicy,
    /// How long an A-device waits for a B-device to connect. Zero never
    /// idles out of A_WAIT_BCON.
    pub a_wait_bcon: Duration,
    pub queue_depth: usize,
}

impl Default for OtgConfig {
    fn default() -> Self {
        Self {
            interface: InterfaceMode::default(),
            power: PowerPolicy::default(),
            a_wait_bcon: Duration::from_millis(1100),
            queue_depth: EventQueue::DEFAULT_DEPTH,
        }
    }
}

/// Collaborators handed over at attach.
pub struct OtgParam {
    pub regs: Arc<dyn RegisterGateway>,
    pub transceiver: Option<Arc<dyn TransceiverOp>>,
    pub hooks: Arc<dyn PowerHooks>,
    pub upstream: Arc<dyn UpstreamOp>,
    pub kernel: Arc<dyn Kernel>,
    pub config: OtgConfig,
}

/// Controller state guarded by the fast lock.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct OtgState {
    pub xceiv: TransceiverState,
    pub role: Role,
    /// A session is in progress, the controller must not idle.
    pub is_active: bool,
    pub default_a: bool,
    pub port1_status: PortStatus,
    /// A dedicated charger is attached.
    pub ac_charger: bool,
    pub vbus_reset_count: u32,
    /// INTERFSEL saved across runtime suspend.
    pub context_interfsel: u32,
}

pub(crate) struct Locked {
    state: OtgState,
    regs: Regs,
}

/// Register access and the transceiver, shared by the worker, the idle timer
/// and the power arbiter.
pub(crate) struct Hw {
    lock: IrqLock<Locked>,
    xceiv: Arc<dyn TransceiverOp>,
    kernel: Arc<dyn Kernel>,
    mode: InterfaceMode,
}

impl Hw {
    fn new(
        regs: Regs,
        xceiv: Arc<dyn TransceiverOp>,
        kernel: Arc<dyn Kernel>,
        mode: InterfaceMode,
    ) -> Self {
        Self {
            lock: IrqLock::new(
                Locked {
                    state: OtgState::default(),
                    regs,
                },
                kernel.clone(),
            ),
            xceiv,
            kernel,
            mode,
        }
    }

    fn lock(&self) -> IrqLockGuard<'_, Locked> {
        self.lock.lock()
    }

    /// Soft reset of the OTG module, best effort.
    fn core_reset(&self, arbiter: &Arbiter) {
        info!("otg core reset +");
        arbiter.exclusive(|| {
            self.lock().regs.soft_reset();
            self.kernel.delay(RESET_SETTLE);

            let _ = SpinWhile::new(&*self.kernel, || !self.lock().regs.reset_done())
                .wait("otg core reset")
                .log_fault("otg core reset");

            self.lock().regs.select_interface(self.mode);
        });
        info!("otg core reset -");
    }

    /// Cycle the transceiver out of any stale session and bring it up.
    fn otg_init(&self) {
        if self.xceiv.is_active() {
            self.xceiv.set_suspend(true);
        }
        self.xceiv.set_suspend(false);
        self.xceiv.init();
    }
}

impl PowerSequence for Hw {
    fn wake(&self) {
        let hw = self.lock();
        self.xceiv.set_suspend(false);
        hw.regs.force_standby(false);
        hw.regs.select_interface(self.mode);
    }

    fn sleep(&self) {
        let hw = self.lock();
        hw.regs.force_standby(true);
        self.xceiv.set_suspend(true);
    }
}

/// Worker-side bookkeeping, guarded by the session lock.
#[derive(Debug, Default)]
pub(crate) struct Session {
    /// The state machine holds its single power vote.
    holds_vote: bool,
    connected: Option<Role>,
    /// Disconnect already reported since the last connect.
    disconnected: bool,
}

pub(crate) struct Inner {
    pub(crate) hw: Hw,
    pub(crate) arbiter: Arbiter,
    pub(crate) hooks: Arc<dyn PowerHooks>,
    upstream: Arc<dyn UpstreamOp>,
    queue: Arc<EventQueue>,
    idle: Mutex<IdleTimer>,
    session: Mutex<Session>,
    config: OtgConfig,
}

impl TaskHandler for Inner {
    fn handle(&self, task: Task) {
        let _ = self.handle_event(task.event);
    }
}

impl Inner {
    pub(crate) fn handle_event(&self, event: Event) -> Result {
        let mut session = self.session.lock();
        self.dispatch(&mut session, event).log_fault("otg event")
    }

    fn set_vbus(&self, on: bool) -> Result {
        if !on && !self.hw.xceiv.is_active() {
            info!("otg is not active");
            return Ok(());
        }

        if on {
            self.session_enable()
        } else {
            self.vbus_off();
            Ok(())
        }
    }

    /// End the A-device session and fall back to B_IDLE.
    fn vbus_off(&self) {
        let mut hw = self.hw.lock();
        hw.state.is_active = false;
        hw.state.default_a = false;
        // A_WAIT_VFALL is skipped
        hw.state.xceiv = TransceiverState::BIdle;
        hw.state.role = Role::Peripheral;
        hw.regs.set_session(false);
        debug!("VBUS {}, devctl {:#04x}", hw.state.xceiv, hw.regs.devctl().get());
    }

    /// Start an A-device session from A_IDLE.
    fn session_enable(&self) -> Result {
        {
            let hw = self.hw.lock();
            if hw.state.xceiv != TransceiverState::AIdle {
                debug!("VBUS on ignored in {}", hw.state.xceiv);
                return Ok(());
            }
            hw.regs.set_session(true);
        }

        // the core clears BDEVICE once it has become the A-device
        let _ = SpinWhile::new(&*self.hw.kernel, || self.hw.lock().regs.is_b_device())
            .wait("configured as A device")
            .log_fault("session enable");

        match self.hw.xceiv.set_vbus(true) {
            Ok(()) | Err(OtgError::NotSupported) => {}
            Err(e) => error!("transceiver VBUS on: {e}"),
        }

        let mut hw = self.hw.lock();
        hw.state.default_a = true;
        hw.state.vbus_reset_count = 0;
        hw.state.role = Role::Host;
        hw.state.xceiv = TransceiverState::AWaitBcon;
        debug!("VBUS {}, devctl {:#04x}", hw.state.xceiv, hw.regs.devctl().get());
        Ok(())
    }
}

/// One OTG port: glue registers, transceiver, power and the event pipeline.
pub struct Controller {
    inner: Arc<Inner>,
}

impl Controller {
    pub fn attach(param: OtgParam) -> Result<Self> {
        let OtgParam {
            regs,
            transceiver,
            hooks,
            upstream,
            kernel,
            config,
        } = param;

        let Some(xceiv) = transceiver else {
            error!("HS USB OTG: no transceiver configured");
            return Err(OtgError::TransceiverAbsent);
        };

        let inner = Arc::new(Inner {
            hw: Hw::new(Regs::new(regs), xceiv.clone(), kernel, config.interface),
            arbiter: Arbiter::new(hooks.clone()),
            hooks,
            upstream,
            queue: Arc::new(EventQueue::new(config.queue_depth)),
            idle: Mutex::new(IdleTimer::new()),
            session: Mutex::new(Session::default()),
            config,
        });

        config.power.attach(&inner)?;

        {
            let hw = inner.hw.lock();
            hw.regs.select_interface(config.interface);
            hw.regs.dump();
        }

        if let Err(e) = xceiv.register_notifier(inner.queue.clone()) {
            warn!("notification register failed: {e}");
        }

        config.power.attach_done(&inner);
        info!("otg attached, {:?} interface", config.interface);
        Ok(Self { inner })
    }

    /// Stop the event pipeline and force the bus into standby.
    pub fn detach(self) {
        let inner = &self.inner;
        inner.idle.lock().cancel();
        inner.hw.xceiv.unregister_notifier();

        // an event still in the worker finishes before the bus goes down
        inner.queue.close();
        let drained = inner.queue.drain(&**inner);
        if drained > 0 {
            debug!("{drained} otg event(s) handled at detach");
        }

        inner.hw.lock().regs.force_standby(true);
        info!("otg detached");
    }

    pub fn event_queue(&self) -> Arc<EventQueue> {
        self.inner.queue.clone()
    }

    /// The single worker for this controller's events.
    ///
    /// Returns [`OtgError::Busy`] while a worker handed out earlier is alive.
    pub fn worker(&self) -> Result<EventWorker> {
        EventWorker::new(self.inner.queue.clone(), self.inner.clone())
    }

    /// Run one event through the state machine in the caller's context.
    pub fn handle_event(&self, event: Event) -> Result {
        self.inner.handle_event(event)
    }

    pub fn state(&self) -> OtgState {
        self.inner.hw.lock().state
    }

    pub fn xceiv_state(&self) -> TransceiverState {
        self.inner.hw.lock().state.xceiv
    }

    pub fn role(&self) -> Role {
        self.inner.hw.lock().state.role
    }

    /// Role of the session reported upstream, if any.
    pub fn connected(&self) -> Option<Role> {
        self.inner.session.lock().connected
    }

    pub fn votes(&self) -> PowerRefCount {
        self.inner.arbiter.votes()
    }

    pub fn config(&self) -> &OtgConfig {
        &self.inner.config
    }

    pub fn async_suspend(&self) -> Result {
        self.inner.arbiter.async_suspend(&self.inner.hw)
    }

    pub fn async_resume(&self) -> Result {
        self.inner.arbiter.async_resume(&self.inner.hw)
    }

    /// Arm the idle timer for the absolute `deadline`, or 3 ms from now.
    pub fn try_idle(&self, deadline: Option<Duration>) {
        let inner = &self.inner;
        let now = inner.hw.kernel.now();
        let deadline = match deadline {
            Some(d) if !d.is_zero() => d,
            _ => now + IdleTimer::DEFAULT_TIMEOUT,
        };

        let (xceiv, active) = {
            let hw = inner.hw.lock();
            (hw.state.xceiv, hw.state.is_active)
        };

        let mut idle = inner.idle.lock();
        if active
            || (inner.config.a_wait_bcon.is_zero() && xceiv == TransceiverState::AWaitBcon)
        {
            debug!("{xceiv} active, deleting timer");
            idle.cancel();
            return;
        }

        let armed = idle.arm(deadline);
        debug!(
            "{xceiv} inactive, idle timer for {} ms",
            armed.saturating_sub(now).as_millis()
        );
    }

    /// Fire the idle timer if it is due. Returns `true` when it fired.
    pub fn poll_idle_timer(&self) -> bool {
        let now = self.inner.hw.kernel.now();
        let fired = self.inner.idle.lock().expire(now);
        if fired {
            self.inner.do_idle();
        }
        fired
    }

    pub fn idle_deadline(&self) -> Option<Duration> {
        self.inner.idle.lock().deadline()
    }

    /// Replay the transceiver's last event after the gadget side comes up.
    pub fn enable(&self) -> Result {
        let inner = &self.inner;
        match inner.hw.xceiv.last_event() {
            Event::IdGrounded => {
                inner.hw.lock().regs.select_interface(inner.config.interface);
                inner.hw.xceiv.init();
                inner.set_vbus(true)
            }
            Event::VbusPresent => {
                inner.hw.lock().regs.select_interface(inner.config.interface);
                inner.hw.xceiv.init();
                Ok(())
            }
            Event::DedicatedChargerPresent => {
                debug!("dedicated charger connect");
                inner.hw.lock().state.ac_charger = true;
                Ok(())
            }
            _ => Ok(()),
        }
    }

    pub fn disable(&self) {
        if self.inner.hw.xceiv.last_event() != Event::NoEvent {
            self.inner.hw.xceiv.shutdown();
        }
    }

    /// The core picks its role from the cable, only the session bit is set.
    pub fn set_mode(&self, role: Role) -> Result {
        debug!("set mode {role:?}");
        self.inner.hw.lock().regs.set_session(true);
        Ok(())
    }

    pub fn set_vbus(&self, on: bool) -> Result {
        self.inner.set_vbus(on)
    }

    /// Restart host negotiation after a VBUS error.
    pub fn vbus_reset(&self) -> Result {
        let count = {
            let mut hw = self.inner.hw.lock();
            let count = hw.state.vbus_reset_count;
            if count < VBUS_RESET_LIMIT {
                hw.state.vbus_reset_count += 1;
            }
            count
        };
        info!("vbus reset count={count}");

        if count >= VBUS_RESET_LIMIT {
            warn!("vbus reset limit reached");
            return Err(OtgError::NotSupported);
        }
        self.inner
            .hw
            .xceiv
            .start_hnp()
            .log_fault("transceiver start hnp")
    }

    /// Runtime PM suspend callback. `Busy` while an event is being handled.
    pub fn runtime_suspend(&self) -> Result {
        let Some(_session) = self.inner.session.try_lock() else {
            return Err(OtgError::Busy);
        };

        info!("runtime suspend");
        let mut hw = self.inner.hw.lock();
        let interfsel = hw.regs.interfsel();
        hw.state.context_interfsel = interfsel;
        hw.regs.force_standby(true);
        self.inner.hw.xceiv.set_suspend(true);
        Ok(())
    }

    pub fn runtime_resume(&self) -> Result {
        info!("runtime resume");
        let hw = self.inner.hw.lock();
        hw.regs.force_standby(false);
        hw.regs.set_interfsel(hw.state.context_interfsel);
        self.inner.hw.xceiv.set_suspend(false);
        Ok(())
    }

    /// Host stack: a B-device enumerated on the root port.
    pub fn host_connected(&self) {
        let mut hw = self.inner.hw.lock();
        hw.state.xceiv = TransceiverState::AHost;
        hw.state.is_active = true;
    }

    /// Host stack: the root port was suspended.
    pub fn host_suspended(&self) {
        let mut hw = self.inner.hw.lock();
        hw.state.xceiv = TransceiverState::ASuspend;
        hw.state.is_active = false;
        hw.state.port1_status.insert(PortStatus::SUSPEND);
    }

    /// Host stack: start resume signalling; the idle timer finishes it.
    pub fn host_resume(&self) {
        let mut hw = self.inner.hw.lock();
        hw.regs.start_resume();
        hw.state.port1_status.insert(PortStatus::RESUME);
    }

    pub fn set_active(&self, active: bool) {
        self.inner.hw.lock().state.is_active = active;
    }
}
