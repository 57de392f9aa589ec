//! Test doubles for the collaborators a [`Controller`] is attached to.

use alloc::{sync::Arc, vec::Vec};
use core::{
    sync::atomic::{AtomicBool, AtomicIsize, AtomicU64, AtomicUsize, Ordering},
    time::Duration,
};

use spin::Mutex;

use crate::{
    Arbitrated, Controller, Event, EventSink, Kernel, OtgConfig, OtgError, OtgParam, PowerHooks,
    RegisterGateway, Role, TransceiverOp, UpstreamOp,
    reg::{
        MUSB_DEVCTL, MUSB_POWER, OTG_FORCESTDBY, OTG_INTERFSEL, OTG_REVISION, OTG_SYSCONFIG,
        OTG_SYSSTATUS,
    },
};

/// Shared, ordered log of power related calls.
#[derive(Clone, Default)]
pub struct Trace(Arc<Mutex<Vec<&'static str>>>);

impl Trace {
    pub fn push(&self, what: &'static str) {
        self.0.lock().push(what);
    }

    pub fn take(&self) -> Vec<&'static str> {
        core::mem::take(&mut *self.0.lock())
    }

    pub fn clear(&self) {
        self.0.lock().clear();
    }
}

#[derive(Default)]
struct RegFile {
    sysconfig: u32,
    interfsel: u32,
    forcestdby: u32,
    power: u8,
    devctl: u8,
    b_device: bool,
    stuck_reset: bool,
    resets: usize,
    standby_access: usize,
}

impl RegFile {
    fn touch(&mut self, offset: usize) {
        if offset != OTG_FORCESTDBY && self.forcestdby & 1 != 0 {
            self.standby_access += 1;
        }
    }
}

/// Register file of the OTG wrapper and the two core registers.
///
/// SOFTRST self-clears and RESETDONE reads back set unless the reset is
/// stuck. BDEVICE is driven by the test.
#[derive(Default)]
pub struct MockRegs(Mutex<RegFile>);

impl MockRegs {
    pub fn set_b_device(&self, on: bool) {
        self.0.lock().b_device = on;
    }

    pub fn set_stuck_reset(&self, stuck: bool) {
        self.0.lock().stuck_reset = stuck;
    }

    pub fn power(&self) -> u8 {
        self.0.lock().power
    }

    pub fn devctl(&self) -> u8 {
        self.0.lock().devctl
    }

    pub fn interfsel(&self) -> u32 {
        self.0.lock().interfsel
    }

    pub fn set_interfsel(&self, value: u32) {
        self.0.lock().interfsel = value;
    }

    pub fn in_standby(&self) -> bool {
        self.0.lock().forcestdby & 1 != 0
    }

    pub fn resets(&self) -> usize {
        self.0.lock().resets
    }

    /// Register accesses made while the bus was forced into standby.
    pub fn standby_access(&self) -> usize {
        self.0.lock().standby_access
    }
}

impl RegisterGateway for MockRegs {
    fn read8(&self, offset: usize) -> u8 {
        let mut f = self.0.lock();
        f.touch(offset);
        match offset {
            MUSB_POWER => f.power,
            MUSB_DEVCTL => f.devctl | if f.b_device { 0x80 } else { 0 },
            _ => 0,
        }
    }

    fn write8(&self, offset: usize, value: u8) {
        let mut f = self.0.lock();
        f.touch(offset);
        match offset {
            MUSB_POWER => f.power = value,
            MUSB_DEVCTL => f.devctl = value & 0x7f,
            _ => {}
        }
    }

    fn read32(&self, offset: usize) -> u32 {
        let mut f = self.0.lock();
        f.touch(offset);
        match offset {
            OTG_REVISION => 0x40,
            OTG_SYSCONFIG => f.sysconfig,
            OTG_SYSSTATUS => u32::from(!f.stuck_reset),
            OTG_INTERFSEL => f.interfsel,
            OTG_FORCESTDBY => f.forcestdby,
            _ => 0,
        }
    }

    fn write32(&self, offset: usize, value: u32) {
        let mut f = self.0.lock();
        f.touch(offset);
        match offset {
            OTG_SYSCONFIG => {
                if value & (1 << 1) != 0 {
                    f.resets += 1;
                }
                f.sysconfig = value & !(1 << 1);
            }
            OTG_INTERFSEL => f.interfsel = value,
            OTG_FORCESTDBY => f.forcestdby = value,
            _ => {}
        }
    }
}

#[derive(Default)]
struct XceivState {
    active: bool,
    suspended: bool,
    vbus: bool,
    last_event: Option<Event>,
    inits: usize,
    shutdowns: usize,
    vbus_calls: usize,
    hnp: usize,
}

#[derive(Default)]
pub struct MockXceiv {
    state: Mutex<XceivState>,
    sink: Mutex<Option<Arc<dyn EventSink>>>,
    fail_register: AtomicBool,
}

impl MockXceiv {
    /// Deliver a raw notifier code, as the transceiver interrupt would.
    pub fn fire(&self, code: u32) {
        if let Ok(event) = Event::try_from(code) {
            self.set_last_event(event);
        }
        let sink = self.sink.lock().clone();
        if let Some(sink) = sink {
            sink.notify(code);
        }
    }

    pub fn set_last_event(&self, event: Event) {
        self.state.lock().last_event = Some(event);
    }

    pub fn fail_register(&self, fail: bool) {
        self.fail_register.store(fail, Ordering::SeqCst);
    }

    pub fn has_notifier(&self) -> bool {
        self.sink.lock().is_some()
    }

    pub fn clear_calls(&self) {
        let mut s = self.state.lock();
        s.inits = 0;
        s.shutdowns = 0;
        s.vbus_calls = 0;
        s.hnp = 0;
    }

    pub fn inits(&self) -> usize {
        self.state.lock().inits
    }

    pub fn shutdowns(&self) -> usize {
        self.state.lock().shutdowns
    }

    pub fn vbus_calls(&self) -> usize {
        self.state.lock().vbus_calls
    }

    pub fn vbus(&self) -> bool {
        self.state.lock().vbus
    }

    pub fn hnp(&self) -> usize {
        self.state.lock().hnp
    }

    pub fn suspended(&self) -> bool {
        self.state.lock().suspended
    }
}

impl TransceiverOp for MockXceiv {
    fn init(&self) {
        let mut s = self.state.lock();
        s.inits += 1;
        s.active = true;
    }

    fn shutdown(&self) {
        let mut s = self.state.lock();
        s.shutdowns += 1;
        s.active = false;
    }

    fn set_suspend(&self, suspend: bool) {
        self.state.lock().suspended = suspend;
    }

    fn is_active(&self) -> bool {
        self.state.lock().active
    }

    fn last_event(&self) -> Event {
        self.state.lock().last_event.unwrap_or(Event::NoEvent)
    }

    fn set_vbus(&self, on: bool) -> Result<(), OtgError> {
        let mut s = self.state.lock();
        s.vbus_calls += 1;
        s.vbus = on;
        Ok(())
    }

    fn start_hnp(&self) -> Result<(), OtgError> {
        self.state.lock().hnp += 1;
        Ok(())
    }

    fn register_notifier(&self, sink: Arc<dyn EventSink>) -> Result<(), OtgError> {
        if self.fail_register.load(Ordering::SeqCst) {
            return Err(OtgError::NotifierRegistrationFailure);
        }
        *self.sink.lock() = Some(sink);
        Ok(())
    }

    fn unregister_notifier(&self) {
        self.sink.lock().take();
    }
}

pub struct MockHooks {
    trace: Trace,
    fail_enable: AtomicBool,
    fail_mark_idle: AtomicBool,
}

impl MockHooks {
    pub fn new(trace: Trace) -> Self {
        Self {
            trace,
            fail_enable: AtomicBool::new(false),
            fail_mark_idle: AtomicBool::new(false),
        }
    }

    pub fn fail_enable(&self, fail: bool) {
        self.fail_enable.store(fail, Ordering::SeqCst);
    }

    pub fn fail_mark_idle(&self, fail: bool) {
        self.fail_mark_idle.store(fail, Ordering::SeqCst);
    }
}

impl PowerHooks for MockHooks {
    fn enable(&self) -> Result<(), OtgError> {
        self.trace.push("enable");
        if self.fail_enable.load(Ordering::SeqCst) {
            return Err(OtgError::PowerHook(-16));
        }
        Ok(())
    }

    fn disable(&self) {
        self.trace.push("disable");
    }

    fn mark_idle(&self) -> Result<(), OtgError> {
        self.trace.push("mark_idle");
        if self.fail_mark_idle.load(Ordering::SeqCst) {
            return Err(OtgError::PowerHook(-5));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Note {
    Connect(Role),
    Disconnect,
}

#[derive(Default)]
pub struct MockUpstream {
    notes: Mutex<Vec<Note>>,
    port_changes: AtomicUsize,
}

impl MockUpstream {
    pub fn notes(&self) -> Vec<Note> {
        self.notes.lock().clone()
    }

    pub fn port_changes(&self) -> usize {
        self.port_changes.load(Ordering::SeqCst)
    }
}

impl UpstreamOp for MockUpstream {
    fn notify_connect(&self, role: Role) {
        self.notes.lock().push(Note::Connect(role));
    }

    fn notify_disconnect(&self) {
        self.notes.lock().push(Note::Disconnect);
    }

    fn port_changed(&self) {
        self.port_changes.fetch_add(1, Ordering::SeqCst);
    }
}

/// Fake clock: delays advance it instantly.
#[derive(Default)]
pub struct MockKernel {
    now_us: AtomicU64,
    delays: AtomicUsize,
    irq_depth: AtomicIsize,
}

impl MockKernel {
    pub fn advance_ms(&self, ms: u64) {
        self.now_us.fetch_add(ms * 1000, Ordering::SeqCst);
    }

    pub fn delays(&self) -> usize {
        self.delays.load(Ordering::SeqCst)
    }

    /// Interrupt masks not yet restored.
    pub fn irq_depth(&self) -> isize {
        self.irq_depth.load(Ordering::SeqCst)
    }
}

impl Kernel for MockKernel {
    fn delay(&self, duration: Duration) {
        self.delays.fetch_add(1, Ordering::SeqCst);
        self.now_us
            .fetch_add(duration.as_micros() as u64, Ordering::SeqCst);
    }

    fn now(&self) -> Duration {
        Duration::from_micros(self.now_us.load(Ordering::SeqCst))
    }

    fn irq_save(&self) -> usize {
        self.irq_depth.fetch_add(1, Ordering::SeqCst);
        0
    }

    fn irq_restore(&self, _flags: usize) {
        self.irq_depth.fetch_sub(1, Ordering::SeqCst);
    }
}

/// A controller's worth of mocks.
pub struct Bench {
    pub trace: Trace,
    pub regs: Arc<MockRegs>,
    pub xceiv: Arc<MockXceiv>,
    pub hooks: Arc<MockHooks>,
    pub upstream: Arc<MockUpstream>,
    pub kernel: Arc<MockKernel>,
    pub config: OtgConfig,
}

impl Bench {
    pub fn new() -> Self {
        Self::with_config(OtgConfig {
            power: Arbitrated.into(),
            ..Default::default()
        })
    }

    pub fn with_config(config: OtgConfig) -> Self {
        let trace = Trace::default();
        Self {
            hooks: Arc::new(MockHooks::new(trace.clone())),
            trace,
            regs: Arc::new(MockRegs::default()),
            xceiv: Arc::new(MockXceiv::default()),
            upstream: Arc::new(MockUpstream::default()),
            kernel: Arc::new(MockKernel::default()),
            config,
        }
    }

    pub fn param(&self) -> OtgParam {
        OtgParam {
            regs: self.regs.clone(),
            transceiver: Some(self.xceiv.clone() as Arc<dyn TransceiverOp>),
            hooks: self.hooks.clone(),
            upstream: self.upstream.clone(),
            kernel: self.kernel.clone(),
            config: self.config,
        }
    }

    pub fn attach(&self) -> Controller {
        Controller::attach(self.param()).unwrap()
    }
}
