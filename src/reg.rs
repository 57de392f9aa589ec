//! OTG wrapper and MUSB core registers touched by the glue.
//!
//! ## Register layout
//!
//! ```text
//! 0x001 POWER      (u8)  MUSB core power control
//! 0x060 DEVCTL     (u8)  MUSB core OTG device control
//! 0x400 REVISION         wrapper revision
//! 0x404 SYSCONFIG        idle/standby modes, soft reset
//! 0x408 SYSSTATUS        reset done
//! 0x40c INTERFSEL        PHY interface select
//! 0x410 SIMENABLE        simulation mode
//! 0x414 FORCESTDBY       force the bus master into standby
//! ```

use alloc::sync::Arc;
use core::ptr::NonNull;

use mbarrier::wmb;
use otg_if::{InterfaceMode, RegisterGateway};
use tock_registers::{LocalRegisterCopy, RegisterLongName, fields::FieldValue, register_bitfields};

pub const MUSB_POWER: usize = 0x01;
pub const MUSB_DEVCTL: usize = 0x60;

pub const OTG_REVISION: usize = 0x400;
pub const OTG_SYSCONFIG: usize = 0x404;
pub const OTG_SYSSTATUS: usize = 0x408;
pub const OTG_INTERFSEL: usize = 0x40c;
pub const OTG_SIMENABLE: usize = 0x410;
pub const OTG_FORCESTDBY: usize = 0x414;

register_bitfields![u32,
    pub SYSCONFIG [
        AUTOIDLE OFFSET(0) NUMBITS(1) [],
        /// Software reset of the whole OTG module
        SOFTRST OFFSET(1) NUMBITS(1) [],
        ENABLEWAKEUP OFFSET(2) NUMBITS(1) [],
        SIDLEMODE OFFSET(3) NUMBITS(2) [
            ForceIdle = 0,
            NoIdle = 1,
            SmartIdle = 2
        ],
        MIDLEMODE OFFSET(12) NUMBITS(2) [
            ForceStandby = 0,
            NoStandby = 1,
            SmartStandby = 2
        ]
    ],
    pub SYSSTATUS [
        RESETDONE OFFSET(0) NUMBITS(1) []
    ],
    pub INTERFSEL [
        PHYSEL OFFSET(0) NUMBITS(2) [
            Utmi8Bit = 0,
            Ulpi12Pin = 1,
            Ulpi8Pin = 2
        ],
        /// Charge pump driven externally
        EXTCP OFFSET(2) NUMBITS(1) []
    ],
    pub FORCESTDBY [
        /// Force MSTANDBY on the interconnect
        ENABLEFORCE OFFSET(0) NUMBITS(1) []
    ],
];

register_bitfields![u8,
    pub POWER [
        ENSUSPEND OFFSET(0) NUMBITS(1) [],
        SUSPENDM OFFSET(1) NUMBITS(1) [],
        RESUME OFFSET(2) NUMBITS(1) [],
        RESET OFFSET(3) NUMBITS(1) [],
        HSMODE OFFSET(4) NUMBITS(1) [],
        HSENAB OFFSET(5) NUMBITS(1) [],
        SOFTCONN OFFSET(6) NUMBITS(1) [],
        ISOUPDATE OFFSET(7) NUMBITS(1) []
    ],
    pub DEVCTL [
        SESSION OFFSET(0) NUMBITS(1) [],
        HR OFFSET(1) NUMBITS(1) [],
        /// Core currently in host mode
        HM OFFSET(2) NUMBITS(1) [],
        VBUS OFFSET(3) NUMBITS(2) [
            BelowSessionEnd = 0,
            AboveSessionEnd = 1,
            AboveAValid = 2,
            AboveVbusValid = 3
        ],
        LSDEV OFFSET(5) NUMBITS(1) [],
        FSDEV OFFSET(6) NUMBITS(1) [],
        /// Core is the B-device
        BDEVICE OFFSET(7) NUMBITS(1) []
    ],
];

pub type Mmio = NonNull<u8>;

/// Register gateway over a memory mapped window.
pub struct MmioGateway {
    base: Mmio,
}

unsafe impl Send for MmioGateway {}
unsafe impl Sync for MmioGateway {}

impl MmioGateway {
    /// # Safety
    ///
    /// `base` must map the whole controller window (core and OTG wrapper)
    /// for as long as the gateway lives.
    pub unsafe fn new(base: Mmio) -> Self {
        Self { base }
    }

    fn ptr(&self, offset: usize) -> *mut u8 {
        unsafe { self.base.as_ptr().add(offset) }
    }
}

impl RegisterGateway for MmioGateway {
    fn read8(&self, offset: usize) -> u8 {
        unsafe { self.ptr(offset).read_volatile() }
    }

    fn write8(&self, offset: usize, value: u8) {
        unsafe { self.ptr(offset).write_volatile(value) }
    }

    fn read32(&self, offset: usize) -> u32 {
        unsafe { self.ptr(offset).cast::<u32>().read_volatile() }
    }

    fn write32(&self, offset: usize, value: u32) {
        unsafe { self.ptr(offset).cast::<u32>().write_volatile(value) }
    }
}

/// Typed view of the controller registers.
///
/// Only reachable through the controller's fast lock.
pub(crate) struct Regs {
    io: Arc<dyn RegisterGateway>,
}

impl Regs {
    pub fn new(io: Arc<dyn RegisterGateway>) -> Self {
        Self { io }
    }

    fn read32<R: RegisterLongName>(&self, offset: usize) -> LocalRegisterCopy<u32, R> {
        LocalRegisterCopy::new(self.io.read32(offset))
    }

    fn write32<R: RegisterLongName>(&self, offset: usize, reg: LocalRegisterCopy<u32, R>) {
        self.io.write32(offset, reg.get());
        wmb();
    }

    fn modify32<R: RegisterLongName>(&self, offset: usize, field: FieldValue<u32, R>) {
        let mut reg = self.read32::<R>(offset);
        reg.modify(field);
        self.write32(offset, reg);
    }

    fn read8<R: RegisterLongName>(&self, offset: usize) -> LocalRegisterCopy<u8, R> {
        LocalRegisterCopy::new(self.io.read8(offset))
    }

    fn write8<R: RegisterLongName>(&self, offset: usize, reg: LocalRegisterCopy<u8, R>) {
        self.io.write8(offset, reg.get());
        wmb();
    }

    pub fn devctl(&self) -> LocalRegisterCopy<u8, DEVCTL::Register> {
        self.read8(MUSB_DEVCTL)
    }

    pub fn is_b_device(&self) -> bool {
        self.devctl().is_set(DEVCTL::BDEVICE)
    }

    pub fn set_session(&self, on: bool) {
        let mut devctl = self.devctl();
        if on {
            devctl.modify(DEVCTL::SESSION::SET);
        } else {
            devctl.modify(DEVCTL::SESSION::CLEAR);
        }
        self.write8(MUSB_DEVCTL, devctl);
    }

    /// Stop driving resume signalling on the root port, returns the new POWER value.
    pub fn clear_resume(&self) -> u8 {
        let mut power = self.read8::<POWER::Register>(MUSB_POWER);
        power.modify(POWER::RESUME::CLEAR);
        self.write8(MUSB_POWER, power);
        power.get()
    }

    pub fn start_resume(&self) {
        let mut power = self.read8::<POWER::Register>(MUSB_POWER);
        power.modify(POWER::RESUME::SET);
        self.write8(MUSB_POWER, power);
    }

    pub fn soft_reset(&self) {
        self.modify32(OTG_SYSCONFIG, SYSCONFIG::SOFTRST::SET);
    }

    pub fn reset_done(&self) -> bool {
        self.read32::<SYSSTATUS::Register>(OTG_SYSSTATUS)
            .is_set(SYSSTATUS::RESETDONE)
    }

    pub fn interfsel(&self) -> u32 {
        self.io.read32(OTG_INTERFSEL)
    }

    pub fn set_interfsel(&self, value: u32) {
        self.write32::<INTERFSEL::Register>(OTG_INTERFSEL, LocalRegisterCopy::new(value));
    }

    pub fn select_interface(&self, mode: InterfaceMode) {
        let physel = match mode {
            InterfaceMode::Utmi => INTERFSEL::PHYSEL::Utmi8Bit,
            InterfaceMode::Ulpi => INTERFSEL::PHYSEL::Ulpi12Pin,
        };
        self.modify32(OTG_INTERFSEL, physel);
    }

    /// `true` forces the bus into standby (low level exit), `false` releases it.
    pub fn force_standby(&self, enable: bool) {
        let field = if enable {
            FORCESTDBY::ENABLEFORCE::SET
        } else {
            FORCESTDBY::ENABLEFORCE::CLEAR
        };
        self.modify32(OTG_FORCESTDBY, field);
    }

    pub fn dump(&self) {
        debug!(
            "HS USB OTG: revision {:#x}, sysconfig {:#04x}, sysstatus {:#x}, intrfsel {:#x}, simenable {:#x}",
            self.io.read32(OTG_REVISION),
            self.io.read32(OTG_SYSCONFIG),
            self.io.read32(OTG_SYSSTATUS),
            self.io.read32(OTG_INTERFSEL),
            self.io.read32(OTG_SIMENABLE),
        );
    }
}
