use otg_if::{Event, InterfaceMode, OtgError, Role, TransceiverState};

use super::{Inner, Locked, PortStatus, Session};
use crate::{err::Result, policy::PowerPolicyOp};

impl Inner {
    pub(super) fn dispatch(&self, session: &mut Session, event: Event) -> Result {
        match event {
            Event::IdGrounded => self.id_grounded(session),
            Event::VbusPresent => self.vbus_present(session),
            Event::VbusChargerPresent => {
                // still unknown whether a host or a charger drives VBUS
                info!("USB/TA connect");
                Ok(())
            }
            Event::DedicatedChargerPresent => {
                info!("dedicated charger connect");
                self.hw.lock().state.ac_charger = true;
                Ok(())
            }
            Event::HostDisconnect => {
                info!("USB host disconnect, ID float");
                self.teardown(session)
            }
            Event::NoEvent => {
                {
                    let mut hw = self.hw.lock();
                    if hw.state.ac_charger {
                        hw.state.ac_charger = false;
                        info!("dedicated charger disconnect");
                        return Ok(());
                    }
                }
                info!("VBUS disconnect");
                self.teardown(session)
            }
        }
    }

    fn id_grounded(&self, session: &mut Session) -> Result {
        {
            let mut hw = self.hw.lock();
            if hw.state.xceiv == TransceiverState::AIdle && session.connected == Some(Role::Host) {
                debug!("ID GND, host session already up");
                return Ok(());
            }
            hw.state.xceiv = TransceiverState::AIdle;
        }
        info!("ID GND");

        if session.connected == Some(Role::Peripheral) {
            self.notify_disconnect(session);
        }

        self.take_vote(session)?;
        self.hw.core_reset(&self.arbiter);
        self.hw.otg_init();

        {
            let mut hw = self.hw.lock();
            hw.state.role = Role::Host;
            hw.state.default_a = true;
        }
        self.notify_connect(session, Role::Host);
        Ok(())
    }

    fn vbus_present(&self, session: &mut Session) -> Result {
        info!("VBUS connect");
        self.take_vote(session)?;
        self.hw.xceiv.init();

        if session.connected.is_none() {
            self.hw.lock().state.role = Role::Peripheral;
            self.notify_connect(session, Role::Peripheral);
        }
        Ok(())
    }

    /// Drop the session and power the port down, ending in B_IDLE.
    fn teardown(&self, session: &mut Session) -> Result {
        self.notify_disconnect(session);

        let mut res = Ok(());
        if session.holds_vote {
            // a dedicated charger keeps the transceiver powered
            if !self.hw.lock().state.ac_charger {
                if self.config.interface == InterfaceMode::Utmi {
                    if self.hw.xceiv.is_active() {
                        self.vbus_off();
                    }
                    match self.hw.xceiv.set_vbus(false) {
                        Ok(()) | Err(OtgError::NotSupported) => {}
                        Err(e) => error!("transceiver VBUS off: {e}"),
                    }
                }
                self.hw.xceiv.shutdown();
            }
            self.hw.core_reset(&self.arbiter);

            session.holds_vote = false;
            res = self.config.power.release(self);
        }

        let mut hw = self.hw.lock();
        hw.state.xceiv = TransceiverState::BIdle;
        hw.state.role = Role::Peripheral;
        hw.state.is_active = false;
        hw.state.default_a = false;
        res
    }

    fn take_vote(&self, session: &mut Session) -> Result {
        if !session.holds_vote {
            self.config.power.acquire(self)?;
            session.holds_vote = true;
        }
        Ok(())
    }

    fn notify_connect(&self, session: &mut Session, role: Role) {
        session.connected = Some(role);
        session.disconnected = false;
        self.upstream.notify_connect(role);
    }

    fn notify_disconnect(&self, session: &mut Session) {
        session.connected = None;
        if !session.disconnected {
            session.disconnected = true;
            self.upstream.notify_disconnect();
        }
    }

    /// Idle timer expiry.
    pub(super) fn do_idle(&self) {
        let port_changed = {
            let mut hw = self.hw.lock();
            let Locked { state, regs } = &mut *hw;

            match state.xceiv {
                TransceiverState::AWaitBcon => {
                    if regs.is_b_device() {
                        state.xceiv = TransceiverState::BIdle;
                        state.role = Role::Peripheral;
                    } else {
                        state.xceiv = TransceiverState::AIdle;
                        state.role = Role::Host;
                    }
                    false
                }
                TransceiverState::ASuspend if state.port1_status.contains(PortStatus::RESUME) => {
                    let power = regs.clear_resume();
                    debug!("root port resume stopped, power {power:#04x}");
                    state.is_active = true;
                    state.port1_status.remove(PortStatus::SUSPEND | PortStatus::RESUME);
                    state.port1_status.insert(PortStatus::C_SUSPEND);
                    state.xceiv = TransceiverState::AHost;
                    true
                }
                TransceiverState::AHost => {
                    state.xceiv = if regs.is_b_device() {
                        TransceiverState::BIdle
                    } else {
                        TransceiverState::AWaitBcon
                    };
                    false
                }
                _ => false,
            }
        };

        if port_changed {
            self.upstream.port_changed();
        }
    }
}
