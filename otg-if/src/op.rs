use alloc::sync::Arc;

use crate::{Event, EventSink, OtgError, Role};

/// Raw access to the controller register window.
///
/// Offsets are in bytes from the start of the window. Accesses complete
/// before returning and are not reordered across the lock guarding them.
pub trait RegisterGateway: Send + Sync + 'static {
    fn read8(&self, offset: usize) -> u8;
    fn write8(&self, offset: usize, value: u8);
    fn read32(&self, offset: usize) -> u32;
    fn write32(&self, offset: usize, value: u32);
}

/// The OTG transceiver (internal PHY or external PMIC).
pub trait TransceiverOp: Send + Sync + 'static {
    /// Bring the transceiver up for a new session.
    fn init(&self);

    fn shutdown(&self);

    fn set_suspend(&self, suspend: bool);

    /// Whether the transceiver currently reports an OTG session.
    fn is_active(&self) -> bool;

    /// Last event the transceiver reported.
    fn last_event(&self) -> Event;

    /// Drive VBUS from the transceiver.
    ///
    /// Transceivers that leave VBUS to the controller return
    /// [`OtgError::NotSupported`].
    fn set_vbus(&self, _on: bool) -> Result<(), OtgError> {
        Err(OtgError::NotSupported)
    }

    /// Restart host negotiation.
    fn start_hnp(&self) -> Result<(), OtgError> {
        Err(OtgError::NotSupported)
    }

    fn register_notifier(&self, sink: Arc<dyn EventSink>) -> Result<(), OtgError>;

    fn unregister_notifier(&self);
}

/// Platform power management for the controller's clocks and power domain.
pub trait PowerHooks: Send + Sync + 'static {
    /// Power the controller domain up. May block.
    fn enable(&self) -> Result<(), OtgError>;

    /// Drop the reference taken by [`PowerHooks::enable`].
    fn disable(&self);

    /// Tell the platform the controller may go idle now.
    fn mark_idle(&self) -> Result<(), OtgError>;
}

/// Host and gadget stacks sitting above the glue.
///
/// Calls are fire-and-forget.
pub trait UpstreamOp: Send + Sync + 'static {
    fn notify_connect(&self, role: Role);

    fn notify_disconnect(&self);

    /// Root port status changed, the host stack should poll it.
    fn port_changed(&self) {}
}
