use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Cable and charger events reported by the transceiver.
///
/// The discriminants are the codes carried by the transceiver notifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[repr(u32)]
pub enum Event {
    /// Nothing attached anymore: VBUS dropped or a charger was removed.
    NoEvent = 0,
    VbusPresent = 1,
    /// ID pin pulled to ground, we must become the A-device.
    IdGrounded = 2,
    DedicatedChargerPresent = 3,
    /// VBUS seen, but it is not known yet whether a host or a charger drives it.
    VbusChargerPresent = 5,
    /// ID pin floated again while acting as host.
    HostDisconnect = 6,
}

/// Receiver of raw notifier codes.
///
/// Called from interrupt or notifier context: implementations must not block.
pub trait EventSink: Send + Sync {
    fn notify(&self, code: u32);
}
