#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod err;
pub mod event;
pub mod op;
pub mod state;

pub use err::OtgError;
pub use event::{Event, EventSink};
pub use op::{PowerHooks, RegisterGateway, TransceiverOp, UpstreamOp};
pub use state::TransceiverState;

/// Role the controller currently plays on the bus.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Host,
    #[default]
    Peripheral,
}

/// Electrical interface between the controller and the transceiver.
///
/// Chosen once from board data and never changed while attached.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InterfaceMode {
    /// Internal PHY over 8-bit UTMI.
    #[default]
    Utmi,
    /// External transceiver over 12-pin ULPI.
    Ulpi,
}
