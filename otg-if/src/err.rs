#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtgError {
    #[error("Hardware poll timed out: {0}")]
    HardwareTimeout(&'static str),
    #[error("Suspend/resume call imbalance")]
    RefCountImbalance,
    #[error("Event queue full, event dropped")]
    AllocationFailure,
    #[error("No transceiver configured")]
    TransceiverAbsent,
    #[error("Transceiver notifier registration failed")]
    NotifierRegistrationFailure,
    #[error("Power hook failed: {0}")]
    PowerHook(i32),
    #[error("Controller busy")]
    Busy,
    #[error("Not supported")]
    NotSupported,
    #[error("Controller detached")]
    Detached,
}
