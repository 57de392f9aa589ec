pub use otg_if::OtgError;

pub type Result<T = ()> = core::result::Result<T, OtgError>;

/// Log a fault and hand it back, so `?` call sites never lose the record.
pub(crate) trait LogFault {
    fn log_fault(self, what: &str) -> Self;
}

impl<T> LogFault for Result<T> {
    fn log_fault(self, what: &str) -> Self {
        if let Err(e) = &self {
            error!("{what}: {e}");
        }
        self
    }
}
