use core::fmt::Display;

/// OTG transceiver states.
///
/// `A_*` states belong to the A-device (ID grounded, we supply VBUS),
/// `B_*` states to the B-device.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransceiverState {
    Undefined,
    #[default]
    BIdle,
    BSrpInit,
    BPeripheral,
    BWaitAcon,
    BHost,
    AIdle,
    AWaitVrise,
    AWaitBcon,
    AHost,
    ASuspend,
    APeripheral,
    AWaitVfall,
    AVbusErr,
}

impl Display for TransceiverState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            Self::Undefined => "UNDEFINED",
            Self::BIdle => "b_idle",
            Self::BSrpInit => "b_srp_init",
            Self::BPeripheral => "b_peripheral",
            Self::BWaitAcon => "b_wait_acon",
            Self::BHost => "b_host",
            Self::AIdle => "a_idle",
            Self::AWaitVrise => "a_wait_vrise",
            Self::AWaitBcon => "a_wait_bcon",
            Self::AHost => "a_host",
            Self::ASuspend => "a_suspend",
            Self::APeripheral => "a_peripheral",
            Self::AWaitVfall => "a_wait_vfall",
            Self::AVbusErr => "a_vbus_err",
        };
        f.write_str(name)
    }
}
