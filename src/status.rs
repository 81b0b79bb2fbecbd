use bitflags::bitflags;

bitflags! {
    /// Flags of the Manufacturing Status block.
    ///
    /// Only the algorithm enable bits are named, the remaining bits are retained as read.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct ManufacturingStatus: u16 {
        /// Impedance Tracking gauging enabled.
        const GAUGE_EN = 1 << 3;
        /// Lifetime data collection enabled.
        const LF_EN = 1 << 5;
    }
}

bitflags! {
    /// BatteryStatus() flags.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct BatteryStatus: u16 {
        /// Overcharged alarm
        const OCA = 1 << 15;
        /// Terminate charge alarm
        const TCA = 1 << 14;
        /// Overtemperature alarm
        const OTA = 1 << 12;
        /// Terminate discharge alarm
        const TDA = 1 << 11;
        /// Remaining capacity alarm
        const RCA = 1 << 9;
        /// Remaining time alarm
        const RTA = 1 << 8;
        /// Initialization complete
        const INIT = 1 << 7;
        /// Discharging or relaxing
        const DSG = 1 << 6;
        /// Fully charged
        const FC = 1 << 5;
        /// Fully discharged
        const FD = 1 << 4;
    }
}

impl BatteryStatus {
    /// The error code reported for the last command, in bits 3..0.
    pub fn error_code(&self) -> u8 {
        (self.bits() & 0x000F) as u8
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for ManufacturingStatus {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "ManufacturingStatus({=u16:#x})", self.bits())
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for BatteryStatus {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "BatteryStatus({=u16:#x})", self.bits())
    }
}

/// Keys stored in the gauge, readable when the device is unsealed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SecurityKeys {
    pub unseal: [u8; 4],
    pub full_access: [u8; 4],
}
