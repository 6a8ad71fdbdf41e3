//! Status and protection register decoding
//!
//! Every decoder is a pure function from the raw register value to a struct
//! of named flags. Bit positions are explicit mask constants rather than
//! bit-field layouts, so the result does not depend on compiler bit ordering.

/// Safety Status A bit masks (Direct Command `0x03`, TRM §12.1.3)
pub mod safety_a {
    /// Short circuit in discharge
    pub const SCD: u8 = 1 << 7;
    /// Overcurrent in discharge, tier 2
    pub const OCD2: u8 = 1 << 6;
    /// Overcurrent in discharge, tier 1
    pub const OCD1: u8 = 1 << 5;
    /// Overcurrent in charge
    pub const OCC: u8 = 1 << 4;
    /// Cell overvoltage
    pub const COV: u8 = 1 << 3;
    /// Cell undervoltage
    pub const CUV: u8 = 1 << 2;
}

/// Safety Status B bit masks (Direct Command `0x05`, TRM §12.1.5)
pub mod safety_b {
    /// FET overtemperature
    pub const OTF: u8 = 1 << 7;
    /// Internal overtemperature
    pub const OTINT: u8 = 1 << 6;
    /// Overtemperature in discharge
    pub const OTD: u8 = 1 << 5;
    /// Overtemperature in charge
    pub const OTC: u8 = 1 << 4;
    /// Internal undertemperature
    pub const UTINT: u8 = 1 << 2;
    /// Undertemperature in discharge
    pub const UTD: u8 = 1 << 1;
    /// Undertemperature in charge
    pub const UTC: u8 = 1 << 0;
}

/// FET Status bit masks (Direct Command `0x7F`, TRM §12.1.21)
pub mod fet {
    /// CHG FET on
    pub const CHG: u8 = 1 << 0;
    /// PCHG FET on
    pub const PCHG: u8 = 1 << 1;
    /// DSG FET on
    pub const DSG: u8 = 1 << 2;
    /// PDSG FET on
    pub const PDSG: u8 = 1 << 3;
    /// DCHG pin asserted
    pub const DCHG_PIN: u8 = 1 << 4;
    /// DDSG pin asserted
    pub const DDSG_PIN: u8 = 1 << 5;
    /// ALERT pin asserted
    pub const ALERT_PIN: u8 = 1 << 6;
}

/// Battery Status bit masks (Direct Command `0x12`, TRM §12.1.6)
pub mod battery {
    /// Device is in SLEEP
    pub const SLEEP: u16 = 1 << 15;
    /// SHUTDOWN is pending
    pub const SD_CMD: u16 = 1 << 13;
    /// Permanent fail triggered
    pub const PF: u16 = 1 << 12;
    /// A safety fault is active
    pub const SS: u16 = 1 << 11;
    /// FUSE pin asserted
    pub const FUSE: u16 = 1 << 10;
    /// Security state (2 bits)
    pub const SEC_MASK: u16 = 0b11 << 8;
    /// Security state shift
    pub const SEC_SHIFT: u16 = 8;
    /// OTP writes blocked
    pub const OTPB: u16 = 1 << 7;
    /// OTP write pending
    pub const OTPW: u16 = 1 << 6;
    /// Open-wire check running
    pub const COW_CHK: u16 = 1 << 5;
    /// Watchdog reset occurred
    pub const WD: u16 = 1 << 4;
    /// Full reset occurred since last clear
    pub const POR: u16 = 1 << 3;
    /// SLEEP allowed
    pub const SLEEP_EN: u16 = 1 << 2;
    /// Precharge mode active
    pub const PCHG_MODE: u16 = 1 << 1;
    /// CONFIG_UPDATE mode active
    pub const CFGUPDATE: u16 = 1 << 0;
}

/// Alarm Status bit masks (Direct Command `0x62`, TRM §12.1.22)
pub mod alarm {
    /// Safety Status A has a flag set
    pub const SSA: u16 = 1 << 15;
    /// Safety Status B/C has a flag set
    pub const SSBC: u16 = 1 << 14;
    /// Permanent Fail Status A has a flag set
    pub const PFA: u16 = 1 << 13;
    /// Permanent Fail Status B/C/D has a flag set
    pub const PFBCD: u16 = 1 << 12;
    /// Voltage ADC scan complete
    pub const ADSCAN: u16 = 1 << 11;
    /// Wake from SLEEP
    pub const WAKE: u16 = 1 << 10;
    /// Device entered SLEEP
    pub const SLEEP: u16 = 1 << 9;
    /// Full scan complete
    pub const FULLSCAN: u16 = 1 << 8;
    /// CHG FET turned off
    pub const XCHG: u16 = 1 << 7;
    /// DSG FET turned off
    pub const XDSG: u16 = 1 << 6;
    /// Stack voltage below shutdown threshold
    pub const SHUTV: u16 = 1 << 5;
    /// FUSE pin driven
    pub const FUSE: u16 = 1 << 4;
    /// Cell balancing active
    pub const CB: u16 = 1 << 3;
    /// Initial ADC complete
    pub const ADC_INIT: u16 = 1 << 2;
    /// Initialization complete
    pub const INIT_COMP: u16 = 1 << 1;
}

/// Protection faults from Safety Status A
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ProtectionStatus {
    /// Short circuit in discharge
    pub short_circuit_discharge: bool,
    /// Overcurrent in discharge, tier 2
    pub overcurrent_discharge_2: bool,
    /// Overcurrent in discharge, tier 1
    pub overcurrent_discharge_1: bool,
    /// Overcurrent in charge
    pub overcurrent_charge: bool,
    /// Cell overvoltage
    pub cell_overvoltage: bool,
    /// Cell undervoltage
    pub cell_undervoltage: bool,
}

impl ProtectionStatus {
    /// Decode a Safety Status A byte
    pub const fn from_bits(bits: u8) -> Self {
        Self {
            short_circuit_discharge: bits & safety_a::SCD != 0,
            overcurrent_discharge_2: bits & safety_a::OCD2 != 0,
            overcurrent_discharge_1: bits & safety_a::OCD1 != 0,
            overcurrent_charge: bits & safety_a::OCC != 0,
            cell_overvoltage: bits & safety_a::COV != 0,
            cell_undervoltage: bits & safety_a::CUV != 0,
        }
    }

    /// `true` if any fault is set
    pub const fn any(&self) -> bool {
        self.short_circuit_discharge
            || self.overcurrent_discharge_2
            || self.overcurrent_discharge_1
            || self.overcurrent_charge
            || self.cell_overvoltage
            || self.cell_undervoltage
    }
}

/// Temperature faults from Safety Status B
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TemperatureProtectionStatus {
    /// FET overtemperature
    pub overtemp_fet: bool,
    /// Internal (die) overtemperature
    pub overtemp_internal: bool,
    /// Overtemperature in discharge
    pub overtemp_discharge: bool,
    /// Overtemperature in charge
    pub overtemp_charge: bool,
    /// Internal (die) undertemperature
    pub undertemp_internal: bool,
    /// Undertemperature in discharge
    pub undertemp_discharge: bool,
    /// Undertemperature in charge
    pub undertemp_charge: bool,
}

impl TemperatureProtectionStatus {
    /// Decode a Safety Status B byte
    pub const fn from_bits(bits: u8) -> Self {
        Self {
            overtemp_fet: bits & safety_b::OTF != 0,
            overtemp_internal: bits & safety_b::OTINT != 0,
            overtemp_discharge: bits & safety_b::OTD != 0,
            overtemp_charge: bits & safety_b::OTC != 0,
            undertemp_internal: bits & safety_b::UTINT != 0,
            undertemp_discharge: bits & safety_b::UTD != 0,
            undertemp_charge: bits & safety_b::UTC != 0,
        }
    }

    /// `true` if any fault is set
    pub const fn any(&self) -> bool {
        self.overtemp_fet
            || self.overtemp_internal
            || self.overtemp_discharge
            || self.overtemp_charge
            || self.undertemp_internal
            || self.undertemp_discharge
            || self.undertemp_charge
    }
}

/// FET driver and pin state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FetStatus {
    /// CHG FET on
    pub chg_fet: bool,
    /// PCHG FET on
    pub pchg_fet: bool,
    /// DSG FET on
    pub dsg_fet: bool,
    /// PDSG FET on
    pub pdsg_fet: bool,
    /// DCHG pin asserted
    pub dchg_pin: bool,
    /// DDSG pin asserted
    pub ddsg_pin: bool,
    /// ALERT pin asserted
    pub alert_pin: bool,
}

impl FetStatus {
    /// Decode a FET Status byte
    pub const fn from_bits(bits: u8) -> Self {
        Self {
            chg_fet: bits & fet::CHG != 0,
            pchg_fet: bits & fet::PCHG != 0,
            dsg_fet: bits & fet::DSG != 0,
            pdsg_fet: bits & fet::PDSG != 0,
            dchg_pin: bits & fet::DCHG_PIN != 0,
            ddsg_pin: bits & fet::DDSG_PIN != 0,
            alert_pin: bits & fet::ALERT_PIN != 0,
        }
    }
}

/// Security state reported in Battery Status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SecurityState {
    /// Not initialized
    NotInitialized,
    /// Full access
    FullAccess,
    /// Unsealed
    Unsealed,
    /// Sealed
    Sealed,
}

impl SecurityState {
    const fn from_bits(bits: u16) -> Self {
        match (bits & battery::SEC_MASK) >> battery::SEC_SHIFT {
            1 => Self::FullAccess,
            2 => Self::Unsealed,
            3 => Self::Sealed,
            _ => Self::NotInitialized,
        }
    }
}

/// Battery Status register
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BatteryStatus {
    /// Device is in SLEEP
    pub sleep_mode: bool,
    /// SHUTDOWN is pending
    pub shutdown_pending: bool,
    /// Permanent fail triggered
    pub permanent_fault: bool,
    /// A safety fault is active
    pub safety_fault: bool,
    /// FUSE pin asserted
    pub fuse_pin: bool,
    /// Security state
    pub security_state: SecurityState,
    /// OTP writes blocked
    pub otp_write_blocked: bool,
    /// OTP write pending
    pub otp_write_pending: bool,
    /// Open-wire check running
    pub open_wire_check: bool,
    /// Watchdog reset occurred
    pub watchdog_reset: bool,
    /// Full reset occurred since last clear
    pub full_reset: bool,
    /// SLEEP allowed
    pub sleep_allowed: bool,
    /// Precharge mode active
    pub precharge_mode: bool,
    /// CONFIG_UPDATE mode active
    pub config_update_mode: bool,
}

impl BatteryStatus {
    /// Decode a Battery Status word
    pub const fn from_bits(bits: u16) -> Self {
        Self {
            sleep_mode: bits & battery::SLEEP != 0,
            shutdown_pending: bits & battery::SD_CMD != 0,
            permanent_fault: bits & battery::PF != 0,
            safety_fault: bits & battery::SS != 0,
            fuse_pin: bits & battery::FUSE != 0,
            security_state: SecurityState::from_bits(bits),
            otp_write_blocked: bits & battery::OTPB != 0,
            otp_write_pending: bits & battery::OTPW != 0,
            open_wire_check: bits & battery::COW_CHK != 0,
            watchdog_reset: bits & battery::WD != 0,
            full_reset: bits & battery::POR != 0,
            sleep_allowed: bits & battery::SLEEP_EN != 0,
            precharge_mode: bits & battery::PCHG_MODE != 0,
            config_update_mode: bits & battery::CFGUPDATE != 0,
        }
    }
}

/// Latched Alarm Status register
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AlarmStatus {
    /// Safety Status A has a flag set
    pub safety_a: bool,
    /// Safety Status B/C has a flag set
    pub safety_bc: bool,
    /// Permanent Fail Status A has a flag set
    pub permanent_fail_a: bool,
    /// Permanent Fail Status B/C/D has a flag set
    pub permanent_fail_bcd: bool,
    /// Voltage ADC scan complete
    pub adc_scan: bool,
    /// Woke from SLEEP
    pub wake: bool,
    /// Entered SLEEP
    pub sleep: bool,
    /// Full scan complete
    pub full_scan: bool,
    /// CHG FET turned off
    pub chg_off: bool,
    /// DSG FET turned off
    pub dsg_off: bool,
    /// Stack voltage below shutdown threshold
    pub shutdown_voltage: bool,
    /// FUSE pin driven
    pub fuse: bool,
    /// Cell balancing active
    pub cell_balancing: bool,
    /// Initial ADC complete
    pub adc_init: bool,
    /// Initialization complete
    pub init_complete: bool,
}

impl AlarmStatus {
    /// Decode an Alarm Status word
    pub const fn from_bits(bits: u16) -> Self {
        Self {
            safety_a: bits & alarm::SSA != 0,
            safety_bc: bits & alarm::SSBC != 0,
            permanent_fail_a: bits & alarm::PFA != 0,
            permanent_fail_bcd: bits & alarm::PFBCD != 0,
            adc_scan: bits & alarm::ADSCAN != 0,
            wake: bits & alarm::WAKE != 0,
            sleep: bits & alarm::SLEEP != 0,
            full_scan: bits & alarm::FULLSCAN != 0,
            chg_off: bits & alarm::XCHG != 0,
            dsg_off: bits & alarm::XDSG != 0,
            shutdown_voltage: bits & alarm::SHUTV != 0,
            fuse: bits & alarm::FUSE != 0,
            cell_balancing: bits & alarm::CB != 0,
            adc_init: bits & alarm::ADC_INIT != 0,
            init_complete: bits & alarm::INIT_COMP != 0,
        }
    }
}
