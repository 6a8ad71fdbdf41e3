//! Command, subcommand and Data Memory address tables for the BQ76952
//!
//! The chip has two disjoint address spaces that happen to share the same
//! numeric range:
//! - **Direct Commands** (`0x00`-`0x7F`) are sent straight on the bus as the
//!   first byte of a transaction.
//! - **Data Memory** (`0x9000`-`0x9FFF`) is only reachable by writing the
//!   16-bit address into the subcommand window at `0x3E`/`0x3F`.
//!
//! Addresses follow the BQ76952 Technical Reference Manual (TRM, SLUUBY2).

/// Direct Command opcodes (TRM §12.1)
pub mod cmd {
    /// Safety Status A (protection faults)
    pub const SAFETY_STATUS_A: u8 = 0x03;
    /// Safety Status B (temperature faults)
    pub const SAFETY_STATUS_B: u8 = 0x05;
    /// Battery Status (16-bit)
    pub const BATTERY_STATUS: u8 = 0x12;

    /// Cell 1 voltage; cell N lives at `VCELL1 + (N - 1) * 2`
    pub const VCELL1: u8 = 0x14;
    /// Cell 16 voltage
    pub const VCELL16: u8 = 0x32;
    /// Top-of-stack voltage (10 mV units)
    pub const STACK_VOLTAGE: u8 = 0x34;
    /// PACK pin voltage (10 mV units)
    pub const PACK_VOLTAGE: u8 = 0x36;

    /// CC2 current (signed, mA with default scaling)
    pub const CC2_CURRENT: u8 = 0x3A;

    /// Subcommand / Data Memory address, low byte
    pub const SUBCMD_LOW: u8 = 0x3E;
    /// Subcommand / Data Memory address, high byte
    pub const SUBCMD_HIGH: u8 = 0x3F;
    /// Start of the 32-byte transfer buffer
    pub const RESP_START: u8 = 0x40;
    /// Transfer buffer checksum
    pub const RESP_CHECKSUM: u8 = 0x60;
    /// Transfer buffer length
    pub const RESP_LEN: u8 = 0x61;

    /// Latched alarm status
    pub const ALARM_STATUS: u8 = 0x62;

    /// Internal die temperature (0.1 K)
    pub const INT_TEMPERATURE: u8 = 0x68;
    /// TS1 thermistor temperature (0.1 K)
    pub const TS1_TEMPERATURE: u8 = 0x70;
    /// TS2 thermistor temperature (0.1 K)
    pub const TS2_TEMPERATURE: u8 = 0x72;
    /// TS3 thermistor temperature (0.1 K)
    pub const TS3_TEMPERATURE: u8 = 0x74;
    /// HDQ pin temperature (0.1 K)
    pub const HDQ_TEMPERATURE: u8 = 0x76;
    /// DCHG pin temperature (0.1 K)
    pub const DCHG_TEMPERATURE: u8 = 0x78;
    /// DDSG pin temperature (0.1 K)
    pub const DDSG_TEMPERATURE: u8 = 0x7A;

    /// FET Status
    pub const FET_STATUS: u8 = 0x7F;
}

/// Subcommand codes (TRM §12.2, Table 12-2)
pub mod subcmd {
    /// Full device reset
    pub const RESET: u16 = 0x0012;
    /// Enter CONFIG_UPDATE mode
    pub const SET_CFGUPDATE: u16 = 0x0090;
    /// Leave CONFIG_UPDATE mode
    pub const EXIT_CFGUPDATE: u16 = 0x0092;
    /// Turn off DSG and PDSG
    pub const DSG_PDSG_OFF: u16 = 0x0093;
    /// Turn off CHG and PCHG
    pub const CHG_PCHG_OFF: u16 = 0x0094;
    /// Turn off all FETs
    pub const ALL_FETS_OFF: u16 = 0x0095;
    /// Allow all FETs to turn on
    pub const ALL_FETS_ON: u16 = 0x0096;
}

/// Data Memory addresses (TRM §13)
pub mod datamem {
    /// Protections:COV:Threshold (U1, 50.6 mV units)
    pub const COV_THRESHOLD: u16 = 0x9278;
    /// Protections:COV:Delay (U2, 3.3 ms units)
    pub const COV_DELAY: u16 = 0x9279;
}

/// Number of cell inputs on the BQ76952
pub const CELL_COUNT: usize = 16;

/// Direct Command opcode for the voltage of `cell` (1-16)
///
/// Returns `None` for indices outside `1..=16`.
pub const fn cell_voltage_command(cell: u8) -> Option<u8> {
    if cell >= 1 && cell as usize <= CELL_COUNT {
        Some(cmd::VCELL1 + (cell - 1) * 2)
    } else {
        None
    }
}

/// Temperature sensing channels
///
/// The discriminant is the Direct Command opcode of the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Thermistor {
    /// TS1 pin
    Ts1 = cmd::TS1_TEMPERATURE,
    /// TS2 pin
    Ts2 = cmd::TS2_TEMPERATURE,
    /// TS3 pin
    Ts3 = cmd::TS3_TEMPERATURE,
    /// HDQ pin configured as a thermistor input
    Hdq = cmd::HDQ_TEMPERATURE,
    /// DCHG pin configured as a thermistor input
    Dchg = cmd::DCHG_TEMPERATURE,
    /// DDSG pin configured as a thermistor input
    Ddsg = cmd::DDSG_TEMPERATURE,
}

impl Thermistor {
    /// Direct Command opcode for this channel
    pub const fn command(self) -> u8 {
        self as u8
    }
}

/// FET selection for [`Bq76952::set_fet`](crate::Bq76952)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Fet {
    /// Charge path (CHG + PCHG)
    Charge,
    /// Discharge path (DSG + PDSG)
    Discharge,
    /// Every FET driver
    All,
}

/// Requested FET state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FetState {
    /// Force the FET(s) off
    Off,
    /// Allow the FET(s) to turn on
    On,
}

/// `(target, state) -> subcommand` table.
///
/// The device has no per-path "on" command; any `On` request maps to
/// `ALL_FETS_ON`.
const FET_SUBCOMMANDS: [(Fet, FetState, u16); 6] = [
    (Fet::Discharge, FetState::Off, subcmd::DSG_PDSG_OFF),
    (Fet::Charge, FetState::Off, subcmd::CHG_PCHG_OFF),
    (Fet::All, FetState::Off, subcmd::ALL_FETS_OFF),
    (Fet::Discharge, FetState::On, subcmd::ALL_FETS_ON),
    (Fet::Charge, FetState::On, subcmd::ALL_FETS_ON),
    (Fet::All, FetState::On, subcmd::ALL_FETS_ON),
];

/// Subcommand that drives `fet` into `state`
pub fn fet_subcommand(fet: Fet, state: FetState) -> u16 {
    FET_SUBCOMMANDS
        .iter()
        .find(|(f, s, _)| *f == fet && *s == state)
        .map_or(subcmd::ALL_FETS_OFF, |&(_, _, code)| code)
}
