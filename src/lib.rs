#![no_std]
#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

pub mod checksum;
pub mod device;
pub mod interface;
pub mod measurement;
pub mod protection;
pub mod registers;
pub mod status;

// Re-export main types
pub use checksum::{Checksum, checksum};
pub use device::{Bq76952, DriverConfig};
pub use interface::I2cInterface;
pub use measurement::{CELL_COUNT, CellVoltages};
pub use protection::CellOvervoltageConfig;
pub use registers::{Fet, FetState, Thermistor};
pub use status::{
    AlarmStatus, BatteryStatus, FetStatus, ProtectionStatus, SecurityState,
    TemperatureProtectionStatus,
};

/// Default 7-bit I2C address of the BQ76952
///
/// Datasheets and Arduino code often quote the 8-bit forms instead:
/// `0x10` for writes and `0x11` for reads.
pub const I2C_ADDRESS_DEFAULT: u8 = 0x08;

/// Driver errors
#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<E> {
    /// Communication error with the device (NACK, arbitration loss, bus timeout)
    Bus(E),
    /// Cell index outside `1..=16` (contains the requested index)
    InvalidCell(u8),
}

impl<E> From<E> for Error<E> {
    fn from(error: E) -> Self {
        Self::Bus(error)
    }
}
