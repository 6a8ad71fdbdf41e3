//! Raw measurement conversions

pub use crate::registers::CELL_COUNT;

/// Voltages of all cells in millivolts, cell 1 first
pub type CellVoltages = [u16; CELL_COUNT];

/// Offset between Kelvin and degrees Celsius
pub const KELVIN_OFFSET: f32 = 273.15;

/// Convert a temperature register (0.1 K units) to degrees Celsius
#[inline]
pub fn deci_kelvin_to_celsius(raw: u16) -> f32 {
    f32::from(raw) / 10.0 - KELVIN_OFFSET
}

/// Convert a stack/pack voltage register (10 mV units) to millivolts
#[inline]
pub const fn centivolts_to_millivolts(raw: u16) -> u32 {
    raw as u32 * 10
}
