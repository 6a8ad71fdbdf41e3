//! Protection threshold encoding
//!
//! Converts user-facing millivolt and millisecond values into the raw units
//! stored in Data Memory. Out-of-range input never produces an error: it is
//! replaced by the device default so that the protection stays configured.
//!
//! Only cell overvoltage (COV) is wired to Data Memory. Undervoltage,
//! overcurrent and temperature limits are not implemented.

use core::ops::RangeInclusive;

/// COV threshold step in millivolts
pub const COV_THRESHOLD_STEP_MV: f32 = 50.6;
/// Legal raw COV threshold values
pub const COV_THRESHOLD_RANGE: RangeInclusive<u16> = 20..=110;
/// Raw COV threshold used when the request is out of range (~4352 mV)
pub const COV_THRESHOLD_DEFAULT: u8 = 86;

/// COV delay step in milliseconds
pub const COV_DELAY_STEP_MS: f32 = 3.3;
/// Fixed offset of the COV delay encoding, in steps
pub const COV_DELAY_OFFSET: f32 = 2.0;
/// Legal raw COV delay values
pub const COV_DELAY_RANGE: RangeInclusive<u16> = 1..=2047;
/// Raw COV delay used when the request is out of range
pub const COV_DELAY_DEFAULT: u16 = 74;

/// Raw cell overvoltage settings, ready to be written to Data Memory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CellOvervoltageConfig {
    /// Threshold in 50.6 mV steps
    pub threshold: u8,
    /// Delay in 3.3 ms steps, offset by 2
    pub delay: u16,
}

impl Default for CellOvervoltageConfig {
    fn default() -> Self {
        Self {
            threshold: COV_THRESHOLD_DEFAULT,
            delay: COV_DELAY_DEFAULT,
        }
    }
}

impl CellOvervoltageConfig {
    /// Encode a threshold and delay, substituting defaults for anything
    /// outside the device's legal range
    pub fn new(threshold_mv: u16, delay_ms: u16) -> Self {
        Self {
            threshold: cov_threshold_raw(threshold_mv),
            delay: cov_delay_raw(delay_ms),
        }
    }

    /// Approximate threshold in millivolts
    pub fn threshold_mv(&self) -> f32 {
        f32::from(self.threshold) * COV_THRESHOLD_STEP_MV
    }

    /// Approximate delay in milliseconds
    pub fn delay_ms(&self) -> f32 {
        (f32::from(self.delay) + COV_DELAY_OFFSET) * COV_DELAY_STEP_MS
    }
}

/// Raw COV threshold for `threshold_mv`, or the default when out of range
pub fn cov_threshold_raw(threshold_mv: u16) -> u8 {
    let raw = libm::roundf(f32::from(threshold_mv) / COV_THRESHOLD_STEP_MV);
    match u8::try_from(raw as u32) {
        Ok(raw) if COV_THRESHOLD_RANGE.contains(&u16::from(raw)) => raw,
        _ => COV_THRESHOLD_DEFAULT,
    }
}

/// Raw COV delay for `delay_ms`, or the default when out of range
pub fn cov_delay_raw(delay_ms: u16) -> u16 {
    let raw = libm::roundf(f32::from(delay_ms) / COV_DELAY_STEP_MS - COV_DELAY_OFFSET);
    if raw < 0.0 {
        return COV_DELAY_DEFAULT;
    }
    match u16::try_from(raw as u32) {
        Ok(raw) if COV_DELAY_RANGE.contains(&raw) => raw,
        _ => COV_DELAY_DEFAULT,
    }
}
