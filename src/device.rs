//! High-level driver API for the BQ76952
//!
//! The driver mirrors the device's three access protocols:
//! - **Direct Commands**: one opcode, two bytes back (measurements, status)
//! - **Subcommands**: a 16-bit code written to `0x3E`/`0x3F` (reset, FETs,
//!   config-update mode)
//! - **Data Memory**: persistent settings, written through the subcommand
//!   window with a checksum, bracketed by `SET_CFGUPDATE`/`EXIT_CFGUPDATE`
//!
//! The blocking API is available by default; enable the `async` feature for
//! the `embedded-hal-async` variant with the same method names.
//!
//! # Sharing
//!
//! The driver holds no lock. Every operation takes `&mut self`, so a single
//! instance is serialized by ownership. If several tasks need the device, put
//! the driver behind a mutex: interleaving any traffic between entering and
//! leaving config-update mode corrupts the Data Memory write in progress.

use crate::checksum::Checksum;
use crate::measurement::{CellVoltages, centivolts_to_millivolts, deci_kelvin_to_celsius};
use crate::protection::CellOvervoltageConfig;
use crate::registers::{
    CELL_COUNT, Fet, FetState, Thermistor, cell_voltage_command, cmd, datamem, fet_subcommand,
    subcmd,
};
use crate::status::{
    AlarmStatus, BatteryStatus, FetStatus, ProtectionStatus, TemperatureProtectionStatus,
};
use crate::{Error, I2C_ADDRESS_DEFAULT};

// Only import RegisterInterface when not using async feature
#[cfg(not(feature = "async"))]
use device_driver::RegisterInterface;

/// Settle time after `SET_CFGUPDATE` before the next bus access
pub const CONFIG_UPDATE_ENTER_DELAY_US: u32 = 2000;

/// Settle time after `EXIT_CFGUPDATE`
pub const CONFIG_UPDATE_EXIT_DELAY_US: u32 = 1000;

/// Length byte overhead of a Data Memory commit: address (2), checksum and
/// length registers (2)
const DATA_MEMORY_LEN_OVERHEAD: u8 = 4;

/// Largest Data Memory value the driver writes in one transaction
const DATA_MEMORY_MAX_VALUE_LEN: usize = 2;

/// Bus tracing, emitted only when [`DriverConfig::debug`] is set
macro_rules! bus_trace {
    ($config:expr, $($arg:tt)*) => {
        #[cfg(feature = "defmt")]
        {
            if $config.debug {
                defmt::debug!($($arg)*);
            }
        }
    };
}

/// Driver configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DriverConfig {
    /// 7-bit device address. Must match the address the bus interface uses;
    /// its 8-bit write form is part of every Data Memory checksum.
    pub address: u8,
    /// Log every bus transaction at debug level (needs the `defmt` feature)
    pub debug: bool,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            address: I2C_ADDRESS_DEFAULT,
            debug: false,
        }
    }
}

impl DriverConfig {
    /// 8-bit write address (`address << 1`)
    pub const fn write_address(&self) -> u8 {
        self.address << 1
    }
}

/// Main driver for the BQ76952
pub struct Bq76952<I> {
    interface: I,
    config: DriverConfig,
}

impl<I> Bq76952<I> {
    /// Create a new driver on top of a bus interface
    ///
    /// No bus traffic is generated. Use `is_connected()` to probe the device.
    pub const fn new(interface: I, config: DriverConfig) -> Self {
        Self { interface, config }
    }

    /// Current driver configuration
    pub const fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Enable or disable bus tracing
    pub fn set_debug(&mut self, enabled: bool) {
        self.config.debug = enabled;
    }

    /// Consume the driver and return the bus interface
    pub fn release(self) -> I {
        self.interface
    }

    /// Checksum and length bytes committing `data` to `address`
    fn data_memory_commit(&self, address: u16, data: &[u8]) -> [u8; 2] {
        let [lo, hi] = address.to_le_bytes();
        let checksum = Checksum::new()
            .push(self.config.write_address())
            .push(cmd::SUBCMD_LOW)
            .push(lo)
            .push(hi)
            .extend(data)
            .finish();
        // data is at most DATA_MEMORY_MAX_VALUE_LEN bytes
        let len = DATA_MEMORY_LEN_OVERHEAD + data.len() as u8;
        [checksum, len]
    }
}

/// Bytes written after the `0x3E` selector to stage a Data Memory access
fn data_memory_stage(
    address: u16,
    data: &[u8],
) -> ([u8; 2 + DATA_MEMORY_MAX_VALUE_LEN], usize) {
    let mut buffer = [0u8; 2 + DATA_MEMORY_MAX_VALUE_LEN];
    buffer[..2].copy_from_slice(&address.to_le_bytes());
    let len = data.len().min(DATA_MEMORY_MAX_VALUE_LEN);
    buffer[2..2 + len].copy_from_slice(&data[..len]);
    (buffer, 2 + len)
}

/// Register size in bits for a payload of `len` bytes
const fn size_bits(len: usize) -> u32 {
    (len * 8) as u32
}

#[cfg(not(feature = "async"))]
impl<I> Bq76952<I>
where
    I: RegisterInterface<AddressType = u8>,
{
    /// Check whether the device answers on the bus
    ///
    /// Performs a Battery Status read and reports whether it completed.
    pub fn is_connected(&mut self) -> bool {
        let connected = self.direct_command(cmd::BATTERY_STATUS).is_ok();

        #[cfg(feature = "defmt")]
        {
            if connected {
                defmt::info!("BQ76952 connected on I2C");
            } else {
                defmt::warn!("BQ76952 not detected on I2C");
            }
        }

        connected
    }

    /// Send a Direct Command and read its 16-bit little-endian result
    ///
    /// # Errors
    ///
    /// Returns an error if communication with the device fails.
    pub fn direct_command(&mut self, command: u8) -> Result<u16, Error<I::Error>> {
        let mut buffer = [0u8; 2];
        self.interface
            .read_register(command, size_bits(buffer.len()), &mut buffer)?;
        let value = u16::from_le_bytes(buffer);
        bus_trace!(self.config, "direct 0x{:02x} -> 0x{:04x}", command, value);
        Ok(value)
    }

    /// Direct Command whose meaningful content is the low byte
    fn direct_command_u8(&mut self, command: u8) -> Result<u8, Error<I::Error>> {
        let [lo, _] = self.direct_command(command)?.to_le_bytes();
        Ok(lo)
    }

    /// Write a 16-bit subcommand to `0x3E`/`0x3F`
    ///
    /// The device executes it asynchronously; nothing is read back.
    ///
    /// # Errors
    ///
    /// Returns an error if communication with the device fails.
    pub fn sub_command(&mut self, code: u16) -> Result<(), Error<I::Error>> {
        let bytes = code.to_le_bytes();
        self.interface
            .write_register(cmd::SUBCMD_LOW, size_bits(bytes.len()), &bytes)?;
        bus_trace!(self.config, "subcommand 0x{:04x}", code);
        Ok(())
    }

    /// Read a 16-bit value from the subcommand response window (`0x40`)
    ///
    /// # Errors
    ///
    /// Returns an error if communication with the device fails.
    pub fn sub_command_response_u16(&mut self) -> Result<u16, Error<I::Error>> {
        let mut buffer = [0u8; 2];
        self.interface
            .read_register(cmd::RESP_START, size_bits(buffer.len()), &mut buffer)?;
        Ok(u16::from_le_bytes(buffer))
    }

    /// Reset the device (`RESET` subcommand)
    ///
    /// # Errors
    ///
    /// Returns an error if communication with the device fails.
    pub fn reset(&mut self) -> Result<(), Error<I::Error>> {
        self.sub_command(subcmd::RESET)
    }

    /// Enter CONFIG_UPDATE mode and wait for the device to settle
    ///
    /// Data Memory writes through [`write_data_memory`](Self::write_data_memory)
    /// handle this on their own; call it directly only to batch a custom
    /// sequence, and always pair it with [`exit_config_update`](Self::exit_config_update).
    ///
    /// # Errors
    ///
    /// Returns an error if communication with the device fails.
    pub fn enter_config_update<D>(&mut self, delay: &mut D) -> Result<(), Error<I::Error>>
    where
        D: embedded_hal::delay::DelayNs,
    {
        self.sub_command(subcmd::SET_CFGUPDATE)?;
        delay.delay_us(CONFIG_UPDATE_ENTER_DELAY_US);
        Ok(())
    }

    /// Leave CONFIG_UPDATE mode and wait for the device to settle
    ///
    /// # Errors
    ///
    /// Returns an error if communication with the device fails.
    pub fn exit_config_update<D>(&mut self, delay: &mut D) -> Result<(), Error<I::Error>>
    where
        D: embedded_hal::delay::DelayNs,
    {
        self.sub_command(subcmd::EXIT_CFGUPDATE)?;
        delay.delay_us(CONFIG_UPDATE_EXIT_DELAY_US);
        Ok(())
    }

    /// Write one byte of Data Memory
    ///
    /// Enters CONFIG_UPDATE mode, stages the address and value at `0x3E`,
    /// commits them with checksum and length at `0x60`, then leaves
    /// CONFIG_UPDATE mode. Nothing is read back.
    ///
    /// # Errors
    ///
    /// Returns the first bus error. The exit subcommand is still attempted
    /// when an earlier step fails, so the device is not left in
    /// CONFIG_UPDATE mode.
    pub fn write_data_memory<D>(
        &mut self,
        address: u16,
        value: u8,
        delay: &mut D,
    ) -> Result<(), Error<I::Error>>
    where
        D: embedded_hal::delay::DelayNs,
    {
        self.write_data_memory_bytes(address, &[value], delay)
    }

    /// Write a little-endian 16-bit Data Memory value
    ///
    /// Same bracketing and failure handling as
    /// [`write_data_memory`](Self::write_data_memory).
    ///
    /// # Errors
    ///
    /// Returns the first bus error.
    pub fn write_data_memory_u16<D>(
        &mut self,
        address: u16,
        value: u16,
        delay: &mut D,
    ) -> Result<(), Error<I::Error>>
    where
        D: embedded_hal::delay::DelayNs,
    {
        self.write_data_memory_bytes(address, &value.to_le_bytes(), delay)
    }

    fn write_data_memory_bytes<D>(
        &mut self,
        address: u16,
        data: &[u8],
        delay: &mut D,
    ) -> Result<(), Error<I::Error>>
    where
        D: embedded_hal::delay::DelayNs,
    {
        let commit = self.data_memory_commit(address, data);
        bus_trace!(
            self.config,
            "data memory write 0x{:04x} = {=[u8]:x} (checksum 0x{:02x})",
            address,
            data,
            commit[0]
        );

        let written = self.stage_data_memory(address, data, &commit, delay);
        let exited = self.exit_config_update(delay);

        #[cfg(feature = "defmt")]
        {
            if written.is_err() && exited.is_err() {
                defmt::warn!("EXIT_CFGUPDATE failed after aborted data memory write");
            }
        }

        written.and(exited)
    }

    /// Everything between (and including) entering CONFIG_UPDATE and the commit
    fn stage_data_memory<D>(
        &mut self,
        address: u16,
        data: &[u8],
        commit: &[u8; 2],
        delay: &mut D,
    ) -> Result<(), Error<I::Error>>
    where
        D: embedded_hal::delay::DelayNs,
    {
        self.enter_config_update(delay)?;

        let (stage, len) = data_memory_stage(address, data);
        self.interface
            .write_register(cmd::SUBCMD_LOW, size_bits(len), &stage[..len])?;
        self.interface
            .write_register(cmd::RESP_CHECKSUM, size_bits(commit.len()), commit)?;
        Ok(())
    }

    /// Read one byte of Data Memory
    ///
    /// Reads do not need CONFIG_UPDATE mode.
    ///
    /// # Errors
    ///
    /// Returns an error if communication with the device fails.
    pub fn read_data_memory(&mut self, address: u16) -> Result<u8, Error<I::Error>> {
        let (stage, len) = data_memory_stage(address, &[]);
        self.interface
            .write_register(cmd::SUBCMD_LOW, size_bits(len), &stage[..len])?;

        let mut buffer = [0u8; 1];
        self.interface
            .read_register(cmd::RESP_START, size_bits(buffer.len()), &mut buffer)?;
        bus_trace!(
            self.config,
            "data memory read 0x{:04x} -> 0x{:02x}",
            address,
            buffer[0]
        );
        Ok(buffer[0])
    }

    /// Read the voltage of one cell in millivolts
    ///
    /// # Arguments
    /// * `cell` - Cell number, 1-16
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidCell`] for an index outside `1..=16`, or a bus
    /// error if communication fails.
    pub fn cell_voltage(&mut self, cell: u8) -> Result<u16, Error<I::Error>> {
        let command = cell_voltage_command(cell).ok_or(Error::InvalidCell(cell))?;
        self.direct_command(command)
    }

    /// Read all 16 cell voltages in millivolts, cell 1 first
    ///
    /// Each cell is its own Direct Command transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if communication with the device fails.
    pub fn all_cell_voltages(&mut self) -> Result<CellVoltages, Error<I::Error>> {
        let mut voltages = [0u16; CELL_COUNT];
        for (cell, voltage) in (1u8..).zip(voltages.iter_mut()) {
            *voltage = self.cell_voltage(cell)?;
        }
        Ok(voltages)
    }

    /// Read the top-of-stack voltage (10 mV units)
    ///
    /// # Errors
    ///
    /// Returns an error if communication with the device fails.
    pub fn stack_voltage(&mut self) -> Result<u16, Error<I::Error>> {
        self.direct_command(cmd::STACK_VOLTAGE)
    }

    /// Read the top-of-stack voltage in millivolts
    ///
    /// # Errors
    ///
    /// Returns an error if communication with the device fails.
    pub fn stack_voltage_mv(&mut self) -> Result<u32, Error<I::Error>> {
        Ok(centivolts_to_millivolts(self.stack_voltage()?))
    }

    /// Read the PACK pin voltage (10 mV units)
    ///
    /// # Errors
    ///
    /// Returns an error if communication with the device fails.
    pub fn pack_voltage(&mut self) -> Result<u16, Error<I::Error>> {
        self.direct_command(cmd::PACK_VOLTAGE)
    }

    /// Read the CC2 current in milliamps (negative while discharging)
    ///
    /// # Errors
    ///
    /// Returns an error if communication with the device fails.
    pub fn current(&mut self) -> Result<i16, Error<I::Error>> {
        Ok(self.current_raw()? as i16)
    }

    /// Read the CC2 current register without sign interpretation
    ///
    /// # Errors
    ///
    /// Returns an error if communication with the device fails.
    pub fn current_raw(&mut self) -> Result<u16, Error<I::Error>> {
        self.direct_command(cmd::CC2_CURRENT)
    }

    /// Read the internal die temperature in °C
    ///
    /// # Errors
    ///
    /// Returns an error if communication with the device fails.
    pub fn internal_temperature(&mut self) -> Result<f32, Error<I::Error>> {
        Ok(deci_kelvin_to_celsius(
            self.direct_command(cmd::INT_TEMPERATURE)?,
        ))
    }

    /// Read a thermistor channel in °C
    ///
    /// # Errors
    ///
    /// Returns an error if communication with the device fails.
    pub fn thermistor_temperature(
        &mut self,
        thermistor: Thermistor,
    ) -> Result<f32, Error<I::Error>> {
        Ok(deci_kelvin_to_celsius(
            self.direct_command(thermistor.command())?,
        ))
    }

    /// Read and decode Safety Status A
    ///
    /// # Errors
    ///
    /// Returns an error if communication with the device fails.
    pub fn protection_status(&mut self) -> Result<ProtectionStatus, Error<I::Error>> {
        let bits = self.direct_command_u8(cmd::SAFETY_STATUS_A)?;
        Ok(ProtectionStatus::from_bits(bits))
    }

    /// Read and decode Safety Status B
    ///
    /// # Errors
    ///
    /// Returns an error if communication with the device fails.
    pub fn temperature_status(
        &mut self,
    ) -> Result<TemperatureProtectionStatus, Error<I::Error>> {
        let bits = self.direct_command_u8(cmd::SAFETY_STATUS_B)?;
        Ok(TemperatureProtectionStatus::from_bits(bits))
    }

    /// Read and decode FET Status
    ///
    /// # Errors
    ///
    /// Returns an error if communication with the device fails.
    pub fn fet_status(&mut self) -> Result<FetStatus, Error<I::Error>> {
        let bits = self.direct_command_u8(cmd::FET_STATUS)?;
        Ok(FetStatus::from_bits(bits))
    }

    /// Check whether the CHG FET is on
    ///
    /// # Errors
    ///
    /// Returns an error if communication with the device fails.
    pub fn is_charging(&mut self) -> Result<bool, Error<I::Error>> {
        Ok(self.fet_status()?.chg_fet)
    }

    /// Check whether the DSG FET is on
    ///
    /// # Errors
    ///
    /// Returns an error if communication with the device fails.
    pub fn is_discharging(&mut self) -> Result<bool, Error<I::Error>> {
        Ok(self.fet_status()?.dsg_fet)
    }

    /// Read and decode Battery Status
    ///
    /// # Errors
    ///
    /// Returns an error if communication with the device fails.
    pub fn battery_status(&mut self) -> Result<BatteryStatus, Error<I::Error>> {
        let bits = self.direct_command(cmd::BATTERY_STATUS)?;
        Ok(BatteryStatus::from_bits(bits))
    }

    /// Read and decode the latched Alarm Status
    ///
    /// # Errors
    ///
    /// Returns an error if communication with the device fails.
    pub fn alarm_status(&mut self) -> Result<AlarmStatus, Error<I::Error>> {
        let bits = self.direct_command(cmd::ALARM_STATUS)?;
        Ok(AlarmStatus::from_bits(bits))
    }

    /// Force FETs off or allow them on
    ///
    /// Any `On` request allows every FET; the device has no per-path enable.
    ///
    /// # Errors
    ///
    /// Returns an error if communication with the device fails.
    pub fn set_fet(&mut self, fet: Fet, state: FetState) -> Result<(), Error<I::Error>> {
        self.sub_command(fet_subcommand(fet, state))
    }

    /// Program the cell overvoltage threshold and delay
    ///
    /// Values outside the device's range are replaced with the defaults
    /// (raw threshold 86 ≈ 4352 mV, raw delay 74) instead of failing. The
    /// applied raw values are returned.
    ///
    /// # Arguments
    /// * `threshold_mv` - Trip voltage in millivolts
    /// * `delay_ms` - Time above threshold before tripping, in milliseconds
    /// * `delay` - Delay provider for the config-update settle times
    ///
    /// # Errors
    ///
    /// Returns an error if communication with the device fails.
    pub fn set_cell_overvoltage_protection<D>(
        &mut self,
        threshold_mv: u16,
        delay_ms: u16,
        delay: &mut D,
    ) -> Result<CellOvervoltageConfig, Error<I::Error>>
    where
        D: embedded_hal::delay::DelayNs,
    {
        let config = CellOvervoltageConfig::new(threshold_mv, delay_ms);

        #[cfg(feature = "defmt")]
        defmt::info!(
            "COV: {} mV / {} ms -> raw threshold {}, raw delay {}",
            threshold_mv,
            delay_ms,
            config.threshold,
            config.delay
        );

        self.write_data_memory(datamem::COV_THRESHOLD, config.threshold, delay)?;
        self.write_data_memory_u16(datamem::COV_DELAY, config.delay, delay)?;
        Ok(config)
    }
}

#[cfg(feature = "async")]
impl<I> Bq76952<I>
where
    I: device_driver::AsyncRegisterInterface<AddressType = u8>,
{
    /// Check whether the device answers on the bus
    ///
    /// Performs a Battery Status read and reports whether it completed.
    pub async fn is_connected(&mut self) -> bool {
        let connected = self.direct_command(cmd::BATTERY_STATUS).await.is_ok();

        #[cfg(feature = "defmt")]
        {
            if connected {
                defmt::info!("BQ76952 connected on I2C");
            } else {
                defmt::warn!("BQ76952 not detected on I2C");
            }
        }

        connected
    }

    /// Send a Direct Command and read its 16-bit little-endian result
    ///
    /// # Errors
    ///
    /// Returns an error if communication with the device fails.
    pub async fn direct_command(&mut self, command: u8) -> Result<u16, Error<I::Error>> {
        let mut buffer = [0u8; 2];
        self.interface
            .read_register(command, size_bits(buffer.len()), &mut buffer)
            .await?;
        let value = u16::from_le_bytes(buffer);
        bus_trace!(self.config, "direct 0x{:02x} -> 0x{:04x}", command, value);
        Ok(value)
    }

    async fn direct_command_u8(&mut self, command: u8) -> Result<u8, Error<I::Error>> {
        let [lo, _] = self.direct_command(command).await?.to_le_bytes();
        Ok(lo)
    }

    /// Write a 16-bit subcommand to `0x3E`/`0x3F`
    ///
    /// # Errors
    ///
    /// Returns an error if communication with the device fails.
    pub async fn sub_command(&mut self, code: u16) -> Result<(), Error<I::Error>> {
        let bytes = code.to_le_bytes();
        self.interface
            .write_register(cmd::SUBCMD_LOW, size_bits(bytes.len()), &bytes)
            .await?;
        bus_trace!(self.config, "subcommand 0x{:04x}", code);
        Ok(())
    }

    /// Read a 16-bit value from the subcommand response window (`0x40`)
    ///
    /// # Errors
    ///
    /// Returns an error if communication with the device fails.
    pub async fn sub_command_response_u16(&mut self) -> Result<u16, Error<I::Error>> {
        let mut buffer = [0u8; 2];
        self.interface
            .read_register(cmd::RESP_START, size_bits(buffer.len()), &mut buffer)
            .await?;
        Ok(u16::from_le_bytes(buffer))
    }

    /// Reset the device (`RESET` subcommand)
    ///
    /// # Errors
    ///
    /// Returns an error if communication with the device fails.
    pub async fn reset(&mut self) -> Result<(), Error<I::Error>> {
        self.sub_command(subcmd::RESET).await
    }

    /// Enter CONFIG_UPDATE mode and wait for the device to settle
    ///
    /// # Errors
    ///
    /// Returns an error if communication with the device fails.
    pub async fn enter_config_update<D>(&mut self, delay: &mut D) -> Result<(), Error<I::Error>>
    where
        D: embedded_hal_async::delay::DelayNs,
    {
        self.sub_command(subcmd::SET_CFGUPDATE).await?;
        delay.delay_us(CONFIG_UPDATE_ENTER_DELAY_US).await;
        Ok(())
    }

    /// Leave CONFIG_UPDATE mode and wait for the device to settle
    ///
    /// Also the recovery path when a Data Memory write future was dropped
    /// before it finished.
    ///
    /// # Errors
    ///
    /// Returns an error if communication with the device fails.
    pub async fn exit_config_update<D>(&mut self, delay: &mut D) -> Result<(), Error<I::Error>>
    where
        D: embedded_hal_async::delay::DelayNs,
    {
        self.sub_command(subcmd::EXIT_CFGUPDATE).await?;
        delay.delay_us(CONFIG_UPDATE_EXIT_DELAY_US).await;
        Ok(())
    }

    /// Write one byte of Data Memory
    ///
    /// # Errors
    ///
    /// Returns the first bus error. The exit subcommand is still attempted
    /// when an earlier step fails.
    pub async fn write_data_memory<D>(
        &mut self,
        address: u16,
        value: u8,
        delay: &mut D,
    ) -> Result<(), Error<I::Error>>
    where
        D: embedded_hal_async::delay::DelayNs,
    {
        self.write_data_memory_bytes(address, &[value], delay).await
    }

    /// Write a little-endian 16-bit Data Memory value
    ///
    /// # Errors
    ///
    /// Returns the first bus error.
    pub async fn write_data_memory_u16<D>(
        &mut self,
        address: u16,
        value: u16,
        delay: &mut D,
    ) -> Result<(), Error<I::Error>>
    where
        D: embedded_hal_async::delay::DelayNs,
    {
        self.write_data_memory_bytes(address, &value.to_le_bytes(), delay)
            .await
    }

    async fn write_data_memory_bytes<D>(
        &mut self,
        address: u16,
        data: &[u8],
        delay: &mut D,
    ) -> Result<(), Error<I::Error>>
    where
        D: embedded_hal_async::delay::DelayNs,
    {
        let commit = self.data_memory_commit(address, data);
        bus_trace!(
            self.config,
            "data memory write 0x{:04x} = {=[u8]:x} (checksum 0x{:02x})",
            address,
            data,
            commit[0]
        );

        let written = self.stage_data_memory(address, data, &commit, delay).await;
        let exited = self.exit_config_update(delay).await;

        #[cfg(feature = "defmt")]
        {
            if written.is_err() && exited.is_err() {
                defmt::warn!("EXIT_CFGUPDATE failed after aborted data memory write");
            }
        }

        written.and(exited)
    }

    async fn stage_data_memory<D>(
        &mut self,
        address: u16,
        data: &[u8],
        commit: &[u8; 2],
        delay: &mut D,
    ) -> Result<(), Error<I::Error>>
    where
        D: embedded_hal_async::delay::DelayNs,
    {
        self.enter_config_update(delay).await?;

        let (stage, len) = data_memory_stage(address, data);
        self.interface
            .write_register(cmd::SUBCMD_LOW, size_bits(len), &stage[..len])
            .await?;
        self.interface
            .write_register(cmd::RESP_CHECKSUM, size_bits(commit.len()), commit)
            .await?;
        Ok(())
    }

    /// Read one byte of Data Memory
    ///
    /// # Errors
    ///
    /// Returns an error if communication with the device fails.
    pub async fn read_data_memory(&mut self, address: u16) -> Result<u8, Error<I::Error>> {
        let (stage, len) = data_memory_stage(address, &[]);
        self.interface
            .write_register(cmd::SUBCMD_LOW, size_bits(len), &stage[..len])
            .await?;

        let mut buffer = [0u8; 1];
        self.interface
            .read_register(cmd::RESP_START, size_bits(buffer.len()), &mut buffer)
            .await?;
        bus_trace!(
            self.config,
            "data memory read 0x{:04x} -> 0x{:02x}",
            address,
            buffer[0]
        );
        Ok(buffer[0])
    }

    /// Read the voltage of one cell in millivolts
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidCell`] for an index outside `1..=16`, or a bus
    /// error if communication fails.
    pub async fn cell_voltage(&mut self, cell: u8) -> Result<u16, Error<I::Error>> {
        let command = cell_voltage_command(cell).ok_or(Error::InvalidCell(cell))?;
        self.direct_command(command).await
    }

    /// Read all 16 cell voltages in millivolts, cell 1 first
    ///
    /// # Errors
    ///
    /// Returns an error if communication with the device fails.
    pub async fn all_cell_voltages(&mut self) -> Result<CellVoltages, Error<I::Error>> {
        let mut voltages = [0u16; CELL_COUNT];
        for (cell, voltage) in (1u8..).zip(voltages.iter_mut()) {
            *voltage = self.cell_voltage(cell).await?;
        }
        Ok(voltages)
    }

    /// Read the top-of-stack voltage (10 mV units)
    ///
    /// # Errors
    ///
    /// Returns an error if communication with the device fails.
    pub async fn stack_voltage(&mut self) -> Result<u16, Error<I::Error>> {
        self.direct_command(cmd::STACK_VOLTAGE).await
    }

    /// Read the top-of-stack voltage in millivolts
    ///
    /// # Errors
    ///
    /// Returns an error if communication with the device fails.
    pub async fn stack_voltage_mv(&mut self) -> Result<u32, Error<I::Error>> {
        Ok(centivolts_to_millivolts(self.stack_voltage().await?))
    }

    /// Read the PACK pin voltage (10 mV units)
    ///
    /// # Errors
    ///
    /// Returns an error if communication with the device fails.
    pub async fn pack_voltage(&mut self) -> Result<u16, Error<I::Error>> {
        self.direct_command(cmd::PACK_VOLTAGE).await
    }

    /// Read the CC2 current in milliamps (negative while discharging)
    ///
    /// # Errors
    ///
    /// Returns an error if communication with the device fails.
    pub async fn current(&mut self) -> Result<i16, Error<I::Error>> {
        Ok(self.current_raw().await? as i16)
    }

    /// Read the CC2 current register without sign interpretation
    ///
    /// # Errors
    ///
    /// Returns an error if communication with the device fails.
    pub async fn current_raw(&mut self) -> Result<u16, Error<I::Error>> {
        self.direct_command(cmd::CC2_CURRENT).await
    }

    /// Read the internal die temperature in °C
    ///
    /// # Errors
    ///
    /// Returns an error if communication with the device fails.
    pub async fn internal_temperature(&mut self) -> Result<f32, Error<I::Error>> {
        Ok(deci_kelvin_to_celsius(
            self.direct_command(cmd::INT_TEMPERATURE).await?,
        ))
    }

    /// Read a thermistor channel in °C
    ///
    /// # Errors
    ///
    /// Returns an error if communication with the device fails.
    pub async fn thermistor_temperature(
        &mut self,
        thermistor: Thermistor,
    ) -> Result<f32, Error<I::Error>> {
        Ok(deci_kelvin_to_celsius(
            self.direct_command(thermistor.command()).await?,
        ))
    }

    /// Read and decode Safety Status A
    ///
    /// # Errors
    ///
    /// Returns an error if communication with the device fails.
    pub async fn protection_status(&mut self) -> Result<ProtectionStatus, Error<I::Error>> {
        let bits = self.direct_command_u8(cmd::SAFETY_STATUS_A).await?;
        Ok(ProtectionStatus::from_bits(bits))
    }

    /// Read and decode Safety Status B
    ///
    /// # Errors
    ///
    /// Returns an error if communication with the device fails.
    pub async fn temperature_status(
        &mut self,
    ) -> Result<TemperatureProtectionStatus, Error<I::Error>> {
        let bits = self.direct_command_u8(cmd::SAFETY_STATUS_B).await?;
        Ok(TemperatureProtectionStatus::from_bits(bits))
    }

    /// Read and decode FET Status
    ///
    /// # Errors
    ///
    /// Returns an error if communication with the device fails.
    pub async fn fet_status(&mut self) -> Result<FetStatus, Error<I::Error>> {
        let bits = self.direct_command_u8(cmd::FET_STATUS).await?;
        Ok(FetStatus::from_bits(bits))
    }

    /// Check whether the CHG FET is on
    ///
    /// # Errors
    ///
    /// Returns an error if communication with the device fails.
    pub async fn is_charging(&mut self) -> Result<bool, Error<I::Error>> {
        Ok(self.fet_status().await?.chg_fet)
    }

    /// Check whether the DSG FET is on
    ///
    /// # Errors
    ///
    /// Returns an error if communication with the device fails.
    pub async fn is_discharging(&mut self) -> Result<bool, Error<I::Error>> {
        Ok(self.fet_status().await?.dsg_fet)
    }

    /// Read and decode Battery Status
    ///
    /// # Errors
    ///
    /// Returns an error if communication with the device fails.
    pub async fn battery_status(&mut self) -> Result<BatteryStatus, Error<I::Error>> {
        let bits = self.direct_command(cmd::BATTERY_STATUS).await?;
        Ok(BatteryStatus::from_bits(bits))
    }

    /// Read and decode the latched Alarm Status
    ///
    /// # Errors
    ///
    /// Returns an error if communication with the device fails.
    pub async fn alarm_status(&mut self) -> Result<AlarmStatus, Error<I::Error>> {
        let bits = self.direct_command(cmd::ALARM_STATUS).await?;
        Ok(AlarmStatus::from_bits(bits))
    }

    /// Force FETs off or allow them on
    ///
    /// # Errors
    ///
    /// Returns an error if communication with the device fails.
    pub async fn set_fet(&mut self, fet: Fet, state: FetState) -> Result<(), Error<I::Error>> {
        self.sub_command(fet_subcommand(fet, state)).await
    }

    /// Program the cell overvoltage threshold and delay
    ///
    /// Values outside the device's range are replaced with the defaults.
    /// The applied raw values are returned.
    ///
    /// # Errors
    ///
    /// Returns an error if communication with the device fails.
    pub async fn set_cell_overvoltage_protection<D>(
        &mut self,
        threshold_mv: u16,
        delay_ms: u16,
        delay: &mut D,
    ) -> Result<CellOvervoltageConfig, Error<I::Error>>
    where
        D: embedded_hal_async::delay::DelayNs,
    {
        let config = CellOvervoltageConfig::new(threshold_mv, delay_ms);

        #[cfg(feature = "defmt")]
        defmt::info!(
            "COV: {} mV / {} ms -> raw threshold {}, raw delay {}",
            threshold_mv,
            delay_ms,
            config.threshold,
            config.delay
        );

        self.write_data_memory(datamem::COV_THRESHOLD, config.threshold, delay)
            .await?;
        self.write_data_memory_u16(datamem::COV_DELAY, config.delay, delay)
            .await?;
        Ok(config)
    }
}
