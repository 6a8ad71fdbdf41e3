//! Bus interface for the BQ76952
//!
//! The driver talks to the chip through the `device-driver` register traits.
//! Every protocol the BQ76952 speaks reduces to two bus shapes:
//!
//! - `read_register(cmd, bits, buf)`: write the command byte, then read
//!   `buf.len()` bytes. Direct Commands and response-window reads.
//! - `write_register(cmd, bits, data)`: one write of the command byte
//!   followed by `data`. Subcommands, Data Memory staging and commit.
//!
//! # Timeouts
//!
//! Neither the driver nor this adapter waits on the bus. The underlying I2C
//! implementation must give up and return an error (NACK, arbitration loss,
//! clock-stretch timeout) instead of blocking forever; that error surfaces as
//! [`Error::Bus`](crate::Error::Bus). Async callers can also cancel by
//! dropping the future.

use crate::I2C_ADDRESS_DEFAULT;

use device_driver::RegisterInterface;

/// Largest payload written after the command byte
const MAX_WRITE_LEN: usize = 32;

/// I2C interface for the BQ76952
pub struct I2cInterface<I2C> {
    i2c: I2C,
    address: u8,
}

impl<I2C> I2cInterface<I2C> {
    /// Create a new I2C interface with the default address (`0x08`)
    ///
    /// # Example
    /// ```ignore
    /// let interface = I2cInterface::default(i2c);
    /// let mut bms = Bq76952::new(interface, DriverConfig::default());
    /// ```
    pub const fn default(i2c: I2C) -> Self {
        Self {
            i2c,
            address: I2C_ADDRESS_DEFAULT,
        }
    }

    /// Create a new I2C interface with a custom 7-bit device address
    ///
    /// The address is reprogrammable through Data Memory. Remember to set
    /// [`DriverConfig::address`](crate::DriverConfig) to the same value, as it
    /// seeds the Data Memory checksum.
    pub const fn new(i2c: I2C, address: u8) -> Self {
        Self { i2c, address }
    }

    /// 7-bit device address used on the bus
    pub const fn address(&self) -> u8 {
        self.address
    }

    /// Consume the interface and return the I2C peripheral
    pub fn release(self) -> I2C {
        self.i2c
    }
}

/// Copy `command` and `data` into one contiguous write buffer
fn frame(command: u8, data: &[u8], buffer: &mut [u8; MAX_WRITE_LEN + 1]) -> usize {
    buffer[0] = command;
    let len = data.len().min(MAX_WRITE_LEN);
    buffer[1..=len].copy_from_slice(&data[..len]);
    len + 1
}

impl<I2C, E> RegisterInterface for I2cInterface<I2C>
where
    I2C: embedded_hal::i2c::I2c<Error = E>,
{
    type Error = E;
    type AddressType = u8;

    fn read_register(
        &mut self,
        address: Self::AddressType,
        size_bits: u32,
        read_data: &mut [u8],
    ) -> Result<(), Self::Error> {
        let _ = size_bits; // Size is implicit in read_data.len() for I2C
        self.i2c.write_read(self.address, &[address], read_data)
    }

    fn write_register(
        &mut self,
        address: Self::AddressType,
        size_bits: u32,
        write_data: &[u8],
    ) -> Result<(), Self::Error> {
        let _ = size_bits;
        let mut buffer = [0u8; MAX_WRITE_LEN + 1];
        let len = frame(address, write_data, &mut buffer);
        self.i2c.write(self.address, &buffer[..len])
    }
}

#[cfg(feature = "async")]
impl<I2C, E> device_driver::AsyncRegisterInterface for I2cInterface<I2C>
where
    I2C: embedded_hal_async::i2c::I2c<Error = E>,
{
    type Error = E;
    type AddressType = u8;

    async fn read_register(
        &mut self,
        address: Self::AddressType,
        size_bits: u32,
        read_data: &mut [u8],
    ) -> Result<(), Self::Error> {
        let _ = size_bits;
        self.i2c
            .write_read(self.address, &[address], read_data)
            .await
    }

    async fn write_register(
        &mut self,
        address: Self::AddressType,
        size_bits: u32,
        write_data: &[u8],
    ) -> Result<(), Self::Error> {
        let _ = size_bits;
        let mut buffer = [0u8; MAX_WRITE_LEN + 1];
        let len = frame(address, write_data, &mut buffer);
        self.i2c.write(self.address, &buffer[..len]).await
    }
}
