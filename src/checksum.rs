//! Data Memory write checksum
//!
//! Every Data Memory write is committed by writing a checksum and a length
//! byte to `0x60`/`0x61`. The checksum covers the bytes of the transaction as
//! they go out on the bus: the 8-bit device write address, the `0x3E`
//! selector, the target address (low, high) and the data.
//!
//! The accumulator is seeded with the first byte. Every following byte is
//! folded in as `!acc + byte`, and the emitted value is `!acc`.

/// Incremental checksum over a Data Memory transaction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Checksum {
    acc: Option<u8>,
}

impl Checksum {
    /// Empty accumulator
    pub const fn new() -> Self {
        Self { acc: None }
    }

    /// Fold one byte into the accumulator
    pub const fn push(self, byte: u8) -> Self {
        let acc = match self.acc {
            None => byte,
            Some(acc) => (!acc).wrapping_add(byte),
        };
        Self { acc: Some(acc) }
    }

    /// Fold a slice of bytes into the accumulator, in order
    pub fn extend(self, bytes: &[u8]) -> Self {
        bytes.iter().fold(self, |sum, &b| sum.push(b))
    }

    /// The checksum byte to write to `0x60`
    pub const fn finish(self) -> u8 {
        match self.acc {
            Some(acc) => !acc,
            None => 0xFF,
        }
    }
}

/// Checksum of `bytes` in one call
pub fn checksum(bytes: &[u8]) -> u8 {
    Checksum::new().extend(bytes).finish()
}
