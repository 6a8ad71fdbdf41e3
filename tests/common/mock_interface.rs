//! Mock interface implementation for testing the BQ76952 driver
//!
//! Besides logging every transaction, the mock models the subcommand window
//! closely enough to check Data Memory writes: writes to `0x3E` select an
//! address (and stage a value), a write to `0x60` commits the staged value if
//! its checksum and length are right, and `SET_CFGUPDATE`/`EXIT_CFGUPDATE`
//! toggle a config-update flag.

#[cfg(feature = "async")]
use device_driver::AsyncRegisterInterface;
use device_driver::RegisterInterface;
use bq76952::checksum;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

const SUBCMD_LOW: u8 = 0x3E;
const RESP_START: u8 = 0x40;
const RESP_CHECKSUM: u8 = 0x60;
const SET_CFGUPDATE: u16 = 0x0090;
const EXIT_CFGUPDATE: u16 = 0x0092;
const WRITE_ADDRESS: u8 = 0x10;

/// Records operations performed on the mock interface
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    /// Command byte written, then `len` bytes read back
    Read {
        /// Command (register) address
        address: u8,
        /// Number of bytes read
        len: usize,
    },
    /// Command byte followed by `data` in one write
    Write {
        /// Command (register) address
        address: u8,
        /// Bytes written after the command
        data: Vec<u8>,
    },
}

/// Shared state for mock interface (uses interior mutability)
#[derive(Debug, Default)]
struct MockState {
    /// Direct Command results, keyed by opcode
    direct: HashMap<u8, u16>,

    /// Simulated Data Memory contents
    data_memory: HashMap<u16, Vec<u8>>,

    /// Address selected by the last write to 0x3E
    selected: Option<u16>,

    /// Bytes staged after the address by the last write to 0x3E
    staged: Vec<u8>,

    /// Whether the device is in CONFIG_UPDATE mode
    config_update: bool,

    /// Commits rejected because of a bad checksum or length
    rejected_commits: usize,

    /// Operations log for verification
    operations: Vec<Operation>,

    /// Failure injection flags
    fail_next_read: bool,
    fail_next_write: bool,
    fail_write_to: Option<u8>,
    fail_write_after: Option<usize>,
    disconnected: bool,
}

impl MockState {
    fn handle_write(&mut self, address: u8, data: &[u8]) {
        match (address, data) {
            (SUBCMD_LOW, [lo, hi, value @ ..]) => {
                let code = u16::from_le_bytes([*lo, *hi]);
                match code {
                    SET_CFGUPDATE if value.is_empty() => self.config_update = true,
                    EXIT_CFGUPDATE if value.is_empty() => self.config_update = false,
                    _ => {}
                }
                self.selected = Some(code);
                self.staged = value.to_vec();
            }
            (RESP_CHECKSUM, [sum, len]) => self.commit(*sum, *len),
            _ => {}
        }
    }

    fn commit(&mut self, sum: u8, len: u8) {
        let Some(selected) = self.selected else {
            self.rejected_commits += 1;
            return;
        };

        let [lo, hi] = selected.to_le_bytes();
        let mut framed = vec![WRITE_ADDRESS, SUBCMD_LOW, lo, hi];
        framed.extend_from_slice(&self.staged);

        let valid = self.config_update
            && sum == checksum(&framed)
            && usize::from(len) == 4 + self.staged.len();
        if valid {
            self.data_memory.insert(selected, self.staged.clone());
        } else {
            self.rejected_commits += 1;
        }
    }

    fn handle_read(&self, address: u8, read_data: &mut [u8]) {
        if address == RESP_START {
            if let Some(value) = self.selected.and_then(|a| self.data_memory.get(&a)) {
                for (byte, stored) in read_data.iter_mut().zip(value.iter()) {
                    *byte = *stored;
                }
                return;
            }
        }

        let bytes = self
            .direct
            .get(&address)
            .copied()
            .unwrap_or(0)
            .to_le_bytes();
        for (byte, value) in read_data.iter_mut().zip(bytes.iter()) {
            *byte = *value;
        }
    }
}

/// Mock interface for testing
#[derive(Clone, Default)]
pub struct MockInterface {
    state: Rc<RefCell<MockState>>,
}

impl MockInterface {
    /// Create a new mock interface; every register reads as zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the value returned by a Direct Command
    pub fn set_direct(&self, command: u8, value: u16) {
        self.state.borrow_mut().direct.insert(command, value);
    }

    /// Set cell voltages (millivolts) for cells 1..=values.len()
    #[allow(dead_code)]
    pub fn set_cell_voltages(&self, values: &[u16]) {
        for (i, &mv) in values.iter().enumerate() {
            self.set_direct(0x14 + 2 * i as u8, mv);
        }
    }

    /// Preload a Data Memory location
    #[allow(dead_code)]
    pub fn set_data_memory(&self, address: u16, value: &[u8]) {
        self.state
            .borrow_mut()
            .data_memory
            .insert(address, value.to_vec());
    }

    /// Contents of a Data Memory location, if it was ever committed
    #[allow(dead_code)]
    pub fn data_memory(&self, address: u16) -> Option<Vec<u8>> {
        self.state.borrow().data_memory.get(&address).cloned()
    }

    /// Whether the simulated device is in CONFIG_UPDATE mode
    #[allow(dead_code)]
    pub fn in_config_update(&self) -> bool {
        self.state.borrow().config_update
    }

    /// Number of commits the simulated device refused
    #[allow(dead_code)]
    pub fn rejected_commits(&self) -> usize {
        self.state.borrow().rejected_commits
    }

    /// Make the next read fail
    #[allow(dead_code)]
    pub fn fail_next_read(&self) {
        self.state.borrow_mut().fail_next_read = true;
    }

    /// Make the next write fail
    #[allow(dead_code)]
    pub fn fail_next_write(&self) {
        self.state.borrow_mut().fail_next_write = true;
    }

    /// Make the next write to `address` fail
    #[allow(dead_code)]
    pub fn fail_write_to(&self, address: u8) {
        self.state.borrow_mut().fail_write_to = Some(address);
    }

    /// Let `count` writes succeed, then fail the next one
    #[allow(dead_code)]
    pub fn fail_write_after(&self, count: usize) {
        self.state.borrow_mut().fail_write_after = Some(count);
    }

    /// Make every transaction fail until reconnected
    #[allow(dead_code)]
    pub fn set_disconnected(&self, disconnected: bool) {
        self.state.borrow_mut().disconnected = disconnected;
    }

    /// Get all recorded operations
    pub fn operations(&self) -> Vec<Operation> {
        self.state.borrow().operations.clone()
    }

    /// Clear the operations log
    #[allow(dead_code)]
    pub fn clear_operations(&self) {
        self.state.borrow_mut().operations.clear();
    }

    /// Subcommand codes written so far, in order
    #[allow(dead_code)]
    pub fn subcommands(&self) -> Vec<u16> {
        self.operations()
            .iter()
            .filter_map(|op| match op {
                Operation::Write { address, data }
                    if *address == SUBCMD_LOW && data.len() == 2 =>
                {
                    Some(u16::from_le_bytes([data[0], data[1]]))
                }
                _ => None,
            })
            .collect()
    }
}

/// Mock error type
#[derive(Debug, Clone, PartialEq)]
pub enum MockError {
    /// Simulated communication error
    Communication,
    /// Simulated missing device (NACK)
    NoAcknowledge,
}

impl RegisterInterface for MockInterface {
    type Error = MockError;
    type AddressType = u8;

    fn read_register(
        &mut self,
        address: Self::AddressType,
        _size_bits: u32,
        read_data: &mut [u8],
    ) -> Result<(), Self::Error> {
        let mut state = self.state.borrow_mut();

        if state.disconnected {
            return Err(MockError::NoAcknowledge);
        }

        // Check for injected failure
        if state.fail_next_read {
            state.fail_next_read = false;
            return Err(MockError::Communication);
        }

        state.handle_read(address, read_data);
        state.operations.push(Operation::Read {
            address,
            len: read_data.len(),
        });
        Ok(())
    }

    fn write_register(
        &mut self,
        address: Self::AddressType,
        _size_bits: u32,
        write_data: &[u8],
    ) -> Result<(), Self::Error> {
        let mut state = self.state.borrow_mut();

        if state.disconnected {
            return Err(MockError::NoAcknowledge);
        }

        // Check for injected failure
        if state.fail_next_write {
            state.fail_next_write = false;
            return Err(MockError::Communication);
        }
        if state.fail_write_to == Some(address) {
            state.fail_write_to = None;
            return Err(MockError::Communication);
        }
        match state.fail_write_after {
            Some(0) => {
                state.fail_write_after = None;
                return Err(MockError::Communication);
            }
            Some(remaining) => state.fail_write_after = Some(remaining - 1),
            None => {}
        }

        state.handle_write(address, write_data);
        state.operations.push(Operation::Write {
            address,
            data: write_data.to_vec(),
        });
        Ok(())
    }
}

#[cfg(feature = "async")]
impl AsyncRegisterInterface for MockInterface {
    type Error = MockError;
    type AddressType = u8;

    async fn read_register(
        &mut self,
        address: Self::AddressType,
        size_bits: u32,
        read_data: &mut [u8],
    ) -> Result<(), Self::Error> {
        // Delegate to synchronous implementation
        RegisterInterface::read_register(self, address, size_bits, read_data)
    }

    async fn write_register(
        &mut self,
        address: Self::AddressType,
        size_bits: u32,
        write_data: &[u8],
    ) -> Result<(), Self::Error> {
        // Delegate to synchronous implementation
        RegisterInterface::write_register(self, address, size_bits, write_data)
    }
}
