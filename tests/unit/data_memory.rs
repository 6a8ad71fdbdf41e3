//! Unit tests for Data Memory access and config-update bracketing

use crate::common::{MockDelay, Operation, create_mock_driver};
use bq76952::Error;
use bq76952::device::{CONFIG_UPDATE_ENTER_DELAY_US, CONFIG_UPDATE_EXIT_DELAY_US};

fn write(address: u8, data: &[u8]) -> Operation {
    Operation::Write {
        address,
        data: data.to_vec(),
    }
}

#[test]
fn test_write_data_memory_exact_sequence() {
    let (mut driver, interface) = create_mock_driver();
    let mut delay = MockDelay::default();

    driver.write_data_memory(0x9278, 0x54, &mut delay).unwrap();

    assert_eq!(
        interface.operations(),
        vec![
            write(0x3E, &[0x90, 0x00]),
            write(0x3E, &[0x78, 0x92, 0x54]),
            write(0x60, &[0xF3, 0x05]),
            write(0x3E, &[0x92, 0x00]),
        ]
    );
    assert_eq!(
        delay.waits_us,
        vec![CONFIG_UPDATE_ENTER_DELAY_US, CONFIG_UPDATE_EXIT_DELAY_US]
    );
}

#[test]
fn test_write_data_memory_is_accepted_by_device() {
    let (mut driver, interface) = create_mock_driver();

    driver
        .write_data_memory(0x9278, 0x56, &mut MockDelay::default())
        .unwrap();

    assert_eq!(interface.data_memory(0x9278), Some(vec![0x56]));
    assert_eq!(interface.rejected_commits(), 0);
    assert!(!interface.in_config_update());
}

#[test]
fn test_write_data_memory_u16_length_and_checksum() {
    let (mut driver, interface) = create_mock_driver();

    driver
        .write_data_memory_u16(0x9279, 301, &mut MockDelay::default())
        .unwrap();

    let ops = interface.operations();
    assert_eq!(ops[1], write(0x3E, &[0x79, 0x92, 0x2D, 0x01]));
    assert_eq!(ops[2], write(0x60, &[0xE5, 0x06]));
    assert_eq!(interface.data_memory(0x9279), Some(vec![0x2D, 0x01]));
}

#[test]
fn test_no_reads_during_write() {
    let (mut driver, interface) = create_mock_driver();

    driver
        .write_data_memory(0x9278, 0x54, &mut MockDelay::default())
        .unwrap();

    assert!(
        interface
            .operations()
            .iter()
            .all(|op| matches!(op, Operation::Write { .. }))
    );
}

#[test]
fn test_exit_attempted_when_commit_fails() {
    let (mut driver, interface) = create_mock_driver();

    interface.fail_write_to(0x60);
    let result = driver.write_data_memory(0x9278, 0x54, &mut MockDelay::default());

    assert!(matches!(result, Err(Error::Bus(_))));
    assert_eq!(interface.subcommands(), vec![0x0090, 0x0092]);
    assert!(!interface.in_config_update());
    assert_eq!(interface.data_memory(0x9278), None);
}

#[test]
fn test_exit_attempted_when_enter_fails() {
    let (mut driver, interface) = create_mock_driver();

    interface.fail_next_write();
    let result = driver.write_data_memory(0x9278, 0x54, &mut MockDelay::default());

    assert!(result.is_err());
    // Only the EXIT made it onto the bus
    assert_eq!(interface.operations(), vec![write(0x3E, &[0x92, 0x00])]);
}

#[test]
fn test_disconnected_write_reports_bus_error() {
    let (mut driver, interface) = create_mock_driver();

    interface.set_disconnected(true);
    let result = driver.write_data_memory(0x9278, 0x54, &mut MockDelay::default());

    assert!(matches!(
        result,
        Err(Error::Bus(crate::common::mock_interface::MockError::NoAcknowledge))
    ));
    assert!(interface.operations().is_empty());
}

#[test]
fn test_exit_failure_reported_after_successful_commit() {
    let (mut driver, interface) = create_mock_driver();

    // Four writes: ENTER, stage, commit, EXIT. Let three through.
    interface.fail_write_after(3);
    let result = driver.write_data_memory(0x9278, 0x50, &mut MockDelay::default());

    assert!(result.is_err());
    // The value landed, but the device is still in config-update mode
    assert_eq!(interface.data_memory(0x9278), Some(vec![0x50]));
    assert!(interface.in_config_update());

    // A later write brackets correctly and leaves config-update mode
    driver
        .write_data_memory(0x9278, 0x51, &mut MockDelay::default())
        .unwrap();
    assert!(!interface.in_config_update());
    assert_eq!(interface.data_memory(0x9278), Some(vec![0x51]));
}

#[test]
fn test_read_data_memory() {
    let (mut driver, interface) = create_mock_driver();
    interface.set_data_memory(0x9278, &[0x56]);

    let value = driver.read_data_memory(0x9278).unwrap();

    assert_eq!(value, 0x56);
    assert_eq!(
        interface.operations(),
        vec![
            write(0x3E, &[0x78, 0x92]),
            Operation::Read {
                address: 0x40,
                len: 1
            },
        ]
    );
    // Reads never enter config-update mode
    assert!(interface.subcommands().iter().all(|&c| c != 0x0090));
}

#[test]
fn test_write_then_read_back() {
    let (mut driver, _interface) = create_mock_driver();

    driver
        .write_data_memory(0x9278, 0x58, &mut MockDelay::default())
        .unwrap();

    assert_eq!(driver.read_data_memory(0x9278).unwrap(), 0x58);
}

#[test]
fn test_custom_address_seeds_checksum() {
    use bq76952::{Bq76952, DriverConfig, checksum};

    let interface = crate::common::mock_interface::MockInterface::new();
    let probe = interface.clone();
    let mut driver = Bq76952::new(
        interface,
        DriverConfig {
            address: 0x09,
            debug: false,
        },
    );

    driver
        .write_data_memory(0x9278, 0x54, &mut MockDelay::default())
        .unwrap();

    let expected = checksum(&[0x12, 0x3E, 0x78, 0x92, 0x54]);
    assert_eq!(probe.operations()[2], write(0x60, &[expected, 0x05]));
    // The mock models a device at the default address, so it refuses this commit
    assert_eq!(probe.rejected_commits(), 1);
}
