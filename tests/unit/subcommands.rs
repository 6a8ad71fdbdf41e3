//! Unit tests for subcommands and FET control

use crate::common::{Operation, create_mock_driver};
use bq76952::{Fet, FetState};

#[test]
fn test_sub_command_bytes_little_endian() {
    let (mut driver, interface) = create_mock_driver();

    driver.sub_command(0x0093).unwrap();

    assert_eq!(
        interface.operations(),
        vec![Operation::Write {
            address: 0x3E,
            data: vec![0x93, 0x00],
        }]
    );
}

#[test]
fn test_sub_command_does_not_read() {
    let (mut driver, interface) = create_mock_driver();

    driver.sub_command(0x1234).unwrap();

    assert_eq!(interface.operations().len(), 1);
    assert_eq!(interface.subcommands(), vec![0x1234]);
}

#[test]
fn test_reset() {
    let (mut driver, interface) = create_mock_driver();

    driver.reset().unwrap();

    assert_eq!(interface.subcommands(), vec![0x0012]);
}

#[test]
fn test_set_fet_mapping() {
    let cases = [
        (Fet::Discharge, FetState::Off, 0x0093),
        (Fet::Charge, FetState::Off, 0x0094),
        (Fet::All, FetState::Off, 0x0095),
        (Fet::Charge, FetState::On, 0x0096),
        (Fet::Discharge, FetState::On, 0x0096),
        (Fet::All, FetState::On, 0x0096),
    ];

    for (fet, state, expected) in cases {
        let (mut driver, interface) = create_mock_driver();
        driver.set_fet(fet, state).unwrap();
        assert_eq!(
            interface.subcommands(),
            vec![expected],
            "{fet:?} {state:?}"
        );
    }
}

#[test]
fn test_sub_command_response_u16() {
    let (mut driver, interface) = create_mock_driver();
    interface.set_direct(0x40, 0x7695);

    driver.sub_command(0x0002).unwrap();
    let value = driver.sub_command_response_u16().unwrap();

    assert_eq!(value, 0x7695);
    assert_eq!(
        interface.operations()[1],
        Operation::Read {
            address: 0x40,
            len: 2
        }
    );
}
