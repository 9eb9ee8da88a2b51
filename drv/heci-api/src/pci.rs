// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! PCI layout of a HECI function.

use bitfield::bitfield;
use num_derive::FromPrimitive;

pub const INTEL_VENDOR_ID: u16 = 0x8086;
pub const HECI_BUS: u8 = 0;
pub const HECI_DEVICE: u8 = 22;

pub const PCI_VENDOR_ID: u16 = 0x00;
pub const PCI_COMMAND: u16 = 0x04;
pub const PCI_BAR0: u16 = 0x10;
pub const PCI_BAR0_HIGH: u16 = 0x14;
/// Host firmware status register 1.
pub const PCI_HFSTS1: u16 = 0x40;

pub const COMMAND_MEMORY_SPACE: u32 = 1 << 1;
pub const COMMAND_BUS_MASTER: u32 = 1 << 2;

pub const BAR_ADDRESS_MASK: u32 = 0xffff_fff0;
pub const BAR_TYPE_64: u32 = 0b10 << 1;

/// The four HECI functions of device 22.
#[derive(Copy, Clone, Debug, PartialEq, Eq, FromPrimitive)]
pub enum HeciFunction {
    Heci1 = 0,
    Heci2 = 1,
    Heci3 = 4,
    Heci4 = 5,
}

impl HeciFunction {
    pub const ALL: [HeciFunction; 4] = [
        HeciFunction::Heci1,
        HeciFunction::Heci2,
        HeciFunction::Heci3,
        HeciFunction::Heci4,
    ];

    pub const fn number(self) -> u8 {
        self as u8
    }
}

/// Values of [`FirmwareStatus::current_state`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, FromPrimitive)]
pub enum CurrentState {
    Reset = 0,
    Initializing = 1,
    Recovery = 2,
    Test = 3,
    Disabled = 4,
    Normal = 5,
    DisableWait = 6,
    Transition = 7,
    InvalidCpu = 8,
}

/// Values of [`FirmwareStatus::error_code`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, FromPrimitive)]
pub enum ErrorCode {
    NoError = 0,
    Uncategorized = 1,
    Disabled = 2,
    ImageFailure = 3,
}

bitfield! {
    /// HFSTS1, the ME's view of its own health.
    #[derive(Copy, Clone, PartialEq, Eq)]
    pub struct FirmwareStatus(u32);
    impl Debug;
    pub u8, current_state_raw, _: 3, 0;
    pub manufacturing_mode, _: 4;
    pub fpt_bad, _: 5;
    pub u8, operation_state, _: 8, 6;
    pub init_complete, _: 9;
    pub u8, error_code_raw, _: 15, 12;
    pub u8, operation_mode, _: 19, 16;
}

impl FirmwareStatus {
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(&self) -> u32 {
        self.0
    }

    pub fn current_state(&self) -> Option<CurrentState> {
        num_traits::FromPrimitive::from_u8(self.current_state_raw())
    }

    pub fn error_code(&self) -> Option<ErrorCode> {
        num_traits::FromPrimitive::from_u8(self.error_code_raw())
    }

    /// The ME accepts HECI traffic only while it reports no error.
    pub fn has_error(&self) -> bool {
        self.error_code_raw() != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn function_numbers() {
        let numbers: Vec<u8> =
            HeciFunction::ALL.iter().map(|f| f.number()).collect();
        assert_eq!(numbers, [0, 1, 4, 5]);
        assert_eq!(
            <HeciFunction as num_traits::FromPrimitive>::from_u8(4),
            Some(HeciFunction::Heci3)
        );
        assert_eq!(
            <HeciFunction as num_traits::FromPrimitive>::from_u8(2),
            None
        );
    }

    #[test]
    fn firmware_status() {
        let fs = FirmwareStatus::from_bits(0x0000_0205);
        assert_eq!(fs.current_state(), Some(CurrentState::Normal));
        assert!(fs.init_complete());
        assert!(!fs.has_error());
        assert_eq!(fs.error_code(), Some(ErrorCode::NoError));

        let fs = FirmwareStatus::from_bits(0x0000_3002);
        assert_eq!(fs.current_state(), Some(CurrentState::Recovery));
        assert!(fs.has_error());
        assert_eq!(fs.error_code(), Some(ErrorCode::ImageFailure));

        let fs = FirmwareStatus::from_bits(0x0000_f00f);
        assert_eq!(fs.current_state(), None);
        assert_eq!(fs.error_code(), None);
    }
}
