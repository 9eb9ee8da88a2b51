// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! MKHI, the request/response framing spoken by the ME's core client.
//!
//! Every MKHI message starts with a 32-bit [`MkhiHeader`] naming a command
//! group and a command within it; the body that follows is command-specific.
//! The ME echoes the group and command in its reply, sets `is_response`, and
//! reports a status in `result`.

use bitfield::bitfield;
use num_derive::FromPrimitive;
use zerocopy::byteorder::{LittleEndian, U16, U32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

pub const GEN_GROUP_ID: u8 = 0xff;
pub const GEN_GET_FW_VERSION: u8 = 0x02;
pub const GEN_END_OF_POST: u8 = 0x0c;

pub const MKHI_HEADER_SIZE: usize = 4;

bitfield! {
    #[derive(Copy, Clone, PartialEq, Eq)]
    pub struct MkhiHeader(u32);
    impl Debug;
    pub u8, group_id, set_group_id: 7, 0;
    pub u8, command, set_command: 14, 8;
    pub is_response, set_is_response: 15;
    pub u8, result, set_result: 31, 24;
}

impl MkhiHeader {
    pub fn request(group_id: u8, command: u8) -> Self {
        let mut h = Self(0);
        h.set_group_id(group_id);
        h.set_command(command);
        h
    }

    pub fn response(group_id: u8, command: u8, result: u8) -> Self {
        let mut h = Self::request(group_id, command);
        h.set_is_response(true);
        h.set_result(result);
        h
    }

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(&self) -> u32 {
        self.0
    }

    /// Decodes the header at the front of a message.
    pub fn parse(message: &[u8]) -> Option<Self> {
        match message {
            [a, b, c, d, ..] => Some(Self(u32::from_le_bytes([*a, *b, *c, *d]))),
            _ => None,
        }
    }

    /// Does `self` answer a request carrying `request`'s group and command?
    pub fn answers(&self, request: MkhiHeader) -> bool {
        self.is_response()
            && self.group_id() == request.group_id()
            && self.command() == request.command()
    }
}

/// Body of a request that carries nothing past the header.
#[derive(Copy, Clone, Debug, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C)]
pub struct NoBody;

#[derive(
    Copy, Clone, Debug, Default, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout,
)]
#[repr(C)]
pub struct FwVersion {
    pub minor: U16<LittleEndian>,
    pub major: U16<LittleEndian>,
    pub build: U16<LittleEndian>,
    pub hotfix: U16<LittleEndian>,
}

impl FwVersion {
    pub fn new(major: u16, minor: u16, hotfix: u16, build: u16) -> Self {
        Self {
            minor: minor.into(),
            major: major.into(),
            build: build.into(),
            hotfix: hotfix.into(),
        }
    }
}

/// Body of the GET_FW_VERSION acknowledgement.
#[derive(
    Copy, Clone, Debug, Default, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout,
)]
#[repr(C)]
pub struct FwVersionResponse {
    pub code: FwVersion,
    pub recovery: FwVersion,
    pub fitc: FwVersion,
}

/// Body of the END_OF_POST acknowledgement.
#[derive(
    Copy, Clone, Debug, Default, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout,
)]
#[repr(C)]
pub struct EndOfPostResponse {
    pub requested_action: U32<LittleEndian>,
}

/// What the ME asks the host to do after END_OF_POST.
#[derive(Copy, Clone, Debug, PartialEq, Eq, FromPrimitive)]
pub enum EndOfPostAction {
    Continue = 0,
    GlobalReset = 1,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_layout() {
        let h = MkhiHeader::request(GEN_GROUP_ID, GEN_GET_FW_VERSION);
        assert_eq!(h.bits(), 0x0000_02ff);

        let r = MkhiHeader::response(GEN_GROUP_ID, GEN_GET_FW_VERSION, 0);
        assert_eq!(r.bits(), 0x0000_82ff);
        assert!(r.answers(h));
        assert!(!h.answers(h));

        let r = MkhiHeader::from_bits(0x8b00_8cff);
        assert_eq!(r.command(), GEN_END_OF_POST);
        assert_eq!(r.result(), 0x8b);
        assert!(!r.answers(h));
    }

    #[test]
    fn parse_needs_four_bytes() {
        assert_eq!(MkhiHeader::parse(&[0xff, 0x82]), None);
        assert_eq!(
            MkhiHeader::parse(&[0xff, 0x82, 0x00, 0x00, 0xaa]),
            Some(MkhiHeader::from_bits(0x82ff))
        );
    }

    #[test]
    fn fw_version_wire_order() {
        let v = FwVersion::new(16, 1, 2, 1234);
        assert_eq!(v.as_bytes(), [1, 0, 16, 0, 0xd2, 0x04, 2, 0]);
        assert_eq!(core::mem::size_of::<FwVersionResponse>(), 24);
        assert_eq!(core::mem::size_of::<NoBody>(), 0);
    }
}
