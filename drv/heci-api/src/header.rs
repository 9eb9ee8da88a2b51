// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use bitfield::bitfield;
use static_assertions::const_assert_eq;

/// Size of a packet header on the wire; it occupies one ring slot.
pub const HEADER_SIZE: usize = 4;

/// Largest payload length the 9-bit length field can describe.
pub const MAX_PACKET_LEN: usize = 0x1ff;

/// Largest whole-word payload a single packet can carry.
pub const MAX_FRAGMENT_WORDS: usize = MAX_PACKET_LEN / 4;
pub const MAX_FRAGMENT_LEN: usize = MAX_FRAGMENT_WORDS * 4;

bitfield! {
    /// Packet header, the first slot of every packet in either ring.
    #[derive(Copy, Clone, PartialEq, Eq)]
    pub struct MessageHeader(u32);
    impl Debug;
    pub u8, me_address, set_me_address: 7, 0;
    pub u8, host_address, set_host_address: 15, 8;
    pub u16, length, set_length: 24, 16;
    pub message_complete, set_message_complete: 31;
}

const_assert_eq!(core::mem::size_of::<MessageHeader>(), HEADER_SIZE);

impl MessageHeader {
    /// Builds a header. `length` is truncated to the 9-bit field.
    pub fn new(me_address: u8, host_address: u8, length: u16, complete: bool) -> Self {
        let mut h = Self(0);
        h.set_me_address(me_address);
        h.set_host_address(host_address);
        h.set_length(length);
        h.set_message_complete(complete);
        h
    }

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(&self) -> u32 {
        self.0
    }

    /// Number of ring slots the payload occupies.
    pub fn len_words(&self) -> usize {
        usize::from(self.length()).div_ceil(4)
    }
}
