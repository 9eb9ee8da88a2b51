// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Occupancy arithmetic for the 8-bit ring pointers in a control register.

/// Number of occupied slots between `read` and `write`.
///
/// Both pointers are free-running 8-bit counters, so the difference is taken
/// modulo 256.
pub fn filled_slots(read: u8, write: u8) -> u8 {
    (write as i8).wrapping_sub(read as i8) as u8
}

/// Does the ring claim more occupied slots than it has?
pub fn overflow(read: u8, write: u8, depth: u8) -> bool {
    filled_slots(read, write) > depth
}

/// Free slots left in a ring, zero if the pointers are inconsistent.
pub fn free_slots(read: u8, write: u8, depth: u8) -> u8 {
    depth.saturating_sub(filled_slots(read, write))
}
