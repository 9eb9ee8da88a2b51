// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/// One direction's circular buffer, with the free-running 8-bit pointers
/// the hardware exposes.
///
/// Slots are indexed by the raw pointer value, so the ring behaves the
/// same whatever its depth, and pointer wraparound at 256 is exercised.
#[derive(Clone, Debug)]
pub struct WordRing {
    depth: u8,
    read: u8,
    write: u8,
    slots: [u32; 256],
}

impl WordRing {
    pub fn new(depth: u8) -> Self {
        Self {
            depth,
            read: 0,
            write: 0,
            slots: [0; 256],
        }
    }

    pub fn depth(&self) -> u8 {
        self.depth
    }

    pub fn read_pointer(&self) -> u8 {
        self.read
    }

    pub fn write_pointer(&self) -> u8 {
        self.write
    }

    pub fn filled(&self) -> usize {
        usize::from(self.write.wrapping_sub(self.read))
    }

    pub fn free(&self) -> usize {
        usize::from(self.depth).saturating_sub(self.filled())
    }

    pub fn push(&mut self, word: u32) -> bool {
        if self.free() == 0 {
            return false;
        }
        self.slots[usize::from(self.write)] = word;
        self.write = self.write.wrapping_add(1);
        true
    }

    pub fn pop(&mut self) -> Option<u32> {
        if self.filled() == 0 {
            return None;
        }
        let word = self.slots[usize::from(self.read)];
        self.read = self.read.wrapping_add(1);
        Some(word)
    }

    pub fn peek(&self, n: usize) -> Option<u32> {
        if n >= self.filled() {
            return None;
        }
        Some(self.slots[usize::from(self.read.wrapping_add(n as u8))])
    }

    /// Empties the ring with both pointers at `origin`.
    pub fn reset_to(&mut self, origin: u8) {
        self.read = origin;
        self.write = origin;
    }

    /// Overwrites the pointers without touching the contents.
    pub fn set_pointers(&mut self, read: u8, write: u8) {
        self.read = read;
        self.write = write;
    }
}
