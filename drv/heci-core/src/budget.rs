// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/// A count of polling quanta a wait may still spend.
///
/// Timeouts are never measured against a clock: a wait checks its
/// condition, and if it is not met spends one quantum on a fixed delay.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PollBudget {
    remaining: u32,
}

impl PollBudget {
    pub const fn quanta(remaining: u32) -> Self {
        Self { remaining }
    }

    /// Converts a timeout to quanta, rounding to the nearest whole quantum.
    pub fn from_us(timeout_us: u32, quantum_us: u32) -> Self {
        let q = u64::from(quantum_us.max(1));
        let n = (u64::from(timeout_us) + q / 2) / q;
        Self {
            remaining: n as u32,
        }
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining == 0
    }

    /// Spends one quantum. Returns false, spending nothing, if none are left.
    pub fn take(&mut self) -> bool {
        match self.remaining.checked_sub(1) {
            Some(r) => {
                self.remaining = r;
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounding() {
        assert_eq!(PollBudget::from_us(5_000_000, 1_000).remaining(), 5_000);
        assert_eq!(PollBudget::from_us(1_499, 1_000).remaining(), 1);
        assert_eq!(PollBudget::from_us(1_500, 1_000).remaining(), 2);
        assert_eq!(PollBudget::from_us(499, 1_000).remaining(), 0);
        assert_eq!(PollBudget::from_us(u32::MAX, 1).remaining(), u32::MAX);
    }

    #[test]
    fn zero_quantum_is_one_microsecond() {
        assert_eq!(PollBudget::from_us(10, 0).remaining(), 10);
    }

    #[test]
    fn take_until_empty() {
        let mut b = PollBudget::quanta(2);
        assert!(b.take());
        assert!(b.take());
        assert!(b.is_exhausted());
        assert!(!b.take());
        assert_eq!(b.remaining(), 0);
    }
}
