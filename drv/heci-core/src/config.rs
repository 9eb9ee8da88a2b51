// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use serde::Deserialize;

use crate::PollBudget;

/// Per-endpoint tuning. Every field has a default, so a board's config
/// table only names what it changes.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HeciConfig {
    /// Length of one polling delay.
    pub poll_quantum_us: u32,
    /// Waiting for the ME to come ready during `initialize` and before
    /// each packet write.
    pub init_timeout_us: u32,
    /// The reset handshake, shared across its three waits.
    pub reset_timeout_us: u32,
    /// Waiting for room in the host ring.
    pub send_timeout_us: u32,
    /// Waiting for a packet, and for its payload, in the ME ring.
    pub read_timeout_us: u32,
    /// Receive attempts made by `send_with_ack` on behalf of MKHI requests.
    pub ack_retries: u16,
    /// MMIO base programmed into BAR0 when firmware left it unassigned.
    pub fallback_base: u64,
}

impl HeciConfig {
    pub const DEFAULT: Self = Self {
        poll_quantum_us: 1_000,
        init_timeout_us: 15_000_000,
        reset_timeout_us: 2_000_000,
        send_timeout_us: 5_000_000,
        read_timeout_us: 5_000_000,
        ack_retries: 3,
        fallback_base: 0xfed1_a000,
    };

    pub fn init_budget(&self) -> PollBudget {
        PollBudget::from_us(self.init_timeout_us, self.poll_quantum_us)
    }

    pub fn reset_budget(&self) -> PollBudget {
        PollBudget::from_us(self.reset_timeout_us, self.poll_quantum_us)
    }

    pub fn send_budget(&self) -> PollBudget {
        PollBudget::from_us(self.send_timeout_us, self.poll_quantum_us)
    }

    pub fn read_budget(&self) -> PollBudget {
        PollBudget::from_us(self.read_timeout_us, self.poll_quantum_us)
    }
}

impl Default for HeciConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}
