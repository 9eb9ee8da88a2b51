// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use drv_heci_api::{HeciError, Platform};

use crate::endpoint::HeciEndpoint;
use crate::trace::{ringbuf_entry, Trace};
use crate::PollBudget;

impl<P: Platform> HeciEndpoint<P> {
    /// Waits for the ME to raise Ready, resetting the interface whenever it
    /// asks for a reset.
    ///
    /// A reset request is honoured even with the budget spent. The reset
    /// then costs a quantum like a delay does, so an ME that keeps asking
    /// for resets still runs the budget out.
    pub fn wait_for_remote_ready(
        &mut self,
        budget: &mut PollBudget,
    ) -> Result<(), HeciError> {
        loop {
            let me = self.me_csr()?;
            if me.ready() {
                return Ok(());
            }
            if me.reset() {
                ringbuf_entry!(self.trace, Trace::RemoteReset);
                self.reset_interface()?;
                if budget.take() || self.me_csr()?.ready() {
                    continue;
                }
            } else if budget.take() {
                self.delay_quantum();
                continue;
            }
            return Err(self.fail(Trace::RemoteReadyTimeout, HeciError::Timeout));
        }
    }

    /// True if either side has dropped Ready, or the registers cannot be
    /// reached at all.
    pub fn is_in_reset_state(&mut self) -> bool {
        match (self.host_csr(), self.me_csr()) {
            (Ok(host), Ok(me)) => !host.ready() || !me.ready(),
            _ => true,
        }
    }

    /// True if the ME is asking for a reset or either side has dropped
    /// Ready; checked before each message is moved.
    pub fn check_for_reset(&mut self) -> bool {
        match (self.host_csr(), self.me_csr()) {
            (Ok(host), Ok(me)) => me.reset() || !me.ready() || !host.ready(),
            _ => true,
        }
    }
}
