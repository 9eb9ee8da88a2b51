// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Bringing the interface up, and resetting it when either side loses
//! track of the rings.

use drv_heci_api::pci::{
    FirmwareStatus, BAR_ADDRESS_MASK, BAR_TYPE_64, COMMAND_BUS_MASTER,
    COMMAND_MEMORY_SPACE, PCI_BAR0, PCI_BAR0_HIGH, PCI_COMMAND, PCI_HFSTS1,
    PCI_VENDOR_ID,
};
use drv_heci_api::{HeciError, Platform};

use crate::endpoint::{HeciEndpoint, LifecycleState};
use crate::trace::{ringbuf_entry, ResetStep, Trace};
use crate::PollBudget;

impl<P: Platform> HeciEndpoint<P> {
    /// Brings the interface up: checks the function is present and healthy,
    /// maps its registers, waits for the ME, and raises host Ready.
    pub fn initialize(&mut self) -> Result<(), HeciError> {
        self.ensure_base()?;

        let fwsts = FirmwareStatus::from_bits(self.config_read(PCI_HFSTS1));
        if fwsts.has_error() {
            return Err(self.fail(
                Trace::FirmwareError(fwsts.error_code_raw()),
                HeciError::Unsupported,
            ));
        }

        self.state = LifecycleState::WaitingForRemoteReady;
        let mut budget = self.config().init_budget();
        self.wait_for_remote_ready(&mut budget)?;

        let mut csr = self.host_csr()?;
        if !csr.ready() {
            csr.set_reset(false);
            csr.set_ready(true);
            csr.set_interrupt_generate(true);
            self.write_host_csr(csr)?;
            ringbuf_entry!(self.trace, Trace::HostReadySet);
        }

        self.state = LifecycleState::Ready;
        ringbuf_entry!(self.trace, Trace::Initialized);
        Ok(())
    }

    /// Runs the reset handshake. Each step must finish before the next
    /// starts, and the three waits share one budget.
    pub fn reset_interface(&mut self) -> Result<(), HeciError> {
        self.ensure_base()?;

        self.state = LifecycleState::Resetting;
        self.pending = None;
        self.interrupted = false;
        self.stats.resets = self.stats.resets.wrapping_add(1);
        ringbuf_entry!(self.trace, Trace::ResetStart);

        let mut csr = self.host_csr()?;
        csr.set_reset(true);
        csr.set_interrupt_generate(true);
        self.write_host_csr(csr)?;

        let mut budget = self.config().reset_budget();
        self.reset_step(&mut budget, ResetStep::HostReadyClear, |ep| {
            Ok(!ep.host_csr()?.ready())
        })?;
        self.state = LifecycleState::WaitingForRemoteReady;
        self.reset_step(&mut budget, ResetStep::MeReady, |ep| {
            Ok(ep.me_csr()?.ready())
        })?;
        self.reset_step(&mut budget, ResetStep::InterruptStatus, |ep| {
            Ok(ep.host_csr()?.interrupt_status())
        })?;

        let mut csr = self.host_csr()?;
        csr.set_reset(false);
        csr.set_ready(true);
        csr.set_interrupt_generate(true);
        self.write_host_csr(csr)?;

        self.state = LifecycleState::Ready;
        ringbuf_entry!(self.trace, Trace::ResetComplete);
        Ok(())
    }

    /// Makes the interface usable again if either side dropped out,
    /// initializing it if that never happened.
    pub fn reinitialize(&mut self) -> Result<(), HeciError> {
        if self.state == LifecycleState::Uninitialized {
            return self.initialize();
        }
        if self.check_for_reset() {
            self.reset_interface()?;
        }
        Ok(())
    }

    fn reset_step(
        &mut self,
        budget: &mut PollBudget,
        step: ResetStep,
        done: impl FnMut(&mut Self) -> Result<bool, HeciError>,
    ) -> Result<(), HeciError> {
        self.poll_until(budget, done).map_err(|e| {
            ringbuf_entry!(self.trace, Trace::ResetTimeout(step));
            e
        })
    }

    /// The MMIO base, discovered on first use.
    pub(crate) fn ensure_base(&mut self) -> Result<u64, HeciError> {
        if let Some(base) = self.base() {
            return Ok(base);
        }
        let base = self.discover_base()?;
        self.set_base(base);
        Ok(base)
    }

    /// Finds the register block behind BAR0, assigning the fallback base if
    /// firmware left the BAR empty, and turns on memory decode.
    fn discover_base(&mut self) -> Result<u64, HeciError> {
        let id = self.config_read(PCI_VENDOR_ID);
        if id & 0xffff == 0xffff {
            return Err(self.fail(Trace::NotPresent, HeciError::NotFound));
        }

        let lo = self.config_read(PCI_BAR0);
        let hi = if lo & BAR_TYPE_64 != 0 {
            self.config_read(PCI_BAR0_HIGH)
        } else {
            0
        };
        let addr_lo = lo & BAR_ADDRESS_MASK;
        let unprogrammed = (addr_lo == 0 && hi == 0)
            || (addr_lo == BAR_ADDRESS_MASK && (hi == 0 || hi == u32::MAX));

        let base = if unprogrammed {
            let base = self.config().fallback_base;
            self.config_write(
                PCI_BAR0,
                (base as u32 & BAR_ADDRESS_MASK) | (lo & !BAR_ADDRESS_MASK),
            );
            if lo & BAR_TYPE_64 != 0 {
                self.config_write(PCI_BAR0_HIGH, (base >> 32) as u32);
            }
            ringbuf_entry!(self.trace, Trace::BaseReassigned(base));
            base
        } else {
            let base = (u64::from(hi) << 32) | u64::from(addr_lo);
            ringbuf_entry!(self.trace, Trace::Base(base));
            base
        };

        // The upper half of this dword is the status register, whose bits
        // are write-one-to-clear.
        let cmd = self.config_read(PCI_COMMAND) & 0xffff;
        self.config_write(
            PCI_COMMAND,
            cmd | COMMAND_MEMORY_SPACE | COMMAND_BUS_MASTER,
        );

        Ok(base)
    }
}
