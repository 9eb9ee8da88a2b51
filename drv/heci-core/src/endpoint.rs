// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use core::ops::{Deref, DerefMut};

use drv_heci_api::{
    Csr, HeciError, HeciFunction, MessageHeader, Platform, ReadReg, WriteReg,
};

use crate::trace::{ringbuf_entry, HeciStats, Ringbuf, Trace};
use crate::{HeciConfig, PollBudget};

pub const TRACE_DEPTH: usize = 64;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LifecycleState {
    Uninitialized,
    Resetting,
    WaitingForRemoteReady,
    Ready,
}

/// The host end of one HECI function.
///
/// All hardware access goes through the owned platform. The MMIO base is
/// found on first use; until then the endpoint has touched nothing.
pub struct HeciEndpoint<P: Platform> {
    platform: P,
    function: HeciFunction,
    config: HeciConfig,
    base: Option<u64>,
    pub(crate) state: LifecycleState,
    /// Header of a packet whose payload is still in the ME ring, left
    /// behind when a read found the caller's buffer too small.
    pub(crate) pending: Option<MessageHeader>,
    /// Set while a message is cut off partway through; its remaining
    /// packets are dropped before the next receive starts.
    pub(crate) interrupted: bool,
    pub(crate) trace: Ringbuf<Trace, TRACE_DEPTH>,
    pub(crate) stats: HeciStats,
}

impl<P: Platform> HeciEndpoint<P> {
    pub fn new(platform: P, function: HeciFunction, config: HeciConfig) -> Self {
        Self {
            platform,
            function,
            config,
            base: None,
            state: LifecycleState::Uninitialized,
            pending: None,
            interrupted: false,
            trace: Ringbuf::new(Trace::None),
            stats: HeciStats::default(),
        }
    }

    pub fn function(&self) -> HeciFunction {
        self.function
    }

    pub fn config(&self) -> &HeciConfig {
        &self.config
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// MMIO base in use, once discovered.
    pub fn base(&self) -> Option<u64> {
        self.base
    }

    pub fn stats(&self) -> &HeciStats {
        &self.stats
    }

    pub fn trace(&self) -> &Ringbuf<Trace, TRACE_DEPTH> {
        &self.trace
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    pub fn platform_mut(&mut self) -> &mut P {
        &mut self.platform
    }

    pub fn into_platform(self) -> P {
        self.platform
    }

    /// Enables the function for the lifetime of the returned guard, putting
    /// the enable state back the way it was when the guard drops.
    pub fn session(&mut self) -> DeviceSession<'_, P> {
        let was_enabled = self.platform.is_function_enabled(self.function);
        if !was_enabled {
            ringbuf_entry!(self.trace, Trace::SessionEnable);
            self.platform.set_function_enabled(self.function, true);
        }
        DeviceSession {
            endpoint: self,
            was_enabled,
        }
    }

    pub(crate) fn config_read(&mut self, offset: u16) -> u32 {
        self.platform.config_read32(self.function, offset)
    }

    pub(crate) fn config_write(&mut self, offset: u16, value: u32) {
        self.platform.config_write32(self.function, offset, value)
    }

    pub(crate) fn set_base(&mut self, base: u64) {
        self.base = Some(base);
    }

    /// Register reads and writes discover the MMIO base first if nothing
    /// has yet; an endpoint with no base touches no MMIO.
    pub(crate) fn read(&mut self, reg: ReadReg) -> Result<u32, HeciError> {
        let base = self.ensure_base()?;
        Ok(self.platform.mmio_read32(base + reg.offset()))
    }

    pub(crate) fn write(
        &mut self,
        reg: WriteReg,
        value: u32,
    ) -> Result<(), HeciError> {
        let base = self.ensure_base()?;
        self.platform.mmio_write32(base + reg.offset(), value);
        Ok(())
    }

    pub(crate) fn host_csr(&mut self) -> Result<Csr, HeciError> {
        self.read(ReadReg::HostCsr).map(Csr::from_bits)
    }

    pub(crate) fn me_csr(&mut self) -> Result<Csr, HeciError> {
        self.read(ReadReg::MeCsr).map(Csr::from_bits)
    }

    pub(crate) fn write_host_csr(&mut self, csr: Csr) -> Result<(), HeciError> {
        self.write(WriteReg::HostCsr, csr.bits())
    }

    /// Tells the ME to look at the rings.
    pub(crate) fn generate_interrupt(&mut self) -> Result<(), HeciError> {
        let mut csr = self.host_csr()?;
        csr.set_interrupt_generate(true);
        self.write_host_csr(csr)
    }

    /// Polls `done` until it holds, spending one quantum per failed check.
    /// A budget of N quanta allows exactly N delays.
    pub(crate) fn poll_until(
        &mut self,
        budget: &mut PollBudget,
        mut done: impl FnMut(&mut Self) -> Result<bool, HeciError>,
    ) -> Result<(), HeciError> {
        loop {
            if done(self)? {
                return Ok(());
            }
            if !budget.take() {
                self.stats.record(HeciError::Timeout);
                return Err(HeciError::Timeout);
            }
            self.delay_quantum();
        }
    }

    pub(crate) fn delay_quantum(&mut self) {
        self.platform.delay_us(self.config.poll_quantum_us);
    }

    /// Notes a failure in the trace ring and the counters, and hands it back.
    pub(crate) fn fail(&mut self, trace: Trace, err: HeciError) -> HeciError {
        ringbuf_entry!(self.trace, trace);
        self.stats.record(err);
        err
    }
}

/// Guard returned by [`HeciEndpoint::session`].
pub struct DeviceSession<'a, P: Platform> {
    endpoint: &'a mut HeciEndpoint<P>,
    was_enabled: bool,
}

impl<P: Platform> Deref for DeviceSession<'_, P> {
    type Target = HeciEndpoint<P>;

    fn deref(&self) -> &Self::Target {
        self.endpoint
    }
}

impl<P: Platform> DerefMut for DeviceSession<'_, P> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.endpoint
    }
}

impl<P: Platform> Drop for DeviceSession<'_, P> {
    fn drop(&mut self) {
        if !self.was_enabled {
            let ep = &mut *self.endpoint;
            ringbuf_entry!(ep.trace, Trace::SessionRestore);
            ep.platform.set_function_enabled(ep.function, false);
        }
    }
}
