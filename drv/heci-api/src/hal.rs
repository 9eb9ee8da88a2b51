// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Platform services the transport is built on.
//!
//! A board supplies one type implementing all four traits; the transport
//! never touches hardware any other way.

use crate::pci::HeciFunction;

/// PCI configuration space of the HECI device (bus 0, device 22).
pub trait PciConfig {
    fn config_read32(&mut self, function: HeciFunction, offset: u16) -> u32;
    fn config_write32(&mut self, function: HeciFunction, offset: u16, value: u32);
}

/// 32-bit memory-mapped I/O.
pub trait Mmio {
    fn mmio_read32(&mut self, addr: u64) -> u32;
    fn mmio_write32(&mut self, addr: u64, value: u32);
}

pub trait Delay {
    fn delay_us(&mut self, us: u32);
}

/// Chipset-level switch that hides or exposes a HECI function.
pub trait DeviceEnable {
    fn is_function_enabled(&mut self, function: HeciFunction) -> bool;
    fn set_function_enabled(&mut self, function: HeciFunction, enabled: bool);
}

pub trait Platform: PciConfig + Mmio + Delay + DeviceEnable {}

impl<T: PciConfig + Mmio + Delay + DeviceEnable> Platform for T {}
