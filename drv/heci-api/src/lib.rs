// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Types shared by the HECI transport and its clients.
//!
//! HECI (Host Embedded Controller Interface) is the PCI function through
//! which boot firmware on the host CPU talks to the Management Engine (ME).
//! Each direction is a circular buffer of 32-bit slots that lives inside the
//! device and is reached through a single data window register; the two
//! control/status registers carry the ring pointers, the ring depth, and the
//! Ready/Reset handshake bits.
//!
//! This crate holds the parts both ends of the conversation need to agree
//! on: the packet header and control register layouts, the PCI layout of a
//! HECI function, the MKHI framing used by the most common ME client, the
//! error taxonomy, and the platform traits the transport is built on.

#![cfg_attr(not(test), no_std)]

mod error;
mod hal;
mod header;
pub mod mkhi;
pub mod pci;
mod regs;

pub use error::{DeviceFault, HeciError};
pub use hal::{Delay, DeviceEnable, Mmio, PciConfig, Platform};
pub use header::{
    MessageHeader, HEADER_SIZE, MAX_FRAGMENT_LEN, MAX_FRAGMENT_WORDS,
    MAX_PACKET_LEN,
};
pub use pci::HeciFunction;
pub use regs::{Csr, ReadReg, WriteReg, H_CB_WW, H_CSR, ME_CB_RW, ME_CSR_HA};

/// Host address used by boot firmware for every HECI conversation.
pub const BIOS_FIXED_HOST_ADDR: u8 = 0x00;

/// ME client address of the MKHI ("core message") handler.
pub const MKHI_CLIENT_ADDR: u8 = 0x07;

/// How a read behaves when the ME has nothing queued.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ReadMode {
    /// Poll until data arrives or the read budget runs out.
    Blocking,
    /// Return immediately with no data if the ring is empty.
    NonBlocking,
}
