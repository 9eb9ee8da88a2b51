// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! HECI MMIO register layout.

use bitfield::bitfield;
use static_assertions::const_assert_eq;

/// Host circular buffer write window (host -> ME data).
pub const H_CB_WW: u64 = 0x00;
/// Host control/status register.
pub const H_CSR: u64 = 0x04;
/// ME circular buffer read window (ME -> host data).
pub const ME_CB_RW: u64 = 0x08;
/// ME control/status register, host view.
pub const ME_CSR_HA: u64 = 0x0c;

bitfield! {
    /// Control/status register layout, shared by `H_CSR` and `ME_CSR_HA`.
    ///
    /// Only the owning side sets its Ready and Reset bits. The pointer and
    /// depth fields are maintained by hardware and ignored on write.
    /// `interrupt_status` is write-one-to-clear in `H_CSR`.
    #[derive(Copy, Clone, PartialEq, Eq)]
    pub struct Csr(u32);
    impl Debug;
    pub interrupt_enable, set_interrupt_enable: 0;
    pub interrupt_status, set_interrupt_status: 1;
    pub interrupt_generate, set_interrupt_generate: 2;
    pub ready, set_ready: 3;
    pub reset, set_reset: 4;
    pub u8, read_pointer, set_read_pointer: 15, 8;
    pub u8, write_pointer, set_write_pointer: 23, 16;
    pub u8, depth, set_depth: 31, 24;
}

const_assert_eq!(core::mem::size_of::<Csr>(), 4);

impl Csr {
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(&self) -> u32 {
        self.0
    }
}

/// Registers the host may read.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ReadReg {
    HostCsr,
    MeCbRw,
    MeCsr,
}

impl ReadReg {
    pub const fn offset(self) -> u64 {
        match self {
            ReadReg::HostCsr => H_CSR,
            ReadReg::MeCbRw => ME_CB_RW,
            ReadReg::MeCsr => ME_CSR_HA,
        }
    }
}

/// Registers the host may write. `ME_CSR_HA` belongs to the ME and has no
/// variant here.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum WriteReg {
    HostCbWw,
    HostCsr,
}

impl WriteReg {
    pub const fn offset(self) -> u64 {
        match self {
            WriteReg::HostCbWw => H_CB_WW,
            WriteReg::HostCsr => H_CSR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csr_bit_positions() {
        let mut csr = Csr::from_bits(0);
        csr.set_interrupt_enable(true);
        assert_eq!(csr.bits(), 1 << 0);

        let mut csr = Csr::from_bits(0);
        csr.set_interrupt_status(true);
        assert_eq!(csr.bits(), 1 << 1);

        let mut csr = Csr::from_bits(0);
        csr.set_interrupt_generate(true);
        assert_eq!(csr.bits(), 1 << 2);

        let mut csr = Csr::from_bits(0);
        csr.set_ready(true);
        assert_eq!(csr.bits(), 1 << 3);

        let mut csr = Csr::from_bits(0);
        csr.set_reset(true);
        assert_eq!(csr.bits(), 1 << 4);
    }

    #[test]
    fn csr_pointer_fields() {
        let csr = Csr::from_bits(0x80_3f_12_08);
        assert_eq!(csr.depth(), 0x80);
        assert_eq!(csr.write_pointer(), 0x3f);
        assert_eq!(csr.read_pointer(), 0x12);
        assert!(csr.ready());
        assert!(!csr.reset());
    }

    #[test]
    fn offsets() {
        assert_eq!(ReadReg::HostCsr.offset(), WriteReg::HostCsr.offset());
        assert_eq!(ReadReg::MeCbRw.offset(), 0x08);
        assert_eq!(ReadReg::MeCsr.offset(), 0x0c);
        assert_eq!(WriteReg::HostCbWw.offset(), 0x00);
    }
}
