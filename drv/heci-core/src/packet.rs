// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Moving single packets through the rings.

use drv_heci_api::{
    DeviceFault, HeciError, MessageHeader, Platform, ReadMode, ReadReg,
    WriteReg, HEADER_SIZE,
};

use crate::endpoint::HeciEndpoint;
use crate::ring::{filled_slots, free_slots, overflow};
use crate::trace::{ringbuf_entry, Trace};
use crate::PollBudget;

impl<P: Platform> HeciEndpoint<P> {
    /// Writes one packet into the host ring and signals the ME.
    ///
    /// `payload` must hold at least the words `header` declares; only those
    /// are written.
    pub fn write_packet(
        &mut self,
        header: MessageHeader,
        payload: &[u32],
    ) -> Result<(), HeciError> {
        let mut budget = self.config().init_budget();
        self.wait_for_remote_ready(&mut budget)?;

        let words = header.len_words();
        let Some(payload) = payload.get(..words) else {
            return Err(self.fail(
                Trace::BufferTooSmall {
                    len: words * 4,
                    room: payload.len() * 4,
                },
                HeciError::BufferTooSmall,
            ));
        };

        // One slot for the header, then the payload.
        let needed = words + 1;
        let depth = self.host_csr()?.depth();
        if needed > usize::from(depth) {
            return Err(self.fail(
                Trace::BadLength {
                    len: header.length(),
                    depth,
                },
                HeciError::DeviceError(DeviceFault::BadLength),
            ));
        }

        let mut budget = self.config().send_budget();
        let mut free = 0;
        let room = self.poll_until(&mut budget, |ep| {
            let csr = ep.host_csr()?;
            free = free_slots(csr.read_pointer(), csr.write_pointer(), csr.depth());
            Ok(usize::from(free) >= needed)
        });
        if let Err(e) = room {
            if e == HeciError::Timeout {
                ringbuf_entry!(self.trace, Trace::NoRoom { free, needed });
            }
            return Err(e);
        }

        self.write(WriteReg::HostCbWw, header.bits())?;
        for &word in payload {
            self.write(WriteReg::HostCbWw, word)?;
        }
        self.generate_interrupt()?;

        if !self.me_csr()?.ready() {
            return Err(self.fail(
                Trace::NotReadyAfterWrite,
                HeciError::DeviceError(DeviceFault::RemoteNotReady),
            ));
        }

        self.stats.packets_sent = self.stats.packets_sent.wrapping_add(1);
        ringbuf_entry!(self.trace, Trace::Sent(header));
        Ok(())
    }

    /// Reads one packet from the ME ring into `buf`.
    ///
    /// On success the payload is in `buf[..header.length()]`. `Ok(None)`
    /// means a non-blocking read found the ring empty. If `buf` is too small
    /// the packet stays queued, so a retry with more room gets it whole.
    pub fn read_packet(
        &mut self,
        mode: ReadMode,
        buf: &mut [u8],
    ) -> Result<Option<MessageHeader>, HeciError> {
        let mut budget = self.config().read_budget();

        let header = match self.pending.take() {
            Some(header) => header,
            None => {
                let csr = self.host_csr()?;
                if csr.interrupt_status() {
                    // Write-one-to-clear.
                    self.write_host_csr(csr)?;
                }

                let me = self.me_csr()?;
                let (read, write, depth) =
                    (me.read_pointer(), me.write_pointer(), me.depth());
                if overflow(read, write, depth) {
                    return Err(self.fail(
                        Trace::Overflow { read, write, depth },
                        HeciError::DeviceError(DeviceFault::Overflow),
                    ));
                }
                if filled_slots(read, write) == 0 && mode == ReadMode::NonBlocking
                {
                    ringbuf_entry!(self.trace, Trace::NoData);
                    return Ok(None);
                }

                self.wait_for_slots(&mut budget, 1)?;
                MessageHeader::from_bits(self.read(ReadReg::MeCbRw)?)
            }
        };

        let len = usize::from(header.length());
        if len == 0 {
            self.generate_interrupt()?;
            self.note_received(header);
            return Ok(Some(header));
        }

        let depth = self.me_csr()?.depth();
        if len + HEADER_SIZE > usize::from(depth) * 4 {
            return Err(self.fail(
                Trace::BadLength {
                    len: header.length(),
                    depth,
                },
                HeciError::DeviceError(DeviceFault::BadLength),
            ));
        }

        if len > buf.len() {
            self.pending = Some(header);
            let room = buf.len();
            return Err(self.fail(
                Trace::BufferTooSmall { len, room },
                HeciError::BufferTooSmall,
            ));
        }
        let dest = &mut buf[..len];

        let words = header.len_words();
        if let Err(e) = self.wait_for_slots(&mut budget, words) {
            // The header is already consumed; keep it for the next read.
            self.pending = Some(header);
            return Err(e);
        }
        for chunk in dest.chunks_mut(4) {
            let word = self.read(ReadReg::MeCbRw)?.to_le_bytes();
            chunk.copy_from_slice(&word[..chunk.len()]);
        }

        if !self.me_csr()?.ready() {
            return Err(self.fail(
                Trace::NotReadyAfterRead,
                HeciError::DeviceError(DeviceFault::RemoteNotReady),
            ));
        }
        self.generate_interrupt()?;

        self.note_received(header);
        Ok(Some(header))
    }

    /// Waits until at least `needed` slots of the ME ring are occupied.
    pub(crate) fn wait_for_slots(
        &mut self,
        budget: &mut PollBudget,
        needed: usize,
    ) -> Result<(), HeciError> {
        let mut filled = 0;
        let r = self.poll_until(budget, |ep| {
            let me = ep.me_csr()?;
            filled = filled_slots(me.read_pointer(), me.write_pointer());
            Ok(usize::from(filled) >= needed)
        });
        if r == Err(HeciError::Timeout) {
            ringbuf_entry!(self.trace, Trace::ReadTimeout { filled, needed });
        }
        r
    }

    fn note_received(&mut self, header: MessageHeader) {
        self.stats.packets_received = self.stats.packets_received.wrapping_add(1);
        ringbuf_entry!(self.trace, Trace::Received(header));
    }
}
