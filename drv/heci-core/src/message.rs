// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Splitting messages into packets and putting them back together.

use drv_heci_api::{
    DeviceFault, HeciError, MessageHeader, Platform, ReadMode, ReadReg,
    HEADER_SIZE, MAX_FRAGMENT_LEN, MAX_FRAGMENT_WORDS,
};

use crate::endpoint::HeciEndpoint;
use crate::trace::{ringbuf_entry, Trace};

/// Largest fragment, in bytes, that a host ring of `depth` slots carries
/// alongside its header.
pub fn fragment_len(depth: u8) -> usize {
    (usize::from(depth).saturating_sub(1) * 4).min(MAX_FRAGMENT_LEN)
}

impl<P: Platform> HeciEndpoint<P> {
    /// Sends `message` to ME client `me_addr`, split into as many packets
    /// as the host ring needs.
    ///
    /// The first failing packet ends the send; packets already written stay
    /// written.
    pub fn send(
        &mut self,
        message: &[u8],
        host_addr: u8,
        me_addr: u8,
    ) -> Result<(), HeciError> {
        self.reinitialize()?;

        let depth = self.host_csr()?.depth();
        let max = fragment_len(depth);
        if max == 0 && !message.is_empty() {
            return Err(self.fail(
                Trace::BadLength { len: 4, depth },
                HeciError::DeviceError(DeviceFault::BadLength),
            ));
        }

        let mut words = [0u32; MAX_FRAGMENT_WORDS];
        let mut remaining = message;
        loop {
            let (fragment, rest) = remaining.split_at(remaining.len().min(max));
            let complete = rest.is_empty();
            let header = MessageHeader::new(
                me_addr,
                host_addr,
                fragment.len() as u16,
                complete,
            );

            for (word, bytes) in words.iter_mut().zip(fragment.chunks(4)) {
                let mut le = [0u8; 4];
                le[..bytes.len()].copy_from_slice(bytes);
                *word = u32::from_le_bytes(le);
            }
            self.write_packet(header, &words[..header.len_words()])?;

            if complete {
                break;
            }
            remaining = rest;
        }

        self.stats.messages_sent = self.stats.messages_sent.wrapping_add(1);
        Ok(())
    }

    /// Receives one message into `buf`, returning its length.
    ///
    /// `Ok(None)` means a non-blocking receive found nothing queued. Once
    /// the first packet of a message has arrived, the rest is waited for
    /// regardless of `mode`. A message that does not fit is consumed and
    /// dropped, unless not even its first packet fit, in which case it is
    /// left queued.
    ///
    /// A receive that fails after part of a message has been read leaves
    /// the rest of that message to be dropped by the next receive, which
    /// then waits for it even in non-blocking mode.
    pub fn receive(
        &mut self,
        mode: ReadMode,
        buf: &mut [u8],
    ) -> Result<Option<usize>, HeciError> {
        self.reinitialize()?;
        if self.interrupted {
            ringbuf_entry!(self.trace, Trace::DropInterrupted);
            self.discard_message()?;
        }

        let mut mode = mode;
        let mut received = 0;
        loop {
            let header = match self.read_packet(mode, &mut buf[received..]) {
                Ok(Some(header)) => header,
                Ok(None) => return Ok(None),
                Err(HeciError::BufferTooSmall) if received > 0 => {
                    self.interrupted = true;
                    self.discard_message()?;
                    return Err(HeciError::BufferTooSmall);
                }
                Err(e) => {
                    if received > 0 {
                        self.interrupted = true;
                    }
                    return Err(e);
                }
            };
            mode = ReadMode::Blocking;

            let len = usize::from(header.length());
            if len == 0 {
                if received == 0 && header.message_complete() {
                    self.note_message();
                    return Ok(Some(0));
                }
                self.interrupted = !header.message_complete();
                return Err(self.fail(
                    Trace::UnexpectedEmptyPacket,
                    HeciError::DeviceError(DeviceFault::UnexpectedEmptyPacket),
                ));
            }

            received += len;
            if header.message_complete() {
                self.note_message();
                return Ok(Some(received));
            }
            if received >= buf.len() {
                let room = buf.len();
                ringbuf_entry!(
                    self.trace,
                    Trace::BufferTooSmall {
                        len: received,
                        room
                    }
                );
                self.stats.record(HeciError::BufferTooSmall);
                self.interrupted = true;
                self.discard_message()?;
                return Err(HeciError::BufferTooSmall);
            }
        }
    }

    /// Reads and drops packets up to and including the next one that ends
    /// a message.
    pub fn discard_message(&mut self) -> Result<(), HeciError> {
        let mut budget = self.config().read_budget();
        loop {
            let header = match self.pending.take() {
                Some(header) => header,
                None => {
                    self.wait_for_slots(&mut budget, 1)?;
                    MessageHeader::from_bits(self.read(ReadReg::MeCbRw)?)
                }
            };

            let depth = self.me_csr()?.depth();
            if usize::from(header.length()) + HEADER_SIZE > usize::from(depth) * 4 {
                return Err(self.fail(
                    Trace::BadLength {
                        len: header.length(),
                        depth,
                    },
                    HeciError::DeviceError(DeviceFault::BadLength),
                ));
            }

            let words = header.len_words();
            if let Err(e) = self.wait_for_slots(&mut budget, words) {
                self.pending = Some(header);
                self.interrupted = true;
                return Err(e);
            }
            for _ in 0..words {
                self.read(ReadReg::MeCbRw)?;
            }
            self.generate_interrupt()?;
            ringbuf_entry!(self.trace, Trace::Discarded(header));

            self.interrupted = !header.message_complete();
            if header.message_complete() {
                return Ok(());
            }
        }
    }

    fn note_message(&mut self) {
        self.stats.messages_received =
            self.stats.messages_received.wrapping_add(1);
    }
}
