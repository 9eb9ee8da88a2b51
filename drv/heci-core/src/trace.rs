// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-endpoint diagnostics: a small ring of recent events and a set of
//! running counters.
//!
//! Each ring entry records the source line that produced it. An event
//! identical to the newest entry (same line, same payload) bumps that
//! entry's count instead of taking a new slot, so a poll loop that keeps
//! failing the same way costs one slot.

use drv_heci_api::{mkhi::MkhiHeader, HeciError, MessageHeader};

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RingbufEntry<T: Copy + PartialEq> {
    pub line: u16,
    /// Bumped each time this slot is overwritten, so readers can tell how
    /// many times the ring has lapped.
    pub generation: u16,
    pub count: u32,
    pub payload: T,
}

#[derive(Debug)]
pub struct Ringbuf<T: Copy + PartialEq, const N: usize> {
    last: Option<usize>,
    buffer: [RingbufEntry<T>; N],
}

impl<T: Copy + PartialEq, const N: usize> Ringbuf<T, N> {
    pub const fn new(init: T) -> Self {
        Self {
            last: None,
            buffer: [RingbufEntry {
                line: 0,
                generation: 0,
                count: 0,
                payload: init,
            }; N],
        }
    }

    pub fn entry(&mut self, line: u16, payload: T) {
        if let Some(ent) = self.last.and_then(|i| self.buffer.get_mut(i)) {
            if ent.line == line && ent.payload == payload {
                if let Some(count) = ent.count.checked_add(1) {
                    ent.count = count;
                    return;
                }
            }
        }

        let ndx = match self.last {
            Some(i) if i + 1 < N => i + 1,
            _ => 0,
        };
        let Some(ent) = self.buffer.get_mut(ndx) else {
            // zero-sized ring
            return;
        };
        *ent = RingbufEntry {
            line,
            generation: ent.generation.wrapping_add(1),
            count: 1,
            payload,
        };
        self.last = Some(ndx);
    }

    /// The newest entry, if anything was ever recorded.
    pub fn last(&self) -> Option<&RingbufEntry<T>> {
        self.last.and_then(|i| self.buffer.get(i))
    }

    /// Recorded entries, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &RingbufEntry<T>> {
        let split = self.last.map(|i| i + 1).unwrap_or(0);
        let (newer, older) = self.buffer.split_at(split.min(N));
        older.iter().chain(newer.iter()).filter(|e| e.count != 0)
    }

    pub fn contains(&self, payload: &T) -> bool {
        self.iter().any(|e| e.payload == *payload)
    }
}

/// Records `$payload` in the ring `$buf`, tagged with the calling line.
macro_rules! ringbuf_entry {
    ($buf:expr, $payload:expr) => {{
        let payload = $payload;
        $buf.entry(line!() as u16, payload);
    }};
}
pub(crate) use ringbuf_entry;

/// Which wait of the reset handshake ran out of budget.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ResetStep {
    HostReadyClear,
    MeReady,
    InterruptStatus,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Trace {
    None,
    NotPresent,
    FirmwareError(u8),
    BaseReassigned(u64),
    Base(u64),
    HostReadySet,
    Initialized,
    ResetStart,
    ResetTimeout(ResetStep),
    ResetComplete,
    RemoteReset,
    RemoteReadyTimeout,
    NoRoom { free: u8, needed: usize },
    Sent(MessageHeader),
    NotReadyAfterWrite,
    Overflow { read: u8, write: u8, depth: u8 },
    NoData,
    ReadTimeout { filled: u8, needed: usize },
    Received(MessageHeader),
    BadLength { len: u16, depth: u8 },
    BufferTooSmall { len: usize, room: usize },
    NotReadyAfterRead,
    UnexpectedEmptyPacket,
    Discarded(MessageHeader),
    DropInterrupted,
    AckRetry { attempt: u16, err: HeciError },
    FailedRetries { retries: u16, last: HeciError },
    BadMkhiResponse(MkhiHeader),
    MkhiRefused(u8),
    SessionEnable,
    SessionRestore,
}

/// Running counts of what an endpoint has done. All counters wrap.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct HeciStats {
    pub packets_sent: u32,
    pub packets_received: u32,
    pub messages_sent: u32,
    pub messages_received: u32,
    pub timeouts: u32,
    pub device_errors: u32,
    pub resets: u32,
    pub buffer_too_small: u32,
    pub ack_retries: u32,
}

impl HeciStats {
    /// Counts a failure against the matching counter.
    pub(crate) fn record(&mut self, err: HeciError) {
        let counter = match err {
            HeciError::Timeout => &mut self.timeouts,
            HeciError::DeviceError(_) => &mut self.device_errors,
            HeciError::BufferTooSmall => &mut self.buffer_too_small,
            HeciError::NotFound | HeciError::Unsupported => return,
        };
        *counter = counter.wrapping_add(1);
    }
}
