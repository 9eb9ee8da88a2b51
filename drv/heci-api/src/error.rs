// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/// Ways the device or the ME broke protocol.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DeviceFault {
    /// The ME ring claims more filled slots than it has.
    Overflow,
    /// The ME dropped Ready while a packet was being moved.
    RemoteNotReady,
    /// A packet header declared a length that cannot fit the ring.
    BadLength,
    /// A zero-length packet appeared anywhere but as a whole message.
    UnexpectedEmptyPacket,
    /// An MKHI response did not match the request it answers.
    BadResponse,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum HeciError {
    /// A poll budget ran out.
    Timeout,
    DeviceError(DeviceFault),
    /// The caller's buffer cannot hold what the ME sent.
    BufferTooSmall,
    /// The HECI function is absent or disabled.
    NotFound,
    /// The ME reports a firmware error, or refused a request.
    Unsupported,
}

impl HeciError {
    /// Returns true if retrying the same operation, unchanged, might
    /// succeed.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, HeciError::Timeout)
    }
}

impl From<DeviceFault> for HeciError {
    fn from(fault: DeviceFault) -> Self {
        HeciError::DeviceError(fault)
    }
}
