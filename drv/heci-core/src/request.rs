// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use drv_heci_api::mkhi::{
    EndOfPostAction, EndOfPostResponse, FwVersionResponse, MkhiHeader, NoBody,
    GEN_END_OF_POST, GEN_GET_FW_VERSION, GEN_GROUP_ID, MKHI_HEADER_SIZE,
};
use drv_heci_api::{
    DeviceFault, HeciError, Platform, ReadMode, BIOS_FIXED_HOST_ADDR,
    MKHI_CLIENT_ADDR,
};
use num_traits::FromPrimitive;
use zerocopy::{FromBytes, Immutable, IntoBytes};

use crate::endpoint::HeciEndpoint;
use crate::trace::{ringbuf_entry, Trace};

/// Largest MKHI message, header included, that [`HeciEndpoint::mkhi_request`]
/// sends or accepts.
pub const MKHI_MAX_MESSAGE: usize = 256;

impl<P: Platform> HeciEndpoint<P> {
    /// Sends `request` once, then waits for the answer, trying the receive
    /// up to `max_retries` times. Returns the response length.
    ///
    /// The request is never resent; only the receive is retried. A device
    /// error resets the interface before the next attempt.
    pub fn send_with_ack(
        &mut self,
        request: &[u8],
        host_addr: u8,
        me_addr: u8,
        response: &mut [u8],
        max_retries: u16,
    ) -> Result<usize, HeciError> {
        self.send(request, host_addr, me_addr)?;

        let retries = max_retries.max(1);
        let mut last = HeciError::Timeout;
        for attempt in 0..retries {
            last = match self.receive(ReadMode::Blocking, response) {
                Ok(Some(len)) => return Ok(len),
                // Blocking receives always produce something or fail.
                Ok(None) => HeciError::Timeout,
                Err(e) => e,
            };

            self.stats.ack_retries = self.stats.ack_retries.wrapping_add(1);
            ringbuf_entry!(self.trace, Trace::AckRetry { attempt, err: last });

            if matches!(last, HeciError::DeviceError(_)) && attempt + 1 < retries {
                self.reset_interface()?;
            }
        }

        ringbuf_entry!(self.trace, Trace::FailedRetries { retries, last });
        Err(last)
    }

    /// Runs one MKHI command against the ME's core client and decodes the
    /// typed response body.
    pub fn mkhi_request<Req, Rsp>(
        &mut self,
        group_id: u8,
        command: u8,
        request: &Req,
    ) -> Result<Rsp, HeciError>
    where
        Req: IntoBytes + Immutable,
        Rsp: FromBytes,
    {
        let body = request.as_bytes();
        let len = MKHI_HEADER_SIZE + body.len();
        if len > MKHI_MAX_MESSAGE {
            return Err(HeciError::BufferTooSmall);
        }

        let header = MkhiHeader::request(group_id, command);
        let mut tx = [0u8; MKHI_MAX_MESSAGE];
        tx[..MKHI_HEADER_SIZE].copy_from_slice(&header.bits().to_le_bytes());
        tx[MKHI_HEADER_SIZE..len].copy_from_slice(body);

        let mut rx = [0u8; MKHI_MAX_MESSAGE];
        let retries = self.config().ack_retries;
        let n = self.send_with_ack(
            &tx[..len],
            BIOS_FIXED_HOST_ADDR,
            MKHI_CLIENT_ADDR,
            &mut rx,
            retries,
        )?;
        let rx = &rx[..n];

        let bad = HeciError::DeviceError(DeviceFault::BadResponse);
        let Some(reply) = MkhiHeader::parse(rx) else {
            return Err(self.fail(
                Trace::BadMkhiResponse(MkhiHeader::from_bits(0)),
                bad,
            ));
        };
        if !reply.answers(header) {
            return Err(self.fail(Trace::BadMkhiResponse(reply), bad));
        }
        if reply.result() != 0 {
            return Err(self.fail(
                Trace::MkhiRefused(reply.result()),
                HeciError::Unsupported,
            ));
        }

        match Rsp::read_from_prefix(&rx[MKHI_HEADER_SIZE..]) {
            Ok((rsp, _)) => Ok(rsp),
            Err(_) => Err(self.fail(Trace::BadMkhiResponse(reply), bad)),
        }
    }

    pub fn get_firmware_version(&mut self) -> Result<FwVersionResponse, HeciError> {
        self.mkhi_request(GEN_GROUP_ID, GEN_GET_FW_VERSION, &NoBody)
    }

    /// Tells the ME that boot firmware is done, returning what the ME wants
    /// done next.
    pub fn end_of_post(&mut self) -> Result<EndOfPostAction, HeciError> {
        let rsp: EndOfPostResponse =
            self.mkhi_request(GEN_GROUP_ID, GEN_END_OF_POST, &NoBody)?;
        let action = rsp.requested_action.get();
        match EndOfPostAction::from_u32(action) {
            Some(a) => Ok(a),
            None => Err(self.fail(
                Trace::BadMkhiResponse(MkhiHeader::response(
                    GEN_GROUP_ID,
                    GEN_END_OF_POST,
                    0,
                )),
                HeciError::DeviceError(DeviceFault::BadResponse),
            )),
        }
    }
}
