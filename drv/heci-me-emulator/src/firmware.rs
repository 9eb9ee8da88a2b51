// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use drv_heci_api::mkhi::{
    EndOfPostResponse, FwVersionResponse, MkhiHeader, GEN_END_OF_POST,
    GEN_GET_FW_VERSION, GEN_GROUP_ID,
};
use drv_heci_api::MKHI_CLIENT_ADDR;
use zerocopy::IntoBytes;

use crate::Message;

/// The ME's MKHI client, as far as the GEN group goes.
#[derive(Copy, Clone, Debug, Default)]
pub struct MkhiFirmware {
    pub version: FwVersionResponse,
    /// Returned in the END_OF_POST acknowledgement.
    pub eop_action: u32,
    /// Result code stamped on every reply; nonzero replies carry no body.
    pub result: u8,
}

impl MkhiFirmware {
    pub fn new(version: FwVersionResponse) -> Self {
        Self {
            version,
            ..Self::default()
        }
    }

    /// Answers `msg`, or ignores it if it is not an MKHI command this
    /// client knows.
    pub fn respond(&mut self, msg: &Message) -> Option<Vec<u8>> {
        if msg.me_addr != MKHI_CLIENT_ADDR {
            return None;
        }
        let request = MkhiHeader::parse(&msg.data)?;
        if request.is_response() || request.group_id() != GEN_GROUP_ID {
            return None;
        }

        let header =
            MkhiHeader::response(request.group_id(), request.command(), self.result);
        let mut reply = header.bits().to_le_bytes().to_vec();
        if self.result != 0 {
            return Some(reply);
        }
        match request.command() {
            GEN_GET_FW_VERSION => {
                reply.extend_from_slice(self.version.as_bytes());
            }
            GEN_END_OF_POST => {
                let rsp = EndOfPostResponse {
                    requested_action: self.eop_action.into(),
                };
                reply.extend_from_slice(rsp.as_bytes());
            }
            _ => return None,
        }
        Some(reply)
    }

    pub fn into_responder(mut self) -> impl FnMut(&Message) -> Option<Vec<u8>> {
        move |msg| self.respond(msg)
    }
}
