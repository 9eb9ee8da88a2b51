// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

#![allow(dead_code)]

use drv_heci_api::HeciFunction;
use drv_heci_core::{HeciConfig, HeciEndpoint};
use drv_heci_me_emulator::MeEmulator;

pub const FALLBACK_BASE: u64 = 0xfed1_a000;

/// Short budgets so timeouts are cheap: init 50 quanta, reset 20, send and
/// read 10 each.
pub fn config() -> HeciConfig {
    HeciConfig {
        poll_quantum_us: 10,
        init_timeout_us: 500,
        reset_timeout_us: 200,
        send_timeout_us: 100,
        read_timeout_us: 100,
        ack_retries: 3,
        fallback_base: FALLBACK_BASE,
    }
}

pub fn endpoint(emu: MeEmulator) -> HeciEndpoint<MeEmulator> {
    HeciEndpoint::new(emu, HeciFunction::Heci1, config())
}

/// An endpoint that has been through `initialize`.
pub fn ready(emu: MeEmulator) -> HeciEndpoint<MeEmulator> {
    let mut ep = endpoint(emu);
    ep.initialize().unwrap();
    ep
}

pub fn emu() -> MeEmulator {
    MeEmulator::new(HeciFunction::Heci1)
}

pub fn bytes(n: usize) -> Vec<u8> {
    (0..n).map(|i| (i * 7 + 3) as u8).collect()
}
