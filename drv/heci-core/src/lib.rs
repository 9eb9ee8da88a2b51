// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Host side of the HECI transport.
//!
//! A [`HeciEndpoint`] drives one HECI function through a [`Platform`]:
//!
//! - `initialize`, `reset_interface` and `reinitialize` bring the interface
//!   up and recover it when either side drops out;
//! - `write_packet` and `read_packet` move single packets through the rings;
//! - `send` and `receive` move whole messages, fragmenting and reassembling
//!   as the ring depth requires;
//! - `send_with_ack` and the MKHI helpers run request/response exchanges.
//!
//! Everything is polled. Every wait is bounded by a [`PollBudget`] derived
//! from the endpoint's [`HeciConfig`], so no operation can hang.
//!
//! [`Platform`]: drv_heci_api::Platform

#![cfg_attr(not(test), no_std)]

mod budget;
mod config;
mod endpoint;
mod gate;
mod lifecycle;
mod message;
mod packet;
mod request;
pub mod ring;
mod trace;

pub use budget::PollBudget;
pub use config::HeciConfig;
pub use endpoint::{DeviceSession, HeciEndpoint, LifecycleState, TRACE_DEPTH};
pub use message::fragment_len;
pub use request::MKHI_MAX_MESSAGE;
pub use trace::{HeciStats, ResetStep, Ringbuf, RingbufEntry, Trace};
