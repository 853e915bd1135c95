//! Thrustbench Collector Protocol
//!
//! This crate defines the messages exchanged between the test stand and the
//! remote collector over the transport session. Messages are small JSON
//! objects discriminated by a `type` field:
//!
//! ```text
//! Collector → Stand   {"type":"tare"}
//!                     {"type":"calibrate","known_mass":100}
//!                     {"type":"start_test"} / {"type":"stop_test"}
//!
//! Stand → Collector   {"type":"reading","timestamp":1200,"force":12.34,"raw":51000}
//!                     {"type":"ack","command":"tare","ok":true}
//!                     {"type":"status","state":"idle","scale":500.0,"offset":1000}
//! ```
//!
//! The control core only depends on the [`MessageCodec`] trait; [`JsonCodec`]
//! is the wire format used by the collector.

#![no_std]
#![deny(unsafe_code)]

extern crate alloc;

#[cfg(test)]
extern crate std;

pub mod codec;
pub mod messages;

pub use codec::{DecodeError, EncodeError, JsonCodec, MessageCodec};
pub use messages::{
    Ack, Command, CommandName, InboundMessage, OutboundMessage, ReadingMessage, StatusMessage,
    MAX_COMMAND_NAME_LEN, MAX_MESSAGE_SIZE,
};
