//! Inbound command handling

pub mod handler;

pub use handler::{CommandHandler, CommandOutcome};
