//! Instrument run mode
//!
//! The run mode decides whether readings are streamed and is changed only
//! by commands and calibration procedures.

pub mod events;
pub mod machine;

pub use events::Event;
pub use machine::InstrumentState;
