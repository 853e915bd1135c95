//! Board-agnostic control core for the Thrustbench load cell test stand
//!
//! This crate contains all application logic that does not depend on
//! specific hardware implementations:
//!
//! - Collaborator traits (load cell, network link, transport, storage, clock)
//! - Run mode state machine
//! - Configuration types and the persisted calibration record
//! - Calibration engine (conversion, tare, gain calibration)
//! - Connectivity supervisor
//! - Command handler and sampling scheduler
//! - The cooperative control loop tying them together

#![no_std]
#![deny(unsafe_code)]

#[cfg(test)]
extern crate std;

// Must come first so the logging macros are visible to every module
mod fmt;

pub mod calibration;
pub mod command;
pub mod config;
pub mod connectivity;
pub mod controller;
pub mod sampler;
pub mod state;
pub mod traits;

#[cfg(test)]
mod testing;

pub use controller::{ControlLoop, IterationReport, SampleOutcome, StandParts};
