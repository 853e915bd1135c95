//! Hardware driver implementations
//!
//! This crate provides concrete implementations of the collaborator traits
//! defined in thrustbench-core:
//!
//! - Load cell amplifier (HX711)
//! - Key-value storage (RAM, NOR flash)

#![no_std]
#![deny(unsafe_code)]

#[cfg(test)]
extern crate std;

pub mod sensor;
pub mod storage;
