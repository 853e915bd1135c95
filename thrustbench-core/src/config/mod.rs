//! Stand configuration and persisted calibration
//!
//! - [`types`]: runtime configuration ([`StandConfig`] and its sections)
//! - [`calibration`]: calibration parameters and their flash record
//! - [`store`]: loading and saving the calibration record

pub mod calibration;
pub mod store;
pub mod types;

pub use calibration::{
    CalibrationParameters, CalibrationRecord, CALIBRATION_MAGIC, CALIBRATION_VERSION, RECORD_SIZE,
};
pub use store::{CalibrationStore, LoadError};
pub use types::*;
