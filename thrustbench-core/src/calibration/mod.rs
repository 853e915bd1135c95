//! Raw-count to force conversion and the tare/calibrate procedures

pub mod engine;

pub use engine::{CalibrationEngine, EngineError};
