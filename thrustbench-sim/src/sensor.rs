//! Simulated load cell
//!
//! Thrust and any dead weight on the stand are turned into raw counts with
//! a hidden scale and offset. The stand only learns them through tare and
//! calibration.

use serde::Deserialize;
use thrustbench_core::config::STANDARD_GRAVITY;
use thrustbench_core::traits::{Clock, LoadCellSensor, SensorError};

use crate::clock::SimClock;
use crate::motor::Motor;

/// 24-bit ADC range
const RAW_MIN: i64 = -(1 << 23);
const RAW_MAX: i64 = (1 << 23) - 1;

/// Hidden amplifier characteristics
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct LoadCellModel {
    /// Counts per gram
    pub true_scale: f64,
    /// Counts with nothing on the stand
    pub true_offset: i64,
}

impl Default for LoadCellModel {
    fn default() -> Self {
        Self {
            true_scale: 420.0,
            true_offset: 84_000,
        }
    }
}

/// Load cell with a motor mounted on it
pub struct SimLoadCell {
    clock: SimClock,
    model: LoadCellModel,
    motor: Motor,
    ignited_at: Option<u64>,
    dead_weight_g: f64,
    failing: bool,
}

impl SimLoadCell {
    pub fn new(clock: SimClock, model: LoadCellModel, motor: Motor) -> Self {
        Self {
            clock,
            model,
            motor,
            ignited_at: None,
            dead_weight_g: 0.0,
            failing: false,
        }
    }

    /// Put a reference mass on the stand (zero removes it)
    pub fn place_mass(&mut self, grams: f64) {
        self.dead_weight_g = grams;
    }

    /// Fire the motor now
    pub fn ignite(&mut self) {
        self.ignited_at = Some(self.clock.now_ms());
    }

    /// Make reads time out, as an unplugged amplifier would
    pub fn set_failing(&mut self, failing: bool) {
        self.failing = failing;
    }

    /// Thrust acting on the cell right now
    pub fn thrust_n(&self) -> f64 {
        match self.ignited_at {
            Some(at) => self.motor.thrust_at(self.clock.now_ms().saturating_sub(at)),
            None => 0.0,
        }
    }

    /// Raw counts for the current load
    pub fn counts(&self) -> i64 {
        let thrust_g = self.thrust_n() * 1000.0 / STANDARD_GRAVITY;
        let load_g = self.dead_weight_g + thrust_g;
        let counts = self.model.true_offset + (load_g * self.model.true_scale).round() as i64;
        counts.clamp(RAW_MIN, RAW_MAX)
    }
}

impl LoadCellSensor for SimLoadCell {
    fn read_raw(&mut self) -> Result<i64, SensorError> {
        if self.failing {
            return Err(SensorError::Timeout);
        }
        Ok(self.counts())
    }
}
