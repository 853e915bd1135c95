//! Sampling scheduler
//!
//! Fires when at least one sampling period has passed since the previous
//! fire. The reference time moves to the actual fire time, so a late
//! iteration delays the following sample instead of causing a burst.

use thrustbench_protocol::ReadingMessage;

use crate::calibration::{CalibrationEngine, EngineError};
use crate::state::InstrumentState;
use crate::traits::{LoadCellSensor, SensorError};

/// One converted sample
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Reading {
    /// Clock time of the sample (ms since boot)
    pub timestamp_ms: u64,
    pub raw: i64,
    pub force: f64,
}

impl Reading {
    /// Wire form of this reading
    pub fn to_message(&self) -> ReadingMessage {
        ReadingMessage {
            timestamp: self.timestamp_ms,
            force: self.force,
            raw: self.raw,
        }
    }
}

/// Why a due sample produced no reading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SampleError {
    Sensor(SensorError),
    Conversion(EngineError),
}

/// Decides when to sample and whether a reading is streamed
pub struct SamplingScheduler {
    period_ms: u64,
    oversample: u16,
    emit_when_idle: bool,
    last_sample_ms: Option<u64>,
    consecutive_failures: u32,
}

impl SamplingScheduler {
    pub fn new(period_ms: u32, oversample: u16, emit_when_idle: bool) -> Self {
        Self {
            period_ms: u64::from(period_ms),
            oversample,
            emit_when_idle,
            last_sample_ms: None,
            consecutive_failures: 0,
        }
    }

    /// Time of the last fire, if any
    pub fn last_sample_ms(&self) -> Option<u64> {
        self.last_sample_ms
    }

    /// Whether a sample is due at `now_ms`
    pub fn is_due(&self, now_ms: u64) -> bool {
        match self.last_sample_ms {
            None => true,
            Some(last) => now_ms.saturating_sub(last) >= self.period_ms,
        }
    }

    /// Whether readings taken in `state` go to the collector
    pub fn should_emit(&self, state: InstrumentState) -> bool {
        match state {
            InstrumentState::Testing => true,
            InstrumentState::Idle => self.emit_when_idle,
            InstrumentState::Calibrating => false,
        }
    }

    /// Sample if due
    ///
    /// A failed read still counts as a fire; the next attempt waits a full
    /// period.
    pub fn tick<S: LoadCellSensor>(
        &mut self,
        now_ms: u64,
        sensor: &mut S,
        engine: &CalibrationEngine,
    ) -> Result<Option<Reading>, SampleError> {
        if !self.is_due(now_ms) {
            return Ok(None);
        }
        self.last_sample_ms = Some(now_ms);

        let raw = match sensor.read_raw_averaged(self.oversample) {
            Ok(raw) => raw,
            Err(e) => {
                self.consecutive_failures = self.consecutive_failures.saturating_add(1);
                if self.consecutive_failures == 1 {
                    warn!("Skipping samples: sensor {:?}", e);
                }
                return Err(SampleError::Sensor(e));
            }
        };
        if self.consecutive_failures > 0 {
            info!(
                "Sensor recovered after {} skipped samples",
                self.consecutive_failures
            );
            self.consecutive_failures = 0;
        }

        let force = engine.to_force(raw).map_err(SampleError::Conversion)?;
        Ok(Some(Reading {
            timestamp_ms: now_ms,
            raw,
            force,
        }))
    }
}
