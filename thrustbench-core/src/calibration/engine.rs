//! Calibration engine
//!
//! Owns the live [`CalibrationParameters`]. Procedures persist a candidate
//! first and commit it in memory only after the store accepted it, so the
//! sampler never converts with a value that would not survive a reset.

use crate::config::{CalibrationParameters, CalibrationStore, StandConfig};
use crate::state::{Event, InstrumentState};
use crate::traits::{Clock, KeyValueStore, LoadCellSensor, SensorError, StoreError};

/// Calibration procedure errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EngineError {
    /// Argument out of range (non-positive mass, zero sample count)
    InvalidInput,
    /// Parameters would make conversion undefined
    InvalidCalibration,
    /// Sensor failed or the procedure ran out of time
    SensorUnavailable(SensorError),
    /// Persisting the new parameters failed
    Store(StoreError),
}

impl EngineError {
    /// Short reason used in acknowledgments
    pub fn reason(&self) -> &'static str {
        match self {
            EngineError::InvalidInput => "invalid_input",
            EngineError::InvalidCalibration => "invalid_calibration",
            EngineError::SensorUnavailable(_) => "sensor_unavailable",
            EngineError::Store(_) => "store_failed",
        }
    }
}

impl From<SensorError> for EngineError {
    fn from(e: SensorError) -> Self {
        EngineError::SensorUnavailable(e)
    }
}

impl From<StoreError> for EngineError {
    fn from(e: StoreError) -> Self {
        EngineError::Store(e)
    }
}

/// Two-point linear calibration
pub struct CalibrationEngine {
    params: CalibrationParameters,
    mass_to_force: f64,
    calibration_samples: u16,
    procedure_timeout_ms: u32,
}

impl CalibrationEngine {
    /// Create an engine around loaded parameters
    pub fn new(params: CalibrationParameters, config: &StandConfig) -> Self {
        Self {
            params,
            mass_to_force: config.mass_to_force,
            calibration_samples: config.calibration_samples,
            procedure_timeout_ms: config.procedure_timeout_ms,
        }
    }

    /// Live (committed) parameters
    pub fn parameters(&self) -> CalibrationParameters {
        self.params
    }

    /// Convert raw counts to force
    pub fn to_force(&self, raw: i64) -> Result<f64, EngineError> {
        let scale = self.params.scale();
        if scale == 0.0 || !scale.is_finite() {
            return Err(EngineError::InvalidCalibration);
        }
        let force = ((raw as f64 - self.params.offset() as f64) / scale) * self.mass_to_force;
        if !force.is_finite() {
            return Err(EngineError::InvalidCalibration);
        }
        Ok(force)
    }

    /// Zero the load cell at the current reading
    ///
    /// Averages `sample_count` reads and commits the mean as the new offset
    /// once it is stored. The scale is untouched.
    pub fn tare<S, K, C>(
        &mut self,
        sample_count: u16,
        sensor: &mut S,
        store: &mut CalibrationStore<K>,
        clock: &C,
    ) -> Result<(), EngineError>
    where
        S: LoadCellSensor,
        K: KeyValueStore,
        C: Clock,
    {
        let average = self.average(sample_count, sensor, clock)?;
        let candidate = self.params.with_offset(average);
        store.save(&candidate)?;
        self.params = candidate;
        info!("Tare complete: offset={}", average);
        Ok(())
    }

    /// Derive the scale from a known reference mass
    ///
    /// Runs under [`InstrumentState::Calibrating`] and always leaves the
    /// instrument [`InstrumentState::Idle`]. A non-positive mass is rejected
    /// before the run mode changes.
    pub fn calibrate<S, K, C>(
        &mut self,
        known_mass: f64,
        state: &mut InstrumentState,
        sensor: &mut S,
        store: &mut CalibrationStore<K>,
        clock: &C,
    ) -> Result<(), EngineError>
    where
        S: LoadCellSensor,
        K: KeyValueStore,
        C: Clock,
    {
        if !known_mass.is_finite() || known_mass <= 0.0 {
            return Err(EngineError::InvalidInput);
        }

        *state = state.transition(Event::CalibrationStarted);
        let result = self.run_calibration(known_mass, sensor, store, clock);
        *state = state.transition(Event::CalibrationFinished);
        result
    }

    fn run_calibration<S, K, C>(
        &mut self,
        known_mass: f64,
        sensor: &mut S,
        store: &mut CalibrationStore<K>,
        clock: &C,
    ) -> Result<(), EngineError>
    where
        S: LoadCellSensor,
        K: KeyValueStore,
        C: Clock,
    {
        let average = self.average(self.calibration_samples, sensor, clock)?;
        let scale = (average as f64 - self.params.offset() as f64) / known_mass;
        let candidate = self
            .params
            .with_scale(scale)
            .ok_or(EngineError::InvalidCalibration)?;
        store.save(&candidate)?;
        self.params = candidate;
        info!("Calibration complete: scale={}", scale);
        Ok(())
    }

    /// Mean of `count` reads, bounded by the procedure timeout
    fn average<S: LoadCellSensor, C: Clock>(
        &self,
        count: u16,
        sensor: &mut S,
        clock: &C,
    ) -> Result<i64, EngineError> {
        if count == 0 {
            return Err(EngineError::InvalidInput);
        }
        let deadline = clock
            .now_ms()
            .saturating_add(u64::from(self.procedure_timeout_ms));

        let mut sum: i128 = 0;
        for _ in 0..count {
            if clock.now_ms() >= deadline {
                warn!("Calibration procedure timed out");
                return Err(EngineError::SensorUnavailable(SensorError::Timeout));
            }
            sum += i128::from(sensor.read_raw()?);
        }
        Ok((sum / i128::from(count)) as i64)
    }
}
