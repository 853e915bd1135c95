//! Simulation configuration
//!
//! Loaded from TOML. Every section is optional; an empty file runs the
//! built-in bench session (tare, calibrate with a 100 g reference, one
//! motor burn).
//!
//! ```toml
//! duration_ms = 6000
//!
//! [motor]
//! profile = "regressive"
//! peak_thrust_n = 80.0
//!
//! [[script]]
//! at_ms = 500
//! action = "send"
//! message = '{"type":"tare"}'
//! ```

use std::path::Path;

use serde::Deserialize;
use thrustbench_core::config::StandConfig;

use crate::motor::Motor;
use crate::sensor::LoadCellModel;

/// Reference mass used by the built-in session
const REFERENCE_MASS_G: f64 = 100.0;

/// Calibration already in storage when the stand boots
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct StoredCalibration {
    pub scale: f64,
    pub offset: i64,
}

/// Simulated access point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SimNetworkConfig {
    /// Delay between the association request and the link coming up
    pub association_delay_ms: u64,
}

impl Default for SimNetworkConfig {
    fn default() -> Self {
        Self {
            association_delay_ms: 200,
        }
    }
}

/// Something the operator or the environment does
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    /// Collector sends a raw message
    Send { message: String },
    /// Put a reference mass on the stand
    PlaceMass { grams: f64 },
    /// Take the reference mass off
    RemoveMass,
    /// Fire the motor
    Ignite,
    /// Access point disappears
    NetworkDown,
    /// Access point is back
    NetworkUp,
    /// Collector stops accepting sessions
    CollectorDown,
    /// Collector accepts sessions again
    CollectorUp,
    /// Amplifier stops answering
    SensorFault,
    /// Amplifier answers again
    SensorRecovered,
}

/// Scripted action at a point in virtual time
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ScriptStep {
    pub at_ms: u64,
    #[serde(flatten)]
    pub action: Action,
}

impl ScriptStep {
    pub fn new(at_ms: u64, action: Action) -> Self {
        Self { at_ms, action }
    }

    fn send(at_ms: u64, message: &str) -> Self {
        Self::new(
            at_ms,
            Action::Send {
                message: message.into(),
            },
        )
    }
}

/// Complete simulation setup
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Virtual time to simulate
    pub duration_ms: u64,
    /// Virtual time between loop iterations
    pub tick_ms: u64,
    pub stand: StandConfig,
    pub motor: Motor,
    pub load_cell: LoadCellModel,
    pub network: SimNetworkConfig,
    pub stored_calibration: Option<StoredCalibration>,
    pub script: Vec<ScriptStep>,
}

impl Default for SimConfig {
    fn default() -> Self {
        let motor = Motor::default();
        let ignition_ms = 2_500;
        let stop_ms = ignition_ms + motor.burnout_ms() + 500;

        Self {
            duration_ms: stop_ms + 1_000,
            tick_ms: 1,
            stand: default_stand(),
            motor,
            load_cell: LoadCellModel::default(),
            network: SimNetworkConfig::default(),
            stored_calibration: None,
            script: vec![
                ScriptStep::send(500, r#"{"type":"tare"}"#),
                ScriptStep::new(
                    1_000,
                    Action::PlaceMass {
                        grams: REFERENCE_MASS_G,
                    },
                ),
                ScriptStep::send(1_200, r#"{"type":"calibrate","known_mass":100}"#),
                ScriptStep::new(1_500, Action::RemoveMass),
                ScriptStep::send(2_000, r#"{"type":"start_test"}"#),
                ScriptStep::new(ignition_ms, Action::Ignite),
                ScriptStep::send(stop_ms, r#"{"type":"stop_test"}"#),
            ],
        }
    }
}

impl SimConfig {
    /// Parse a TOML document
    pub fn from_toml(text: &str) -> Result<Self, ConfigFileError> {
        let mut config: SimConfig = toml::from_str(text)?;
        config.script.sort_by_key(|step| step.at_ms);
        Ok(config)
    }

    /// Read and parse a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigFileError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }
}

/// Stand settings for the simulated bench network
fn default_stand() -> StandConfig {
    let mut stand = StandConfig::default();
    // Both fit their capacity
    let _ = stand.network.credentials.ssid.push_str("thrustbench");
    let _ = stand.transport.endpoint.host.push_str("collector.local");
    stand
}

/// Configuration file could not be used
#[derive(Debug, thiserror::Error)]
pub enum ConfigFileError {
    #[error("cannot read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),
}
