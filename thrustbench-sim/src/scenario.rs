//! Simulation driver
//!
//! Runs the control loop against the simulated bench one iteration per
//! tick, applying scripted actions when their time comes and writing every
//! message the stand sends as one JSON line.

use std::collections::VecDeque;
use std::io::{self, Write};

use thrustbench_core::command::CommandOutcome;
use thrustbench_core::config::{CalibrationParameters, CalibrationStore, ConfigError};
use thrustbench_core::state::InstrumentState;
use thrustbench_core::traits::{Clock, StoreError};
use thrustbench_core::{ControlLoop, IterationReport, SampleOutcome, StandParts};
use thrustbench_drivers::storage::MemoryStore;
use thrustbench_protocol::JsonCodec;

use crate::clock::SimClock;
use crate::config::{Action, ScriptStep, SimConfig};
use crate::links::{SimNetwork, SimTransport};
use crate::sensor::SimLoadCell;

type SimStand = ControlLoop<SimLoadCell, SimNetwork, SimTransport, MemoryStore, JsonCodec, SimClock>;

/// Simulation could not be set up or its output written
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    /// Stand configuration rejected at boot
    #[error("stand configuration rejected: {0:?}")]
    Config(ConfigError),

    /// Preloaded calibration is not usable
    #[error("stored calibration has an invalid scale")]
    InvalidCalibration,

    /// Preloaded calibration could not be stored
    #[error("cannot store calibration: {0:?}")]
    Store(StoreError),

    /// Scripted message does not fit the inbound buffer
    #[error("scripted message at {at_ms} ms is too large")]
    MessageTooLarge { at_ms: u64 },

    #[error("cannot write output: {0}")]
    Io(#[from] io::Error),
}

/// Outcome of a full run
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub iterations: u64,
    /// Messages written to the output
    pub messages: usize,
    pub readings_sent: usize,
    /// Readings lost while the transport was down
    pub readings_dropped: usize,
    /// Commands dispatched, whatever their outcome
    pub commands_handled: u32,
    /// Dispatched commands whose procedure failed
    pub commands_failed: usize,
    /// Inbound messages that were not valid commands
    pub commands_rejected: u32,
    /// Largest streamed force
    pub peak_force: f64,
    /// First and last streamed reading timestamps
    pub streamed_window_ms: Option<(u64, u64)>,
    pub calibration: CalibrationParameters,
    pub final_state: InstrumentState,
}

/// Simulated bench session
pub struct Simulation {
    clock: SimClock,
    stand: SimStand,
    script: VecDeque<ScriptStep>,
    duration_ms: u64,
    tick_ms: u64,
}

impl Simulation {
    pub fn new(config: SimConfig) -> Result<Self, SimError> {
        let clock = SimClock::new();

        let mut store = CalibrationStore::new(MemoryStore::new());
        if let Some(stored) = config.stored_calibration {
            let params = CalibrationParameters::new(stored.scale, stored.offset)
                .ok_or(SimError::InvalidCalibration)?;
            store.save(&params).map_err(SimError::Store)?;
        }

        let parts = StandParts {
            sensor: SimLoadCell::new(clock.clone(), config.load_cell, config.motor),
            network: SimNetwork::new(clock.clone(), config.network.association_delay_ms),
            transport: SimTransport::new(),
            store: store.into_inner(),
            codec: JsonCodec,
            clock: clock.clone(),
        };
        let stand = ControlLoop::new(config.stand, parts).map_err(SimError::Config)?;

        Ok(Self {
            clock,
            stand,
            script: config.script.into(),
            duration_ms: config.duration_ms,
            tick_ms: config.tick_ms.max(1),
        })
    }

    /// Current virtual time
    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    pub fn is_finished(&self) -> bool {
        self.clock.now_ms() >= self.duration_ms
    }

    pub fn stand(&self) -> &SimStand {
        &self.stand
    }

    /// Apply due actions, run one iteration and advance time
    ///
    /// Returns the iteration report and everything the stand sent.
    pub fn step(&mut self) -> Result<(IterationReport, Vec<String>), SimError> {
        self.apply_due_actions()?;
        let report = self.stand.run_iteration();
        let sent = self.stand.transport_mut().take_outbound();
        self.clock.advance(self.tick_ms);
        Ok((report, sent))
    }

    /// Run to the configured duration, writing sent messages to `out`
    pub fn run<W: Write>(&mut self, out: &mut W) -> Result<Summary, SimError> {
        let mut summary = Summary {
            iterations: 0,
            messages: 0,
            readings_sent: 0,
            readings_dropped: 0,
            commands_handled: 0,
            commands_failed: 0,
            commands_rejected: 0,
            peak_force: 0.0,
            streamed_window_ms: None,
            calibration: self.stand.calibration(),
            final_state: self.stand.state(),
        };

        while !self.is_finished() {
            let (report, sent) = self.step()?;

            for line in &sent {
                writeln!(out, "{}", line)?;
            }
            summary.messages += sent.len();

            summary.commands_failed += report
                .commands
                .iter()
                .filter(|outcome| matches!(outcome, CommandOutcome::Failed(..)))
                .count();

            match report.sample {
                SampleOutcome::Sent(reading) => {
                    summary.readings_sent += 1;
                    summary.peak_force = summary.peak_force.max(reading.force);
                    summary.streamed_window_ms = Some(match summary.streamed_window_ms {
                        Some((first, _)) => (first, reading.timestamp_ms),
                        None => (reading.timestamp_ms, reading.timestamp_ms),
                    });
                }
                SampleOutcome::Dropped(_) => summary.readings_dropped += 1,
                _ => {}
            }
        }

        out.flush()?;
        summary.iterations = self.stand.iterations();
        summary.commands_handled = self.stand.commands().handled();
        summary.commands_rejected = self.stand.commands().rejected();
        summary.calibration = self.stand.calibration();
        summary.final_state = self.stand.state();
        Ok(summary)
    }

    fn apply_due_actions(&mut self) -> Result<(), SimError> {
        let now = self.clock.now_ms();
        while self.script.front().is_some_and(|step| step.at_ms <= now) {
            let Some(step) = self.script.pop_front() else {
                break;
            };
            log::debug!("t={}ms {:?}", now, step.action);
            self.apply(step)?;
        }
        Ok(())
    }

    fn apply(&mut self, step: ScriptStep) -> Result<(), SimError> {
        match step.action {
            Action::Send { message } => {
                if !self.stand.transport_mut().deliver(&message) {
                    return Err(SimError::MessageTooLarge { at_ms: step.at_ms });
                }
            }
            Action::PlaceMass { grams } => self.stand.sensor_mut().place_mass(grams),
            Action::RemoveMass => self.stand.sensor_mut().place_mass(0.0),
            Action::Ignite => {
                log::info!("Ignition at {} ms", self.clock.now_ms());
                self.stand.sensor_mut().ignite();
            }
            Action::NetworkDown => self.stand.network_mut().set_available(false),
            Action::NetworkUp => self.stand.network_mut().set_available(true),
            Action::CollectorDown => self.stand.transport_mut().set_refusing(true),
            Action::CollectorUp => self.stand.transport_mut().set_refusing(false),
            Action::SensorFault => self.stand.sensor_mut().set_failing(true),
            Action::SensorRecovered => self.stand.sensor_mut().set_failing(false),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoredCalibration;
    use thrustbench_core::connectivity::LinkState;

    fn run(config: SimConfig) -> (Summary, Vec<String>) {
        let mut sim = Simulation::new(config).unwrap();
        let mut out = Vec::new();
        let summary = sim.run(&mut out).unwrap();
        let lines = String::from_utf8(out)
            .unwrap()
            .lines()
            .map(str::to_owned)
            .collect();
        (summary, lines)
    }

    #[test]
    fn test_default_session_recovers_load_cell() {
        let (summary, lines) = run(SimConfig::default());

        assert_eq!(summary.calibration.offset(), 84_000);
        assert!((summary.calibration.scale() - 420.0).abs() < 1e-9);
        assert_eq!(summary.commands_handled, 4);
        assert_eq!(summary.commands_failed, 0);
        assert_eq!(summary.commands_rejected, 0);
        assert_eq!(summary.final_state, InstrumentState::Idle);

        assert!(lines[0].starts_with(r#"{"type":"status","state":"idle""#));
        assert!(lines.contains(&r#"{"type":"ack","command":"tare","ok":true}"#.to_owned()));
        assert!(lines.contains(&r#"{"type":"ack","command":"calibrate","ok":true}"#.to_owned()));
    }

    #[test]
    fn test_peak_force_matches_motor() {
        let (summary, _) = run(SimConfig::default());
        // Sampling misses the exact peak by at most a period
        assert!(summary.peak_force > 0.95 * 50.0, "{}", summary.peak_force);
        assert!(summary.peak_force < 50.1, "{}", summary.peak_force);
    }

    #[test]
    fn test_readings_only_while_testing() {
        let config = SimConfig::default();
        let (summary, lines) = run(config);

        let (first, last) = summary.streamed_window_ms.unwrap();
        assert!(first >= 2_000);
        assert!(last <= 5_000);
        // 3 s at a 12 ms period
        assert!(summary.readings_sent >= 240 && summary.readings_sent <= 251);
        let readings = lines.iter().filter(|l| l.contains(r#""type":"reading""#)).count();
        assert_eq!(readings, summary.readings_sent);
    }

    #[test]
    fn test_stored_calibration_used_at_boot() {
        let config = SimConfig {
            duration_ms: 500,
            stored_calibration: Some(StoredCalibration {
                scale: 420.0,
                offset: 84_000,
            }),
            script: vec![
                ScriptStep::new(
                    300,
                    Action::Send {
                        message: r#"{"type":"start_test"}"#.into(),
                    },
                ),
                ScriptStep::new(300, Action::PlaceMass { grams: 1_000.0 }),
            ],
            ..SimConfig::default()
        };
        let (summary, _) = run(config);
        assert_eq!(summary.calibration.offset(), 84_000);
        // 1 kg dead weight reads as its weight in newtons
        assert!((summary.peak_force - 9.81).abs() < 0.01);
        assert_eq!(summary.final_state, InstrumentState::Testing);
    }

    #[test]
    fn test_bad_commands_counted() {
        let mut config = SimConfig::default();
        config.script.push(ScriptStep::new(
            600,
            Action::Send {
                message: r#"{"type":"self_destruct"}"#.into(),
            },
        ));
        config.script.push(ScriptStep::new(
            700,
            Action::Send {
                message: r#"{"type":"calibrate","known_mass":0}"#.into(),
            },
        ));
        config.script.sort_by_key(|s| s.at_ms);

        let (summary, lines) = run(config);
        assert_eq!(summary.commands_handled, 5);
        assert_eq!(summary.commands_failed, 1);
        assert_eq!(summary.commands_rejected, 1);
        assert!(lines.contains(
            &r#"{"type":"ack","command":"self_destruct","ok":false,"error":"unknown_command"}"#
                .to_owned()
        ));
    }

    #[test]
    fn test_sim_error_messages() {
        assert_eq!(
            SimError::MessageTooLarge { at_ms: 40 }.to_string(),
            "scripted message at 40 ms is too large"
        );
        let io = SimError::from(io::Error::new(io::ErrorKind::BrokenPipe, "closed"));
        assert!(matches!(io, SimError::Io(_)));
        assert_eq!(io.to_string(), "cannot write output: closed");
    }

    #[test]
    fn test_invalid_stored_calibration() {
        let config = SimConfig {
            stored_calibration: Some(StoredCalibration {
                scale: 0.0,
                offset: 0,
            }),
            ..SimConfig::default()
        };
        assert!(matches!(
            Simulation::new(config),
            Err(SimError::InvalidCalibration)
        ));
    }

    #[test]
    fn test_invalid_stand_config() {
        let mut config = SimConfig::default();
        config.stand.sampling_period_ms = 0;
        assert!(matches!(Simulation::new(config), Err(SimError::Config(_))));
    }

    #[test]
    fn test_collector_outage_drops_readings() {
        let mut config = SimConfig::default();
        config.script.push(ScriptStep::new(3_000, Action::CollectorDown));
        config.script.push(ScriptStep::new(3_200, Action::CollectorUp));
        config.script.sort_by_key(|s| s.at_ms);

        let (summary, lines) = run(config);
        assert!(summary.readings_dropped > 0);
        // A fresh status follows the reconnect
        let statuses = lines.iter().filter(|l| l.contains(r#""type":"status""#)).count();
        assert_eq!(statuses, 2);
        assert_eq!(summary.final_state, InstrumentState::Idle);
    }

    #[test]
    fn test_sensor_fault_skips_samples() {
        let mut config = SimConfig::default();
        config.script.push(ScriptStep::new(3_000, Action::SensorFault));
        config.script.push(ScriptStep::new(3_100, Action::SensorRecovered));
        config.script.sort_by_key(|s| s.at_ms);

        let mut sim = Simulation::new(config).unwrap();
        let mut skipped = 0;
        while !sim.is_finished() {
            let (report, _) = sim.step().unwrap();
            if matches!(report.sample, SampleOutcome::Skipped(_)) {
                skipped += 1;
            }
        }
        assert!(skipped >= 8 && skipped <= 9, "{}", skipped);
    }

    #[test]
    fn test_link_comes_up_after_association_delay() {
        let mut sim = Simulation::new(SimConfig::default()).unwrap();
        while sim.now_ms() < 199 {
            sim.step().unwrap();
        }
        assert_eq!(sim.stand().network_state(), LinkState::Connecting);
        while sim.now_ms() <= 200 {
            sim.step().unwrap();
        }
        assert_eq!(sim.stand().network_state(), LinkState::Up);
        assert_eq!(sim.stand().transport_state(), LinkState::Up);
    }
}
