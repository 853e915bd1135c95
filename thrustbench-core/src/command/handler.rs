//! Command protocol handler
//!
//! Pulls one inbound message per [`CommandHandler::poll`] call, decodes it
//! with the configured codec, and dispatches decoded commands
//! synchronously. Decode failures are reported and leave the run mode
//! unchanged.

use thrustbench_protocol::{Ack, Command, DecodeError, MessageCodec};

use crate::calibration::{CalibrationEngine, EngineError};
use crate::config::CalibrationStore;
use crate::state::{Event, InstrumentState};
use crate::traits::{Clock, KeyValueStore, LoadCellSensor, TransportSession};

/// Result of handling one inbound message
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CommandOutcome {
    /// Command executed
    Applied(Command),
    /// Command decoded but its procedure failed
    Failed(Command, EngineError),
    /// Message could not be turned into a command
    Rejected(DecodeError),
}

impl CommandOutcome {
    /// Acknowledgment for the collector
    pub fn ack(&self) -> Ack<'_> {
        match self {
            CommandOutcome::Applied(cmd) => Ack::ok(cmd.name()),
            CommandOutcome::Failed(cmd, e) => Ack::failed(cmd.name(), e.reason()),
            CommandOutcome::Rejected(DecodeError::UnknownCommand { name }) => {
                Ack::failed(name.as_str(), "unknown_command")
            }
            CommandOutcome::Rejected(e) => Ack::failed("unknown", e.reason()),
        }
    }
}

/// Decodes and dispatches collector commands
pub struct CommandHandler {
    tare_samples: u16,
    handled: u32,
    rejected: u32,
}

impl CommandHandler {
    /// Create a handler; tare averages `tare_samples` reads
    pub const fn new(tare_samples: u16) -> Self {
        Self {
            tare_samples,
            handled: 0,
            rejected: 0,
        }
    }

    /// Commands dispatched so far (successful or not)
    pub fn handled(&self) -> u32 {
        self.handled
    }

    /// Messages that failed to decode
    pub fn rejected(&self) -> u32 {
        self.rejected
    }

    /// Take and decode the next inbound message
    ///
    /// Returns `None` when nothing is buffered.
    pub fn poll<T, D>(&mut self, transport: &mut T, codec: &D) -> Option<Result<Command, DecodeError>>
    where
        T: TransportSession,
        D: MessageCodec,
    {
        let message = transport.poll()?;
        let decoded = codec.decode(&message);
        if let Err(e) = &decoded {
            self.rejected = self.rejected.wrapping_add(1);
            warn!("Rejected inbound message: {:?}", e);
        }
        Some(decoded)
    }

    /// Execute one command to completion
    pub fn dispatch<S, K, C>(
        &mut self,
        command: Command,
        state: &mut InstrumentState,
        engine: &mut CalibrationEngine,
        sensor: &mut S,
        store: &mut CalibrationStore<K>,
        clock: &C,
    ) -> Result<(), EngineError>
    where
        S: LoadCellSensor,
        K: KeyValueStore,
        C: Clock,
    {
        self.handled = self.handled.wrapping_add(1);
        if command.is_procedure() {
            debug!("Running {} procedure", command.name());
        }

        let result = match command {
            Command::Tare => engine.tare(self.tare_samples, sensor, store, clock),
            Command::Calibrate { known_mass } => {
                engine.calibrate(known_mass, state, sensor, store, clock)
            }
            Command::StartTest => {
                *state = state.transition(Event::StartTest);
                Ok(())
            }
            Command::StopTest => {
                *state = state.transition(Event::StopTest);
                Ok(())
            }
        };

        match &result {
            Ok(()) => info!("Command {} done, state={:?}", command.name(), *state),
            Err(e) => warn!("Command {} failed: {:?}", command.name(), e),
        }
        result
    }
}
