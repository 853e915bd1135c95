//! Control loop
//!
//! One iteration, in order:
//! 1. reconcile connectivity
//! 2. drain a bounded number of inbound commands
//! 3. tick the sampler
//!
//! Commands therefore take effect before the sample of the same iteration.
//! Nothing is sent while the transport is down; readings produced in that
//! window are dropped.

use heapless::Vec;
use thrustbench_protocol::{
    EncodeError, MessageCodec, OutboundMessage, StatusMessage, MAX_MESSAGE_SIZE,
};

use crate::calibration::CalibrationEngine;
use crate::command::{CommandHandler, CommandOutcome};
use crate::config::{
    CalibrationParameters, CalibrationStore, ConfigError, StandConfig,
    MAX_COMMANDS_PER_ITERATION,
};
use crate::connectivity::{ConnectivityReport, ConnectivitySupervisor, LinkState};
use crate::sampler::{Reading, SampleError, SamplingScheduler};
use crate::state::InstrumentState;
use crate::traits::{
    Clock, KeyValueStore, LoadCellSensor, NetworkLink, TransportError, TransportSession,
};

/// Collaborators handed to the control loop at boot
pub struct StandParts<S, N, T, K, D, C> {
    pub sensor: S,
    pub network: N,
    pub transport: T,
    pub store: K,
    pub codec: D,
    pub clock: C,
}

/// What happened to the sampler this iteration
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SampleOutcome {
    /// Sampling period not yet elapsed
    NotDue,
    /// Due sample produced no reading
    Skipped(SampleError),
    /// Reading taken but not streamed in the current run mode
    Recorded(Reading),
    /// Reading discarded because the transport is down
    Dropped(Reading),
    /// Reading sent to the collector
    Sent(Reading),
}

/// Summary of one loop iteration
#[derive(Debug, Clone, PartialEq)]
pub struct IterationReport {
    pub connectivity: ConnectivityReport,
    pub commands: Vec<CommandOutcome, MAX_COMMANDS_PER_ITERATION>,
    pub sample: SampleOutcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
enum SendError {
    NotConnected,
    Encode(EncodeError),
    Transport(TransportError),
}

/// Top-level cooperative driver owning all instrument state
pub struct ControlLoop<S, N, T, K, D, C> {
    sensor: S,
    network: N,
    transport: T,
    store: CalibrationStore<K>,
    codec: D,
    clock: C,
    state: InstrumentState,
    engine: CalibrationEngine,
    supervisor: ConnectivitySupervisor,
    commands: CommandHandler,
    sampler: SamplingScheduler,
    command_budget: usize,
    tx_buffer: [u8; MAX_MESSAGE_SIZE],
    iterations: u64,
}

impl<S, N, T, K, D, C> ControlLoop<S, N, T, K, D, C>
where
    S: LoadCellSensor,
    N: NetworkLink,
    T: TransportSession,
    K: KeyValueStore,
    D: MessageCodec,
    C: Clock,
{
    /// Boot: validate configuration and load the stored calibration
    pub fn new(config: StandConfig, parts: StandParts<S, N, T, K, D, C>) -> Result<Self, ConfigError> {
        config.validate()?;

        let mut store = CalibrationStore::new(parts.store);
        let params = store.load();

        info!(
            "Stand ready: period={}ms scale={} offset={}",
            config.sampling_period_ms,
            params.scale(),
            params.offset()
        );

        Ok(Self {
            sensor: parts.sensor,
            network: parts.network,
            transport: parts.transport,
            store,
            codec: parts.codec,
            clock: parts.clock,
            state: InstrumentState::Idle,
            engine: CalibrationEngine::new(params, &config),
            supervisor: ConnectivitySupervisor::new(config.network.clone(), config.transport.clone()),
            commands: CommandHandler::new(config.tare_samples),
            sampler: SamplingScheduler::new(
                config.sampling_period_ms,
                config.oversample,
                config.emit_when_idle,
            ),
            command_budget: usize::from(config.max_commands_per_iteration)
                .min(MAX_COMMANDS_PER_ITERATION),
            tx_buffer: [0; MAX_MESSAGE_SIZE],
            iterations: 0,
        })
    }

    /// Run forever
    pub fn run(&mut self) -> ! {
        loop {
            self.run_iteration();
        }
    }

    /// Run one non-blocking pass
    pub fn run_iteration(&mut self) -> IterationReport {
        self.iterations = self.iterations.wrapping_add(1);

        let connectivity = self
            .supervisor
            .tick(&mut self.network, &mut self.transport, &self.clock);
        if connectivity.transport_came_up() {
            self.send_status();
        }

        let commands = self.drain_commands();

        let now = self.clock.now_ms();
        let sample = self.tick_sampler(now);

        IterationReport {
            connectivity,
            commands,
            sample,
        }
    }

    /// Current run mode
    pub fn state(&self) -> InstrumentState {
        self.state
    }

    /// Live calibration
    pub fn calibration(&self) -> CalibrationParameters {
        self.engine.parameters()
    }

    pub fn network_state(&self) -> LinkState {
        self.supervisor.network_state()
    }

    pub fn transport_state(&self) -> LinkState {
        self.supervisor.transport_state()
    }

    /// Iterations run since boot
    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    /// Command counters
    pub fn commands(&self) -> &CommandHandler {
        &self.commands
    }

    pub fn sensor_mut(&mut self) -> &mut S {
        &mut self.sensor
    }

    pub fn network_mut(&mut self) -> &mut N {
        &mut self.network
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn store_mut(&mut self) -> &mut K {
        self.store.backend_mut()
    }

    fn drain_commands(&mut self) -> Vec<CommandOutcome, MAX_COMMANDS_PER_ITERATION> {
        let mut outcomes = Vec::new();

        for _ in 0..self.command_budget {
            if !self.supervisor.transport_up() {
                break;
            }
            let Some(decoded) = self.commands.poll(&mut self.transport, &self.codec) else {
                break;
            };

            let outcome = match decoded {
                Ok(command) => match self.commands.dispatch(
                    command,
                    &mut self.state,
                    &mut self.engine,
                    &mut self.sensor,
                    &mut self.store,
                    &self.clock,
                ) {
                    Ok(()) => CommandOutcome::Applied(command),
                    Err(e) => CommandOutcome::Failed(command, e),
                },
                Err(e) => CommandOutcome::Rejected(e),
            };

            if let Err(e) = self.send(&OutboundMessage::Ack(outcome.ack())) {
                debug!("Ack not sent: {:?}", e);
            }
            // Capacity is the loop bound
            let _ = outcomes.push(outcome);
        }

        outcomes
    }

    fn tick_sampler(&mut self, now: u64) -> SampleOutcome {
        let reading = match self.sampler.tick(now, &mut self.sensor, &self.engine) {
            Ok(Some(reading)) => reading,
            Ok(None) => return SampleOutcome::NotDue,
            Err(e) => return SampleOutcome::Skipped(e),
        };

        if !self.sampler.should_emit(self.state) {
            return SampleOutcome::Recorded(reading);
        }

        match self.send(&OutboundMessage::Reading(reading.to_message())) {
            Ok(()) => SampleOutcome::Sent(reading),
            Err(_) => SampleOutcome::Dropped(reading),
        }
    }

    fn send_status(&mut self) {
        let params = self.engine.parameters();
        let status = StatusMessage {
            state: self.state.as_str(),
            scale: params.scale(),
            offset: params.offset(),
        };
        if let Err(e) = self.send(&OutboundMessage::Status(status)) {
            debug!("Status not sent: {:?}", e);
        }
    }

    fn send(&mut self, message: &OutboundMessage<'_>) -> Result<(), SendError> {
        if !self.supervisor.transport_up() {
            return Err(SendError::NotConnected);
        }

        let len = self
            .codec
            .encode(message, &mut self.tx_buffer)
            .map_err(|e| {
                error!("Encode failed: {:?}", e);
                SendError::Encode(e)
            })?;

        let payload = self.tx_buffer.get(..len).ok_or(SendError::Encode(EncodeError::BufferTooSmall))?;
        match self.transport.send(payload) {
            Ok(()) => Ok(()),
            Err(e) => {
                self.transport.close();
                self.supervisor.mark_transport_lost(&self.clock);
                Err(SendError::Transport(e))
            }
        }
    }
}
