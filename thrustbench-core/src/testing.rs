//! Test doubles for the collaborator traits

use std::cell::Cell;
use std::collections::{BTreeMap, VecDeque};
use std::rc::Rc;
use std::string::String;
use std::vec::Vec;

use thrustbench_protocol::InboundMessage;

use crate::config::{Credentials, Endpoint};
use crate::traits::{
    Clock, KeyValueStore, LoadCellSensor, NetworkLink, SensorError, StorageKey, StoreError,
    TransportError, TransportSession,
};

/// Clock advanced by hand; clones share the same time
#[derive(Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<u64>>,
}

impl ManualClock {
    pub fn new(now: u64) -> Self {
        Self {
            now: Rc::new(Cell::new(now)),
        }
    }

    pub fn set(&self, now: u64) {
        self.now.set(now);
    }

    pub fn advance(&self, ms: u64) {
        self.now.set(self.now.get() + ms);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.get()
    }
}

/// Scripted load cell
pub struct FakeSensor {
    script: VecDeque<Result<i64, SensorError>>,
    fallback: Result<i64, SensorError>,
    read_cost: Option<(ManualClock, u64)>,
    pub reads: usize,
}

impl FakeSensor {
    /// Always reads `value`
    pub fn constant(value: i64) -> Self {
        Self {
            script: VecDeque::new(),
            fallback: Ok(value),
            read_cost: None,
            reads: 0,
        }
    }

    /// Always fails with `error`
    pub fn failing(error: SensorError) -> Self {
        Self {
            fallback: Err(error),
            ..Self::constant(0)
        }
    }

    /// Plays `script`, then reports `NotReady`
    pub fn sequence(script: &[Result<i64, SensorError>]) -> Self {
        Self {
            script: script.iter().copied().collect(),
            ..Self::failing(SensorError::NotReady)
        }
    }

    /// Each read advances `clock` by `ms`
    pub fn advancing(mut self, clock: &ManualClock, ms: u64) -> Self {
        self.read_cost = Some((clock.clone(), ms));
        self
    }

    pub fn set_value(&mut self, value: i64) {
        self.fallback = Ok(value);
    }

    pub fn set_failing(&mut self, error: SensorError) {
        self.fallback = Err(error);
    }
}

impl LoadCellSensor for FakeSensor {
    fn read_raw(&mut self) -> Result<i64, SensorError> {
        self.reads += 1;
        if let Some((clock, ms)) = &self.read_cost {
            clock.advance(*ms);
        }
        self.script.pop_front().unwrap_or(self.fallback)
    }
}

/// Network link whose association is set by the test
#[derive(Default)]
pub struct FakeNetwork {
    pub associated: bool,
    /// Associate immediately when asked
    pub associate_on_begin: bool,
    pub begin_calls: usize,
    pub last_ssid: String,
}

impl NetworkLink for FakeNetwork {
    fn is_associated(&mut self) -> bool {
        self.associated
    }

    fn begin_association(&mut self, credentials: &Credentials) {
        self.begin_calls += 1;
        self.last_ssid = credentials.ssid.as_str().into();
        if self.associate_on_begin {
            self.associated = true;
        }
    }
}

/// Transport session recording everything sent
#[derive(Default)]
pub struct FakeTransport {
    pub open: bool,
    /// Outcomes for upcoming `open` calls; refused once empty unless `accept_open`
    pub open_results: VecDeque<Result<(), TransportError>>,
    pub accept_open: bool,
    pub open_calls: usize,
    pub fail_sends: bool,
    pub sent: Vec<String>,
    pub inbound: VecDeque<InboundMessage>,
    pub polls: usize,
    pub closes: usize,
}

impl FakeTransport {
    pub fn accepting() -> Self {
        Self {
            accept_open: true,
            ..Self::default()
        }
    }

    pub fn push_inbound(&mut self, payload: &str) {
        let mut message = InboundMessage::new();
        message.extend_from_slice(payload.as_bytes()).unwrap();
        self.inbound.push_back(message);
    }

    /// Sent messages containing `needle`
    pub fn sent_matching(&self, needle: &str) -> Vec<&str> {
        self.sent
            .iter()
            .filter(|m| m.contains(needle))
            .map(String::as_str)
            .collect()
    }
}

impl TransportSession for FakeTransport {
    fn is_open(&mut self) -> bool {
        self.open
    }

    fn open(&mut self, _endpoint: &Endpoint) -> Result<(), TransportError> {
        self.open_calls += 1;
        let result = match self.open_results.pop_front() {
            Some(result) => result,
            None if self.accept_open => Ok(()),
            None => Err(TransportError::Refused),
        };
        self.open = result.is_ok();
        result
    }

    fn send(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        if !self.open {
            return Err(TransportError::Closed);
        }
        if self.fail_sends {
            self.open = false;
            return Err(TransportError::Io);
        }
        self.sent.push(String::from_utf8_lossy(payload).into_owned());
        Ok(())
    }

    fn poll(&mut self) -> Option<InboundMessage> {
        self.polls += 1;
        self.inbound.pop_front()
    }

    fn close(&mut self) {
        self.closes += 1;
        self.open = false;
    }
}

/// In-memory store with injectable failures
#[derive(Default)]
pub struct MemStore {
    values: BTreeMap<StorageKey, Vec<u8>>,
    pub fail_reads: bool,
    pub fail_writes: bool,
    pub puts: usize,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn value_mut(&mut self, key: StorageKey) -> Option<&mut Vec<u8>> {
        self.values.get_mut(&key)
    }
}

impl KeyValueStore for MemStore {
    fn get(&mut self, key: StorageKey, buffer: &mut [u8]) -> Result<Option<usize>, StoreError> {
        if self.fail_reads {
            return Err(StoreError::Storage);
        }
        match self.values.get(&key) {
            Some(value) => {
                let target = buffer
                    .get_mut(..value.len())
                    .ok_or(StoreError::BufferTooSmall)?;
                target.copy_from_slice(value);
                Ok(Some(value.len()))
            }
            None => Ok(None),
        }
    }

    fn put(&mut self, key: StorageKey, data: &[u8]) -> Result<(), StoreError> {
        if self.fail_writes {
            return Err(StoreError::Storage);
        }
        self.puts += 1;
        self.values.insert(key, data.to_vec());
        Ok(())
    }
}
