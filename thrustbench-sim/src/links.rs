//! Simulated network link and collector session
//!
//! The collector side is scripted: the driver pushes commands into the
//! session and collects what the stand sends.

use std::collections::VecDeque;

use thrustbench_core::config::{Credentials, Endpoint};
use thrustbench_core::traits::{Clock, NetworkLink, TransportError, TransportSession};
use thrustbench_protocol::InboundMessage;

use crate::clock::SimClock;

/// Network that associates a fixed time after being asked
pub struct SimNetwork {
    clock: SimClock,
    association_delay_ms: u64,
    requested_at: Option<u64>,
    available: bool,
}

impl SimNetwork {
    pub fn new(clock: SimClock, association_delay_ms: u64) -> Self {
        Self {
            clock,
            association_delay_ms,
            requested_at: None,
            available: true,
        }
    }

    /// Take the access point away or bring it back
    pub fn set_available(&mut self, available: bool) {
        self.available = available;
        if !available {
            self.requested_at = None;
        }
    }
}

impl NetworkLink for SimNetwork {
    fn is_associated(&mut self) -> bool {
        match self.requested_at {
            Some(at) => self.available && self.clock.now_ms() >= at + self.association_delay_ms,
            None => false,
        }
    }

    fn begin_association(&mut self, credentials: &Credentials) {
        log::debug!("Associating with '{}'", credentials.ssid.as_str());
        if self.available {
            self.requested_at = Some(self.clock.now_ms());
        }
    }
}

/// Collector session
#[derive(Default)]
pub struct SimTransport {
    open: bool,
    refuse: bool,
    inbound: VecDeque<InboundMessage>,
    outbound: Vec<String>,
}

impl SimTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collector sends a message to the stand
    ///
    /// Returns false if the payload exceeds the message size limit.
    pub fn deliver(&mut self, payload: &str) -> bool {
        match InboundMessage::from_slice(payload.as_bytes()) {
            Ok(message) => {
                self.inbound.push_back(message);
                true
            }
            Err(()) => false,
        }
    }

    /// Make the collector refuse new sessions and drop the current one
    pub fn set_refusing(&mut self, refuse: bool) {
        self.refuse = refuse;
        if refuse {
            self.open = false;
        }
    }

    /// Everything the stand sent since the last call
    pub fn take_outbound(&mut self) -> Vec<String> {
        std::mem::take(&mut self.outbound)
    }
}

impl TransportSession for SimTransport {
    fn is_open(&mut self) -> bool {
        self.open
    }

    fn open(&mut self, endpoint: &Endpoint) -> Result<(), TransportError> {
        if self.refuse {
            return Err(TransportError::Refused);
        }
        log::debug!(
            "Session open to {}:{}{}",
            endpoint.host.as_str(),
            endpoint.port,
            endpoint.path.as_str()
        );
        self.open = true;
        Ok(())
    }

    fn send(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        if !self.open {
            return Err(TransportError::Closed);
        }
        self.outbound
            .push(String::from_utf8_lossy(payload).into_owned());
        Ok(())
    }

    fn poll(&mut self) -> Option<InboundMessage> {
        if !self.open {
            return None;
        }
        self.inbound.pop_front()
    }

    fn close(&mut self) {
        self.open = false;
    }
}
