//! Network link and transport session interfaces

use thrustbench_protocol::InboundMessage;

use crate::config::{Credentials, Endpoint};

/// Errors from the transport session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransportError {
    /// Collector refused or did not answer the open request
    Refused,
    /// Operation did not complete in time
    Timeout,
    /// Session is not open
    Closed,
    /// Underlying socket error
    Io,
}

/// Wireless (or other) network association
pub trait NetworkLink {
    /// Whether the link is currently associated
    fn is_associated(&mut self) -> bool;

    /// Start associating with the given credentials
    ///
    /// Must not block; completion is observed through
    /// [`NetworkLink::is_associated`].
    fn begin_association(&mut self, credentials: &Credentials);
}

/// Message-oriented session with the collector
pub trait TransportSession {
    /// Whether the session is currently open
    fn is_open(&mut self) -> bool;

    /// Attempt to open the session
    ///
    /// Each call is a single bounded attempt.
    fn open(&mut self, endpoint: &Endpoint) -> Result<(), TransportError>;

    /// Send one encoded message
    fn send(&mut self, payload: &[u8]) -> Result<(), TransportError>;

    /// Take the next inbound message, if any
    fn poll(&mut self) -> Option<InboundMessage>;

    /// Drop the session
    fn close(&mut self) {}
}
