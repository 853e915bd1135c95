//! Connectivity supervisor
//!
//! The network link associates asynchronously: a tick starts association
//! and later ticks observe the result, so the network can sit in
//! [`LinkState::Connecting`] across ticks until the association timeout.
//! The transport opens synchronously with a per-tick cap on attempts and
//! elapsed time, and is only attempted while the network is up.

use super::link::{LinkState, LinkTracker, LinkTransition};
use crate::config::{NetworkConfig, TransportConfig};
use crate::traits::{Clock, NetworkLink, TransportSession};

/// Link changes observed during one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ConnectivityReport {
    pub network: Option<LinkTransition>,
    pub transport: Option<LinkTransition>,
}

impl ConnectivityReport {
    /// Check if the transport session was established this tick
    pub fn transport_came_up(&self) -> bool {
        matches!(
            self.transport,
            Some(LinkTransition {
                to: LinkState::Up,
                ..
            })
        )
    }
}

/// Keeps the network and transport links up
pub struct ConnectivitySupervisor {
    network: LinkTracker,
    transport: LinkTracker,
    network_config: NetworkConfig,
    transport_config: TransportConfig,
}

impl ConnectivitySupervisor {
    /// Create a supervisor with both links down
    pub fn new(network_config: NetworkConfig, transport_config: TransportConfig) -> Self {
        Self {
            network: LinkTracker::new(network_config.retry),
            transport: LinkTracker::new(transport_config.retry),
            network_config,
            transport_config,
        }
    }

    pub fn network_state(&self) -> LinkState {
        self.network.state()
    }

    pub fn transport_state(&self) -> LinkState {
        self.transport.state()
    }

    /// Whether outbound messages may be sent
    pub fn transport_up(&self) -> bool {
        self.network.is_up() && self.transport.is_up()
    }

    /// Reconcile both links
    ///
    /// Logs at most one transition per link.
    pub fn tick<N, T, C>(&mut self, network: &mut N, transport: &mut T, clock: &C) -> ConnectivityReport
    where
        N: NetworkLink,
        T: TransportSession,
        C: Clock,
    {
        // A loss recorded since the last tick is reported before reopening
        let reopen = self.transport.transition().is_none();

        self.tick_network(network, clock.now_ms());
        self.tick_transport(transport, clock, reopen);

        let report = ConnectivityReport {
            network: self.network.transition(),
            transport: self.transport.transition(),
        };
        self.network.end_tick();
        self.transport.end_tick();

        if let Some(t) = report.network {
            log_transition("network", t, self.network.failures());
        }
        if let Some(t) = report.transport {
            log_transition("transport", t, self.transport.failures());
        }
        report
    }

    /// Record a failed send
    ///
    /// The next tick reports the loss; the tick after reopens the session.
    pub fn mark_transport_lost<C: Clock>(&mut self, clock: &C) {
        if self.transport.state() != LinkState::Down {
            debug!("transport send failed, dropping session");
            self.transport.lost(clock.now_ms());
        }
    }

    fn tick_network<N: NetworkLink>(&mut self, link: &mut N, now: u64) {
        match self.network.state() {
            LinkState::Up => {
                if !link.is_associated() {
                    self.network.lost(now);
                }
            }
            LinkState::Connecting => {
                if link.is_associated() {
                    self.network.up(now);
                } else if now.saturating_sub(self.network.since_ms())
                    >= u64::from(self.network_config.association_timeout_ms)
                {
                    self.network.failed(now);
                }
            }
            LinkState::Down => {
                if link.is_associated() {
                    self.network.up(now);
                } else if self.network.can_retry(now) {
                    self.network.connecting(now);
                    link.begin_association(&self.network_config.credentials);
                    if link.is_associated() {
                        self.network.up(now);
                    }
                }
            }
        }
    }

    fn tick_transport<T: TransportSession, C: Clock>(
        &mut self,
        session: &mut T,
        clock: &C,
        reopen: bool,
    ) {
        let now = clock.now_ms();

        if !self.network.is_up() {
            if self.transport.state() != LinkState::Down {
                session.close();
                self.transport.lost(now);
            }
            return;
        }

        match self.transport.state() {
            LinkState::Up => {
                if !session.is_open() {
                    self.transport.lost(now);
                }
            }
            LinkState::Down | LinkState::Connecting => {
                if reopen && self.transport.can_retry(now) {
                    self.open_transport(session, clock);
                }
            }
        }
    }

    /// Bounded open: stops at the attempt cap or the time budget
    fn open_transport<T: TransportSession, C: Clock>(&mut self, session: &mut T, clock: &C) {
        let start = clock.now_ms();
        self.transport.connecting(start);

        let mut attempts: u8 = 0;
        loop {
            attempts = attempts.saturating_add(1);
            match session.open(&self.transport_config.endpoint) {
                Ok(()) => {
                    self.transport.up(clock.now_ms());
                    return;
                }
                Err(e) => {
                    trace!("Transport open attempt {} failed: {:?}", attempts, e);
                }
            }

            let elapsed = clock.now_ms().saturating_sub(start);
            if attempts >= self.transport_config.open_attempts_per_tick
                || elapsed >= u64::from(self.transport_config.open_budget_ms)
            {
                self.transport.failed(clock.now_ms());
                return;
            }
        }
    }
}

fn log_transition(link: &str, transition: LinkTransition, failures: u32) {
    match transition.to {
        LinkState::Up => info!("{} link up", link),
        LinkState::Down => warn!(
            "{} link down (was {:?}, {} failed attempts)",
            link, transition.from, failures
        ),
        LinkState::Connecting => debug!("{} link connecting", link),
    }
}
