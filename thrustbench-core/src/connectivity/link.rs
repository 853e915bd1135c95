//! Per-link state with retry backoff

use crate::config::RetryPolicy;

/// Link state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkState {
    #[default]
    Down,
    Connecting,
    Up,
}

/// Net state change of a link since it was last reported
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LinkTransition {
    pub from: LinkState,
    pub to: LinkState,
}

/// State of one link plus its retry bookkeeping
///
/// Changes since the last [`LinkTracker::end_tick`] collapse into a single
/// [`LinkTransition`], including changes recorded between ticks.
#[derive(Debug, Clone)]
pub struct LinkTracker {
    state: LinkState,
    since_ms: u64,
    failures: u32,
    retry_at_ms: u64,
    policy: RetryPolicy,
    reported: LinkState,
}

impl LinkTracker {
    /// Create a tracker in [`LinkState::Down`], ready to attempt at once
    pub const fn new(policy: RetryPolicy) -> Self {
        Self {
            state: LinkState::Down,
            since_ms: 0,
            failures: 0,
            retry_at_ms: 0,
            policy,
            reported: LinkState::Down,
        }
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn is_up(&self) -> bool {
        self.state == LinkState::Up
    }

    /// Time the current state was entered
    pub fn since_ms(&self) -> u64 {
        self.since_ms
    }

    /// Consecutive failed attempts
    pub fn failures(&self) -> u32 {
        self.failures
    }

    /// Whether the backoff after the last failure has elapsed
    pub fn can_retry(&self, now_ms: u64) -> bool {
        now_ms >= self.retry_at_ms
    }

    /// Net transition since the last [`LinkTracker::end_tick`], if any
    pub fn transition(&self) -> Option<LinkTransition> {
        (self.reported != self.state).then_some(LinkTransition {
            from: self.reported,
            to: self.state,
        })
    }

    /// Mark the current state as reported
    pub fn end_tick(&mut self) {
        self.reported = self.state;
    }

    /// Attempt started
    pub fn connecting(&mut self, now_ms: u64) {
        self.enter(LinkState::Connecting, now_ms);
    }

    /// Attempt succeeded
    pub fn up(&mut self, now_ms: u64) {
        self.failures = 0;
        self.enter(LinkState::Up, now_ms);
    }

    /// Attempt failed; back off before the next one
    pub fn failed(&mut self, now_ms: u64) {
        self.failures = self.failures.saturating_add(1);
        self.retry_at_ms = now_ms.saturating_add(u64::from(self.policy.backoff_ms(self.failures)));
        self.enter(LinkState::Down, now_ms);
    }

    /// Established link dropped; the next attempt may start at once
    pub fn lost(&mut self, now_ms: u64) {
        self.retry_at_ms = now_ms;
        self.enter(LinkState::Down, now_ms);
    }

    fn enter(&mut self, state: LinkState, now_ms: u64) {
        if self.state != state {
            self.state = state;
            self.since_ms = now_ms;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker() -> LinkTracker {
        LinkTracker::new(RetryPolicy {
            initial_backoff_ms: 100,
            max_backoff_ms: 400,
        })
    }

    #[test]
    fn test_starts_down_and_ready() {
        let link = tracker();
        assert_eq!(link.state(), LinkState::Down);
        assert!(link.can_retry(0));
    }

    #[test]
    fn test_failure_backoff_grows() {
        let mut link = tracker();
        link.connecting(0);
        link.failed(0);
        assert!(!link.can_retry(99));
        assert!(link.can_retry(100));

        link.connecting(100);
        link.failed(100);
        assert!(!link.can_retry(299));
        assert!(link.can_retry(300));
        assert_eq!(link.failures(), 2);
    }

    #[test]
    fn test_success_resets_failures() {
        let mut link = tracker();
        link.failed(0);
        link.failed(0);
        link.up(500);
        assert_eq!(link.failures(), 0);
        assert!(link.is_up());
        assert_eq!(link.since_ms(), 500);
    }

    #[test]
    fn test_loss_allows_immediate_retry() {
        let mut link = tracker();
        link.up(0);
        link.lost(1_000);
        assert_eq!(link.state(), LinkState::Down);
        assert!(link.can_retry(1_000));
    }

    #[test]
    fn test_transitions_collapse_within_tick() {
        let mut link = tracker();
        link.connecting(0);
        link.up(0);
        assert_eq!(
            link.transition(),
            Some(LinkTransition {
                from: LinkState::Down,
                to: LinkState::Up
            })
        );

        link.end_tick();
        assert_eq!(link.transition(), None);

        // Failed attempt ends where it started
        let mut link = tracker();
        link.connecting(0);
        link.failed(0);
        assert_eq!(link.transition(), None);
    }

    #[test]
    fn test_change_between_ticks_is_kept() {
        let mut link = tracker();
        link.up(0);
        link.end_tick();

        link.lost(5);
        assert_eq!(
            link.transition(),
            Some(LinkTransition {
                from: LinkState::Up,
                to: LinkState::Down
            })
        );
        link.end_tick();
        assert_eq!(link.transition(), None);
    }
}
