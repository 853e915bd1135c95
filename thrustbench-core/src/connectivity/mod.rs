//! Connectivity supervision
//!
//! Two independent links are tracked: the network association and the
//! transport session on top of it. Each supervisor tick makes at most one
//! bounded attempt per link and never waits for a link to come up.

pub mod link;
pub mod supervisor;

pub use link::{LinkState, LinkTracker, LinkTransition};
pub use supervisor::{ConnectivityReport, ConnectivitySupervisor};
