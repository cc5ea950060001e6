//! Live connection churn: how many connections appeared or went away
//! since the previous poll, scaled to a fixed 3-second window.

use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use crate::source::Connection;

/// Churn is reported per this many seconds
const REPORT_WINDOW_SECS: f64 = 3.0;

/// Only gaps strictly inside this band are extrapolated into a rate
const MIN_PLAUSIBLE_GAP: Duration = Duration::from_secs(1);
const MAX_PLAUSIBLE_GAP: Duration = Duration::from_secs(10);

/// Identity of a connection for diffing: local and remote endpoint.
/// State is deliberately not part of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionSignature {
    pub local: SocketAddr,
    pub remote: SocketAddr,
}

impl From<&Connection> for ConnectionSignature {
    fn from(c: &Connection) -> Self {
        Self { local: c.local, remote: c.remote }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ChurnRate {
    pub new_per_3s: u64,
    pub closed_per_3s: u64,
}

/// Aggregate view of one connection snapshot plus the churn rate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectionReport {
    /// Keyed by state name, e.g. "ESTABLISHED"
    pub status_counts: BTreeMap<String, u64>,
    pub total_connections: u64,
    pub rate: ChurnRate,
}

struct ChurnState {
    signatures: HashSet<ConnectionSignature>,
    observed_at: Instant,
}

/// Holds the previous signature set. One instance is shared by every
/// caller; `observe` is a read-modify-write done under a single lock.
#[derive(Default)]
pub struct ConnectionChurnTracker {
    state: Mutex<Option<ChurnState>>,
}

impl ConnectionChurnTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&self, connections: &[Connection]) -> ChurnRate {
        self.observe_at(connections, Instant::now())
    }

    /// Same as [`observe`](Self::observe) with an explicit clock reading.
    pub fn observe_at(&self, connections: &[Connection], now: Instant) -> ChurnRate {
        let current: HashSet<ConnectionSignature> = connections
            .iter()
            .filter(|c| c.state.is_churn_relevant())
            .map(ConnectionSignature::from)
            .collect();

        let mut guard = self.state.lock();

        let rate = match guard.as_ref() {
            Some(last) => {
                let elapsed = now.saturating_duration_since(last.observed_at);
                if elapsed > MIN_PLAUSIBLE_GAP && elapsed < MAX_PLAUSIBLE_GAP {
                    let opened = current.difference(&last.signatures).count();
                    let closed = last.signatures.difference(&current).count();
                    let multiplier = REPORT_WINDOW_SECS / elapsed.as_secs_f64();
                    ChurnRate {
                        new_per_3s: (opened as f64 * multiplier) as u64,
                        closed_per_3s: (closed as f64 * multiplier) as u64,
                    }
                } else {
                    ChurnRate::default()
                }
            }
            // First observation: nothing to diff against
            None => ChurnRate::default(),
        };

        // The baseline always advances, reported or not.
        *guard = Some(ChurnState { signatures: current, observed_at: now });
        rate
    }

    /// Build the full report for one snapshot, advancing the tracker.
    pub fn report(&self, connections: &[Connection]) -> ConnectionReport {
        let rate = self.observe(connections);
        ConnectionReport {
            status_counts: status_counts(connections),
            total_connections: connections.len() as u64,
            rate,
        }
    }
}

/// Count connections per state, across all states.
pub fn status_counts(connections: &[Connection]) -> BTreeMap<String, u64> {
    let mut counts = BTreeMap::new();
    for c in connections {
        *counts.entry(c.state.as_str().to_string()).or_insert(0) += 1;
    }
    counts
}
