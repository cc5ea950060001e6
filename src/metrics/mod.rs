pub mod churn;
pub mod rates;
pub mod sampler;

pub use churn::{ConnectionChurnTracker, ConnectionReport};
pub use rates::{derive_history, HistorySeries};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::source::HostCounters;

pub(crate) const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// One persisted reading of the host. Never mutated after it is written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub timestamp: DateTime<Utc>,
    /// 0–100
    pub cpu_percent: f64,
    pub memory_used_mb: f64,
    pub memory_total_mb: f64,
    /// Cumulative since boot
    pub net_bytes_sent: u64,
    /// Cumulative since boot
    pub net_bytes_recv: u64,
}

impl Sample {
    /// Build a sample from a possibly partial reading. Missing fields
    /// become zero: a partial sample beats a gap in the series.
    pub fn from_counters(timestamp: DateTime<Utc>, counters: &HostCounters) -> Self {
        Self {
            timestamp,
            cpu_percent: counters.cpu_percent.unwrap_or(0.0),
            memory_used_mb: counters.memory_used_bytes.unwrap_or(0) as f64 / BYTES_PER_MB,
            memory_total_mb: counters.memory_total_bytes.unwrap_or(0) as f64 / BYTES_PER_MB,
            net_bytes_sent: counters.bytes_sent.unwrap_or(0),
            net_bytes_recv: counters.bytes_recv.unwrap_or(0),
        }
    }
}

/// Round to two decimal places.
pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
