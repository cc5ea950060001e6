use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use super::{round2, Sample};

/// Parallel series shipped to the dashboard charts.
///
/// Every `Vec` has one entry per input sample, in the same order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistorySeries {
    pub timestamps: Vec<String>,
    pub cpu: Vec<f64>,
    pub memory_used_mb: Vec<f64>,
    pub net_sent_speed_bps: Vec<f64>,
    pub net_recv_speed_bps: Vec<f64>,
    /// From the most recent sample; 0 when there are none
    pub memory_total_mb: f64,
}

/// Turn an ascending run of samples into chart series, deriving
/// bytes/sec from the cumulative network counters.
///
/// Pure: the output depends only on `samples`.
pub fn derive_history(samples: &[Sample]) -> HistorySeries {
    let n = samples.len();
    let mut out = HistorySeries {
        timestamps: Vec::with_capacity(n),
        cpu: Vec::with_capacity(n),
        memory_used_mb: Vec::with_capacity(n),
        net_sent_speed_bps: Vec::with_capacity(n),
        net_recv_speed_bps: Vec::with_capacity(n),
        memory_total_mb: samples.last().map(|s| s.memory_total_mb).unwrap_or(0.0),
    };

    let mut prev: Option<&Sample> = None;
    for sample in samples {
        out.timestamps.push(sample.timestamp.to_rfc3339_opts(SecondsFormat::Micros, true));
        out.cpu.push(sample.cpu_percent);
        out.memory_used_mb.push(round2(sample.memory_used_mb));

        let (sent, recv) = match prev {
            None => (0.0, 0.0),
            Some(p) => interval_rates(p, sample),
        };
        out.net_sent_speed_bps.push(sent);
        out.net_recv_speed_bps.push(recv);

        prev = Some(sample);
    }

    out
}

/// Bytes/sec between two consecutive samples.
///
/// A non-positive interval yields zero. A counter that went backwards
/// (reset, wrap) counts as no traffic, never as a negative rate.
fn interval_rates(prev: &Sample, cur: &Sample) -> (f64, f64) {
    let dt = elapsed_secs(prev.timestamp, cur.timestamp);
    if dt <= 0.0 {
        return (0.0, 0.0);
    }

    let sent = cur.net_bytes_sent.saturating_sub(prev.net_bytes_sent);
    let recv = cur.net_bytes_recv.saturating_sub(prev.net_bytes_recv);
    (round2(sent as f64 / dt), round2(recv as f64 / dt))
}

fn elapsed_secs(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    // to_std fails on a negative span, which we treat as zero
    (to - from).to_std().map(|d| d.as_secs_f64()).unwrap_or(0.0)
}
