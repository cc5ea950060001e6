use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::Sample;
use crate::source::MetricsSource;
use crate::store::SampleStore;

/// Background task that appends one [`Sample`] per interval.
pub struct Sampler {
    store: Arc<dyn SampleStore>,
    source: Arc<dyn MetricsSource>,
    interval: Duration,
    /// Stamp of the last recorded sample
    last_stamp: Mutex<Option<DateTime<Utc>>>,
}

impl Sampler {
    pub fn new(store: Arc<dyn SampleStore>, source: Arc<dyn MetricsSource>, interval: Duration) -> Self {
        Self {
            store,
            source,
            interval,
            last_stamp: Mutex::new(None),
        }
    }

    /// Spawn the recurring loop. It runs until `shutdown` flips to true
    /// (or its sender is dropped).
    pub fn spawn(self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            // An overrunning tick delays the next one; ticks never overlap
            // and are never bunched up to catch up.
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(interval_secs = self.interval.as_secs_f64(), "sampler started");

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.tick().await;
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
            info!("sampler stopped");
        })
    }

    /// Record one sample. Failures are logged and the tick is dropped;
    /// nothing here can end the schedule.
    pub async fn tick(&self) -> bool {
        let source = self.source.clone();
        // Readers may block on I/O or panic; keep both off the runtime
        // threads and inside this tick.
        let counters = match tokio::task::spawn_blocking(move || source.host_counters()).await {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, "metrics source failed, skipping tick");
                return false;
            }
        };

        let sample = Sample::from_counters(self.next_timestamp(Utc::now()), &counters);
        match self.store.append(sample).await {
            Ok(()) => {
                debug!("sample recorded");
                true
            }
            Err(e) => {
                warn!(error = %e, "failed to store sample, skipping tick");
                false
            }
        }
    }

    /// Never hand out a stamp older than the previous one. A wall clock
    /// stepping back repeats the last stamp until it catches up.
    fn next_timestamp(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let mut last = self.last_stamp.lock();
        let stamp = match *last {
            Some(prev) if prev > now => {
                debug!(%prev, %now, "wall clock went backwards, holding timestamp");
                prev
            }
            _ => now,
        };
        *last = Some(stamp);
        stamp
    }
}
