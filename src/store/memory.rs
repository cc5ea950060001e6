use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use super::SampleStore;
use crate::config::StorageBackend;
use crate::error::Result;
use crate::metrics::Sample;

/// In-process series.
///
/// Readers share the lock and copy out their range, so a reader never
/// sees a half-applied append or clear. Writers are exclusive.
#[derive(Default)]
pub struct MemoryStore {
    samples: RwLock<Vec<Sample>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert keeping the vector sorted by timestamp. A sample stamped at or
    /// after the latest one lands at the end; equal stamps stay in arrival
    /// order.
    pub fn insert(&self, sample: Sample) {
        let mut samples = self.samples.write();
        let at = samples.partition_point(|s| s.timestamp <= sample.timestamp);
        samples.insert(at, sample);
    }

    /// Samples with `start <= ts` (and `ts <= end` when bounded).
    pub fn between(&self, start: DateTime<Utc>, end: Option<DateTime<Utc>>) -> Vec<Sample> {
        let samples = self.samples.read();
        let from = samples.partition_point(|s| s.timestamp < start);
        let to = match end {
            Some(end) => samples.partition_point(|s| s.timestamp <= end),
            None => samples.len(),
        };
        if from >= to {
            return Vec::new();
        }
        samples[from..to].to_vec()
    }

    pub fn clear(&self) {
        self.samples.write().clear();
    }
}

#[async_trait::async_trait]
impl SampleStore for MemoryStore {
    fn backend(&self) -> StorageBackend {
        StorageBackend::Memory
    }

    async fn append(&self, sample: Sample) -> Result<()> {
        self.insert(sample);
        Ok(())
    }

    async fn range(&self, start: DateTime<Utc>, end: Option<DateTime<Utc>>) -> Result<Vec<Sample>> {
        Ok(self.between(start, end))
    }

    async fn clear_all(&self) -> Result<()> {
        self.clear();
        Ok(())
    }
}
