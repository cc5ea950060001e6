//! Append-only time series of [`Sample`]s.
//!
//! Backends implement [`SampleStore`]: [`MemoryStore`] for a single
//! process and [`RedisStore`] when history must outlive restarts.

pub mod memory;
pub mod redis_store;
pub mod window;

pub use memory::MemoryStore;
pub use redis_store::RedisStore;
pub use window::TimeWindow;

use chrono::{DateTime, Utc};

use crate::config::StorageBackend;
use crate::error::Result;
use crate::metrics::Sample;

/// History backend.
///
/// Range reads must be snapshot-consistent, appends serialized with one
/// another, and `clear_all` exclusive with both.
#[async_trait::async_trait]
pub trait SampleStore: Send + Sync {
    fn backend(&self) -> StorageBackend;

    /// Add to the series in timestamp order. Duplicate timestamps are kept
    /// in insertion order.
    async fn append(&self, sample: Sample) -> Result<()>;

    /// Samples with `start <= ts` (and `ts <= end` when bounded), ascending.
    async fn range(&self, start: DateTime<Utc>, end: Option<DateTime<Utc>>) -> Result<Vec<Sample>>;

    /// Drop the whole series.
    async fn clear_all(&self) -> Result<()>;

    /// Samples inside `window`, resolved against `now`.
    async fn range_query(&self, window: &TimeWindow, now: DateTime<Utc>) -> Result<Vec<Sample>> {
        let (start, end) = window.bounds(now);
        self.range(start, end).await
    }
}
