use chrono::{DateTime, Utc};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::SampleStore;
use crate::config::StorageBackend;
use crate::error::{PulseError, Result};
use crate::metrics::Sample;

/// Series kept in a Redis sorted set.
///
/// Score is the timestamp in microseconds. Members are
/// `<seq:020>|<sample json>`: Redis orders equal scores by member, so
/// the zero-padded sequence keeps duplicates in insertion order.
pub struct RedisStore {
    conn: ConnectionManager,
    samples_key: String,
    seq_key: String,
    /// Serializes seq allocation + ZADD so appends land in order
    append_guard: Mutex<()>,
}

impl RedisStore {
    /// Connect and verify the server answers.
    pub async fn connect(url: &str, key_prefix: &str) -> Result<Self> {
        let client = redis::Client::open(url)?;
        let mut conn = ConnectionManager::new(client).await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        info!(url, key_prefix, "connected to redis history store");

        Ok(Self {
            conn,
            samples_key: format!("{key_prefix}:samples"),
            seq_key: format!("{key_prefix}:seq"),
            append_guard: Mutex::new(()),
        })
    }
}

#[async_trait::async_trait]
impl SampleStore for RedisStore {
    fn backend(&self) -> StorageBackend {
        StorageBackend::Redis
    }

    async fn append(&self, sample: Sample) -> Result<()> {
        let _guard = self.append_guard.lock().await;
        let mut conn = self.conn.clone();

        let seq: u64 = conn.incr(&self.seq_key, 1u64).await?;
        let member = encode_member(seq, &sample)?;
        let _: () = conn.zadd(&self.samples_key, member, score(sample.timestamp)).await?;

        debug!(seq, "appended sample");
        Ok(())
    }

    async fn range(&self, start: DateTime<Utc>, end: Option<DateTime<Utc>>) -> Result<Vec<Sample>> {
        let mut conn = self.conn.clone();
        let min = score(start);
        let members: Vec<String> = match end {
            Some(end) => conn.zrangebyscore(&self.samples_key, min, score(end)).await?,
            None => conn.zrangebyscore(&self.samples_key, min, "+inf").await?,
        };

        members.iter().map(|m| decode_member(m)).collect()
    }

    /// Delete the series and its sequence counter in one transaction.
    async fn clear_all(&self) -> Result<()> {
        let _guard = self.append_guard.lock().await;
        let mut conn = self.conn.clone();
        let _: () = redis::pipe()
            .atomic()
            .del(&self.samples_key)
            .ignore()
            .del(&self.seq_key)
            .ignore()
            .query_async(&mut conn)
            .await?;
        Ok(())
    }
}

fn score(ts: DateTime<Utc>) -> f64 {
    ts.timestamp_micros() as f64
}

fn encode_member(seq: u64, sample: &Sample) -> Result<String> {
    Ok(format!("{seq:020}|{}", serde_json::to_string(sample)?))
}

fn decode_member(member: &str) -> Result<Sample> {
    let (_seq, json) = member.split_once('|').ok_or_else(|| PulseError::Storage {
        reason: format!("malformed history entry: {member}"),
    })?;
    Ok(serde_json::from_str(json)?)
}
