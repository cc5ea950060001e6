use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::metrics::{derive_history, round2, HistorySeries, BYTES_PER_MB};
use crate::store::{SampleStore, TimeWindow};
use crate::AppState;

use super::{AppError, StatusMessage};

const BYTES_PER_GB: f64 = BYTES_PER_MB * 1024.0;

// ─── Request / response types ────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HistoryParams {
    /// Trailing window length; falls back to the configured default
    pub minutes: Option<i64>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MemoryOverview {
    pub total_mb: f64,
    pub used_mb: f64,
    pub percent: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DiskOverview {
    pub total_gb: f64,
    pub used_gb: f64,
    pub percent: f64,
}

/// Live reading straight from the source, independent of the sampler.
/// Fields the host cannot report are `null`.
#[derive(Debug, Clone, Serialize)]
pub struct RealtimeOverview {
    pub cpu_percent: f64,
    pub cpu_count_logical: Option<usize>,
    pub cpu_count_physical: Option<usize>,
    pub memory: MemoryOverview,
    pub disk: Option<DiskOverview>,
    pub net_bytes_sent: u64,
    pub net_bytes_recv: u64,
    pub boot_time: Option<DateTime<Utc>>,
    pub sampled_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub storage: &'static str,
}

// ─── GET /api/system/metrics/history ─────────────────────────────

pub async fn get_history(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<HistorySeries>, AppError> {
    let minutes = params.minutes.unwrap_or(state.default_history_minutes);
    let window = TimeWindow::from_params(
        minutes,
        params.start_time.as_deref(),
        params.end_time.as_deref(),
    );

    let samples = state.store.range_query(&window, Utc::now()).await?;
    Ok(Json(derive_history(&samples)))
}

// ─── DELETE /api/system/metrics/history ──────────────────────────

/// Always answers 200; a failed clear is reported in the body.
pub async fn clear_history(State(state): State<Arc<AppState>>) -> Json<StatusMessage> {
    match state.store.clear_all().await {
        Ok(()) => {
            info!("metrics history cleared");
            Json(StatusMessage::success("All metrics history has been cleared"))
        }
        Err(e) => {
            warn!(error = %e, "failed to clear metrics history");
            Json(StatusMessage::error(e.to_string()))
        }
    }
}

// ─── GET /api/system/metrics/realtime ────────────────────────────

pub async fn get_realtime(
    State(state): State<Arc<AppState>>,
) -> Result<Json<RealtimeOverview>, AppError> {
    let source = state.source.clone();
    let (counters, info) = tokio::task::spawn_blocking(move || (source.host_counters(), source.host_info()))
        .await
        .map_err(|e| AppError::Internal(format!("metrics source failed: {e}")))?;

    let total_mb = counters.memory_total_bytes.unwrap_or(0) as f64 / BYTES_PER_MB;
    let used_mb = counters.memory_used_bytes.unwrap_or(0) as f64 / BYTES_PER_MB;
    let percent = if total_mb > 0.0 { used_mb / total_mb * 100.0 } else { 0.0 };

    let disk = info.disk.map(|d| {
        let total = d.total_bytes as f64;
        let used = d.used_bytes() as f64;
        DiskOverview {
            total_gb: round2(total / BYTES_PER_GB),
            used_gb: round2(used / BYTES_PER_GB),
            percent: if total > 0.0 { round2(used / total * 100.0) } else { 0.0 },
        }
    });

    Ok(Json(RealtimeOverview {
        cpu_percent: round2(counters.cpu_percent.unwrap_or(0.0)),
        cpu_count_logical: info.cpu_count_logical,
        cpu_count_physical: info.cpu_count_physical,
        memory: MemoryOverview {
            total_mb: round2(total_mb),
            used_mb: round2(used_mb),
            percent: round2(percent),
        },
        disk,
        net_bytes_sent: counters.bytes_sent.unwrap_or(0),
        net_bytes_recv: counters.bytes_recv.unwrap_or(0),
        boot_time: info.boot_time,
        sampled_at: Utc::now(),
    }))
}

// ─── GET /api/health ─────────────────────────────────────────────

pub async fn health(State(state): State<Arc<AppState>>) -> Json<Health> {
    Json(Health { status: "ok", storage: state.store.backend().as_str() })
}
