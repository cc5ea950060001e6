use axum::{extract::State, Json};
use std::sync::Arc;
use tracing::warn;

use crate::metrics::ConnectionReport;
use crate::source::{NetworkInterface, SourceError};
use crate::AppState;

use super::AppError;

// ─── GET /api/network/interfaces ─────────────────────────────────

/// Name, MAC, addresses and link state of every interface.
pub async fn get_interfaces(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<NetworkInterface>>, AppError> {
    let source = state.source.clone();
    let interfaces = tokio::task::spawn_blocking(move || source.interfaces())
        .await
        .map_err(|e| AppError::Internal(format!("interface source failed: {e}")))?
        .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(Json(interfaces))
}

// ─── GET /api/network/connections ────────────────────────────────

/// Per-state counts of the current socket table plus the churn rate
/// since the previous call.
///
/// An unreadable table counts as empty: the aggregates read zero and
/// churn is computed against an empty set.
pub async fn get_connections(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ConnectionReport>, AppError> {
    let source = state.source.clone();
    let snapshot = tokio::task::spawn_blocking(move || source.connections())
        .await
        .map_err(|e| AppError::Internal(format!("connection source failed: {e}")))?;

    let connections = match snapshot {
        Ok(c) => c,
        Err(e @ SourceError::PermissionDenied { .. }) => {
            warn!(error = %e, "cannot read connection table, treating as empty");
            Vec::new()
        }
        Err(e @ SourceError::Unavailable { .. }) => {
            warn!(error = %e, "connection table unavailable, treating as empty");
            Vec::new()
        }
    };

    Ok(Json(state.churn.report(&connections)))
}
