pub mod network;
pub mod system;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::error::PulseError;

// ─── Shared response envelope ────────────────────────────────────

/// `{status, message}` body used for operations that report an outcome
/// rather than data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusMessage {
    pub status: String,
    pub message: String,
}

impl StatusMessage {
    pub fn success(message: impl Into<String>) -> Self {
        Self { status: "success".into(), message: message.into() }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self { status: "error".into(), message: message.into() }
    }
}

// ─── Unified error type ──────────────────────────────────────────

#[derive(Debug)]
pub enum AppError {
    Storage(String),
    Internal(String),
}

impl From<PulseError> for AppError {
    fn from(e: PulseError) -> Self {
        Self::Storage(e.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let message = match self {
            Self::Storage(msg) => format!("storage: {msg}"),
            Self::Internal(msg) => msg,
        };
        error!(%message, "request failed");

        (StatusCode::INTERNAL_SERVER_ERROR, Json(StatusMessage::error(message))).into_response()
    }
}
