//! JSON bodies returned by the timer API besides timer records.

use serde::{Deserialize, Serialize};

use super::Timer;

/// Body of a successful `DELETE /api/timers/:id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteResponse {
    /// Human-readable confirmation.
    pub message: String,
    /// The record that was removed.
    pub deleted_timer: Timer,
}

/// Body of every error response: `{"error": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiErrorBody {
    /// Error description.
    pub error: String,
}

/// Body of the liveness endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusMessage {
    /// Liveness message.
    pub message: String,
}
