//! Session records for Pengate chat runs.
//!
//! One [`SessionLog`] per chat request: the resolved prompt, what the model
//! did at every step, and token usage. Records are written as JSON files,
//! best effort. A failed write is logged and never reaches the client.

pub mod model;
pub mod writer;

pub use model::{LogStep, LoggedCall, LoggedResult, SessionLog};
pub use writer::{SessionLogWriter, new_session_id};

/// Errors from the telemetry subsystem.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("session log I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
}
