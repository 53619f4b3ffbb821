//! Best-effort persistence of session records.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rand::Rng;
use tracing::{debug, warn};

use crate::TelemetryError;
use crate::model::SessionLog;

/// Writes one pretty-printed JSON file per session into a directory.
#[derive(Debug, Clone)]
pub struct SessionLogWriter {
    dir: PathBuf,
}

impl SessionLogWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `session-<timestamp>-<8 hex>.json`, with `:` and `.` made file-safe.
    pub fn file_name(time: DateTime<Utc>) -> String {
        let stamp = time
            .to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
            .replace([':', '.'], "-");
        let suffix: u32 = rand::rng().random();
        format!("session-{stamp}-{suffix:08x}.json")
    }

    /// Write the record, creating the directory if needed.
    pub async fn write(&self, log: &SessionLog) -> Result<PathBuf, TelemetryError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(Self::file_name(Utc::now()));
        let body = serde_json::to_string_pretty(log)?;
        tokio::fs::write(&path, body).await?;
        debug!(path = %path.display(), session = %log.session_id, "Session log written");
        Ok(path)
    }

    /// Write the record on a detached task. Failures are logged, never returned.
    pub fn spawn_write(&self, log: SessionLog) {
        let writer = self.clone();
        tokio::spawn(async move {
            if let Err(e) = writer.write(&log).await {
                warn!(error = %e, session = %log.session_id, "Failed to write session log");
            }
        });
    }
}

/// Short random session id: millisecond clock plus 6 hex digits.
pub fn new_session_id() -> String {
    let suffix: u32 = rand::rng().random_range(0..0x100_0000);
    format!("{}-{suffix:06x}", Utc::now().timestamp_millis())
}
