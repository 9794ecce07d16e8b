// src/store/record.rs

use std::path::PathBuf;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{Model, WorkerStatus};

/// One spawned worker, as persisted in the state file.
///
/// Fields this version does not know about are kept in `extra` and written
/// back untouched, so older binaries never drop data added by newer ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerRecord {
    pub name: String,
    pub prompt: String,
    pub model: Model,
    /// Advisory spend ceiling in USD, forwarded to the assistant CLI.
    pub budget: f64,
    pub notify_target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    pub session_id: String,
    pub status: WorkerStatus,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    pub log_path: PathBuf,
    #[serde(default)]
    pub notified: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl WorkerRecord {
    pub fn is_running(&self) -> bool {
        self.status == WorkerStatus::Running
    }

    /// The pid, but only while the record is running.
    ///
    /// Terminal records may hold an id the OS has since reused, so callers
    /// that intend to signal must go through here.
    pub fn live_pid(&self) -> Option<u32> {
        if self.is_running() { self.pid } else { None }
    }

    /// Time from start until `ended_at`, or until `now` while still running.
    pub fn elapsed(&self, now: DateTime<Utc>) -> Duration {
        let end = self.ended_at.unwrap_or(now);
        (end - self.started_at).max(Duration::zero())
    }

    /// Move the record into a terminal state.
    ///
    /// Does nothing if the record already left `running`, so a second
    /// monitor pass cannot reclassify it.
    pub fn finish(&mut self, status: WorkerStatus, at: DateTime<Utc>) -> bool {
        if !self.is_running() || !status.is_terminal() {
            return false;
        }
        self.status = status;
        self.ended_at = Some(at);
        true
    }
}
