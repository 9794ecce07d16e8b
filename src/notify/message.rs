// src/notify/message.rs

use chrono::{DateTime, Utc};

use crate::monitor::classify::{NO_OUTPUT, truncate_chars};
use crate::store::WorkerRecord;
use crate::types::WorkerStatus;

const MESSAGE_SUMMARY_CHARS: usize = 500;

pub const TEST_MESSAGE: &str = "🧪 bgworker notification test - delivery is working!";

/// `42s`, `3m 7s`, `2h 15m`.
pub fn format_duration(secs: i64) -> String {
    let secs = secs.max(0);
    if secs < 60 {
        format!("{secs}s")
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
    }
}

/// Message sent to the notify target when a worker finishes.
pub fn completion_message(record: &WorkerRecord, now: DateTime<Utc>) -> String {
    let icon = match record.status {
        WorkerStatus::Failed => "❌",
        _ => "🎯",
    };
    let elapsed = format_duration(record.elapsed(now).num_seconds());
    let mut message = format!(
        "{icon} Worker **{}** {} ({elapsed})",
        record.name, record.status
    );

    let summary = record.summary.as_deref().unwrap_or("").trim();
    if !summary.is_empty() && summary != NO_OUTPUT {
        let summary = truncate_chars(summary, MESSAGE_SUMMARY_CHARS);
        if looks_structured(&summary) {
            message.push_str(&format!("\n```\n{summary}\n```"));
        } else {
            message.push_str(&format!("\n\n{summary}"));
        }
    }

    message
}

fn looks_structured(s: &str) -> bool {
    s.contains(['{', '[', ':', '\n'])
}
