// src/monitor/classify.rs

//! Decide how a finished worker ended by looking at the tail of its log.
//!
//! Once a worker is detached its output is the only signal left, so this is
//! a heuristic. All of it lives here so the marker format can change without
//! touching the monitor loop.
//!
//! Priority:
//! 1. The assistant's JSON result envelope (`{"type":"result", ...}`).
//!    `is_error: true` or an `error*` subtype means failed.
//! 2. A configured failure pattern on any tail line means failed.
//! 3. A configured success pattern means completed.
//! 4. An empty or missing log means failed (the process produced nothing).
//! 5. Otherwise completed.

use std::fs::File;
use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::path::Path;

use serde_json::Value;
use tracing::{debug, warn};

use crate::config::ClassifyRules;
use crate::types::WorkerStatus;

const RESULT_SUMMARY_CHARS: usize = 300;
const FALLBACK_SUMMARY_CHARS: usize = 200;
const FALLBACK_SUMMARY_LINES: usize = 5;
pub const NO_OUTPUT: &str = "No output captured";

/// Outcome of classifying one log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    /// Either `Completed` or `Failed`.
    pub outcome: WorkerStatus,
    pub summary: String,
}

/// Read up to `max_bytes` from the end of `path`.
///
/// Returns `Ok(None)` when the file does not exist. When the read starts
/// mid-file the first (partial) line is dropped.
pub fn read_tail(path: &Path, max_bytes: u64) -> std::io::Result<Option<String>> {
    let mut file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };

    let len = file.metadata()?.len();
    let start = len.saturating_sub(max_bytes);
    file.seek(SeekFrom::Start(start))?;

    let mut buf = Vec::with_capacity((len - start) as usize);
    file.read_to_end(&mut buf)?;
    let text = String::from_utf8_lossy(&buf).into_owned();

    if start > 0 {
        if let Some(idx) = text.find('\n') {
            return Ok(Some(text[idx + 1..].to_string()));
        }
    }
    Ok(Some(text))
}

/// Classify the log at `path`. Unreadable logs count as failures.
pub fn classify_log(path: &Path, max_bytes: u64, rules: &ClassifyRules) -> Classification {
    match read_tail(path, max_bytes) {
        Ok(Some(tail)) => classify_tail(&tail, rules),
        Ok(None) => {
            debug!(path = ?path, "worker log missing");
            Classification {
                outcome: WorkerStatus::Failed,
                summary: NO_OUTPUT.to_string(),
            }
        }
        Err(e) => {
            warn!(path = ?path, error = %e, "could not read worker log");
            Classification {
                outcome: WorkerStatus::Failed,
                summary: format!("Error reading output: {e}"),
            }
        }
    }
}

/// Classify already-read log text.
pub fn classify_tail(tail: &str, rules: &ClassifyRules) -> Classification {
    if let Some(c) = classify_result_envelope(tail) {
        return c;
    }

    let summary = fallback_summary(tail);

    if tail.lines().any(|l| rules.failure.iter().any(|re| re.is_match(l))) {
        return Classification {
            outcome: WorkerStatus::Failed,
            summary,
        };
    }

    if tail.lines().any(|l| rules.success.iter().any(|re| re.is_match(l))) {
        return Classification {
            outcome: WorkerStatus::Completed,
            summary,
        };
    }

    if tail.trim().is_empty() {
        return Classification {
            outcome: WorkerStatus::Failed,
            summary,
        };
    }

    Classification {
        outcome: WorkerStatus::Completed,
        summary,
    }
}

/// Find the last `{"type":"result", ...}` line, if any.
fn classify_result_envelope(tail: &str) -> Option<Classification> {
    tail.lines().rev().find_map(|line| {
        let line = line.trim();
        if !line.starts_with('{') || !line.contains("\"result\"") {
            return None;
        }
        let value: Value = serde_json::from_str(line).ok()?;
        let obj = value.as_object()?;
        if obj.get("type").and_then(Value::as_str) != Some("result") {
            return None;
        }

        let is_error = obj.get("is_error").and_then(Value::as_bool).unwrap_or(false);
        let error_subtype = obj
            .get("subtype")
            .and_then(Value::as_str)
            .is_some_and(|s| s.starts_with("error"));

        let outcome = if is_error || error_subtype {
            WorkerStatus::Failed
        } else {
            WorkerStatus::Completed
        };

        let summary = match obj.get("result").and_then(Value::as_str) {
            Some(text) if !text.trim().is_empty() => {
                truncate_chars(text.trim(), RESULT_SUMMARY_CHARS)
            }
            _ => obj
                .get("subtype")
                .and_then(Value::as_str)
                .unwrap_or(NO_OUTPUT)
                .to_string(),
        };

        Some(Classification { outcome, summary })
    })
}

fn fallback_summary(tail: &str) -> String {
    let lines: Vec<&str> = tail.lines().filter(|l| !l.trim().is_empty()).collect();
    if lines.is_empty() {
        return NO_OUTPUT.to_string();
    }
    let start = lines.len().saturating_sub(FALLBACK_SUMMARY_LINES);
    truncate_chars(&lines[start..].join("\n"), FALLBACK_SUMMARY_CHARS)
}

/// Cut `s` to at most `max` characters, marking the cut with `...`.
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}
