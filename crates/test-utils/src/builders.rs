#![allow(dead_code)]

use std::path::{Path, PathBuf};

use bgworker::config::{ConfigFile, RawConfigFile};
use bgworker::store::WorkerRecord;
use bgworker::types::{Model, WorkerStatus};
use chrono::{DateTime, Duration, Utc};

/// Builder for `ConfigFile` to simplify test setup.
///
/// Starts from the built-in defaults with paths under `root` and kill
/// escalation disabled.
pub struct ConfigBuilder {
    config: RawConfigFile,
}

impl ConfigBuilder {
    pub fn new(root: &Path) -> Self {
        let mut config = RawConfigFile::default();
        config.paths.state_file = root.join("workers.json");
        config.paths.logs_dir = root.join("logs");
        config.monitor.kill_grace_secs = 0;
        Self { config }
    }

    pub fn assistant_program(mut self, program: impl Into<String>) -> Self {
        self.config.assistant.program = program.into();
        self
    }

    pub fn default_target(mut self, target: &str) -> Self {
        self.config.notify.default_target = target.to_string();
        self
    }

    pub fn default_budget(mut self, budget: f64) -> Self {
        self.config.defaults.budget = budget;
        self
    }

    pub fn kill_grace_secs(mut self, secs: u64) -> Self {
        self.config.monitor.kill_grace_secs = secs;
        self
    }

    pub fn failure_pattern(mut self, pattern: &str) -> Self {
        self.config.monitor.failure_patterns.push(pattern.to_string());
        self
    }

    pub fn success_pattern(mut self, pattern: &str) -> Self {
        self.config.monitor.success_patterns.push(pattern.to_string());
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

/// Builder for `WorkerRecord`.
pub struct RecordBuilder {
    record: WorkerRecord,
}

impl RecordBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            record: WorkerRecord {
                name: name.to_string(),
                prompt: format!("prompt for {name}"),
                model: Model::Haiku,
                budget: 2.0,
                notify_target: "main".to_string(),
                pid: Some(4242),
                session_id: format!("session-{name}"),
                status: WorkerStatus::Running,
                started_at: fixed_time(),
                ended_at: None,
                log_path: PathBuf::from(format!("/tmp/bgworker-tests/{name}.log")),
                notified: false,
                summary: None,
                extra: Default::default(),
            },
        }
    }

    pub fn status(mut self, status: WorkerStatus) -> Self {
        self.record.status = status;
        if status.is_terminal() && self.record.ended_at.is_none() {
            self.record.ended_at = Some(self.record.started_at + Duration::seconds(90));
        }
        self
    }

    pub fn pid(mut self, pid: Option<u32>) -> Self {
        self.record.pid = pid;
        self
    }

    pub fn model(mut self, model: Model) -> Self {
        self.record.model = model;
        self
    }

    pub fn budget(mut self, budget: f64) -> Self {
        self.record.budget = budget;
        self
    }

    pub fn notified(mut self, notified: bool) -> Self {
        self.record.notified = notified;
        self
    }

    pub fn log_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.record.log_path = path.into();
        self
    }

    pub fn extra(mut self, key: &str, value: serde_json::Value) -> Self {
        self.record.extra.insert(key.to_string(), value);
        self
    }

    pub fn build(self) -> WorkerRecord {
        self.record
    }
}

/// Whole-second timestamp so JSON round-trips compare cleanly.
pub fn fixed_time() -> DateTime<Utc> {
    DateTime::from_timestamp(1_767_225_600, 0).expect("valid timestamp")
}
