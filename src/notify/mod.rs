// src/notify/mod.rs

//! Notifier: tells an external agent that a worker finished.
//!
//! Delivery is at-most-once. The monitor marks a record `notified` before
//! calling [`Notifier::send`], and a failed send is logged, never retried.

pub mod message;

use std::future::Future;
use std::io::ErrorKind;
use std::pin::Pin;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, info};

use crate::config::NotifySection;
use crate::errors::{Result, WorkerError};

pub use message::{TEST_MESSAGE, completion_message, format_duration};

/// Trait abstracting message delivery.
///
/// Production code uses [`CommandNotifier`]; tests record calls instead.
pub trait Notifier: Send + Sync {
    fn send<'a>(
        &'a self,
        target: &'a str,
        message: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;
}

/// Delivers messages by running an external command, by default
/// `openclaw agent --agent <target> -m <message>`.
#[derive(Debug, Clone)]
pub struct CommandNotifier {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandNotifier {
    pub fn new(program: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args,
            timeout,
        }
    }

    pub fn from_config(cfg: &NotifySection) -> Self {
        Self::new(
            cfg.program.clone(),
            cfg.args.clone(),
            Duration::from_secs(cfg.timeout_secs),
        )
    }

    /// Argument list with `{target}` / `{message}` substituted.
    pub fn render_args(&self, target: &str, message: &str) -> Vec<String> {
        self.args
            .iter()
            .map(|a| a.replace("{target}", target).replace("{message}", message))
            .collect()
    }

    async fn run(&self, target: &str, message: &str) -> Result<()> {
        let failed = |reason: String| WorkerError::NotifyFailed {
            target: target.to_string(),
            reason,
        };

        let mut cmd = Command::new(&self.program);
        cmd.args(self.render_args(target, message))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(program = %self.program, %target, "sending notification");

        let output = match tokio::time::timeout(self.timeout, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) if e.kind() == ErrorKind::NotFound => {
                return Err(failed(format!("'{}' not found on PATH", self.program)));
            }
            Ok(Err(e)) => return Err(failed(format!("running '{}': {e}", self.program))),
            Err(_) => {
                return Err(failed(format!(
                    "timed out after {}s",
                    self.timeout.as_secs()
                )));
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let code = output
                .status
                .code()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "signal".to_string());
            return Err(failed(format!("exit {code}: {}", stderr.trim())));
        }

        info!(%target, "notification delivered");
        Ok(())
    }
}

impl Notifier for CommandNotifier {
    fn send<'a>(
        &'a self,
        target: &'a str,
        message: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(self.run(target, message))
    }
}
