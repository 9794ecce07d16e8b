// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::config::validate_budget;
use crate::types::Model;

/// Command-line arguments for `bgworker`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "bgworker",
    version,
    about = "Run AI assistant workers in the background and get notified when they finish.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to a config file (TOML).
    ///
    /// Default: `BGWORKER_CONFIG`, or built-in defaults when unset.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Override `[paths].state_file`.
    #[arg(long, global = true, value_name = "PATH")]
    pub state_file: Option<PathBuf>,

    /// Override `[paths].logs_dir`.
    #[arg(long, global = true, value_name = "DIR")]
    pub logs_dir: Option<PathBuf>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `BGWORKER_LOG` or a default level will be used.
    #[arg(long, global = true, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Spawn a new worker.
    Spawn(SpawnArgs),

    /// List all workers with their status.
    List,

    /// Kill a running worker.
    Kill {
        /// Worker name.
        name: String,
    },

    /// Remove finished (completed, failed, killed) workers.
    Cleanup,

    /// Show counts per status and where state is kept.
    Status,

    /// Send a test notification.
    TestNotify {
        /// Target agent; defaults to `[notify].default_target`.
        target: Option<String>,
    },

    /// Poll running workers until Ctrl-C, notifying as they finish.
    Monitor {
        /// Seconds between passes; defaults to `[monitor].poll_interval_secs`.
        #[arg(long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..))]
        interval: Option<u64>,

        /// Run a single pass and exit.
        #[arg(long)]
        once: bool,
    },
}

#[derive(Debug, Clone, Args)]
pub struct SpawnArgs {
    /// Unique worker name.
    pub name: String,

    /// Prompt handed to the assistant.
    pub prompt: String,

    /// Model; defaults to `[defaults].model`.
    #[arg(long, value_enum)]
    pub model: Option<Model>,

    /// Spend ceiling in USD; defaults to `[defaults].budget`.
    #[arg(long, value_parser = parse_budget)]
    pub budget: Option<f64>,

    /// Agent to notify on completion; defaults to `[notify].default_target`.
    #[arg(long, value_name = "AGENT")]
    pub notify: Option<String>,

    /// Wait for the worker to finish before returning.
    #[arg(long)]
    pub foreground: bool,
}

fn parse_budget(s: &str) -> Result<f64, String> {
    let budget: f64 = s
        .trim()
        .parse()
        .map_err(|_| format!("not a number: {s}"))?;
    validate_budget(budget)?;
    Ok(budget)
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
