// src/lib.rs

#[cfg(not(unix))]
compile_error!("bgworker manages Unix process groups and only builds on Unix targets");

pub mod cli;
pub mod config;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod manager;
pub mod monitor;
pub mod notify;
pub mod store;
pub mod types;

use std::process::ExitCode;
use std::time::Duration;

use chrono::Utc;
use tracing::debug;

use crate::cli::{CliArgs, Command, SpawnArgs};
use crate::config::load_effective;
use crate::errors::Result;
use crate::exec::SignalOutcome;
use crate::manager::{SpawnRequest, StatusSummary, WorkerManager};
use crate::monitor::Transition;
use crate::notify::format_duration;
use crate::store::WorkerRecord;
use crate::types::WorkerStatus;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading (+ CLI path overrides)
/// - record store, launcher, process table, notifier
/// - the requested command
pub async fn run(args: CliArgs) -> Result<ExitCode> {
    let cfg = load_effective(args.config.as_deref())?
        .with_paths(args.state_file.clone(), args.logs_dir.clone());
    debug!(state_file = ?cfg.paths.state_file, logs_dir = ?cfg.paths.logs_dir, "config resolved");

    let manager = WorkerManager::from_config(cfg);
    execute(&manager, args.command).await
}

/// Run one command against an already-built manager.
pub async fn execute(manager: &WorkerManager, command: Command) -> Result<ExitCode> {
    match command {
        Command::Spawn(spawn) => run_spawn(manager, spawn).await,
        Command::List => {
            manager.refresh().await.iter().for_each(print_transition);
            print_list(&manager.snapshot());
            Ok(ExitCode::SUCCESS)
        }
        Command::Kill { name } => {
            let outcome = manager.kill(&name).await?;
            match (outcome.status, outcome.signal) {
                (WorkerStatus::Killed, SignalOutcome::Delivered) if outcome.escalated => {
                    println!("Killed worker '{}' (SIGKILL after grace period)", outcome.name)
                }
                (WorkerStatus::Killed, SignalOutcome::Delivered) => {
                    println!("Killed worker '{}'", outcome.name)
                }
                (WorkerStatus::Killed, SignalOutcome::AlreadyExited) => {
                    println!("Worker '{}' had already exited; marked killed", outcome.name)
                }
                (status, _) => println!(
                    "Worker '{}' finished as {status} before it was killed",
                    outcome.name
                ),
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Cleanup => {
            let removed = manager.cleanup()?;
            if removed.is_empty() {
                println!("No workers to clean up");
            }
            for r in &removed {
                println!("Removed worker '{}' ({})", r.name, r.status);
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Status => {
            manager.refresh().await.iter().for_each(print_transition);
            print_status(&manager.summarize(&manager.snapshot()));
            Ok(ExitCode::SUCCESS)
        }
        Command::TestNotify { target } => {
            let target = manager.test_notify(target.as_deref()).await?;
            println!("Test notification sent to '{target}'");
            Ok(ExitCode::SUCCESS)
        }
        Command::Monitor { interval, once } => {
            if once {
                manager.refresh().await.iter().for_each(print_transition);
                return Ok(ExitCode::SUCCESS);
            }
            let secs = interval.unwrap_or(manager.config().monitor.poll_interval_secs);
            let shutdown = async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    eprintln!("failed to listen for Ctrl+C: {e}");
                    std::future::pending::<()>().await;
                }
            };
            manager
                .monitor()
                .run_until(Duration::from_secs(secs), shutdown, print_transition)
                .await;
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn run_spawn(manager: &WorkerManager, spawn: SpawnArgs) -> Result<ExitCode> {
    let foreground = spawn.foreground;
    let request = SpawnRequest {
        name: spawn.name,
        prompt: spawn.prompt,
        model: spawn.model,
        budget: spawn.budget,
        notify_target: spawn.notify,
        foreground,
    };
    let outcome = manager.spawn(request).await?;
    let record = &outcome.record;

    if !foreground {
        println!(
            "Started worker '{}' (PID {}, model {}, log {})",
            record.name,
            record.pid.map(|p| p.to_string()).unwrap_or_else(|| "-".to_string()),
            record.model,
            record.log_path.display()
        );
        return Ok(ExitCode::SUCCESS);
    }

    outcome.transitions.iter().for_each(print_transition);
    let elapsed = format_duration(record.elapsed(Utc::now()).num_seconds());
    println!("Worker '{}' {} ({elapsed})", record.name, record.status);
    if record.status == WorkerStatus::Completed {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

/// One line per status change seen by a monitor pass.
pub fn transition_line(t: &Transition) -> String {
    match &t.delivery {
        Some(Ok(())) => format!("Worker '{}' {}; notification sent", t.name, t.status),
        Some(Err(e)) => format!("Worker '{}' {}; notification failed: {e}", t.name, t.status),
        None => format!("Worker '{}' {}", t.name, t.status),
    }
}

fn print_transition(t: &Transition) {
    println!("{}", transition_line(t));
}

fn print_list(workers: &[WorkerRecord]) {
    if workers.is_empty() {
        println!("No workers found");
        return;
    }

    let now = Utc::now();
    println!(
        "{:<20} {:<10} {:<8} {:<8} {:<8} {:<12} {:<8}",
        "Name", "Status", "Model", "Age", "Budget", "Target", "PID"
    );
    println!("{}", "─".repeat(80));

    for w in workers {
        let age = format_duration((now - w.started_at).num_seconds());
        let pid = w
            .live_pid()
            .map(|p| p.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<20} {:<10} {:<8} {:<8} {:<8} {:<12} {:<8}",
            w.name,
            w.status.as_str(),
            w.model.as_str(),
            age,
            format!("${:.2}", w.budget),
            w.notify_target,
            pid
        );
    }
}

fn print_status(s: &StatusSummary) {
    println!("bgworker status:");
    println!("   Running:   {}", s.running);
    println!("   Completed: {}", s.completed);
    println!("   Failed:    {}", s.failed);
    println!("   Killed:    {}", s.killed);
    println!("   Total:     {}", s.total);
    println!("   State file: {}", s.store);
    println!("   Logs dir:   {}", s.logs_dir.display());
}
