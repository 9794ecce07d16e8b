// src/monitor/mod.rs

//! Status Monitor.
//!
//! A monitor pass is a function of (pid liveness, log contents) → status:
//! every `running` record whose process is gone gets classified from its log
//! tail and, for `completed` / `failed`, notified once. Terminal records are
//! never looked at again, so passes can be repeated freely.
//!
//! [`Monitor::pass`] is used both lazily (before `list`, `status`, `spawn`,
//! `kill`) and from the polling loop in [`Monitor::run_until`].

pub mod classify;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::config::ClassifyRules;
use crate::errors::Result;
use crate::exec::ProcessTable;
use crate::notify::{Notifier, completion_message};
use crate::store::{WorkerRecord, WorkerStore};
use crate::types::WorkerStatus;

pub use classify::{Classification, classify_log, classify_tail};

/// What happened to one record during a pass.
#[derive(Debug, Clone)]
pub struct Transition {
    pub name: String,
    pub status: WorkerStatus,
    pub summary: String,
    /// `None` when the new status does not notify; otherwise the delivery
    /// result (`Err` holds the failure text).
    pub delivery: Option<std::result::Result<(), String>>,
}

pub struct Monitor {
    store: Arc<dyn WorkerStore>,
    processes: Arc<dyn ProcessTable>,
    notifier: Arc<dyn Notifier>,
    rules: ClassifyRules,
    tail_bytes: u64,
}

impl Monitor {
    pub fn new(
        store: Arc<dyn WorkerStore>,
        processes: Arc<dyn ProcessTable>,
        notifier: Arc<dyn Notifier>,
        rules: ClassifyRules,
        tail_bytes: u64,
    ) -> Self {
        Self {
            store,
            processes,
            notifier,
            rules,
            tail_bytes,
        }
    }

    /// Run one monitor pass.
    ///
    /// Classification and the `notified` flag are written in the same store
    /// update, before any message is sent. A crash between the two loses a
    /// notification rather than duplicating it.
    pub async fn pass(&self) -> Result<Vec<Transition>> {
        let now = Utc::now();
        // (record, whether this pass claimed its notification)
        let mut finished: Vec<(WorkerRecord, bool)> = Vec::new();

        self.store.update(&mut |workers| {
            for record in workers.values_mut() {
                if !record.is_running() {
                    continue;
                }
                if let Some(pid) = record.pid {
                    if self.processes.is_alive(pid) {
                        continue;
                    }
                    debug!(worker = %record.name, pid, "worker process has exited");
                } else {
                    warn!(worker = %record.name, "running worker has no pid; treating as exited");
                }

                let c = classify_log(&record.log_path, self.tail_bytes, &self.rules);
                record.finish(c.outcome, now);
                record.summary = Some(c.summary);
                let claim = record.status.notifies() && !record.notified;
                if claim {
                    record.notified = true;
                }
                info!(worker = %record.name, status = %record.status, "worker finished");
                finished.push((record.clone(), claim));
            }
            Ok(())
        })?;

        let mut transitions = Vec::with_capacity(finished.len());
        for (record, claim) in finished {
            let delivery = if claim {
                Some(self.deliver(&record, now).await)
            } else {
                None
            };
            transitions.push(Transition {
                name: record.name.clone(),
                status: record.status,
                summary: record.summary.clone().unwrap_or_default(),
                delivery,
            });
        }

        Ok(transitions)
    }

    async fn deliver(
        &self,
        record: &WorkerRecord,
        now: chrono::DateTime<Utc>,
    ) -> std::result::Result<(), String> {
        let message = completion_message(record, now);
        match self.notifier.send(&record.notify_target, &message).await {
            Ok(()) => Ok(()),
            Err(e) => {
                // At-most-once: `notified` stays true.
                warn!(
                    worker = %record.name,
                    target = %record.notify_target,
                    error = %e,
                    "notification failed; not retrying"
                );
                Err(e.to_string())
            }
        }
    }

    /// Poll every `interval` until `shutdown` resolves.
    ///
    /// Passes run one at a time; a failed pass (e.g. corrupt state) is logged
    /// and the loop carries on.
    pub async fn run_until<F>(
        &self,
        interval: Duration,
        shutdown: F,
        mut on_transition: impl FnMut(&Transition),
    ) where
        F: Future<Output = ()>,
    {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        info!(interval_secs = interval.as_secs(), "monitor loop started");
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = ticker.tick() => {
                    match self.pass().await {
                        Ok(transitions) => transitions.iter().for_each(&mut on_transition),
                        Err(e) => warn!(error = %e, "monitor pass failed"),
                    }
                }
            }
        }
        info!("monitor loop finished");
    }
}
