// tests/spawn_lifecycle.rs

mod common;
use crate::common::{Harness, RecordBuilder, init_tracing, success_envelope, with_timeout};

use std::sync::Arc;
use std::time::Duration;

use bgworker::errors::WorkerError;
use bgworker::exec::ProcessTable;
use bgworker::manager::{SpawnRequest, WorkerManager, validate_name};
use bgworker::store::{JsonFileStore, WorkerStore};
use bgworker::types::{Model, WorkerStatus};

#[tokio::test]
async fn spawn_records_a_running_worker_with_defaults() {
    init_tracing();
    let h = Harness::new();

    let outcome = h
        .manager
        .spawn(SpawnRequest::new("research", "summarise the repo"))
        .await
        .unwrap();

    let record = h.record("research").expect("record persisted");
    assert_eq!(record, outcome.record);
    assert_eq!(record.status, WorkerStatus::Running);
    assert_eq!(record.model, Model::Haiku);
    assert_eq!(record.budget, 2.0);
    assert_eq!(record.notify_target, "main");
    assert_eq!(record.pid, Some(4000));
    assert!(!record.notified);
    assert!(record.ended_at.is_none());
    assert!(outcome.transitions.is_empty());
}

#[tokio::test]
async fn spawn_passes_assistant_arguments_and_log_path() {
    let h = Harness::new();
    let request = SpawnRequest {
        model: Some(Model::Sonnet),
        budget: Some(0.25),
        notify_target: Some("ops".to_string()),
        ..SpawnRequest::new("w1", "fix the tests")
    };

    let record = h.manager.spawn(request).await.unwrap().record;

    let requests = h.launcher.requests();
    assert_eq!(requests.len(), 1);
    let launch = &requests[0];
    assert_eq!(launch.program, "claude");
    assert_eq!(
        launch.args,
        vec![
            "--print",
            "--session-id",
            record.session_id.as_str(),
            "--model",
            "sonnet",
            "--max-budget-usd",
            "0.25",
            "--output-format",
            "json",
            "fix the tests",
        ]
    );

    let expected_log = h
        .manager
        .config()
        .paths
        .logs_dir
        .join(format!("w1-{}.log", record.session_id));
    assert_eq!(launch.log_path, expected_log);
    assert_eq!(record.log_path, expected_log);
    assert!(expected_log.exists());
    assert_eq!(record.notify_target, "ops");
}

#[tokio::test]
async fn each_spawn_gets_a_fresh_session() {
    let h = Harness::new();
    let a = h.manager.spawn(SpawnRequest::new("a", "p")).await.unwrap().record;
    let b = h.manager.spawn(SpawnRequest::new("b", "p")).await.unwrap().record;

    assert_ne!(a.session_id, b.session_id);
    assert_ne!(a.log_path, b.log_path);
}

#[tokio::test]
async fn duplicate_running_name_is_rejected() {
    let h = Harness::new();
    h.manager.spawn(SpawnRequest::new("w1", "first")).await.unwrap();

    let err = h
        .manager
        .spawn(SpawnRequest::new("w1", "second"))
        .await
        .unwrap_err();

    assert!(matches!(err, WorkerError::DuplicateWorker(ref n) if n == "w1"));
    assert_eq!(h.launcher.requests().len(), 1, "no second process launched");
    assert_eq!(h.record("w1").unwrap().prompt, "first");
}

#[tokio::test]
async fn terminal_record_is_replaced_by_respawn() {
    let h = Harness::new();
    h.store
        .upsert(
            RecordBuilder::new("w1")
                .status(WorkerStatus::Completed)
                .notified(true)
                .build(),
        )
        .unwrap();

    let record = h
        .manager
        .spawn(SpawnRequest::new("w1", "again"))
        .await
        .unwrap()
        .record;

    assert_eq!(record.status, WorkerStatus::Running);
    assert!(!record.notified);
    assert_eq!(h.record("w1").unwrap().prompt, "again");
}

#[tokio::test]
async fn finished_worker_frees_its_name() {
    let h = Harness::new();
    let first = h.manager.spawn(SpawnRequest::new("w1", "one")).await.unwrap().record;
    h.finish(&first, &success_envelope("done"));

    // The lazy pass inside spawn classifies the old record before the check.
    let second = h.manager.spawn(SpawnRequest::new("w1", "two")).await.unwrap().record;

    assert_eq!(second.status, WorkerStatus::Running);
    assert_ne!(second.session_id, first.session_id);
    assert_eq!(h.notifier.count(), 1);
}

#[tokio::test]
async fn launch_failure_persists_nothing() {
    let h = Harness::new();
    h.launcher.set_fail(true);

    let err = h
        .manager
        .spawn(SpawnRequest::new("w1", "p"))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "SpawnFailed");
    assert!(err.to_string().contains("not found on PATH"));
    assert!(h.record("w1").is_none());
}

#[tokio::test]
async fn invalid_names_are_rejected_before_launch() {
    let h = Harness::new();
    for name in ["", "../escape", "-flag", ".hidden", "has space", "a/b"] {
        let err = h
            .manager
            .spawn(SpawnRequest::new(name, "p"))
            .await
            .unwrap_err();
        assert!(matches!(err, WorkerError::InvalidName(_)), "{name:?}: {err:?}");
    }
    assert!(h.launcher.requests().is_empty());
}

#[test]
fn name_rules() {
    assert!(validate_name("build-1.2_final").is_ok());
    assert!(validate_name(&"x".repeat(64)).is_ok());
    assert!(validate_name(&"x".repeat(65)).is_err());
    assert!(validate_name("ünïcode").is_err());
}

#[tokio::test]
async fn non_positive_budget_is_rejected() {
    let h = Harness::new();
    for budget in [0.0, -1.0, f64::NAN] {
        let request = SpawnRequest {
            budget: Some(budget),
            ..SpawnRequest::new("w1", "p")
        };
        let err = h.manager.spawn(request).await.unwrap_err();
        assert_eq!(err.kind(), "InvalidBudget");
    }
    assert!(h.launcher.requests().is_empty());
}

#[tokio::test]
async fn foreground_spawn_waits_and_reports_final_state() {
    init_tracing();
    let h = Harness::new();
    let request = SpawnRequest {
        foreground: true,
        ..SpawnRequest::new("fg", "quick task")
    };

    let finisher = async {
        tokio::time::sleep(Duration::from_millis(300)).await;
        let launch = h.launcher.requests().pop().expect("launched");
        std::fs::write(&launch.log_path, success_envelope("all good")).unwrap();
        h.processes.exit(4000);
    };

    let (outcome, ()) =
        with_timeout(async { tokio::join!(h.manager.spawn(request), finisher) }).await;
    let outcome = outcome.unwrap();

    assert_eq!(outcome.record.status, WorkerStatus::Completed);
    assert_eq!(outcome.record.summary.as_deref(), Some("all good"));
    assert!(outcome.record.notified);
    assert_eq!(outcome.transitions.len(), 1);
    assert_eq!(outcome.transitions[0].delivery, Some(Ok(())));
    assert_eq!(h.notifier.count(), 1);
}

/// A second manager over the harness's state file and fakes, as a separate
/// CLI invocation would be.
fn sibling_manager(h: &Harness) -> WorkerManager {
    let config = h.manager.config().clone();
    let store = Arc::new(JsonFileStore::new(config.paths.state_file.clone()));
    WorkerManager::new(
        config,
        store,
        Arc::new(h.launcher.clone()),
        Arc::new(h.processes.clone()),
        Arc::new(h.notifier.clone()),
    )
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_spawns_of_one_name_track_a_single_worker() {
    init_tracing();
    let h = Harness::with_json_store();
    // Both spawns pass the early duplicate check before either saves.
    h.launcher.set_delay(Duration::from_millis(200));

    let a = Arc::new(sibling_manager(&h));
    let b = Arc::new(sibling_manager(&h));
    let spawn_a = tokio::spawn(async move { a.spawn(SpawnRequest::new("w1", "from a")).await });
    let spawn_b = tokio::spawn(async move { b.spawn(SpawnRequest::new("w1", "from b")).await });
    let (ra, rb) = with_timeout(async { tokio::join!(spawn_a, spawn_b) }).await;
    let results = [ra.unwrap(), rb.unwrap()];

    assert_eq!(h.launcher.requests().len(), 2, "both spawns reached the launcher");
    let winners: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    assert_eq!(winners.len(), 1, "{results:?}");
    let losers: Vec<_> = results.iter().filter_map(|r| r.as_ref().err()).collect();
    assert!(matches!(losers[0], WorkerError::DuplicateWorker(n) if n == "w1"));

    let winner = &winners[0].record;
    let workers = h.store.load().unwrap();
    assert_eq!(workers.len(), 1);
    assert_eq!(workers["w1"].pid, winner.pid);
    assert!(winner.log_path.exists());

    let loser_pid = if winner.pid == Some(4000) { 4001 } else { 4000 };
    assert_eq!(h.processes.signals(), vec![(loser_pid, "SIGTERM")]);
    assert!(!h.processes.is_alive(loser_pid));
    for request in h.launcher.requests() {
        if request.log_path != winner.log_path {
            assert!(!request.log_path.exists(), "{:?}", request.log_path);
        }
    }
}
