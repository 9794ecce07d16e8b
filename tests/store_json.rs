// tests/store_json.rs

mod common;
use crate::common::{RecordBuilder, init_tracing};

use std::collections::BTreeMap;

use proptest::prelude::*;
use tempfile::TempDir;

use bgworker::errors::WorkerError;
use bgworker::store::{JsonFileStore, WorkerMap, WorkerStore};
use bgworker::types::{Model, WorkerStatus};

fn store_in(dir: &TempDir) -> JsonFileStore {
    JsonFileStore::new(dir.path().join("state").join("workers.json"))
}

#[test]
fn missing_file_reads_as_empty() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);

    assert!(store.load().unwrap().is_empty());
    assert!(!store.path().exists(), "load must not create the file");
}

#[test]
fn empty_file_reads_as_empty() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
    std::fs::write(store.path(), "  \n").unwrap();

    assert!(store.load().unwrap().is_empty());
}

#[test]
fn saved_records_load_back_identical() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);

    let mut workers = WorkerMap::new();
    let running = RecordBuilder::new("alpha").model(Model::Sonnet).budget(0.5).build();
    let done = RecordBuilder::new("beta")
        .status(WorkerStatus::Completed)
        .notified(true)
        .build();
    workers.insert(running.name.clone(), running);
    workers.insert(done.name.clone(), done);

    store.save(&workers).unwrap();
    let loaded = store.load().unwrap();

    assert_eq!(loaded, workers);
    let names: Vec<&String> = loaded.keys().collect();
    assert_eq!(names, vec!["alpha", "beta"]);
}

#[test]
fn document_uses_lowercase_status_and_model() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    store
        .upsert(
            RecordBuilder::new("w1")
                .model(Model::Opus)
                .status(WorkerStatus::Failed)
                .build(),
        )
        .unwrap();

    let raw = std::fs::read_to_string(store.path()).unwrap();
    let doc: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(doc["w1"]["status"], "failed");
    assert_eq!(doc["w1"]["model"], "opus");
    assert_eq!(doc["w1"]["notified"], false);
}

#[test]
fn garbage_document_is_corrupt_state() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
    std::fs::write(store.path(), "{ this is not json").unwrap();

    match store.load() {
        Err(WorkerError::CorruptState { path, .. }) => assert_eq!(path, store.path()),
        other => panic!("expected CorruptState, got {other:?}"),
    }
    assert!(store.load_or_empty().is_empty());
}

#[test]
fn corrupt_document_is_not_overwritten_by_update() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
    std::fs::write(store.path(), "[1, 2, 3]").unwrap();

    let err = store.upsert(RecordBuilder::new("w1").build()).unwrap_err();
    assert_eq!(err.kind(), "CorruptState");
    assert_eq!(std::fs::read_to_string(store.path()).unwrap(), "[1, 2, 3]");
}

#[test]
fn unknown_fields_survive_a_rewrite() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    store
        .upsert(
            RecordBuilder::new("w1")
                .extra("host", serde_json::json!("build-box"))
                .build(),
        )
        .unwrap();

    // Touch a different record; w1 goes through load -> save untouched.
    store.upsert(RecordBuilder::new("w2").build()).unwrap();

    let loaded = store.load().unwrap();
    assert_eq!(loaded["w1"].extra["host"], "build-box");

    let raw = std::fs::read_to_string(store.path()).unwrap();
    assert!(raw.contains("\"host\": \"build-box\""), "raw: {raw}");
}

#[test]
fn map_key_wins_over_embedded_name() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    let mut workers = WorkerMap::new();
    workers.insert("outer".to_string(), RecordBuilder::new("inner").build());
    store.save(&workers).unwrap();

    let loaded = store.load().unwrap();
    assert_eq!(loaded["outer"].name, "outer");
}

#[test]
fn remove_returns_the_record_once() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    store.upsert(RecordBuilder::new("w1").build()).unwrap();

    let removed = store.remove("w1").unwrap();
    assert_eq!(removed.map(|r| r.name), Some("w1".to_string()));
    assert!(store.remove("w1").unwrap().is_none());
    assert!(store.load().unwrap().is_empty());
}

#[test]
fn failed_mutation_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    store.upsert(RecordBuilder::new("w1").build()).unwrap();
    let before = std::fs::read_to_string(store.path()).unwrap();

    let result = store.update(&mut |workers| {
        workers.clear();
        Err(WorkerError::UnknownWorker("nope".to_string()))
    });

    assert!(matches!(result, Err(WorkerError::UnknownWorker(_))));
    assert_eq!(std::fs::read_to_string(store.path()).unwrap(), before);
}

#[test]
fn no_temp_files_left_behind() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    for name in ["a", "b", "c"] {
        store.upsert(RecordBuilder::new(name).build()).unwrap();
    }

    let leftovers: Vec<String> = std::fs::read_dir(store.path().parent().unwrap())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|n| n.contains(".tmp-"))
        .collect();
    assert!(leftovers.is_empty(), "leftovers: {leftovers:?}");
}

#[test]
fn unchanged_update_leaves_the_document_alone() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);

    store.update(&mut |_| Ok(())).unwrap();
    assert!(!store.path().exists(), "no-op update must not create the file");

    // Compact JSON: any rewrite would come back pretty-printed.
    let mut workers = WorkerMap::new();
    workers.insert("w1".to_string(), RecordBuilder::new("w1").build());
    let compact = serde_json::to_string(&workers).unwrap();
    std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
    std::fs::write(store.path(), &compact).unwrap();

    store
        .update(&mut |workers| {
            if let Some(r) = workers.get_mut("w1") {
                r.notified = false;
            }
            Ok(())
        })
        .unwrap();
    assert_eq!(std::fs::read_to_string(store.path()).unwrap(), compact);

    store.upsert(RecordBuilder::new("w2").build()).unwrap();
    assert_ne!(std::fs::read_to_string(store.path()).unwrap(), compact);
}

#[derive(Debug, Clone)]
enum Op {
    Upsert(String, bool),
    Remove(String),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    let name = prop::sample::select(vec!["a", "b", "c", "d"]).prop_map(str::to_string);
    prop_oneof![
        (name.clone(), any::<bool>()).prop_map(|(n, done)| Op::Upsert(n, done)),
        name.prop_map(Op::Remove),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// The file store behaves like a plain ordered map under upsert/remove.
    #[test]
    fn store_matches_map_model(ops in proptest::collection::vec(op_strategy(), 1..20)) {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let mut model: BTreeMap<String, WorkerStatus> = BTreeMap::new();

        for op in ops {
            match op {
                Op::Upsert(name, done) => {
                    let status = if done { WorkerStatus::Completed } else { WorkerStatus::Running };
                    store.upsert(RecordBuilder::new(&name).status(status).build()).unwrap();
                    model.insert(name, status);
                }
                Op::Remove(name) => {
                    let removed = store.remove(&name).unwrap();
                    prop_assert_eq!(removed.is_some(), model.remove(&name).is_some());
                }
            }
        }

        let loaded: BTreeMap<String, WorkerStatus> = store
            .load()
            .unwrap()
            .into_iter()
            .map(|(k, r)| (k, r.status))
            .collect();
        prop_assert_eq!(loaded, model);
    }
}
