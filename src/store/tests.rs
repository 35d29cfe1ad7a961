use std::fs;

use serde_json::json;
use tempfile::TempDir;

use super::*;

fn seeded_store() -> (TempDir, RunStore) {
    let dir = TempDir::new().expect("tempdir");
    let collection = dir.path().join("nq");
    fs::create_dir_all(&collection).expect("collection dir");
    fs::write(collection.join("b_run.json"), br#"{"results": []}"#).expect("write b");
    fs::write(collection.join("a_run.json"), br#"{"results": [], "metrics": {}}"#)
        .expect("write a");
    fs::write(collection.join("notes.txt"), b"ignored").expect("write notes");
    fs::write(collection.join("broken.json"), b"{not json").expect("write broken");
    fs::create_dir_all(dir.path().join("empty")).expect("empty dir");
    fs::write(dir.path().join("stray.json"), b"{}").expect("write stray");

    let store = RunStore::new(dir.path()).expect("store");
    (dir, store)
}

#[test]
fn list_collections_sorts_json_runs_and_skips_other_entries() {
    let (_dir, store) = seeded_store();

    let collections = store.list_collections().expect("listing succeeds");
    assert_eq!(collections.len(), 2);
    assert_eq!(
        collections["nq"],
        vec!["a_run.json", "b_run.json", "broken.json"]
    );
    assert!(collections["empty"].is_empty());
}

#[test]
fn list_collections_fails_when_root_is_missing() {
    let dir = TempDir::new().expect("tempdir");
    let store = RunStore::new(dir.path().join("missing")).expect("store");

    let err = store.list_collections().expect_err("missing root must fail");
    assert!(err.to_string().contains("collections directory not found"));
}

#[test]
fn load_run_parses_json_and_fingerprints_raw_bytes() {
    let (_dir, store) = seeded_store();

    let loaded = store.load_run("nq", "a_run.json").expect("load succeeds");
    assert_eq!(loaded.source, "nq/a_run.json");
    assert_eq!(loaded.value, json!({"results": [], "metrics": {}}));
    assert_eq!(loaded.sha256.len(), 64);
    assert_eq!(
        loaded.sha256,
        sha256_bytes(br#"{"results": [], "metrics": {}}"#)
    );
}

#[test]
fn load_run_reports_missing_and_invalid_files() {
    let (_dir, store) = seeded_store();

    let missing = store.load_run("nq", "absent.json").expect_err("missing run");
    assert!(missing.to_string().contains("run file not found"));

    let broken = store.load_run("nq", "broken.json").expect_err("broken run");
    assert!(broken.to_string().contains("invalid JSON in run file"));
}

#[test]
fn run_path_rejects_traversal_names() {
    let (_dir, store) = seeded_store();

    assert!(store.run_path("..", "a_run.json").is_err());
    assert!(store.run_path("nq", "../stray.json").is_err());
    assert!(store.run_path("nq", ".hidden.json").is_err());
    assert!(store.run_path("nq/inner", "a_run.json").is_err());
    assert!(store.run_path("nq", "run 2024-01.json").is_ok());
}

#[test]
fn load_path_reads_standalone_run_file() {
    let (dir, _store) = seeded_store();

    let loaded = load_path(&dir.path().join("stray.json")).expect("load succeeds");
    assert_eq!(loaded.value, json!({}));
    assert!(load_path(&dir.path().join("nope.json")).is_err());
}
