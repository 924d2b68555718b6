use super::*;
use crate::store::{DocumentKind, DocumentMetadata};
use chrono::Utc;
use std::fs;
use tempfile::TempDir;

fn document(id: &str, source_id: i64) -> VectorDocument {
    VectorDocument {
        id: id.to_string(),
        content: "chunk text".to_string(),
        metadata: DocumentMetadata {
            title: "Test Article".to_string(),
            source_id,
            group: "SchoolA".to_string(),
            author: None,
            created_at: Utc::now(),
            kind: DocumentKind::Whole,
            chunk_index: None,
        },
        embedding: Some(vec![0.1, 0.2, 0.3]),
    }
}

#[test]
fn load_missing_snapshot() {
    let dir = TempDir::new().expect("tempdir");
    let store = SnapshotStore::new(dir.path());

    assert!(store.load().expect("load succeeds").is_none());
}

#[test]
fn save_and_load_round_trip() {
    let dir = TempDir::new().expect("tempdir");
    let store = SnapshotStore::new(dir.path());

    let documents = vec![document("1", 1), document("2_chunk_0", 2)];
    store.save(&documents).expect("save succeeds");

    let loaded = store
        .load()
        .expect("load succeeds")
        .expect("snapshot present");
    assert_eq!(loaded, documents);
    assert!(store.timestamp().is_some());
}

#[test]
fn version_marker_mismatch_discards_snapshot() {
    let dir = TempDir::new().expect("tempdir");
    let store = SnapshotStore::new(dir.path());

    store.save(&[document("1", 1)]).expect("save succeeds");
    fs::write(dir.path().join("vector-snapshot.version"), "1").expect("write marker");

    assert!(store.load().expect("load succeeds").is_none());
}

#[test]
fn corrupt_snapshot_is_ignored() {
    let dir = TempDir::new().expect("tempdir");
    let store = SnapshotStore::new(dir.path());

    store.save(&[document("1", 1)]).expect("save succeeds");
    fs::write(dir.path().join("vector-snapshot.json"), "{not json").expect("write garbage");

    assert!(store.load().expect("load succeeds").is_none());
}

#[test]
fn erase_removes_both_keys() {
    let dir = TempDir::new().expect("tempdir");
    let store = SnapshotStore::new(dir.path());

    store.save(&[document("1", 1)]).expect("save succeeds");
    store.erase().expect("erase succeeds");

    assert!(!dir.path().join("vector-snapshot.json").exists());
    assert!(!dir.path().join("vector-snapshot.version").exists());
    assert!(store.load().expect("load succeeds").is_none());
}

#[test]
fn save_overwrites_previous_snapshot() {
    let dir = TempDir::new().expect("tempdir");
    let store = SnapshotStore::new(dir.path());

    store.save(&[document("1", 1)]).expect("save succeeds");
    store
        .save(&[document("2", 2), document("3", 3)])
        .expect("save succeeds");

    let loaded = store
        .load()
        .expect("load succeeds")
        .expect("snapshot present");
    assert_eq!(loaded.len(), 2);
    assert_eq!(loaded[0].metadata.source_id, 2);
}
