use super::*;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;

use crate::embeddings::chunking::ChunkingConfig;
use crate::embeddings::client::{Embedder, EmbeddingError};
use crate::progress::NullProgress;

/// Embedder producing deterministic keyword-axis vectors. Documents
/// mentioning different topics land far apart; a shared bias component
/// keeps unrelated pairs at a small positive similarity.
struct KeywordEmbedder {
    calls: AtomicUsize,
}

impl KeywordEmbedder {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Embedder for KeywordEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let lower = text.to_lowercase();
        Ok(vec![
            if lower.contains("library") { 1.0 } else { 0.0 },
            if lower.contains("sport") { 1.0 } else { 0.0 },
            if lower.contains("dorm") { 1.0 } else { 0.0 },
            0.5,
        ])
    }
}

/// Embedder that fails whenever the input contains a marker string.
struct FlakyEmbedder {
    fail_on: &'static str,
    error: fn() -> EmbeddingError,
    calls: AtomicUsize,
}

#[async_trait]
impl Embedder for FlakyEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if text.contains(self.fail_on) {
            return Err((self.error)());
        }
        Ok(vec![1.0, 0.0])
    }
}

fn source(id: i64, title: &str, content: &str, group: &str) -> SourceDocument {
    SourceDocument {
        id,
        title: title.to_string(),
        content: content.to_string(),
        group: group.to_string(),
        author: Some("facilities team".to_string()),
        created_at: Utc::now(),
    }
}

fn open_store(embedder: Arc<dyn Embedder>, dir: &TempDir) -> VectorStore {
    VectorStore::open(
        embedder,
        ChunkingConfig::default(),
        SnapshotStore::new(dir.path()),
    )
    .expect("store opens")
}

#[tokio::test]
async fn search_on_empty_store_skips_provider() {
    let embedder = Arc::new(KeywordEmbedder::new());
    let dir = TempDir::new().expect("tempdir");
    let store = open_store(Arc::clone(&embedder) as Arc<dyn Embedder>, &dir);

    let results = store.search("anything", 5).await;

    assert!(results.is_empty());
    assert_eq!(embedder.call_count(), 0, "no embedding call expected");
}

#[tokio::test]
async fn short_document_stored_whole() {
    let embedder: Arc<dyn Embedder> = Arc::new(KeywordEmbedder::new());
    let dir = TempDir::new().expect("tempdir");
    let mut store = open_store(embedder, &dir);

    store
        .add_document(
            &source(7, "Library Hours", "The library opens at 9am.", "SchoolA"),
            &NullProgress,
        )
        .await
        .expect("indexing succeeds");

    assert_eq!(store.count(), 1);
    let results = store.search("library", 5).await;
    assert_eq!(results[0].document.id, "7");
    assert_eq!(results[0].document.metadata.kind, DocumentKind::Whole);
    assert_eq!(results[0].document.metadata.chunk_index, None);
}

#[tokio::test]
async fn long_document_stored_as_chunks() {
    let embedder: Arc<dyn Embedder> = Arc::new(KeywordEmbedder::new());
    let dir = TempDir::new().expect("tempdir");
    let mut store = open_store(embedder, &dir);

    let content = "The library stocks many books. ".repeat(40);
    store
        .add_document(&source(3, "Library Guide", &content, "SchoolA"), &NullProgress)
        .await
        .expect("indexing succeeds");

    assert!(store.count() > 1);
    let results = store.search("library", 50).await;
    for result in &results {
        assert!(result.document.id.starts_with("3_chunk_"));
        assert_eq!(result.document.metadata.kind, DocumentKind::Chunk);
        assert!(result.document.metadata.chunk_index.is_some());
    }
}

#[tokio::test]
async fn reindexing_is_idempotent() {
    let embedder: Arc<dyn Embedder> = Arc::new(KeywordEmbedder::new());
    let dir = TempDir::new().expect("tempdir");
    let mut store = open_store(embedder, &dir);

    let doc = source(5, "Gym Rules", &"Sport equipment must be returned. ".repeat(30), "SchoolB");
    store
        .add_document(&doc, &NullProgress)
        .await
        .expect("first indexing succeeds");
    let first_count = store.count();

    store
        .add_document(&doc, &NullProgress)
        .await
        .expect("second indexing succeeds");

    assert_eq!(store.count(), first_count, "old chunks must be purged");
    assert_eq!(store.list_source_ids(), vec![5]);
}

#[tokio::test]
async fn rejects_empty_title_and_content() {
    let embedder: Arc<dyn Embedder> = Arc::new(KeywordEmbedder::new());
    let dir = TempDir::new().expect("tempdir");
    let mut store = open_store(embedder, &dir);

    let no_title = source(1, "  ", "content", "SchoolA");
    assert!(matches!(
        store.add_document(&no_title, &NullProgress).await,
        Err(StoreError::Validation(_))
    ));

    let no_content = source(1, "Title", "\n ", "SchoolA");
    assert!(matches!(
        store.add_document(&no_content, &NullProgress).await,
        Err(StoreError::Validation(_))
    ));

    assert_eq!(store.count(), 0);
}

#[tokio::test]
async fn threshold_filters_weak_matches() {
    let embedder: Arc<dyn Embedder> = Arc::new(KeywordEmbedder::new());
    let dir = TempDir::new().expect("tempdir");
    let mut store = open_store(embedder, &dir);

    store
        .add_document(
            &source(1, "Library Hours", "The library opens at 9am.", "SchoolA"),
            &NullProgress,
        )
        .await
        .expect("indexing succeeds");
    store
        .add_document(
            &source(2, "Sport Courts", "Sport courts close at 10pm.", "SchoolB"),
            &NullProgress,
        )
        .await
        .expect("indexing succeeds");

    // Both documents are ranked, but only the library one clears the
    // minimum score for a library query.
    let results = store.search("library opening times", 10).await;
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].document.metadata.source_id, 1);
    assert!(results[0].score > MIN_SCORE);
}

#[tokio::test]
async fn group_search_never_leaks_other_groups() {
    let embedder: Arc<dyn Embedder> = Arc::new(KeywordEmbedder::new());
    let dir = TempDir::new().expect("tempdir");
    let mut store = open_store(embedder, &dir);

    store
        .add_document(
            &source(1, "Library Hours", "The library opens at 9am.", "SchoolA"),
            &NullProgress,
        )
        .await
        .expect("indexing succeeds");
    store
        .add_document(
            &source(2, "Library Rules", "Library rules for visitors.", "SchoolB"),
            &NullProgress,
        )
        .await
        .expect("indexing succeeds");

    let results = store.search_by_group("library", "SchoolA", 10).await;
    assert!(!results.is_empty());
    for result in &results {
        assert_eq!(result.document.metadata.group, "SchoolA");
    }
}

#[tokio::test]
async fn group_filter_applies_after_ranking_cut() {
    let embedder: Arc<dyn Embedder> = Arc::new(KeywordEmbedder::new());
    let dir = TempDir::new().expect("tempdir");
    let mut store = open_store(embedder, &dir);

    store
        .add_document(
            &source(1, "Library Hours", "The library opens at 9am.", "SchoolA"),
            &NullProgress,
        )
        .await
        .expect("indexing succeeds");
    store
        .add_document(
            &source(2, "Dorm Library Corner", "The dorm has a library corner.", "SchoolB"),
            &NullProgress,
        )
        .await
        .expect("indexing succeeds");

    // With the cut at one result, the globally best match wins the slot
    // even though SchoolB has its own weaker match.
    let results = store.search_by_group("library", "SchoolB", 1).await;
    assert!(results.is_empty());
}

#[tokio::test]
async fn failed_chunk_discards_document() {
    let dir = TempDir::new().expect("tempdir");
    let flaky = Arc::new(FlakyEmbedder {
        fail_on: "poison",
        error: || EmbeddingError::Provider {
            status: 500,
            body: "boom".to_string(),
        },
        calls: AtomicUsize::new(0),
    });
    let mut store = open_store(Arc::clone(&flaky) as Arc<dyn Embedder>, &dir);

    let good = source(1, "Clean Article", &"Nothing wrong here. ".repeat(30), "SchoolA");
    store
        .add_document(&good, &NullProgress)
        .await
        .expect("indexing succeeds");
    let persisted = store.count();

    let mut bad_content = "Fine first sentence. ".repeat(30);
    bad_content.push_str("poison");
    let bad = source(1, "Clean Article", &bad_content, "SchoolA");

    let result = store.add_document(&bad, &NullProgress).await;
    assert!(matches!(
        result,
        Err(StoreError::Embedding(EmbeddingError::Provider { .. }))
    ));

    // The in-memory collection lost the purged chunks, but the snapshot
    // still holds the last fully indexed version.
    assert_eq!(store.count(), 0);
    let reopened = open_store(Arc::clone(&flaky) as Arc<dyn Embedder>, &dir);
    assert_eq!(reopened.count(), persisted);
}

#[tokio::test]
async fn batch_collects_failures_without_aborting() {
    let dir = TempDir::new().expect("tempdir");
    let flaky: Arc<dyn Embedder> = Arc::new(FlakyEmbedder {
        fail_on: "Broken",
        error: || EmbeddingError::Provider {
            status: 503,
            body: "unavailable".to_string(),
        },
        calls: AtomicUsize::new(0),
    });
    let mut store = open_store(flaky, &dir);

    let sources = vec![
        source(1, "First", "First article text.", "SchoolA"),
        source(2, "Broken", "Broken article text.", "SchoolA"),
        source(3, "Third", "Third article text.", "SchoolA"),
    ];

    let summary = store
        .add_documents(&sources, &NullProgress)
        .await
        .expect("batch completes");

    assert_eq!(summary.indexed, 2);
    assert_eq!(summary.failures.len(), 1);
    assert_eq!(summary.failures[0].title, "Broken");
    assert!(!summary.is_clean());
    assert_eq!(store.list_source_ids(), vec![1, 3]);
}

#[tokio::test]
async fn batch_aborts_on_missing_credential() {
    let dir = TempDir::new().expect("tempdir");
    let flaky = Arc::new(FlakyEmbedder {
        fail_on: "Second",
        error: || EmbeddingError::MissingCredential,
        calls: AtomicUsize::new(0),
    });
    let mut store = open_store(Arc::clone(&flaky) as Arc<dyn Embedder>, &dir);

    let sources = vec![
        source(1, "First", "First article text.", "SchoolA"),
        source(2, "Second", "Second article text.", "SchoolA"),
        source(3, "Third", "Third article text.", "SchoolA"),
    ];

    let result = store.add_documents(&sources, &NullProgress).await;
    assert!(matches!(
        result,
        Err(StoreError::Embedding(EmbeddingError::MissingCredential))
    ));

    // The third document was never attempted.
    assert_eq!(flaky.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn persistence_round_trip() {
    let embedder: Arc<dyn Embedder> = Arc::new(KeywordEmbedder::new());
    let dir = TempDir::new().expect("tempdir");

    {
        let mut store = open_store(Arc::clone(&embedder) as Arc<dyn Embedder>, &dir);
        store
            .add_document(
                &source(1, "Library Hours", "The library opens at 9am.", "SchoolA"),
                &NullProgress,
            )
            .await
            .expect("indexing succeeds");
        store
            .add_document(
                &source(2, "Sport Courts", &"Sport schedules vary. ".repeat(30), "SchoolB"),
                &NullProgress,
            )
            .await
            .expect("indexing succeeds");
    }

    let reopened = open_store(embedder, &dir);
    assert!(reopened.count() > 1);
    assert_eq!(reopened.list_source_ids(), vec![1, 2]);
}

#[tokio::test]
async fn clear_erases_persisted_state() {
    let embedder: Arc<dyn Embedder> = Arc::new(KeywordEmbedder::new());
    let dir = TempDir::new().expect("tempdir");
    let mut store = open_store(Arc::clone(&embedder) as Arc<dyn Embedder>, &dir);

    store
        .add_document(
            &source(1, "Library Hours", "The library opens at 9am.", "SchoolA"),
            &NullProgress,
        )
        .await
        .expect("indexing succeeds");
    store.clear().expect("clear succeeds");

    assert_eq!(store.count(), 0);
    let reopened = open_store(embedder, &dir);
    assert_eq!(reopened.count(), 0);
}

#[tokio::test]
async fn remove_drops_all_chunks_for_source() {
    let embedder: Arc<dyn Embedder> = Arc::new(KeywordEmbedder::new());
    let dir = TempDir::new().expect("tempdir");
    let mut store = open_store(embedder, &dir);

    store
        .add_document(
            &source(1, "Library Guide", &"Library floors and rooms. ".repeat(30), "SchoolA"),
            &NullProgress,
        )
        .await
        .expect("indexing succeeds");
    store
        .add_document(
            &source(2, "Sport Courts", "Sport courts close at 10pm.", "SchoolB"),
            &NullProgress,
        )
        .await
        .expect("indexing succeeds");

    store.remove(1).expect("remove succeeds");

    assert_eq!(store.list_source_ids(), vec![2]);
}

#[test]
fn cosine_similarity_bounds() {
    let a = vec![0.6, 0.8, 0.0];
    let b = vec![-0.6, -0.8, 0.0];
    let c = vec![0.8, -0.6, 0.0];

    let self_sim = cosine_similarity(&a, &a).expect("same dimensions");
    assert!((self_sim - 1.0).abs() < 1e-6);

    let opposite = cosine_similarity(&a, &b).expect("same dimensions");
    assert!((opposite + 1.0).abs() < 1e-6);

    let orthogonal = cosine_similarity(&a, &c).expect("same dimensions");
    assert!(orthogonal.abs() < 1e-6);
}

#[test]
fn cosine_similarity_zero_norm() {
    let zero = vec![0.0, 0.0];
    let unit = vec![1.0, 0.0];
    assert_eq!(cosine_similarity(&zero, &unit).expect("same dimensions"), 0.0);
}

#[test]
fn cosine_similarity_dimension_mismatch() {
    let a = vec![1.0, 0.0];
    let b = vec![1.0, 0.0, 0.0];
    assert!(matches!(
        cosine_similarity(&a, &b),
        Err(StoreError::DimensionMismatch { left: 2, right: 3 })
    ));
}
