use super::*;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;
use tokio::sync::Notify;

use crate::embeddings::chunking::ChunkingConfig;
use crate::embeddings::client::{Embedder, EmbeddingError};
use crate::progress::NullProgress;
use crate::store::{SnapshotStore, SourceDocument, VectorStore};

struct StaticEmbedder {
    calls: AtomicUsize,
}

#[async_trait]
impl Embedder for StaticEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let lower = text.to_lowercase();
        // Unrelated texts share only the small bias component, which
        // keeps them below the search threshold.
        Ok(vec![
            if lower.contains("library") { 1.0 } else { 0.0 },
            0.25,
        ])
    }
}

struct FixtureCorpus {
    documents: Vec<SourceDocument>,
    calls: AtomicUsize,
    gate: Option<Arc<Notify>>,
}

#[async_trait]
impl DocumentCorpus for FixtureCorpus {
    async fn list_all(&self) -> anyhow::Result<Vec<SourceDocument>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        Ok(self.documents.clone())
    }
}

struct BrokenCorpus;

#[async_trait]
impl DocumentCorpus for BrokenCorpus {
    async fn list_all(&self) -> anyhow::Result<Vec<SourceDocument>> {
        anyhow::bail!("wiki listing unavailable")
    }
}

fn article(id: i64, title: &str, content: &str) -> SourceDocument {
    SourceDocument {
        id,
        title: title.to_string(),
        content: content.to_string(),
        group: "SchoolA".to_string(),
        author: None,
        created_at: Utc::now(),
    }
}

fn coordinator_with(
    corpus: Arc<dyn DocumentCorpus>,
    embedder: Arc<dyn Embedder>,
    dir: &TempDir,
) -> RagCoordinator {
    let store = VectorStore::open(
        embedder,
        ChunkingConfig::default(),
        SnapshotStore::new(dir.path()),
    )
    .expect("store opens");

    RagCoordinator::new(store, corpus, Arc::new(NullProgress))
}

#[tokio::test]
async fn starts_uninitialized_and_search_is_noop() {
    let embedder = Arc::new(StaticEmbedder {
        calls: AtomicUsize::new(0),
    });
    let corpus = Arc::new(FixtureCorpus {
        documents: vec![article(1, "Library Hours", "The library opens at 9am.")],
        calls: AtomicUsize::new(0),
        gate: None,
    });
    let dir = TempDir::new().expect("tempdir");
    let coordinator = coordinator_with(
        Arc::clone(&corpus) as Arc<dyn DocumentCorpus>,
        Arc::clone(&embedder) as Arc<dyn Embedder>,
        &dir,
    );

    assert_eq!(coordinator.state(), IndexState::Uninitialized);
    assert!(coordinator.search_documents("library", None, 5).await.is_empty());
    assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn initialize_indexes_corpus() {
    let embedder: Arc<dyn Embedder> = Arc::new(StaticEmbedder {
        calls: AtomicUsize::new(0),
    });
    let corpus: Arc<dyn DocumentCorpus> = Arc::new(FixtureCorpus {
        documents: vec![
            article(1, "Library Hours", "The library opens at 9am."),
            article(2, "Dining Plan", "Meals are served until 8pm."),
        ],
        calls: AtomicUsize::new(0),
        gate: None,
    });
    let dir = TempDir::new().expect("tempdir");
    let coordinator = coordinator_with(corpus, embedder, &dir);

    let summary = coordinator.initialize().await.expect("initialize succeeds");

    assert_eq!(summary.indexed, 2);
    assert!(summary.is_clean());
    assert_eq!(coordinator.state(), IndexState::Initialized);

    let results = coordinator.search_documents("library", None, 5).await;
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].document.metadata.source_id, 1);
}

#[tokio::test]
async fn empty_corpus_still_initializes() {
    let embedder: Arc<dyn Embedder> = Arc::new(StaticEmbedder {
        calls: AtomicUsize::new(0),
    });
    let corpus: Arc<dyn DocumentCorpus> = Arc::new(FixtureCorpus {
        documents: Vec::new(),
        calls: AtomicUsize::new(0),
        gate: None,
    });
    let dir = TempDir::new().expect("tempdir");
    let coordinator = coordinator_with(corpus, embedder, &dir);

    let summary = coordinator.initialize().await.expect("initialize succeeds");

    assert_eq!(summary.total(), 0);
    assert_eq!(coordinator.state(), IndexState::Initialized);
}

#[tokio::test]
async fn corpus_failure_marks_failed() {
    let embedder: Arc<dyn Embedder> = Arc::new(StaticEmbedder {
        calls: AtomicUsize::new(0),
    });
    let dir = TempDir::new().expect("tempdir");
    let coordinator = coordinator_with(Arc::new(BrokenCorpus), embedder, &dir);

    let result = coordinator.initialize().await;

    assert!(result.is_err());
    assert_eq!(coordinator.state(), IndexState::Failed);
    assert!(coordinator.search_documents("library", None, 5).await.is_empty());
}

#[tokio::test]
async fn concurrent_initialize_is_ignored() {
    let embedder: Arc<dyn Embedder> = Arc::new(StaticEmbedder {
        calls: AtomicUsize::new(0),
    });
    let gate = Arc::new(Notify::new());
    let corpus = Arc::new(FixtureCorpus {
        documents: vec![article(1, "Library Hours", "The library opens at 9am.")],
        calls: AtomicUsize::new(0),
        gate: Some(Arc::clone(&gate)),
    });
    let dir = TempDir::new().expect("tempdir");
    let coordinator = Arc::new(coordinator_with(
        Arc::clone(&corpus) as Arc<dyn DocumentCorpus>,
        embedder,
        &dir,
    ));

    let first = tokio::spawn({
        let coordinator = Arc::clone(&coordinator);
        async move { coordinator.initialize().await }
    });

    // Let the first call reach the corpus fetch and park there.
    tokio::task::yield_now().await;
    while corpus.calls.load(Ordering::SeqCst) == 0 {
        tokio::task::yield_now().await;
    }

    // The second call must bail out without fetching the corpus again.
    let second = coordinator.initialize().await.expect("no-op succeeds");
    assert_eq!(second.total(), 0);
    assert_eq!(corpus.calls.load(Ordering::SeqCst), 1);

    gate.notify_one();
    let summary = first
        .await
        .expect("task joins")
        .expect("initialize succeeds");
    assert_eq!(summary.indexed, 1);
    assert_eq!(coordinator.state(), IndexState::Initialized);
}

#[tokio::test]
async fn restored_snapshot_starts_initialized() {
    let embedder: Arc<dyn Embedder> = Arc::new(StaticEmbedder {
        calls: AtomicUsize::new(0),
    });
    let corpus: Arc<dyn DocumentCorpus> = Arc::new(FixtureCorpus {
        documents: vec![article(1, "Library Hours", "The library opens at 9am.")],
        calls: AtomicUsize::new(0),
        gate: None,
    });
    let dir = TempDir::new().expect("tempdir");

    {
        let coordinator = coordinator_with(
            Arc::clone(&corpus) as Arc<dyn DocumentCorpus>,
            Arc::clone(&embedder) as Arc<dyn Embedder>,
            &dir,
        );
        coordinator.initialize().await.expect("initialize succeeds");
    }

    // A new coordinator over the persisted store can search right away.
    let restored = coordinator_with(corpus, embedder, &dir);
    assert_eq!(restored.state(), IndexState::Initialized);
    assert_eq!(
        restored.search_documents("library", None, 5).await.len(),
        1
    );
}

#[tokio::test]
async fn reinitialize_replaces_index() {
    let embedder: Arc<dyn Embedder> = Arc::new(StaticEmbedder {
        calls: AtomicUsize::new(0),
    });
    let corpus = Arc::new(FixtureCorpus {
        documents: vec![article(1, "Library Hours", "The library opens at 9am.")],
        calls: AtomicUsize::new(0),
        gate: None,
    });
    let dir = TempDir::new().expect("tempdir");
    let coordinator = coordinator_with(
        Arc::clone(&corpus) as Arc<dyn DocumentCorpus>,
        embedder,
        &dir,
    );

    coordinator.initialize().await.expect("first run succeeds");
    coordinator.initialize().await.expect("second run succeeds");

    assert_eq!(corpus.calls.load(Ordering::SeqCst), 2);
    assert_eq!(coordinator.document_count().await, 1);
    assert_eq!(coordinator.indexed_source_ids().await, vec![1]);
}
