// Vector store module
// Owns the document collection: chunking, embedding, similarity search,
// and snapshot persistence

pub mod snapshot;

#[cfg(test)]
mod tests;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::embeddings::chunking::{ChunkingConfig, chunk_text};
use crate::embeddings::client::{Embedder, EmbeddingError};
use crate::progress::ProgressSink;

pub use snapshot::{SnapshotError, SnapshotStore};

/// Results scoring below this are dropped from search output.
pub const MIN_SCORE: f32 = 0.3;

/// Pause between documents during batch indexing; the embedding
/// provider rate-limits bursts.
const INTER_DOCUMENT_DELAY: Duration = Duration::from_millis(200);

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("embedding dimension mismatch: {left} vs {right}")]
    DimensionMismatch { left: usize, right: usize },

    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    #[error("snapshot persistence failed: {0}")]
    Snapshot(#[from] SnapshotError),
}

/// Whether a stored document is a full article or one chunk of it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Whole,
    Chunk,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub title: String,
    pub source_id: i64,
    pub group: String,
    pub author: Option<String>,
    pub created_at: DateTime<Utc>,
    pub kind: DocumentKind,
    pub chunk_index: Option<usize>,
}

/// One indexed unit: a whole short article or a chunk of a longer one.
/// `embedding` stays empty until the provider call succeeds; documents
/// without it are invisible to search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorDocument {
    pub id: String,
    pub content: String,
    pub metadata: DocumentMetadata,
    pub embedding: Option<Vec<f32>>,
}

/// Un-indexed source article as fetched from the corpus
#[derive(Debug, Clone, PartialEq)]
pub struct SourceDocument {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub group: String,
    pub author: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct SearchResult {
    pub document: VectorDocument,
    pub score: f32,
}

/// Per-document failure recorded during batch indexing
#[derive(Debug, Clone)]
pub struct IndexingFailure {
    pub title: String,
    pub error: String,
}

/// Aggregate outcome of a batch indexing run
#[derive(Debug, Clone, Default)]
pub struct IndexingSummary {
    pub indexed: usize,
    pub failures: Vec<IndexingFailure>,
}

impl IndexingSummary {
    #[inline]
    pub fn total(&self) -> usize {
        self.indexed + self.failures.len()
    }

    #[inline]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// In-memory vector collection with cosine similarity search and a
/// persisted snapshot.
///
/// Single-writer: the collection is process-local and persistence is
/// last-write-wins. A crash mid-batch leaves completed documents
/// persisted and the remainder absent.
pub struct VectorStore {
    documents: Vec<VectorDocument>,
    embedder: Arc<dyn Embedder>,
    chunking: ChunkingConfig,
    snapshot: SnapshotStore,
}

impl VectorStore {
    /// Open the store, restoring any compatible persisted snapshot.
    #[inline]
    pub fn open(
        embedder: Arc<dyn Embedder>,
        chunking: ChunkingConfig,
        snapshot: SnapshotStore,
    ) -> Result<Self, StoreError> {
        let documents = snapshot.load()?.unwrap_or_default();
        if !documents.is_empty() {
            info!("Restored {} documents from snapshot", documents.len());
        }

        Ok(Self {
            documents,
            embedder,
            chunking,
            snapshot,
        })
    }

    /// Index one source document: purge its previous chunks, re-chunk,
    /// embed every chunk, and persist.
    ///
    /// On any chunk failing to embed, the document's partial results are
    /// discarded and the error propagates; the store keeps neither old
    /// nor new chunks for that source in persisted state.
    #[inline]
    pub async fn add_document(
        &mut self,
        source: &SourceDocument,
        progress: &dyn ProgressSink,
    ) -> Result<(), StoreError> {
        if source.title.trim().is_empty() {
            return Err(StoreError::Validation("document title is empty".to_string()));
        }
        if source.content.trim().is_empty() {
            return Err(StoreError::Validation(format!(
                "document '{}' has no content",
                source.title
            )));
        }

        // At most one active chunk set per source id.
        self.documents
            .retain(|doc| doc.metadata.source_id != source.id);

        let chunks = chunk_text(&source.content, self.chunking.chunk_size, self.chunking.overlap);
        let total = chunks.len();
        let whole = total == 1;

        debug!(
            "Indexing '{}' (source {}) as {} chunk(s)",
            source.title, source.id, total
        );

        let mut indexed = Vec::with_capacity(total);
        for (index, chunk) in chunks.into_iter().enumerate() {
            progress.on_progress(index + 1, total, &source.title);

            // The title sharpens retrieval for chunks that never mention
            // their own subject.
            let input = format!("{}\n\n{}", source.title, chunk);
            let embedding = self.embedder.embed(&input).await?;

            indexed.push(VectorDocument {
                id: if whole {
                    source.id.to_string()
                } else {
                    format!("{}_chunk_{}", source.id, index)
                },
                content: chunk,
                metadata: DocumentMetadata {
                    title: source.title.clone(),
                    source_id: source.id,
                    group: source.group.clone(),
                    author: source.author.clone(),
                    created_at: source.created_at,
                    kind: if whole {
                        DocumentKind::Whole
                    } else {
                        DocumentKind::Chunk
                    },
                    chunk_index: (!whole).then_some(index),
                },
                embedding: Some(embedding),
            });
        }

        self.documents.extend(indexed);
        self.persist()?;
        Ok(())
    }

    /// Index a batch of source documents sequentially, pausing between
    /// documents for the provider's rate limit.
    ///
    /// Per-document failures are collected into the summary; a fatal
    /// embedding error (missing credential) aborts the batch
    /// immediately since every remaining document would fail the same
    /// way.
    #[inline]
    pub async fn add_documents(
        &mut self,
        sources: &[SourceDocument],
        progress: &dyn ProgressSink,
    ) -> Result<IndexingSummary, StoreError> {
        let mut summary = IndexingSummary::default();

        for (position, source) in sources.iter().enumerate() {
            match self.add_document(source, progress).await {
                Ok(()) => summary.indexed += 1,
                Err(StoreError::Embedding(error)) if error.is_fatal() => {
                    warn!("Aborting batch indexing: {}", error);
                    return Err(StoreError::Embedding(error));
                }
                Err(error) => {
                    warn!("Failed to index '{}': {}", source.title, error);
                    summary.failures.push(IndexingFailure {
                        title: source.title.clone(),
                        error: error.to_string(),
                    });
                }
            }

            if position + 1 < sources.len() {
                tokio::time::sleep(INTER_DOCUMENT_DELAY).await;
            }
        }

        info!(
            "Batch indexing finished: {} indexed, {} failed",
            summary.indexed,
            summary.failures.len()
        );
        Ok(summary)
    }

    /// Rank the whole collection against the query and return the best
    /// matches above [`MIN_SCORE`].
    ///
    /// Never fails: an empty store short-circuits without touching the
    /// embedding provider, and any embedding or scoring error degrades
    /// to an empty result list.
    #[inline]
    pub async fn search(&self, query: &str, max_results: usize) -> Vec<SearchResult> {
        match self.search_ranked(query, max_results).await {
            Ok(results) => results,
            Err(error) => {
                warn!("Search failed, returning no results: {}", error);
                Vec::new()
            }
        }
    }

    /// Like [`search`](Self::search), restricted to one group.
    ///
    /// The group filter runs after global ranking and truncation, so a
    /// strong match in another group can push this group's documents
    /// out of the cut.
    #[inline]
    pub async fn search_by_group(
        &self,
        query: &str,
        group: &str,
        max_results: usize,
    ) -> Vec<SearchResult> {
        self.search(query, max_results)
            .await
            .into_iter()
            .filter(|result| result.document.metadata.group == group)
            .collect()
    }

    async fn search_ranked(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<SearchResult>, StoreError> {
        if self.documents.is_empty() {
            return Ok(Vec::new());
        }

        let query_embedding = self.embedder.embed(query).await?;

        let mut scored = Vec::new();
        for document in &self.documents {
            let Some(embedding) = &document.embedding else {
                continue;
            };
            let score = cosine_similarity(&query_embedding, embedding)?;
            scored.push(SearchResult {
                document: document.clone(),
                score,
            });
        }

        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(max_results);
        scored.retain(|result| result.score >= MIN_SCORE);

        debug!(
            "Search for {:?} produced {} results above threshold",
            query,
            scored.len()
        );
        Ok(scored)
    }

    /// Remove every chunk belonging to a source document.
    #[inline]
    pub fn remove(&mut self, source_id: i64) -> Result<(), StoreError> {
        let before = self.documents.len();
        self.documents
            .retain(|doc| doc.metadata.source_id != source_id);

        if self.documents.len() != before {
            debug!(
                "Removed {} documents for source {}",
                before - self.documents.len(),
                source_id
            );
        }
        self.persist()
    }

    /// Drop the whole collection and erase persisted state.
    #[inline]
    pub fn clear(&mut self) -> Result<(), StoreError> {
        self.documents.clear();
        self.snapshot.erase()?;
        Ok(())
    }

    #[inline]
    pub fn count(&self) -> usize {
        self.documents.len()
    }

    /// Distinct source ids present in the collection, ascending.
    #[inline]
    pub fn list_source_ids(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = self
            .documents
            .iter()
            .map(|doc| doc.metadata.source_id)
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    #[inline]
    pub fn snapshot_timestamp(&self) -> Option<DateTime<Utc>> {
        self.snapshot.timestamp()
    }

    fn persist(&self) -> Result<(), StoreError> {
        self.snapshot.save(&self.documents)?;
        Ok(())
    }
}

/// Cosine similarity of two vectors, in [-1, 1]. Zero-norm vectors
/// score 0 rather than dividing by zero.
#[inline]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32, StoreError> {
    if a.len() != b.len() {
        return Err(StoreError::DimensionMismatch {
            left: a.len(),
            right: b.len(),
        });
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denominator = (norm_a * norm_b).sqrt();
    if denominator == 0.0 {
        return Ok(0.0);
    }

    Ok(dot / denominator)
}
