// RAG coordinator
// Owns the indexing lifecycle over the vector store and gates search
// behind it

#[cfg(test)]
mod tests;

use async_trait::async_trait;
use std::sync::{Arc, RwLock};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::AssistantError;
use crate::progress::ProgressSink;
use crate::store::{IndexingSummary, SearchResult, SourceDocument, VectorStore};

/// Where the corpus comes from. The portal's wiki listing implements
/// this; tests feed in fixtures.
#[async_trait]
pub trait DocumentCorpus: Send + Sync {
    async fn list_all(&self) -> anyhow::Result<Vec<SourceDocument>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexState {
    Uninitialized,
    Indexing,
    Initialized,
    Failed,
}

/// Coordinates corpus fetch, indexing, and search over the vector
/// store. Search is a no-op until indexing has completed once.
pub struct RagCoordinator {
    store: Mutex<VectorStore>,
    state: RwLock<IndexState>,
    corpus: Arc<dyn DocumentCorpus>,
    progress: Arc<dyn ProgressSink>,
}

impl RagCoordinator {
    #[inline]
    pub fn new(
        store: VectorStore,
        corpus: Arc<dyn DocumentCorpus>,
        progress: Arc<dyn ProgressSink>,
    ) -> Self {
        // A store restored from a non-empty snapshot is already a valid
        // index; search does not have to wait for a fresh run.
        let state = if store.count() > 0 {
            IndexState::Initialized
        } else {
            IndexState::Uninitialized
        };

        Self {
            store: Mutex::new(store),
            state: RwLock::new(state),
            corpus,
            progress,
        }
    }

    #[inline]
    pub fn state(&self) -> IndexState {
        *self.state.read().expect("state lock poisoned")
    }

    /// Fetch the corpus and (re-)index it from scratch.
    ///
    /// A call while indexing is already running is ignored and returns
    /// an empty summary. Per-document failures do not fail the run;
    /// the coordinator only ends up `Failed` when the corpus fetch
    /// fails, a fatal embedding error aborts the batch, or nothing at
    /// all could be indexed.
    #[inline]
    pub async fn initialize(&self) -> Result<IndexingSummary, AssistantError> {
        {
            let mut state = self.state.write().expect("state lock poisoned");
            if *state == IndexState::Indexing {
                debug!("Indexing already in progress, ignoring initialize call");
                return Ok(IndexingSummary::default());
            }
            *state = IndexState::Indexing;
        }

        let sources = match self.corpus.list_all().await {
            Ok(sources) => sources,
            Err(error) => {
                warn!("Corpus fetch failed: {}", error);
                self.set_state(IndexState::Failed);
                return Err(AssistantError::Other(error));
            }
        };

        info!("Indexing {} corpus documents", sources.len());

        let mut store = self.store.lock().await;
        if let Err(error) = store.clear() {
            self.set_state(IndexState::Failed);
            return Err(error.into());
        }

        match store.add_documents(&sources, self.progress.as_ref()).await {
            Ok(summary) => {
                if summary.indexed > 0 || sources.is_empty() {
                    self.set_state(IndexState::Initialized);
                } else {
                    self.set_state(IndexState::Failed);
                }
                Ok(summary)
            }
            Err(error) => {
                self.set_state(IndexState::Failed);
                Err(error.into())
            }
        }
    }

    /// Search the indexed corpus, optionally scoped to one group.
    /// Returns nothing until the coordinator is initialized.
    #[inline]
    pub async fn search_documents(
        &self,
        query: &str,
        group: Option<&str>,
        max_results: usize,
    ) -> Vec<SearchResult> {
        if self.state() != IndexState::Initialized {
            debug!("Search before initialization, returning no results");
            return Vec::new();
        }

        let store = self.store.lock().await;
        match group {
            Some(group) => store.search_by_group(query, group, max_results).await,
            None => store.search(query, max_results).await,
        }
    }

    /// Number of indexed documents (chunks count individually).
    #[inline]
    pub async fn document_count(&self) -> usize {
        self.store.lock().await.count()
    }

    /// Source ids currently present in the index.
    #[inline]
    pub async fn indexed_source_ids(&self) -> Vec<i64> {
        self.store.lock().await.list_source_ids()
    }

    fn set_state(&self, state: IndexState) {
        *self.state.write().expect("state lock poisoned") = state;
    }
}
