// Embeddings module
// Text chunking and the embedding provider client

pub mod chunking;
pub mod client;

pub use chunking::{ChunkingConfig, chunk_text};
pub use client::{Embedder, EmbeddingClient, EmbeddingError};
