use thiserror::Error;

pub type Result<T> = std::result::Result<T, AssistantError>;

#[derive(Error, Debug)]
pub enum AssistantError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Embedding error: {0}")]
    Embedding(#[from] crate::embeddings::client::EmbeddingError),

    #[error("Store error: {0}")]
    Store(#[from] crate::store::StoreError),

    #[error("Chat provider error: {0}")]
    Llm(#[from] crate::llm::LlmError),

    #[error("Portal error: {0}")]
    Portal(#[from] crate::portal::PortalError),

    #[error("Tool error: {0}")]
    Tool(#[from] crate::tools::ToolError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub mod agent;
pub mod commands;
pub mod config;
pub mod embeddings;
pub mod llm;
pub mod portal;
pub mod progress;
pub mod rag;
pub mod store;
pub mod tools;
