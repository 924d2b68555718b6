
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::config::EmbeddingProviderConfig;

const DEFAULT_TIMEOUT_SECONDS: u64 = 30;
const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
const EXPONENTIAL_BACKOFF_BASE: u64 = 2;

/// Hard cap on embedding input length; providers reject oversized inputs
/// with opaque errors, so we cut early and mark the cut.
pub const MAX_INPUT_CHARS: usize = 8000;
const TRUNCATION_MARKER: &str = "...";

#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("no API credential configured for the embedding provider")]
    MissingCredential,

    #[error("embedding input is empty")]
    EmptyInput,

    #[error("embedding provider returned HTTP {status}: {body}")]
    Provider { status: u16, body: String },

    #[error("embedding response is missing the vector payload")]
    MalformedResponse,

    #[error("embedding request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

impl EmbeddingError {
    /// Whether this failure makes every subsequent request pointless.
    /// Batch indexing stops on fatal errors instead of recording them
    /// per document.
    #[inline]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::MissingCredential)
    }
}

/// Anything that can turn text into a fixed-length vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;
}

/// Client for the external embedding endpoint.
///
/// Stateless apart from its connection pool; safe to share and call
/// concurrently.
#[derive(Debug, Clone)]
pub struct EmbeddingClient {
    http: reqwest::Client,
    base_url: Url,
    model: String,
    api_key: Option<String>,
    retry_attempts: u32,
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedData>,
}

#[derive(Debug, Deserialize)]
struct EmbedData {
    embedding: Vec<f32>,
}

impl EmbeddingClient {
    #[inline]
    pub fn new(config: &EmbeddingProviderConfig) -> Result<Self, EmbeddingError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECONDS))
            .build()?;

        Ok(Self {
            http,
            base_url: config.endpoint.clone(),
            model: config.model.clone(),
            api_key: config.resolve_api_key(),
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
        })
    }

    #[inline]
    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts;
        self
    }

    /// Verify the provider is reachable and the credential is accepted.
    /// Returns the embedding dimension reported back.
    #[inline]
    pub async fn health_check(&self) -> Result<usize, EmbeddingError> {
        debug!("Performing embedding provider health check");
        let vector = self.embed("health check").await?;
        Ok(vector.len())
    }

    async fn request_embedding(&self, input: &str) -> Result<Vec<f32>, EmbeddingError> {
        let key = self
            .api_key
            .as_deref()
            .ok_or(EmbeddingError::MissingCredential)?;

        let request = EmbedRequest {
            model: &self.model,
            input,
        };

        let mut last_error = None;

        for attempt in 1..=self.retry_attempts {
            debug!(
                "Embedding request attempt {}/{} ({} chars)",
                attempt,
                self.retry_attempts,
                input.len()
            );

            let response = match self
                .http
                .post(self.base_url.as_str())
                .bearer_auth(key)
                .json(&request)
                .send()
                .await
            {
                Ok(response) => response,
                Err(error) => {
                    warn!("Embedding transport error: {}", error);
                    last_error = Some(EmbeddingError::Transport(error));
                    self.backoff(attempt).await;
                    continue;
                }
            };

            let status = response.status();
            if status.is_success() {
                let payload: EmbedResponse = response
                    .json()
                    .await
                    .map_err(|_| EmbeddingError::MalformedResponse)?;

                let vector = payload
                    .data
                    .into_iter()
                    .next()
                    .map(|d| d.embedding)
                    .ok_or(EmbeddingError::MalformedResponse)?;

                if vector.is_empty() {
                    return Err(EmbeddingError::MalformedResponse);
                }

                return Ok(vector);
            }

            let body = response.text().await.unwrap_or_default();
            if status.is_server_error() {
                warn!(
                    "Embedding provider returned {} on attempt {}/{}",
                    status, attempt, self.retry_attempts
                );
                last_error = Some(EmbeddingError::Provider {
                    status: status.as_u16(),
                    body,
                });
                self.backoff(attempt).await;
                continue;
            }

            // Client errors are not retried.
            return Err(EmbeddingError::Provider {
                status: status.as_u16(),
                body,
            });
        }

        Err(last_error.unwrap_or(EmbeddingError::MalformedResponse))
    }

    async fn backoff(&self, attempt: u32) {
        if attempt < self.retry_attempts {
            let delay = Duration::from_millis(EXPONENTIAL_BACKOFF_BASE.pow(attempt - 1) * 1000);
            debug!("Waiting {:?} before retry", delay);
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl Embedder for EmbeddingClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let input = normalize_input(text);
        if input.is_empty() {
            return Err(EmbeddingError::EmptyInput);
        }

        let input = truncate_input(&input);
        let vector = self.request_embedding(&input).await?;

        debug!("Generated embedding with {} dimensions", vector.len());
        Ok(vector)
    }
}

/// Collapse newlines to spaces and trim; embedding models treat the
/// input as one flat passage.
fn normalize_input(text: &str) -> String {
    text.replace(['\n', '\r'], " ").trim().to_string()
}

/// Cut oversized input at the provider limit, marking the cut.
fn truncate_input(input: &str) -> String {
    if input.chars().count() <= MAX_INPUT_CHARS {
        return input.to_string();
    }

    let cut: String = input.chars().take(MAX_INPUT_CHARS).collect();
    warn!(
        "Embedding input truncated from {} to {} chars",
        input.chars().count(),
        MAX_INPUT_CHARS
    );
    format!("{}{}", cut, TRUNCATION_MARKER)
}
