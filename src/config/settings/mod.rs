
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

use crate::embeddings::chunking::ChunkingConfig;

/// Environment variable consulted when a provider credential is not in
/// the config file.
pub const API_KEY_ENV: &str = "CAMPUS_ASSISTANT_API_KEY";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub embedding: EmbeddingProviderConfig,
    #[serde(default)]
    pub chat: ChatProviderConfig,
    #[serde(default)]
    pub portal: PortalConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(skip)]
    pub base_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EmbeddingProviderConfig {
    pub endpoint: Url,
    pub model: String,
    pub api_key: Option<String>,
}

impl Default for EmbeddingProviderConfig {
    fn default() -> Self {
        Self {
            endpoint: Url::parse("https://api.openai.com/v1/embeddings")
                .expect("default endpoint is valid"),
            model: "text-embedding-3-small".to_string(),
            api_key: None,
        }
    }
}

impl EmbeddingProviderConfig {
    /// Config value first, environment fallback second.
    #[inline]
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key.clone().or_else(|| env::var(API_KEY_ENV).ok())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ChatProviderConfig {
    pub endpoint: Url,
    pub model: String,
    pub api_key: Option<String>,
}

impl Default for ChatProviderConfig {
    fn default() -> Self {
        Self {
            endpoint: Url::parse("https://api.openai.com/v1/chat/completions")
                .expect("default endpoint is valid"),
            model: "gpt-4o-mini".to_string(),
            api_key: None,
        }
    }
}

impl ChatProviderConfig {
    #[inline]
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key.clone().or_else(|| env::var(API_KEY_ENV).ok())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PortalConfig {
    pub base_url: Url,
    pub calendar_ready: bool,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            base_url: Url::parse("http://localhost:8080/").expect("default base url is valid"),
            calendar_ready: false,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration directory not found or could not be created")]
    DirectoryError,
    #[error("Invalid URL: {0} (must use http or https)")]
    InvalidUrl(String),
    #[error("Invalid model name: {0} (cannot be empty)")]
    InvalidModel(String),
    #[error("Invalid chunk size: {0} (must be between 100 and 4000)")]
    InvalidChunkSize(usize),
    #[error("Invalid overlap: {0} (must be at most 512)")]
    InvalidOverlap(usize),
    #[error("Overlap ({0}) must be smaller than chunk size ({1})")]
    OverlapTooLarge(usize, usize),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl Config {
    #[inline]
    pub fn load_default() -> Result<Self> {
        let dir = Self::config_dir().context("Failed to resolve configuration directory")?;
        Self::load(dir)
    }

    #[inline]
    pub fn load<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let config_path = config_dir.as_ref().join("config.toml");

        if !config_path.exists() {
            return Ok(Self {
                embedding: EmbeddingProviderConfig::default(),
                chat: ChatProviderConfig::default(),
                portal: PortalConfig::default(),
                chunking: ChunkingConfig::default(),
                base_dir: config_dir.as_ref().to_path_buf(),
            });
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;
        config.base_dir = config_dir.as_ref().to_path_buf();

        config
            .validate()
            .with_context(|| "Configuration validation failed")?;

        Ok(config)
    }

    #[inline]
    pub fn save(&self) -> Result<()> {
        self.validate()
            .context("Configuration validation failed before saving")?;

        fs::create_dir_all(&self.base_dir).with_context(|| {
            format!(
                "Failed to create config directory: {}",
                self.base_dir.display()
            )
        })?;

        let config_path = self.config_file_path();
        let content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(())
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_endpoint(&self.embedding.endpoint)?;
        validate_endpoint(&self.chat.endpoint)?;
        validate_endpoint(&self.portal.base_url)?;

        if self.embedding.model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.embedding.model.clone()));
        }
        if self.chat.model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.chat.model.clone()));
        }

        if !(100..=4000).contains(&self.chunking.chunk_size) {
            return Err(ConfigError::InvalidChunkSize(self.chunking.chunk_size));
        }
        if self.chunking.overlap > 512 {
            return Err(ConfigError::InvalidOverlap(self.chunking.overlap));
        }
        if self.chunking.overlap >= self.chunking.chunk_size {
            return Err(ConfigError::OverlapTooLarge(
                self.chunking.overlap,
                self.chunking.chunk_size,
            ));
        }

        Ok(())
    }

    #[inline]
    pub fn config_dir() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|dir| dir.join("campus-assistant"))
            .ok_or(ConfigError::DirectoryError)
    }

    #[inline]
    pub fn config_file_path(&self) -> PathBuf {
        self.base_dir.join("config.toml")
    }

    /// Directory holding the persisted vector snapshot
    #[inline]
    pub fn index_dir_path(&self) -> PathBuf {
        self.base_dir.join("index")
    }
}

fn validate_endpoint(url: &Url) -> Result<(), ConfigError> {
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(url.to_string()));
    }
    Ok(())
}
