// Configuration management module
// TOML configuration with validation and interactive first-run setup

pub mod interactive;
pub mod settings;

pub use interactive::{run_interactive_config, show_config};
pub use settings::{
    ChatProviderConfig, Config, ConfigError, EmbeddingProviderConfig, PortalConfig,
};

/// Get the configuration directory path
#[inline]
pub fn get_config_dir() -> Result<std::path::PathBuf, ConfigError> {
    Config::config_dir()
}
