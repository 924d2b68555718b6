
use anyhow::{Context, Result};
use console::style;
use dialoguer::{Confirm, Input};
use url::Url;

use super::{ChatProviderConfig, Config, ConfigError, EmbeddingProviderConfig, PortalConfig};

#[inline]
pub fn run_interactive_config() -> Result<()> {
    eprintln!("{}", style("🔧 Campus Assistant Setup").bold().cyan());
    eprintln!();

    let mut config = load_existing_config()?;

    eprintln!("{}", style("Embedding Provider").bold().yellow());
    configure_embedding(&mut config.embedding)?;

    eprintln!();
    eprintln!("{}", style("Chat Provider").bold().yellow());
    configure_chat(&mut config.chat)?;

    eprintln!();
    eprintln!("{}", style("Portal Backend").bold().yellow());
    configure_portal(&mut config.portal)?;

    eprintln!();
    if Confirm::new()
        .with_prompt("Save configuration?")
        .default(true)
        .interact()?
    {
        config.save().context("Failed to save configuration")?;
        eprintln!("{}", style("✓ Configuration saved successfully!").green());
        eprintln!(
            "Configuration saved to: {}",
            style(config.config_file_path().display()).cyan()
        );
    } else {
        eprintln!("Configuration not saved.");
    }

    Ok(())
}

#[inline]
pub fn show_config() -> Result<()> {
    let config = Config::load_default().context("Failed to load configuration")?;

    eprintln!("{}", style("📋 Current Configuration").bold().cyan());
    eprintln!();

    eprintln!("{}", style("Embedding Provider:").bold().yellow());
    eprintln!("  Endpoint: {}", style(&config.embedding.endpoint).cyan());
    eprintln!("  Model: {}", style(&config.embedding.model).cyan());
    eprintln!(
        "  Credential: {}",
        credential_status(config.embedding.resolve_api_key().as_deref())
    );

    eprintln!();
    eprintln!("{}", style("Chat Provider:").bold().yellow());
    eprintln!("  Endpoint: {}", style(&config.chat.endpoint).cyan());
    eprintln!("  Model: {}", style(&config.chat.model).cyan());
    eprintln!(
        "  Credential: {}",
        credential_status(config.chat.resolve_api_key().as_deref())
    );

    eprintln!();
    eprintln!("{}", style("Portal:").bold().yellow());
    eprintln!("  Base URL: {}", style(&config.portal.base_url).cyan());
    eprintln!(
        "  Calendar integration: {}",
        style(config.portal.calendar_ready).cyan()
    );

    eprintln!();
    eprintln!("{}", style("Chunking:").bold().yellow());
    eprintln!("  Chunk size: {}", style(config.chunking.chunk_size).cyan());
    eprintln!("  Overlap: {}", style(config.chunking.overlap).cyan());

    eprintln!();
    eprintln!(
        "Config file: {}",
        style(config.config_file_path().display()).dim()
    );

    Ok(())
}

fn credential_status(key: Option<&str>) -> String {
    match key {
        Some(_) => style("configured").green().to_string(),
        None => style("missing").red().to_string(),
    }
}

fn load_existing_config() -> Result<Config> {
    Config::load_default().map_or_else(
        |_| {
            eprintln!(
                "{}",
                style("No existing configuration found. Using defaults.").yellow()
            );
            Ok(Config {
                embedding: EmbeddingProviderConfig::default(),
                chat: ChatProviderConfig::default(),
                portal: PortalConfig::default(),
                chunking: crate::embeddings::chunking::ChunkingConfig::default(),
                base_dir: Config::config_dir()?,
            })
        },
        |config| {
            eprintln!("{}", style("Found existing configuration.").green());
            Ok(config)
        },
    )
}

fn configure_embedding(embedding: &mut EmbeddingProviderConfig) -> Result<()> {
    embedding.endpoint = prompt_url("Embedding endpoint", &embedding.endpoint)?;

    embedding.model = Input::new()
        .with_prompt("Embedding model")
        .default(embedding.model.clone())
        .interact_text()?;

    embedding.api_key = prompt_api_key(embedding.api_key.as_deref())?;
    Ok(())
}

fn configure_chat(chat: &mut ChatProviderConfig) -> Result<()> {
    chat.endpoint = prompt_url("Chat completion endpoint", &chat.endpoint)?;

    chat.model = Input::new()
        .with_prompt("Chat model")
        .default(chat.model.clone())
        .interact_text()?;

    chat.api_key = prompt_api_key(chat.api_key.as_deref())?;
    Ok(())
}

fn configure_portal(portal: &mut PortalConfig) -> Result<()> {
    portal.base_url = prompt_url("Portal base URL", &portal.base_url)?;

    portal.calendar_ready = Confirm::new()
        .with_prompt("Is the calendar integration connected?")
        .default(portal.calendar_ready)
        .interact()?;
    Ok(())
}

fn prompt_url(prompt: &str, current: &Url) -> Result<Url> {
    let input: String = Input::new()
        .with_prompt(prompt)
        .default(current.to_string())
        .validate_with(|value: &String| match Url::parse(value) {
            Ok(url) if url.scheme() == "http" || url.scheme() == "https" => Ok(()),
            _ => Err(ConfigError::InvalidUrl(value.clone()).to_string()),
        })
        .interact_text()?;

    Url::parse(&input).map_err(|_| ConfigError::InvalidUrl(input).into())
}

fn prompt_api_key(current: Option<&str>) -> Result<Option<String>> {
    let prompt = if current.is_some() {
        "API key (empty keeps the current value)"
    } else {
        "API key (empty reads the environment at runtime)"
    };

    let input: String = Input::new()
        .with_prompt(prompt)
        .allow_empty(true)
        .interact_text()?;

    if input.trim().is_empty() {
        Ok(current.map(str::to_string))
    } else {
        Ok(Some(input.trim().to_string()))
    }
}
