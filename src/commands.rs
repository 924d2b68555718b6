use anyhow::{Context, Result};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use crate::agent::AgentOrchestrator;
use crate::config::Config;
use crate::embeddings::client::{Embedder, EmbeddingClient};
use crate::llm::ChatClient;
use crate::portal::RestPortalApi;
use crate::progress::ProgressSink;
use crate::rag::RagCoordinator;
use crate::store::{SnapshotStore, VectorStore};
use crate::tools::handlers::{ToolDeps, build_registry};

/// Progress sink bound to an indicatif bar; indexing reports per-chunk.
struct BarProgress {
    bar: ProgressBar,
}

impl BarProgress {
    fn new() -> Self {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template("{msg:24} [{bar:30}] {pos}/{len}")
                .expect("progress template is valid")
                .progress_chars("=> "),
        );
        Self { bar }
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ProgressSink for BarProgress {
    fn on_progress(&self, current: usize, total: usize, status: &str) {
        self.bar.set_length(total as u64);
        self.bar.set_position(current as u64);
        self.bar.set_message(status.to_string());
    }
}

fn open_store(config: &Config) -> Result<VectorStore> {
    let embedder: Arc<dyn Embedder> = Arc::new(
        EmbeddingClient::new(&config.embedding).context("Failed to create embedding client")?,
    );
    VectorStore::open(
        embedder,
        config.chunking.clone(),
        SnapshotStore::new(config.index_dir_path()),
    )
    .context("Failed to open vector store")
}

fn coordinator(config: &Config, progress: Arc<dyn ProgressSink>) -> Result<Arc<RagCoordinator>> {
    let store = open_store(config)?;
    let portal = Arc::new(
        RestPortalApi::new(config.portal.base_url.clone())
            .context("Failed to create portal client")?,
    );
    Ok(Arc::new(RagCoordinator::new(store, portal, progress)))
}

/// Fetch the wiki corpus and rebuild the vector index.
#[inline]
pub async fn index_corpus(config: &Config) -> Result<()> {
    info!("Rebuilding the vector index from the wiki corpus");

    let progress = Arc::new(BarProgress::new());
    let rag = coordinator(config, Arc::clone(&progress) as Arc<dyn ProgressSink>)?;

    let summary = rag.initialize().await?;
    progress.finish();

    println!(
        "{} {} document(s) indexed, {} failed",
        style("✓").green(),
        summary.indexed,
        summary.failures.len()
    );

    if !summary.is_clean() {
        println!();
        println!("{}", style("Failed documents:").yellow());
        for failure in &summary.failures {
            println!("  {} {} — {}", style("✗").red(), failure.title, failure.error);
        }
        println!("Already-indexed content stays searchable.");
    }

    Ok(())
}

/// Search the persisted index directly.
#[inline]
pub async fn search_index(
    config: &Config,
    query: &str,
    group: Option<&str>,
    limit: usize,
) -> Result<()> {
    let store = open_store(config)?;

    if store.count() == 0 {
        println!("The index is empty. Run 'campus-assistant index' first.");
        return Ok(());
    }

    let results = match group {
        Some(group) => store.search_by_group(query, group, limit).await,
        None => store.search(query, limit).await,
    };

    if results.is_empty() {
        println!("No matches above the relevance threshold.");
        return Ok(());
    }

    for (rank, result) in results.iter().enumerate() {
        println!(
            "{} {} {}",
            style(format!("{}.", rank + 1)).bold(),
            style(&result.document.metadata.title).cyan(),
            style(format!("(score {:.2})", result.score)).dim()
        );
        println!(
            "   {} · source {}",
            result.document.metadata.group, result.document.metadata.source_id
        );
        let preview: String = result.document.content.chars().take(160).collect();
        println!("   {}", preview);
    }

    Ok(())
}

/// Interactive agent REPL over stdin.
#[inline]
pub async fn chat(config: &Config) -> Result<()> {
    let rag = coordinator(
        config,
        Arc::new(crate::progress::NullProgress) as Arc<dyn ProgressSink>,
    )?;

    if rag.document_count().await == 0 {
        println!(
            "{}",
            style("Note: the index is empty; knowledge-base answers will be limited.").yellow()
        );
        println!("Run 'campus-assistant index' to build it.");
    }

    let portal = Arc::new(
        RestPortalApi::new(config.portal.base_url.clone())
            .context("Failed to create portal client")?,
    );
    let registry = build_registry(ToolDeps {
        portal,
        rag,
        navigator: None,
        calendar_ready: config.portal.calendar_ready,
    })
    .context("Failed to build tool registry")?;

    let llm = Arc::new(ChatClient::new(&config.chat).context("Failed to create chat client")?);
    let mut orchestrator = AgentOrchestrator::new(llm, registry);

    println!("{}", orchestrator.history()[0].content);
    println!("{}", style("(empty line to exit)").dim());

    use std::io::Write;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush().ok();

        let Ok(Some(line)) = lines.next_line().await else {
            break;
        };
        let line = line.trim().to_string();
        if line.is_empty() {
            break;
        }

        let reply = orchestrator.send(&line).await;
        println!();
        println!("{}", reply.content);

        if !reply.used_tools.is_empty() {
            println!();
            for usage in &reply.used_tools {
                let mark = if usage.success {
                    style("✓").green()
                } else {
                    style("✗").red()
                };
                println!("  {} {}", mark, style(&usage.name).dim());
            }
        }

        if let Some(link) = &reply.suggested_link {
            println!();
            println!("  {} {} ({})", style("→").cyan(), link.title, link.link);
        }
        println!();
    }

    Ok(())
}

/// Show index and provider status.
#[inline]
pub async fn show_status(config: &Config) -> Result<()> {
    println!("{}", style("📊 Campus Assistant Status").bold().cyan());
    println!();

    let store = open_store(config)?;
    println!("Indexed documents: {}", style(store.count()).cyan());
    println!(
        "Indexed sources: {}",
        style(store.list_source_ids().len()).cyan()
    );
    match store.snapshot_timestamp() {
        Some(timestamp) => println!("Snapshot written: {}", style(timestamp.to_rfc3339()).cyan()),
        None => println!("Snapshot written: {}", style("never").dim()),
    }

    println!();
    let client =
        EmbeddingClient::new(&config.embedding).context("Failed to create embedding client")?;
    match client.health_check().await {
        Ok(dimension) => {
            println!(
                "Embedding provider: {} ({} dimensions)",
                style("reachable").green(),
                dimension
            );
        }
        Err(error) => {
            warn!("Embedding provider health check failed: {}", error);
            println!("Embedding provider: {} — {}", style("unreachable").red(), error);
        }
    }

    Ok(())
}

/// Drop the persisted index.
#[inline]
pub fn clear_index(config: &Config) -> Result<()> {
    let mut store = open_store(config)?;
    let count = store.count();
    store.clear().context("Failed to clear index")?;

    println!("{} Cleared {} indexed document(s).", style("✓").green(), count);
    Ok(())
}
