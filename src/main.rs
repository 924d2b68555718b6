use clap::{Parser, Subcommand};
use campus_assistant::Result;
use campus_assistant::commands::{chat, clear_index, index_corpus, search_index, show_status};
use campus_assistant::config::{Config, run_interactive_config, show_config};

#[derive(Parser)]
#[command(name = "campus-assistant")]
#[command(about = "RAG index and tool-calling assistant for the campus services portal")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure providers, portal connection, and chunking
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Fetch the wiki corpus and rebuild the vector index
    Index,
    /// Search the vector index
    Search {
        /// Search query
        query: String,
        /// Restrict results to one school
        #[arg(long)]
        group: Option<String>,
        /// Maximum number of results
        #[arg(long, default_value_t = 5)]
        limit: usize,
    },
    /// Talk to the assistant on stdin
    Chat,
    /// Show index and provider status
    Status,
    /// Drop the persisted index
    Clear,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Config { show } => {
            if show {
                show_config()?;
            } else {
                run_interactive_config()?;
            }
        }
        Commands::Index => {
            let config = Config::load_default()?;
            index_corpus(&config).await?;
        }
        Commands::Search {
            query,
            group,
            limit,
        } => {
            let config = Config::load_default()?;
            search_index(&config, &query, group.as_deref(), limit).await?;
        }
        Commands::Chat => {
            let config = Config::load_default()?;
            chat(&config).await?;
        }
        Commands::Status => {
            let config = Config::load_default()?;
            show_status(&config).await?;
        }
        Commands::Clear => {
            let config = Config::load_default()?;
            clear_index(&config)?;
        }
    }

    Ok(())
}
