//! CLI interface for Shelfmark.

pub mod handlers;
pub mod output;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use output::OutputMode;

/// Shelfmark - catalog discovery for library collections
#[derive(Parser)]
#[command(name = "shelfmark", version, about, long_about = None)]
pub struct Cli {
    /// Override data directory (default: ~/.shelfmark)
    #[arg(long, env = "SHELFMARK_DATA_PATH", global = true)]
    pub data_path: Option<PathBuf>,

    /// Output as JSON instead of human-readable format
    #[arg(long, global = true)]
    pub json: bool,

    /// Disable semantic search (use keyword only)
    #[arg(long, global = true)]
    pub no_semantic: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Search the catalog (semantic, with keyword fallback)
    #[command(alias = "find")]
    Search {
        /// Free-text query
        query: String,
        /// Maximum results (default from discovery.toml)
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Recommend books for a patron
    Recommend {
        /// Patron id
        patron_id: i64,
        /// Maximum results (default from discovery.toml)
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Books sharing genre, sub-genre or an author with a given book
    Similar {
        /// Book id
        book_id: i64,
        /// Maximum results (default from discovery.toml)
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Fill the embedding cache
    Backfill {
        /// Books per embedder call (default from discovery.toml)
        #[arg(long)]
        batch_size: Option<usize>,
        /// Keep going until no active book lacks a vector
        #[arg(long)]
        all: bool,
        /// Re-embed books whose text changed since they were embedded
        #[arg(long)]
        refresh_stale: bool,
        /// Delete vectors of deactivated books first
        #[arg(long)]
        purge: bool,
    },

    /// Embedding cache coverage
    Status,

    /// Load a catalog snapshot (JSON) into the store
    Load {
        /// Path to the snapshot file
        path: PathBuf,
    },
}

/// Execute a CLI command.
pub async fn execute(
    command: &Commands,
    ctx: &crate::init::AppContext,
    mode: OutputMode,
) -> anyhow::Result<()> {
    match command {
        Commands::Search { query, limit } => {
            handlers::search::handle_search(ctx, query, *limit, mode).await?
        }
        Commands::Recommend { patron_id, limit } => {
            handlers::recommend::handle_recommend(ctx, *patron_id, *limit, mode).await?
        }
        Commands::Similar { book_id, limit } => {
            handlers::recommend::handle_similar(ctx, *book_id, *limit, mode).await?
        }
        Commands::Backfill {
            batch_size,
            all,
            refresh_stale,
            purge,
        } => {
            let options = handlers::backfill::BackfillOptions {
                batch_size: batch_size.unwrap_or(ctx.config.backfill.batch_size),
                all: *all,
                refresh_stale: *refresh_stale,
                purge: *purge,
            };
            handlers::backfill::handle_backfill(ctx, options, mode).await?
        }
        Commands::Status => handlers::backfill::handle_status(ctx, mode).await?,
        Commands::Load { path } => handlers::catalog::handle_load(ctx, path, mode).await?,
    }

    Ok(())
}
