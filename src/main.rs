//! Shelfmark - catalog discovery for library collections
//!
//! Usage:
//!   shelfmark search "query"          Semantic search with keyword fallback
//!   shelfmark recommend <patron_id>   Recommendations for a patron
//!   shelfmark similar <book_id>       Books related to a given book
//!   shelfmark backfill --all          Fill the embedding cache
//!   shelfmark status                  Embedding cache coverage
//!   shelfmark --help                  Show all commands

use anyhow::Result;
use clap::Parser;

use shelfmark::cli::output::OutputMode;
use shelfmark::cli::Cli;
use shelfmark::init::AppContext;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Tracing to stderr so JSON output on stdout stays clean
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("shelfmark=info".parse()?),
        )
        .init();

    let mode = OutputMode::from_json_flag(cli.json);
    let ctx = AppContext::new(cli.data_path.clone(), cli.no_semantic).await?;
    shelfmark::cli::execute(&cli.command, &ctx, mode).await?;

    Ok(())
}
