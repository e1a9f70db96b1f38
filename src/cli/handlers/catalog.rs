//! Catalog load handler for CLI.

use std::path::Path;

use anyhow::{Context, Result};
use serde_json::json;

use crate::cli::output::{output_json, print_hint, print_success, OutputMode};
use crate::init::AppContext;
use crate::models::CatalogSnapshot;

pub async fn handle_load(ctx: &AppContext, path: &Path, mode: OutputMode) -> Result<()> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let snapshot: CatalogSnapshot = serde_json::from_str(&content)
        .with_context(|| format!("Invalid catalog snapshot in {}", path.display()))?;

    let counts = json!({
        "books": snapshot.books.len(),
        "patrons": snapshot.patrons.len(),
        "interactions": snapshot.interactions.len(),
        "reviews": snapshot.reviews.len(),
    });
    let empty = snapshot.is_empty();

    ctx.store.load_snapshot(snapshot).await?;

    if mode == OutputMode::Json {
        output_json(&counts);
        return Ok(());
    }

    if empty {
        print_hint("Snapshot is empty; nothing loaded.");
        return Ok(());
    }

    print_success(&format!(
        "Loaded {} books, {} patrons, {} interactions, {} reviews",
        counts["books"], counts["patrons"], counts["interactions"], counts["reviews"]
    ));
    print_hint("Run `shelfmark backfill --all` to embed new books.");

    Ok(())
}
