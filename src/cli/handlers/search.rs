//! Search handler for CLI.

use anyhow::Result;

use crate::cli::output::{output_json, print_books, print_error, print_hint, OutputMode};
use crate::init::AppContext;
use crate::services::SearchMode;

pub async fn handle_search(
    ctx: &AppContext,
    query: &str,
    limit: Option<usize>,
    mode: OutputMode,
) -> Result<()> {
    let response = ctx.discovery.search(query, limit).await?;

    if mode == OutputMode::Json {
        output_json(&response);
        return Ok(());
    }

    if response.mode == SearchMode::Error {
        print_error(response.error.as_deref().unwrap_or("search failed"));
        return Ok(());
    }

    println!(
        "Search ({}) for '{}': {} results\n",
        response.mode,
        query.trim(),
        response.books.len()
    );
    print_books(
        "Distance",
        response.books.iter().map(|hit| {
            let distance = hit
                .distance
                .map_or_else(|| "-".to_string(), |d| format!("{:.3}", d));
            (&hit.book, distance)
        }),
    );

    if response.mode == SearchMode::KeywordFallback {
        print_hint("\nSemantic search unavailable; showing keyword matches.");
    }

    Ok(())
}
