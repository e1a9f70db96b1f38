//! Recommendation and similar-book handlers for CLI.

use anyhow::Result;

use crate::cli::output::{output_json, print_books, OutputMode};
use crate::init::AppContext;
use crate::ShelfmarkError;

pub async fn handle_recommend(
    ctx: &AppContext,
    patron_id: i64,
    limit: Option<usize>,
    mode: OutputMode,
) -> Result<()> {
    let recommendations = ctx.recommendations.recommend(patron_id, limit).await?;

    if mode == OutputMode::Json {
        output_json(&recommendations);
        return Ok(());
    }

    println!(
        "Recommendations for patron {}: {} books\n",
        patron_id,
        recommendations.len()
    );
    print_books(
        "Stage",
        recommendations
            .iter()
            .map(|r| (&r.book, r.stage.to_string())),
    );

    Ok(())
}

pub async fn handle_similar(
    ctx: &AppContext,
    book_id: i64,
    limit: Option<usize>,
    mode: OutputMode,
) -> Result<()> {
    let limit = limit.unwrap_or(ctx.config.recommend.similar_default_limit);
    if ctx.store.get_book(book_id).await?.is_none() {
        return Err(ShelfmarkError::NotFound {
            entity_type: "book".to_string(),
            id: book_id.to_string(),
        }
        .into());
    }
    let similar = ctx.similar.similar(book_id, limit).await?;

    if mode == OutputMode::Json {
        output_json(&similar);
        return Ok(());
    }

    println!("Books related to {}:\n", book_id);
    print_books("Tier", similar.iter().map(|s| (&s.book, s.tier.to_string())));

    Ok(())
}
