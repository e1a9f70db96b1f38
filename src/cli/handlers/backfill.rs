//! Embedding cache maintenance handlers for CLI.

use std::time::Duration;

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;

use crate::cli::output::{
    output_json, print_header, print_hint, print_kv, print_success, OutputMode,
};
use crate::embedding::BackfillStats;
use crate::init::AppContext;

pub struct BackfillOptions {
    pub batch_size: usize,
    pub all: bool,
    pub refresh_stale: bool,
    pub purge: bool,
}

#[derive(Debug, Default, Serialize)]
struct BackfillReport {
    purged: usize,
    refreshed: BackfillStats,
    backfilled: BackfillStats,
}

fn spinner(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
        spinner.set_style(style);
    }
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

pub async fn handle_backfill(
    ctx: &AppContext,
    options: BackfillOptions,
    mode: OutputMode,
) -> Result<()> {
    if !ctx.embedding_service.is_available() {
        anyhow::bail!(
            "Embedding model is not available. Check embedding.toml or SHELFMARK_EMBEDDING_PROVIDER."
        );
    }

    let mut report = BackfillReport::default();
    let progress = (mode == OutputMode::Human).then(|| spinner("Embedding catalog..."));

    if options.purge {
        report.purged = ctx.staleness_manager.purge_inactive().await?;
    }
    if options.refresh_stale {
        report.refreshed = ctx
            .staleness_manager
            .refresh_stale(options.batch_size)
            .await?;
    }

    report.backfilled = if options.all {
        let mut done = 0;
        ctx.backfill
            .backfill_all(options.batch_size, |batch| {
                done += batch.embedded;
                if let Some(pb) = &progress {
                    pb.set_message(format!("Embedded {} books...", done));
                }
            })
            .await?
    } else {
        ctx.backfill.backfill(options.batch_size).await?
    };

    if let Some(pb) = progress {
        pb.finish_and_clear();
    }

    if mode == OutputMode::Json {
        output_json(&report);
        return Ok(());
    }

    if options.purge {
        print_kv("Purged", &report.purged.to_string());
    }
    if options.refresh_stale {
        print_kv("Refreshed", &report.refreshed.embedded.to_string());
    }
    print_success(&format!(
        "Embedded {} of {} selected books",
        report.backfilled.embedded, report.backfilled.selected
    ));
    if !options.all && report.backfilled.selected == options.batch_size {
        print_hint("More books may be missing vectors; use --all to continue.");
    }

    Ok(())
}

pub async fn handle_status(ctx: &AppContext, mode: OutputMode) -> Result<()> {
    let coverage = ctx.staleness_manager.coverage().await?;

    if mode == OutputMode::Json {
        output_json(&coverage);
        return Ok(());
    }

    print_header("Embedding cache");
    print_kv("Data path", &ctx.data_path.display().to_string());
    print_kv(
        "Model",
        if ctx.embedding_service.is_available() {
            "available"
        } else {
            "unavailable"
        },
    );
    print_kv("Dimensions", &ctx.embedding_service.dimensions().to_string());
    print_kv("Active books", &coverage.active_items.to_string());
    print_kv("Embedded", &coverage.embedded.to_string());
    print_kv("Missing", &coverage.missing.to_string());
    print_kv("Stale", &coverage.stale.to_string());

    if coverage.missing > 0 {
        print_hint("\nRun `shelfmark backfill --all` to fill the cache.");
    }

    Ok(())
}
