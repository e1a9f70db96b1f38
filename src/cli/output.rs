//! Terminal rendering for CLI commands: JSON, book tables and status lines.

use colored::Colorize;
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

use crate::models::BookSummary;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Human,
    Json,
}

impl OutputMode {
    pub fn from_json_flag(json: bool) -> Self {
        if json {
            OutputMode::Json
        } else {
            OutputMode::Human
        }
    }
}

/// Pretty-printed JSON on stdout.
pub fn output_json<T: Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => print_error(&format!("Failed to serialize to JSON: {}", e)),
    }
}

/// One row per book: id, title, authors, availability, rating, then a
/// command-specific last column.
pub fn print_books<'a, I>(last_column: &str, rows: I)
where
    I: IntoIterator<Item = (&'a BookSummary, String)>,
{
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            "ID",
            "Title",
            "Authors",
            "Available",
            "Rating",
            last_column,
        ]);

    let mut empty = true;
    for (book, extra) in rows {
        empty = false;
        table.add_row(vec![
            book.book_id.to_string(),
            format_title(book),
            book.author_line(),
            format_availability(book),
            format_rating(book),
            extra,
        ]);
    }

    if empty {
        println!("{}", "No books found.".dimmed());
    } else {
        println!("{table}");
    }
}

pub fn print_success(msg: &str) {
    println!("{} {}", "OK".green().bold(), msg);
}

pub fn print_error(msg: &str) {
    eprintln!("{} {}", "Error:".red().bold(), msg);
}

pub fn print_header(title: &str) {
    println!("\n{}\n", title.bold());
}

pub fn print_kv(key: &str, value: &str) {
    println!("  {}: {}", key.dimmed(), value);
}

pub fn print_hint(msg: &str) {
    println!("{}", msg.dimmed());
}

/// `"4.3 (12)"`, or `"-"` when unrated.
pub fn format_rating(book: &BookSummary) -> String {
    match book.avg_rating {
        Some(avg) => format!("{:.1} ({})", avg, book.review_count),
        None => "-".to_string(),
    }
}

/// Title with the subtitle appended after a colon.
pub fn format_title(book: &BookSummary) -> String {
    match &book.subtitle {
        Some(sub) if !sub.is_empty() => format!("{}: {}", book.title, sub),
        _ => book.title.clone(),
    }
}

/// `"2/3"` available over total copies.
pub fn format_availability(book: &BookSummary) -> String {
    format!("{}/{}", book.available_items, book.total_items)
}
