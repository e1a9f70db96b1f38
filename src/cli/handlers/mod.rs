//! CLI command handlers.

pub mod backfill;
pub mod catalog;
pub mod recommend;
pub mod search;
