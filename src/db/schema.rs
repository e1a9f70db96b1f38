use crate::db::connection::ShelfmarkDb;
use crate::ShelfmarkError;

/// Catalog tables: book, patron, interaction, review
const SCHEMA_001: &str = include_str!("migrations/001_catalog.surql");

/// Embedding cache keyed by book id
const SCHEMA_002: &str = include_str!("migrations/002_embeddings.surql");

/// Apply the database schema.
///
/// Every statement uses `IF NOT EXISTS`, so calling this on an existing
/// database is a no-op.
///
/// # Example
///
/// ```no_run
/// # use shelfmark::db::{connection::{init_db, DbConfig}, schema::apply_schema};
/// # use std::path::Path;
/// # async fn example() -> Result<(), shelfmark::ShelfmarkError> {
/// let config = DbConfig::Embedded { path: Some("./data/catalog.db".into()) };
/// let db = init_db(&config, Path::new("./data")).await?;
/// apply_schema(&db).await?;
/// # Ok(())
/// # }
/// ```
pub async fn apply_schema(db: &ShelfmarkDb) -> Result<(), ShelfmarkError> {
    db.query(SCHEMA_001).await?.check()?;
    db.query(SCHEMA_002).await?.check()?;
    Ok(())
}
