pub mod catalog;
pub mod memory;

pub use catalog::{CatalogStore, SurrealCatalogStore};
pub use memory::InMemoryCatalogStore;
