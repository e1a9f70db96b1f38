pub mod builders;
pub mod harness;

// Re-export commonly used test utilities
pub use builders::{interaction, review, BookBuilder};
pub use harness::{hash_embedding_service, memory_context, test_embedding_service, TestHarness};
