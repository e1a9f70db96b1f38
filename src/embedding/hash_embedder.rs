//! FNV-1a feature hashing embedder.
//!
//! Deterministic, dependency-free and instant. Texts sharing words land near
//! each other; there is no semantic generalization beyond that. Used when no
//! model download is possible and throughout the test suite.

use async_trait::async_trait;

use crate::embedding::EmbeddingService;
use crate::utils::math::normalize;
use crate::ShelfmarkError;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET, |hash, b| {
        (hash ^ u64::from(*b)).wrapping_mul(FNV_PRIME)
    })
}

/// Lowercased alphanumeric words.
fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
}

pub struct HashEmbeddingService {
    dimensions: usize,
}

impl HashEmbeddingService {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    /// Signed bucket counts, L2-normalized. Text without words maps to zeros.
    pub fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0_f32; self.dimensions];
        for token in tokenize(text) {
            let hash = fnv1a(token.as_bytes());
            let bucket = (hash % self.dimensions as u64) as usize;
            let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }
        normalize(&vector)
    }
}

impl Default for HashEmbeddingService {
    fn default() -> Self {
        Self::new(crate::embedding::model::DEFAULT_DIMENSIONS)
    }
}

#[async_trait]
impl EmbeddingService for HashEmbeddingService {
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>, ShelfmarkError> {
        Ok(self.embed_sync(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ShelfmarkError> {
        Ok(texts.iter().map(|t| self.embed_sync(t)).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn is_available(&self) -> bool {
        true
    }
}
