//! Deterministic feature-hashing embedder
//!
//! Each lowercase word and adjacent word pair is hashed with SHA-256 into one
//! of `dimensions` buckets with a hash-derived sign, and the result is
//! L2-normalized. Identical text always yields the identical vector, and no
//! model has to be downloaded, which makes it the default provider.

use crate::embeddings::EmbeddingService;
use crate::error::{MotivateError, Result};
use async_trait::async_trait;
use sha2::{Digest, Sha256};

pub struct HashingEmbedder {
    model: String,
    dimensions: usize,
}

impl HashingEmbedder {
    pub fn new(model: impl Into<String>, dimensions: usize) -> Result<Self> {
        if dimensions == 0 {
            return Err(MotivateError::ValidationError(
                "embedding dimensions must be positive".to_string(),
            ));
        }
        Ok(Self {
            model: model.into(),
            dimensions,
        })
    }

    fn tokens(text: &str) -> Vec<String> {
        text.split(|c: char| !c.is_alphanumeric() && c != '\'')
            .filter(|t| !t.is_empty())
            .map(|t| t.to_lowercase())
            .collect()
    }

    fn accumulate(&self, feature: &str, vector: &mut [f32]) {
        let digest = Sha256::digest(feature.as_bytes());
        let mut bucket_bytes = [0u8; 8];
        bucket_bytes.copy_from_slice(&digest[..8]);
        let bucket = (u64::from_le_bytes(bucket_bytes) % self.dimensions as u64) as usize;
        let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
        vector[bucket] += sign;
    }

    /// Embed synchronously; used by the async trait impl and benchmarks
    pub fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        let tokens = Self::tokens(text);

        for token in &tokens {
            self.accumulate(token, &mut vector);
        }
        for window in tokens.windows(2) {
            self.accumulate(&format!("{} {}", window[0], window[1]), &mut vector);
        }

        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut vector {
                *value /= norm;
            }
        }
        vector
    }
}

#[async_trait]
impl EmbeddingService for HashingEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_sync(text))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
