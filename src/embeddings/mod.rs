//! Embedding providers for the reward model
//!
//! The reward model only relies on a stable contract: the same text always
//! maps to the same vector, and one provider always produces vectors of the
//! same length. Providers:
//! - [`HashingEmbedder`]: deterministic feature hashing, no model download
//! - [`OllamaEmbedder`]: a local Ollama server's `/api/embeddings`
//! - `LocalEmbeddingService`: fastembed/ONNX (feature `local-embeddings`)

pub mod hashing;
#[cfg(feature = "local-embeddings")]
pub mod local;
pub mod remote;

pub use hashing::HashingEmbedder;
#[cfg(feature = "local-embeddings")]
pub use local::LocalEmbeddingService;
pub use remote::OllamaEmbedder;

use crate::error::{MotivateError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Embedding service trait defining required operations
#[async_trait]
pub trait EmbeddingService: Send + Sync {
    /// Generate embedding for a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embeddings for multiple texts
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            embeddings.push(self.embed(text).await?);
        }
        Ok(embeddings)
    }

    /// Get embedding dimensionality
    fn dimensions(&self) -> usize;

    /// Get model name
    fn model_name(&self) -> &str;
}

/// Which embedding backend to build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingProvider {
    Hashing,
    Ollama,
    Local,
}

impl std::fmt::Display for EmbeddingProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EmbeddingProvider::Hashing => write!(f, "hashing"),
            EmbeddingProvider::Ollama => write!(f, "ollama"),
            EmbeddingProvider::Local => write!(f, "local"),
        }
    }
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: EmbeddingProvider,

    /// Model name (hashing: label only; ollama: pulled model; local: fastembed model)
    pub model: String,

    /// Vector length; must match what the model produces
    pub dimensions: usize,

    /// Ollama server for the `ollama` provider
    pub base_url: String,

    pub request_timeout_secs: u64,

    /// Model cache directory for the `local` provider
    pub cache_dir: Option<std::path::PathBuf>,

    /// Texts per ONNX call for the `local` provider
    pub batch_size: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::Hashing,
            model: "hashing-v1".to_string(),
            dimensions: 384,
            base_url: "http://localhost:11434".to_string(),
            request_timeout_secs: 30,
            cache_dir: None,
            batch_size: 32,
        }
    }
}

impl EmbeddingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.dimensions == 0 {
            return Err(MotivateError::ValidationError(
                "embedding dimensions must be positive".to_string(),
            ));
        }
        if self.model.trim().is_empty() {
            return Err(MotivateError::ValidationError(
                "embedding model cannot be empty".to_string(),
            ));
        }
        if self.batch_size == 0 {
            return Err(MotivateError::ValidationError(
                "embedding batch_size must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Build the configured embedding provider
pub async fn build_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingService>> {
    config.validate()?;
    match config.provider {
        EmbeddingProvider::Hashing => Ok(Arc::new(HashingEmbedder::new(
            config.model.clone(),
            config.dimensions,
        )?)),
        EmbeddingProvider::Ollama => Ok(Arc::new(OllamaEmbedder::new(config.clone())?)),
        #[cfg(feature = "local-embeddings")]
        EmbeddingProvider::Local => Ok(Arc::new(LocalEmbeddingService::new(config.clone()).await?)),
        #[cfg(not(feature = "local-embeddings"))]
        EmbeddingProvider::Local => Err(MotivateError::Config(config::ConfigError::Message(
            "the 'local' embedding provider requires the local-embeddings feature".to_string(),
        ))),
    }
}

/// Calculate cosine similarity between two vectors
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let magnitude_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let magnitude_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if magnitude_a == 0.0 || magnitude_b == 0.0 {
        return 0.0;
    }

    dot_product / (magnitude_a * magnitude_b)
}
