//! Local embedding service using fastembed
//!
//! Runs an ONNX sentence-embedding model in-process. Models are downloaded
//! to the cache directory on first use.

use crate::embeddings::{EmbeddingConfig, EmbeddingService};
use crate::error::{MotivateError, Result};
use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use std::sync::{Arc, Mutex};
use tokio::task;
use tracing::{debug, info};

pub struct LocalEmbeddingService {
    model: Arc<Mutex<TextEmbedding>>,
    config: EmbeddingConfig,
}

impl LocalEmbeddingService {
    /// Load (and if needed download) the configured model
    pub async fn new(config: EmbeddingConfig) -> Result<Self> {
        config.validate()?;

        let (embedding_model, expected_dims) = Self::resolve_model(&config.model)?;
        if expected_dims != config.dimensions {
            return Err(MotivateError::DimensionMismatch {
                expected: expected_dims,
                actual: config.dimensions,
            });
        }

        info!(
            "Initializing local embedding model {} (cache: {:?})",
            config.model, config.cache_dir
        );

        let mut init_options = InitOptions::default();
        init_options.model_name = embedding_model;
        init_options.show_download_progress = false;
        if let Some(dir) = config.cache_dir.clone() {
            init_options.cache_dir = dir;
        }

        let model = task::spawn_blocking(move || TextEmbedding::try_new(init_options))
            .await
            .map_err(|e| MotivateError::Other(format!("Task join error: {}", e)))?
            .map_err(|e| {
                MotivateError::CollaboratorUnavailable(format!("Failed to load model: {}", e))
            })?;

        Ok(Self {
            model: Arc::new(Mutex::new(model)),
            config,
        })
    }

    /// Supported model names and their output width
    fn resolve_model(model_name: &str) -> Result<(EmbeddingModel, usize)> {
        match model_name {
            "all-MiniLM-L6-v2" => Ok((EmbeddingModel::AllMiniLML6V2, 384)),
            "all-MiniLM-L12-v2" => Ok((EmbeddingModel::AllMiniLML12V2, 384)),
            "bge-small-en-v1.5" => Ok((EmbeddingModel::BGESmallENV15, 384)),
            "bge-base-en-v1.5" => Ok((EmbeddingModel::BGEBaseENV15, 768)),
            "nomic-embed-text-v1.5" => Ok((EmbeddingModel::NomicEmbedTextV15, 768)),
            _ => Err(MotivateError::Config(config::ConfigError::Message(format!(
                "Unsupported local embedding model: '{}'",
                model_name
            )))),
        }
    }

    async fn embed_chunk(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        debug!("Embedding batch of {} texts", texts.len());

        let model = Arc::clone(&self.model);
        let embeddings = task::spawn_blocking(move || {
            let mut guard = model
                .lock()
                .map_err(|e| format!("Mutex lock failed: {}", e))?;
            guard
                .embed(texts, None)
                .map_err(|e| format!("Embedding generation failed: {}", e))
        })
        .await
        .map_err(|e| MotivateError::Other(format!("Task join error: {}", e)))?
        .map_err(MotivateError::CollaboratorUnavailable)?;

        for embedding in &embeddings {
            if embedding.len() != self.config.dimensions {
                return Err(MotivateError::DimensionMismatch {
                    expected: self.config.dimensions,
                    actual: embedding.len(),
                });
            }
        }
        Ok(embeddings)
    }
}

#[async_trait]
impl EmbeddingService for LocalEmbeddingService {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(MotivateError::ValidationError(
                "Text cannot be empty".to_string(),
            ));
        }

        self.embed_chunk(vec![text.to_string()])
            .await?
            .pop()
            .ok_or_else(|| {
                MotivateError::CollaboratorUnavailable("No embedding returned".to_string())
            })
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if let Some(i) = texts.iter().position(|t| t.trim().is_empty()) {
            return Err(MotivateError::ValidationError(format!(
                "Text at index {} cannot be empty",
                i
            )));
        }

        let owned: Vec<String> = texts.iter().map(|s| s.to_string()).collect();
        let mut all = Vec::with_capacity(owned.len());
        for chunk in owned.chunks(self.config.batch_size) {
            all.extend(self.embed_chunk(chunk.to_vec()).await?);
        }
        Ok(all)
    }

    fn dimensions(&self) -> usize {
        self.config.dimensions
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}
