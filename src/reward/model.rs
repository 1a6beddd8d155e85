//! Trained reward model
//!
//! A linear classifier over embedding differences. A single text is scored
//! against the baseline embedding captured at training time:
//! `sigmoid(w · (e(text) - e(baseline)) + b)`.

use crate::error::{MotivateError, Result};
use crate::storage::file::write_atomic;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;
use uuid::Uuid;

pub(crate) fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let ez = z.exp();
        ez / (1.0 + ez)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewardModel {
    pub id: Uuid,
    pub weights: Vec<f64>,
    pub bias: f64,

    /// Embedding width the model was trained against
    pub dimensions: usize,

    /// Name of the embedder that produced the training features
    pub embedder: String,

    pub baseline_text: String,
    pub baseline: Vec<f32>,

    pub trained_at: DateTime<Utc>,

    /// Pairs that contributed to training
    pub pair_count: usize,

    /// Pairs dropped because an embedding could not be produced
    pub skipped_pairs: usize,

    /// Training examples (twice `pair_count` with symmetric doubling)
    pub sample_count: usize,

    pub training_accuracy: f64,
    pub final_loss: f64,
}

impl RewardModel {
    pub fn validate(&self) -> Result<()> {
        if self.weights.len() != self.dimensions {
            return Err(MotivateError::DimensionMismatch {
                expected: self.dimensions,
                actual: self.weights.len(),
            });
        }
        if self.baseline.len() != self.dimensions {
            return Err(MotivateError::DimensionMismatch {
                expected: self.dimensions,
                actual: self.baseline.len(),
            });
        }
        if !self.bias.is_finite() || self.weights.iter().any(|w| !w.is_finite()) {
            return Err(MotivateError::ValidationError(
                "reward model parameters must be finite".to_string(),
            ));
        }
        Ok(())
    }

    /// Refuse to score with a different embedder than the one trained against
    pub fn check_embedder(&self, name: &str, dimensions: usize) -> Result<()> {
        if dimensions != self.dimensions {
            return Err(MotivateError::DimensionMismatch {
                expected: self.dimensions,
                actual: dimensions,
            });
        }
        if name != self.embedder {
            return Err(MotivateError::EmbedderMismatch {
                expected: self.embedder.clone(),
                actual: name.to_string(),
            });
        }
        Ok(())
    }

    /// Raw decision value `w · x + b`
    pub fn decision(&self, difference: &[f64]) -> Result<f64> {
        if difference.len() != self.dimensions {
            return Err(MotivateError::DimensionMismatch {
                expected: self.dimensions,
                actual: difference.len(),
            });
        }
        Ok(self
            .weights
            .iter()
            .zip(difference)
            .map(|(w, x)| w * x)
            .sum::<f64>()
            + self.bias)
    }

    /// Probability that the first text of a pair is preferred
    pub fn prefer_probability(&self, embedding_a: &[f32], embedding_b: &[f32]) -> Result<f64> {
        if embedding_a.len() != embedding_b.len() {
            return Err(MotivateError::DimensionMismatch {
                expected: embedding_a.len(),
                actual: embedding_b.len(),
            });
        }
        let difference: Vec<f64> = embedding_a
            .iter()
            .zip(embedding_b)
            .map(|(a, b)| f64::from(*a) - f64::from(*b))
            .collect();
        Ok(sigmoid(self.decision(&difference)?))
    }

    /// Score one embedded text against the baseline, in `[0, 1]`
    pub fn score_embedding(&self, embedding: &[f32]) -> Result<f64> {
        self.prefer_probability(embedding, &self.baseline)
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_vec_pretty(self)?;
        write_atomic(path, &json).await?;
        info!("Saved reward model {} to {}", self.id, path.display());
        Ok(())
    }

    /// Load a saved model; `None` if the file does not exist
    pub async fn load(path: &Path) -> Result<Option<Self>> {
        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let model: RewardModel = serde_json::from_str(&content)?;
        model.validate()?;
        Ok(Some(model))
    }
}
