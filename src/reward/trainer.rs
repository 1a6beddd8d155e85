//! Pairwise reward model training
//!
//! Every pair becomes the example `(e(A) - e(B), A preferred)`. With
//! symmetric doubling each example is mirrored as `(e(B) - e(A), !label)`,
//! so the fitted boundary passes through the origin's odd symmetry and a
//! response has no intrinsic side. The classifier is L2-regularized
//! logistic regression fitted by full-batch gradient descent from zero.

use crate::embeddings::EmbeddingService;
use crate::error::{MotivateError, Result};
use crate::reward::model::{sigmoid, RewardModel};
use crate::types::{Preference, PreferencePair};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Floor below which a pairwise fit is not meaningful
pub const MIN_TRAINING_PAIRS: usize = 3;

/// Reward model training settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardConfig {
    /// Fewer usable pairs than this fails with `InsufficientData`; at least
    /// [`MIN_TRAINING_PAIRS`]
    pub min_pairs: usize,

    /// Mirror every example (see module docs)
    pub symmetric_pairs: bool,

    /// Inverse regularization strength `C`; penalty is `||w||² / (2·C·n)`
    pub l2_strength: f64,

    /// Gradient descent step size
    pub learning_rate: f64,

    pub max_iterations: usize,

    /// Stop once every gradient component is below this
    pub tolerance: f64,

    /// Canonical neutral response single texts are scored against
    pub baseline_text: String,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            min_pairs: MIN_TRAINING_PAIRS,
            symmetric_pairs: true,
            l2_strength: 1.0,
            learning_rate: 0.5,
            max_iterations: 1000,
            tolerance: 1e-6,
            baseline_text: "Keep going. Take it one step at a time and you will get there."
                .to_string(),
        }
    }
}

impl RewardConfig {
    pub fn validate(&self) -> Result<()> {
        if self.min_pairs < MIN_TRAINING_PAIRS {
            return Err(MotivateError::ValidationError(format!(
                "reward min_pairs must be at least {}, got {}",
                MIN_TRAINING_PAIRS, self.min_pairs
            )));
        }
        if !(self.l2_strength > 0.0) || !(self.learning_rate > 0.0) {
            return Err(MotivateError::ValidationError(
                "reward l2_strength and learning_rate must be positive".to_string(),
            ));
        }
        if self.max_iterations == 0 {
            return Err(MotivateError::ValidationError(
                "reward max_iterations must be positive".to_string(),
            ));
        }
        if self.baseline_text.trim().is_empty() {
            return Err(MotivateError::ValidationError(
                "reward baseline_text cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Parameters and diagnostics of one logistic fit
#[derive(Debug, Clone, PartialEq)]
pub struct LogisticFit {
    pub weights: Vec<f64>,
    pub bias: f64,
    pub iterations: usize,
    pub loss: f64,
    pub accuracy: f64,
}

/// Fit L2-regularized logistic regression
///
/// `labels` are 0.0 or 1.0. The bias is not regularized.
pub fn fit_logistic(
    features: &[Vec<f64>],
    labels: &[f64],
    config: &RewardConfig,
) -> Result<LogisticFit> {
    if features.is_empty() || features.len() != labels.len() {
        return Err(MotivateError::ValidationError(format!(
            "cannot fit {} feature rows against {} labels",
            features.len(),
            labels.len()
        )));
    }
    let dims = features[0].len();
    if let Some(row) = features.iter().find(|row| row.len() != dims) {
        return Err(MotivateError::DimensionMismatch {
            expected: dims,
            actual: row.len(),
        });
    }

    let n = features.len() as f64;
    let lambda = 1.0 / (config.l2_strength * n);
    let mut weights = vec![0.0; dims];
    let mut bias = 0.0;
    let mut grad_w = vec![0.0; dims];
    let mut iterations = 0;

    while iterations < config.max_iterations {
        iterations += 1;
        grad_w.iter_mut().for_each(|g| *g = 0.0);
        let mut grad_b = 0.0;

        for (row, &label) in features.iter().zip(labels) {
            let z: f64 = weights.iter().zip(row).map(|(w, x)| w * x).sum::<f64>() + bias;
            let residual = sigmoid(z) - label;
            for (g, x) in grad_w.iter_mut().zip(row) {
                *g += residual * x;
            }
            grad_b += residual;
        }

        let mut max_grad = (grad_b / n).abs();
        for (g, w) in grad_w.iter_mut().zip(&weights) {
            *g = *g / n + lambda * w;
            max_grad = max_grad.max(g.abs());
        }

        for (w, g) in weights.iter_mut().zip(&grad_w) {
            *w -= config.learning_rate * g;
        }
        bias -= config.learning_rate * grad_b / n;

        if max_grad < config.tolerance {
            break;
        }
    }

    let mut loss = 0.0;
    let mut correct = 0usize;
    for (row, &label) in features.iter().zip(labels) {
        let z: f64 = weights.iter().zip(row).map(|(w, x)| w * x).sum::<f64>() + bias;
        let p = sigmoid(z).clamp(1e-12, 1.0 - 1e-12);
        loss -= label * p.ln() + (1.0 - label) * (1.0 - p).ln();
        if (p >= 0.5) == (label >= 0.5) {
            correct += 1;
        }
    }
    loss = loss / n + 0.5 * lambda * weights.iter().map(|w| w * w).sum::<f64>();

    if !loss.is_finite() || !bias.is_finite() {
        return Err(MotivateError::Other(
            "logistic fit diverged; lower reward.learning_rate".to_string(),
        ));
    }

    Ok(LogisticFit {
        weights,
        bias,
        iterations,
        loss,
        accuracy: correct as f64 / n,
    })
}

/// Trains reward models from preference pairs
pub struct RewardTrainer {
    embedder: Arc<dyn EmbeddingService>,
    config: RewardConfig,
}

impl RewardTrainer {
    pub fn new(embedder: Arc<dyn EmbeddingService>, config: RewardConfig) -> Self {
        Self { embedder, config }
    }

    pub fn config(&self) -> &RewardConfig {
        &self.config
    }

    async fn embed_cached(
        &self,
        text: &str,
        cache: &mut HashMap<String, Vec<f32>>,
    ) -> Result<Vec<f32>> {
        if let Some(hit) = cache.get(text) {
            return Ok(hit.clone());
        }
        let embedding = self.embedder.embed(text).await?;
        if embedding.len() != self.embedder.dimensions() {
            return Err(MotivateError::DimensionMismatch {
                expected: self.embedder.dimensions(),
                actual: embedding.len(),
            });
        }
        cache.insert(text.to_string(), embedding.clone());
        Ok(embedding)
    }

    /// Full retrain on `pairs`
    ///
    /// Pairs whose texts cannot be embedded are skipped with a warning. Fails
    /// with `InsufficientData` if fewer than `min_pairs` are supplied or
    /// survive embedding; an embedding failure for the baseline text is
    /// returned as is.
    pub async fn train(&self, pairs: &[PreferencePair]) -> Result<RewardModel> {
        let need = self.config.min_pairs;
        if pairs.len() < need {
            return Err(MotivateError::InsufficientData {
                have: pairs.len(),
                need,
            });
        }

        let mut cache = HashMap::new();
        let mut features: Vec<Vec<f64>> = Vec::with_capacity(pairs.len() * 2);
        let mut labels: Vec<f64> = Vec::with_capacity(pairs.len() * 2);
        let mut skipped = 0;

        for (i, pair) in pairs.iter().enumerate() {
            let a = match self.embed_cached(&pair.text_a, &mut cache).await {
                Ok(a) => a,
                Err(e) => {
                    warn!("Skipping pair {}: cannot embed text_a: {}", i, e);
                    skipped += 1;
                    continue;
                }
            };
            let b = match self.embed_cached(&pair.text_b, &mut cache).await {
                Ok(b) => b,
                Err(e) => {
                    warn!("Skipping pair {}: cannot embed text_b: {}", i, e);
                    skipped += 1;
                    continue;
                }
            };

            let difference: Vec<f64> = a
                .iter()
                .zip(&b)
                .map(|(x, y)| f64::from(*x) - f64::from(*y))
                .collect();
            let label = if pair.preferred == Preference::A { 1.0 } else { 0.0 };

            if self.config.symmetric_pairs {
                features.push(difference.iter().map(|d| -d).collect());
                labels.push(1.0 - label);
            }
            features.push(difference);
            labels.push(label);
        }

        let pair_count = pairs.len() - skipped;
        if pair_count < need {
            return Err(MotivateError::InsufficientData {
                have: pair_count,
                need,
            });
        }

        let baseline = self.embed_cached(&self.config.baseline_text, &mut cache).await?;

        debug!(
            "Fitting reward model on {} examples ({} dims)",
            features.len(),
            self.embedder.dimensions()
        );
        let config = self.config.clone();
        let sample_count = features.len();
        let fit = tokio::task::spawn_blocking(move || fit_logistic(&features, &labels, &config))
            .await
            .map_err(|e| MotivateError::Other(format!("Task join error: {}", e)))??;

        let model = RewardModel {
            id: Uuid::new_v4(),
            weights: fit.weights,
            bias: fit.bias,
            dimensions: self.embedder.dimensions(),
            embedder: self.embedder.model_name().to_string(),
            baseline_text: self.config.baseline_text.clone(),
            baseline,
            trained_at: Utc::now(),
            pair_count,
            skipped_pairs: skipped,
            sample_count,
            training_accuracy: fit.accuracy,
            final_loss: fit.loss,
        };

        info!(
            "Trained reward model {} on {} pairs ({} skipped): accuracy {:.2}, loss {:.4}, {} iterations",
            model.id, pair_count, skipped, fit.accuracy, fit.loss, fit.iterations
        );
        Ok(model)
    }
}
