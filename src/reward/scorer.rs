//! Publishing and scoring with the current reward model

use crate::embeddings::EmbeddingService;
use crate::error::{MotivateError, Result};
use crate::reward::model::RewardModel;
use crate::types::OceanVector;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Score used when no model has been trained
pub const NEUTRAL_SCORE: f64 = 0.5;

/// Holds the published reward model
///
/// Publishing swaps the whole `Arc`; scorers that already cloned the old
/// one finish with it.
#[derive(Debug, Default)]
pub struct RewardModelSlot {
    current: RwLock<Option<Arc<RewardModel>>>,
}

impl RewardModelSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the published model, returning the previous one
    pub async fn publish(&self, model: RewardModel) -> Option<Arc<RewardModel>> {
        let model = Arc::new(model);
        let mut guard = self.current.write().await;
        info!("Publishing reward model {}", model.id);
        guard.replace(model)
    }

    pub async fn current(&self) -> Option<Arc<RewardModel>> {
        self.current.read().await.clone()
    }

    pub async fn is_trained(&self) -> bool {
        self.current.read().await.is_some()
    }
}

/// A candidate response with its reward score
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredResponse {
    pub text: String,
    pub score: f64,
}

pub struct RewardScorer {
    slot: Arc<RewardModelSlot>,
    embedder: Arc<dyn EmbeddingService>,
}

impl RewardScorer {
    pub fn new(slot: Arc<RewardModelSlot>, embedder: Arc<dyn EmbeddingService>) -> Self {
        Self { slot, embedder }
    }

    pub fn slot(&self) -> &Arc<RewardModelSlot> {
        &self.slot
    }

    /// Score `text` for a user with `profile`, in `[0, 1]`
    ///
    /// The profile is validated but does not enter the decision; the style it
    /// describes is already present in the text.
    pub async fn score(&self, text: &str, profile: &OceanVector) -> Result<f64> {
        profile.validate()?;
        let model = self.slot.current().await.ok_or(MotivateError::ModelNotTrained)?;
        model.check_embedder(self.embedder.model_name(), self.embedder.dimensions())?;

        let embedding = self.embedder.embed(text).await?;
        let score = model.score_embedding(&embedding)?;
        debug!("Scored response for profile {}: {:.3}", profile, score);
        Ok(score)
    }

    /// Like [`score`](Self::score), but [`NEUTRAL_SCORE`] when untrained
    pub async fn score_or_neutral(&self, text: &str, profile: &OceanVector) -> Result<f64> {
        match self.score(text, profile).await {
            Err(MotivateError::ModelNotTrained) => Ok(NEUTRAL_SCORE),
            other => other,
        }
    }

    /// Score every candidate and return them best first
    ///
    /// Without a model every candidate gets the neutral score and the input
    /// order is kept.
    pub async fn rerank(
        &self,
        candidates: &[String],
        profile: &OceanVector,
    ) -> Result<Vec<ScoredResponse>> {
        let mut scored = Vec::with_capacity(candidates.len());
        for text in candidates {
            scored.push(ScoredResponse {
                text: text.clone(),
                score: self.score_or_neutral(text, profile).await?,
            });
        }
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        Ok(scored)
    }
}
