//! Feedback to preference-pair synthesis

pub mod strategy;
pub mod synthesizer;

pub use strategy::{
    build_strategy, ContrastStrategy, OppositeStrategy, RandomStrategy, SingleDimensionStrategy,
    StrategyKind,
};
pub use synthesizer::{contrastive_pair, PairSynthesizer, SynthesisOutcome};

use crate::error::{MotivateError, Result};
use serde::{Deserialize, Serialize};

/// Synthesis settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisConfig {
    pub strategy: StrategyKind,

    /// Fixed seed for the random strategies
    pub seed: Option<u64>,

    /// Stored as the contrasting response when generation fails
    pub placeholder: String,

    /// Per-event generation timeout
    pub generation_timeout_secs: u64,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            strategy: StrategyKind::Opposite,
            seed: None,
            placeholder: "Contrastive response (generator unavailable)".to_string(),
            generation_timeout_secs: 60,
        }
    }
}

impl SynthesisConfig {
    pub fn validate(&self) -> Result<()> {
        if self.placeholder.trim().is_empty() {
            return Err(MotivateError::ValidationError(
                "synthesis placeholder cannot be empty".to_string(),
            ));
        }
        if self.generation_timeout_secs == 0 {
            return Err(MotivateError::ValidationError(
                "generation_timeout_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
