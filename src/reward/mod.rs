//! Pairwise reward model: training, publishing and scoring

pub mod model;
pub mod scorer;
pub mod trainer;

pub use model::RewardModel;
pub use scorer::{RewardModelSlot, RewardScorer, ScoredResponse, NEUTRAL_SCORE};
pub use trainer::{fit_logistic, LogisticFit, RewardConfig, RewardTrainer, MIN_TRAINING_PAIRS};
