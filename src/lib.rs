//! Motivate - OCEAN preference learning engine
//!
//! Personalizes generated coaching text to a user's Big-Five (OCEAN)
//! preferences and improves from binary feedback:
//! - A profile that moves toward liked styles and away from disliked ones,
//!   with a decaying learning rate
//! - An append-only feedback ledger
//! - Contrastive preference pairs synthesized from the ledger
//! - A pairwise reward model trained on embedding differences
//!
//! # Architecture
//!
//! - **Types**: OCEAN vectors, profiles, feedback events, preference pairs
//! - **Learning**: learning-rate schedule and the pure profile updater
//! - **Storage**: profile, log and cursor stores (memory and file backends)
//! - **Services / Embeddings**: generator and embedder collaborators
//! - **Synthesis / Reward**: pair synthesis, reward training and scoring
//! - **Engine**: wires the above together for one user
//!
//! # Example
//!
//! ```ignore
//! use motivate_core::{Feedback, FeedbackEvent, OceanVector, PreferenceEngine, Settings};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load(None)?;
//!     let engine = PreferenceEngine::from_settings(&settings).await?;
//!
//!     let shown = OceanVector::new(0.9, 0.5, 0.7, 0.8, 0.3)?;
//!     let event = FeedbackEvent::new(
//!         "I keep procrastinating",
//!         "Try a wild new routine this week!",
//!         shown,
//!         Feedback::Positive,
//!     )?;
//!     let receipt = engine.record_feedback(event).await?;
//!     println!("profile now {}", receipt.profile.current);
//!
//!     let score = engine
//!         .score_or_neutral("Plan one small step.", &receipt.profile.current)
//!         .await?;
//!     println!("score {:.2}", score);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod embeddings;
pub mod engine;
pub mod error;
pub mod learning;
pub mod reward;
pub mod services;
pub mod storage;
pub mod synthesis;
pub mod types;

// Re-export commonly used types
pub use config::Settings;
pub use embeddings::{EmbeddingService, HashingEmbedder};
pub use engine::{
    EngineStores, FeedbackReceipt, PipelineStatus, PreferenceEngine, TrainOptions,
    TrainingOutcome, TrainingReport, TrainingStats,
};
pub use error::{MotivateError, Result};
pub use learning::{ImpactLevel, LearningRateSchedule, ProfileUpdater};
pub use reward::{RewardModel, RewardScorer, RewardTrainer};
pub use services::{OllamaGenerator, ResponseGenerator};
pub use storage::{AppendLog, CursorStore, ProfileStore};
pub use synthesis::{ContrastStrategy, PairSynthesizer, StrategyKind};
pub use types::{
    Dimension, Feedback, FeedbackEvent, LedgerCursor, OceanVector, PairSource, Preference,
    PreferencePair, UserProfile,
};
