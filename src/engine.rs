//! Preference learning engine
//!
//! Owns the stores and collaborators for one user and wires the learning
//! components together:
//! - feedback ingestion: ledger append, then profile read-modify-write
//! - the feedback → pairs → retrain pipeline
//! - scoring and reranking against the published reward model

use crate::config::{DataConfig, PipelineConfig, Settings};
use crate::embeddings::{build_embedder, EmbeddingService};
use crate::error::{MotivateError, Result};
use crate::learning::{ImpactLevel, ProfileUpdater};
use crate::reward::{RewardModel, RewardModelSlot, RewardScorer, RewardTrainer, ScoredResponse};
use crate::services::{OllamaGenerator, ResponseGenerator};
use crate::storage::{
    CursorStore, FeedbackLedger, FileCursorStore, FileProfileStore, JsonlLog, MemoryCursorStore,
    MemoryLog, MemoryProfileStore, PairCorpus, ProfileStore,
};
use crate::synthesis::{build_strategy, PairSynthesizer};
use crate::types::{FeedbackEvent, LedgerCursor, OceanVector, PreferencePair, UserProfile};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// The four stores the engine reads and writes
pub struct EngineStores {
    pub profiles: Arc<dyn ProfileStore>,
    pub ledger: Arc<FeedbackLedger>,
    pub pairs: Arc<PairCorpus>,
    pub cursor: Arc<dyn CursorStore>,
}

impl EngineStores {
    pub fn in_memory() -> Self {
        Self {
            profiles: Arc::new(MemoryProfileStore::new()),
            ledger: Arc::new(MemoryLog::<FeedbackEvent>::new()),
            pairs: Arc::new(MemoryLog::<PreferencePair>::new()),
            cursor: Arc::new(MemoryCursorStore::new()),
        }
    }

    pub fn files(data: &DataConfig) -> Self {
        Self {
            profiles: Arc::new(FileProfileStore::new(data.profile_path())),
            ledger: Arc::new(JsonlLog::<FeedbackEvent>::new(data.feedback_path())),
            pairs: Arc::new(JsonlLog::<PreferencePair>::new(data.pairs_path())),
            cursor: Arc::new(FileCursorStore::new(data.cursor_path())),
        }
    }
}

/// Options for one pipeline run
#[derive(Debug, Clone, Default)]
pub struct TrainOptions {
    /// Overrides `pipeline.min_feedback`
    pub min_feedback: Option<usize>,

    /// Only synthesize pairs, do not retrain
    pub skip_training: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStatus {
    InsufficientData,
    NoNewData,
    Success,
}

/// What happened to the retrain step of a pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum TrainingOutcome {
    Trained {
        model_id: Uuid,
        pair_count: usize,
        skipped_pairs: usize,
        training_accuracy: f64,
    },
    Failed {
        message: String,
    },
}

/// Result of [`PreferenceEngine::train_from_feedback`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    pub status: PipelineStatus,
    pub total_feedback: u64,
    pub min_feedback: usize,
    /// Ledger entries turned into pairs by this run
    pub processed: u64,
    pub new_pairs: usize,
    pub placeholders_used: usize,
    pub cursor: LedgerCursor,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub training: Option<TrainingOutcome>,
}

/// Result of recording one piece of feedback
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedbackReceipt {
    /// Ledger index of the event
    pub index: u64,
    pub profile: UserProfile,
    pub learning_rate: f64,
    pub impact: ImpactLevel,
    /// Present when this feedback triggered an automatic pipeline run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_training: Option<TrainingReport>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingStats {
    pub total_feedback: u64,
    pub positive_feedback: u64,
    pub negative_feedback: u64,
    pub total_pairs: u64,
    pub feedback_pairs: u64,
    pub cursor: LedgerCursor,
    pub model_trained: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_id: Option<Uuid>,
}

pub struct PreferenceEngine {
    stores: EngineStores,
    updater: ProfileUpdater,
    synthesizer: PairSynthesizer,
    trainer: RewardTrainer,
    scorer: RewardScorer,
    embedder: Arc<dyn EmbeddingService>,
    pipeline: PipelineConfig,
    model_path: Option<PathBuf>,
    profile_lock: Mutex<()>,
    pipeline_lock: Mutex<()>,
}

impl PreferenceEngine {
    pub fn new(
        settings: &Settings,
        stores: EngineStores,
        generator: Arc<dyn ResponseGenerator>,
        embedder: Arc<dyn EmbeddingService>,
    ) -> Result<Self> {
        settings.validate()?;

        let synthesizer = PairSynthesizer::new(
            Arc::clone(&stores.ledger),
            generator,
            build_strategy(settings.synthesis.strategy, settings.synthesis.seed),
            settings.synthesis.placeholder.clone(),
            Duration::from_secs(settings.synthesis.generation_timeout_secs),
        );
        let trainer = RewardTrainer::new(Arc::clone(&embedder), settings.reward.clone());
        let scorer = RewardScorer::new(Arc::new(RewardModelSlot::new()), Arc::clone(&embedder));

        Ok(Self {
            stores,
            updater: ProfileUpdater::new(settings.learning),
            synthesizer,
            trainer,
            scorer,
            embedder,
            pipeline: settings.pipeline.clone(),
            model_path: None,
            profile_lock: Mutex::new(()),
            pipeline_lock: Mutex::new(()),
        })
    }

    /// Persist trained models to `path` (and load from it with [`load_model`](Self::load_model))
    pub fn with_model_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.model_path = Some(path.into());
        self
    }

    /// File-backed engine with the Ollama generator and the configured embedder
    ///
    /// A previously saved reward model is loaded if present.
    pub async fn from_settings(settings: &Settings) -> Result<Self> {
        let embedder = build_embedder(&settings.embedding).await?;
        let generator = Arc::new(OllamaGenerator::new(settings.generator.clone())?);
        let stores = EngineStores::files(&settings.data);

        let engine = Self::new(settings, stores, generator, embedder)?
            .with_model_path(settings.data.model_path());
        engine.load_model().await?;
        Ok(engine)
    }

    pub fn updater(&self) -> &ProfileUpdater {
        &self.updater
    }

    pub fn scorer(&self) -> &RewardScorer {
        &self.scorer
    }

    /// Publish the saved model, if one exists and matches the embedder
    pub async fn load_model(&self) -> Result<bool> {
        let path = match &self.model_path {
            Some(path) => path,
            None => return Ok(false),
        };
        let model = match RewardModel::load(path).await? {
            Some(model) => model,
            None => {
                debug!("No saved reward model at {}", path.display());
                return Ok(false);
            }
        };

        if let Err(e) =
            model.check_embedder(self.embedder.model_name(), self.embedder.dimensions())
        {
            warn!("Ignoring saved reward model {}: {}", model.id, e);
            return Ok(false);
        }

        info!("Loaded reward model {} from {}", model.id, path.display());
        self.scorer.slot().publish(model).await;
        Ok(true)
    }

    pub async fn profile(&self) -> Result<UserProfile> {
        self.stores.profiles.get().await
    }

    pub async fn reset_profile(&self) -> Result<UserProfile> {
        let _guard = self.profile_lock.lock().await;
        self.stores.profiles.reset().await
    }

    /// Append feedback to the ledger and fold it into the profile
    ///
    /// The next profile is computed before the ledger write, so an unreadable
    /// profile or invalid update leaves the ledger untouched. If only the
    /// final profile write fails, the event stays in the ledger and the error
    /// names its index; retrying would record it twice.
    ///
    /// When auto-training is due, the pipeline runs afterwards; its failures
    /// are logged and never fail the feedback write.
    pub async fn record_feedback(&self, event: FeedbackEvent) -> Result<FeedbackReceipt> {
        event.validate()?;
        let target = event.ocean_profile;
        let feedback = event.feedback;

        let (index, profile) = {
            let _guard = self.profile_lock.lock().await;
            let current = self.stores.profiles.get().await?;
            let next = self.updater.apply(&current, &target, feedback)?;

            let index = self.stores.ledger.append(event).await?;
            debug!("Appended {} feedback at ledger index {}", feedback, index);

            if let Err(e) = self.stores.profiles.set(next.clone()).await {
                warn!("Feedback {} is in the ledger but the profile write failed", index);
                return Err(MotivateError::Storage(format!(
                    "feedback recorded at ledger index {} but profile not updated: {}",
                    index, e
                )));
            }
            (index, next)
        };

        let learning_rate = profile.last_learning_rate.unwrap_or_default();
        info!(
            "Profile updated with {} feedback #{} (rate {:.4}): {}",
            feedback, profile.feedback_count, learning_rate, profile.current
        );

        let auto_training = if self.auto_train_due(index + 1) {
            match self.train_from_feedback(TrainOptions::default()).await {
                Ok(report) => Some(report),
                Err(e) => {
                    warn!("Automatic training failed: {}", e);
                    None
                }
            }
        } else {
            None
        };

        Ok(FeedbackReceipt {
            index,
            profile,
            learning_rate,
            impact: ImpactLevel::from_rate(learning_rate),
            auto_training,
        })
    }

    fn auto_train_due(&self, ledger_len: u64) -> bool {
        self.pipeline.auto_train
            && ledger_len >= self.pipeline.min_feedback as u64
            && ledger_len % self.pipeline.auto_train_every as u64 == 0
    }

    /// Turn unprocessed feedback into pairs, then retrain
    ///
    /// Pairs are appended before the cursor is stored. A retrain failure is
    /// reported in [`TrainingReport::training`], not returned as an error.
    pub async fn train_from_feedback(&self, options: TrainOptions) -> Result<TrainingReport> {
        let _guard = self.pipeline_lock.lock().await;
        let min_feedback = options.min_feedback.unwrap_or(self.pipeline.min_feedback);

        let total_feedback = self.stores.ledger.len().await?;
        let cursor = self.stores.cursor.load().await?;

        let mut report = TrainingReport {
            status: PipelineStatus::Success,
            total_feedback,
            min_feedback,
            processed: 0,
            new_pairs: 0,
            placeholders_used: 0,
            cursor,
            training: None,
        };

        if total_feedback < min_feedback as u64 {
            info!(
                "Not enough feedback to train: {} of {} required",
                total_feedback, min_feedback
            );
            report.status = PipelineStatus::InsufficientData;
            return Ok(report);
        }
        if cursor.position() >= total_feedback {
            info!("No new feedback since cursor {}", cursor);
            report.status = PipelineStatus::NoNewData;
            return Ok(report);
        }

        let outcome = self.synthesizer.synthesize(cursor).await?;
        self.stores.pairs.append_all(outcome.pairs.clone()).await?;
        self.stores.cursor.store(outcome.cursor).await?;

        report.processed = outcome.cursor.position() - cursor.position();
        report.new_pairs = outcome.pairs.len();
        report.placeholders_used = outcome.placeholders_used;
        report.cursor = outcome.cursor;

        if !options.skip_training {
            report.training = Some(match self.retrain().await {
                Ok(model) => TrainingOutcome::Trained {
                    model_id: model.id,
                    pair_count: model.pair_count,
                    skipped_pairs: model.skipped_pairs,
                    training_accuracy: model.training_accuracy,
                },
                Err(e) => {
                    warn!("Retraining failed: {}", e);
                    TrainingOutcome::Failed {
                        message: e.to_string(),
                    }
                }
            });
        }

        Ok(report)
    }

    /// Full retrain on the whole pair corpus, then publish
    pub async fn retrain(&self) -> Result<Arc<RewardModel>> {
        let pairs = self.stores.pairs.read_all().await?;
        let model = self.trainer.train(&pairs).await?;

        if let Some(path) = &self.model_path {
            model.save(path).await?;
        }

        let model = Arc::new(model);
        self.scorer.slot().publish((*model).clone()).await;
        Ok(model)
    }

    pub async fn score(&self, text: &str, profile: &OceanVector) -> Result<f64> {
        self.scorer.score(text, profile).await
    }

    pub async fn score_or_neutral(&self, text: &str, profile: &OceanVector) -> Result<f64> {
        self.scorer.score_or_neutral(text, profile).await
    }

    pub async fn rerank(
        &self,
        candidates: &[String],
        profile: &OceanVector,
    ) -> Result<Vec<ScoredResponse>> {
        self.scorer.rerank(candidates, profile).await
    }

    pub async fn stats(&self) -> Result<TrainingStats> {
        let feedback = self.stores.ledger.read_all().await?;
        let pairs = self.stores.pairs.read_all().await?;
        let positive = feedback.iter().filter(|e| e.feedback.is_positive()).count() as u64;
        let model = self.scorer.slot().current().await;

        Ok(TrainingStats {
            total_feedback: feedback.len() as u64,
            positive_feedback: positive,
            negative_feedback: feedback.len() as u64 - positive,
            total_pairs: pairs.len() as u64,
            feedback_pairs: pairs.iter().filter(|p| p.source.is_feedback_derived()).count() as u64,
            cursor: self.stores.cursor.load().await?,
            model_trained: model.is_some(),
            model_id: model.map(|m| m.id),
        })
    }
}

impl std::fmt::Debug for PreferenceEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreferenceEngine")
            .field("strategy", &self.synthesizer.strategy_name())
            .field("embedder", &self.embedder.model_name())
            .field("model_path", &self.model_path)
            .finish()
    }
}
