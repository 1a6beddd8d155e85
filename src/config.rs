//! Layered configuration for Motivate
//!
//! Values are resolved in order, later sources winning:
//! 1. Built-in defaults
//! 2. TOML file (`--config`, or `<data dir>/motivate.toml` if it exists)
//! 3. Environment variables: `MOTIVATE__<SECTION>__<KEY>`,
//!    e.g. `MOTIVATE__LEARNING__BASE_RATE=0.3`

use crate::embeddings::EmbeddingConfig;
use crate::error::{MotivateError, Result};
use crate::learning::LearningRateSchedule;
use crate::reward::RewardConfig;
use crate::services::GeneratorConfig;
use crate::synthesis::SynthesisConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable prefix
pub const ENV_PREFIX: &str = "MOTIVATE";

/// Config file looked for in the data directory
pub const CONFIG_FILE_NAME: &str = "motivate.toml";

/// Default data directory: `<local data dir>/motivate`, or `./data`
pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("motivate"))
        .unwrap_or_else(|| PathBuf::from("data"))
}

/// Where persisted state lives
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub dir: PathBuf,
    pub profile_file: String,
    pub feedback_file: String,
    pub pairs_file: String,
    pub cursor_file: String,
    pub model_file: String,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            dir: default_data_dir(),
            profile_file: "user_ocean_profile.json".to_string(),
            feedback_file: "ocean_feedback.jsonl".to_string(),
            pairs_file: "comparisons.jsonl".to_string(),
            cursor_file: "last_processed_feedback.json".to_string(),
            model_file: "reward_model.json".to_string(),
        }
    }
}

impl DataConfig {
    /// Everything under `dir`, with the default file names
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            ..Default::default()
        }
    }

    pub fn profile_path(&self) -> PathBuf {
        self.dir.join(&self.profile_file)
    }

    pub fn feedback_path(&self) -> PathBuf {
        self.dir.join(&self.feedback_file)
    }

    pub fn pairs_path(&self) -> PathBuf {
        self.dir.join(&self.pairs_file)
    }

    pub fn cursor_path(&self) -> PathBuf {
        self.dir.join(&self.cursor_file)
    }

    pub fn model_path(&self) -> PathBuf {
        self.dir.join(&self.model_file)
    }
}

/// Feedback → pairs → retrain pipeline settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Ledger entries required before the pipeline runs at all
    pub min_feedback: usize,

    /// Retrain automatically as feedback arrives
    pub auto_train: bool,

    /// Retrain every this many feedback events
    pub auto_train_every: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            min_feedback: 3,
            auto_train: true,
            auto_train_every: 3,
        }
    }
}

/// Complete engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub data: DataConfig,
    pub learning: LearningRateSchedule,
    pub synthesis: SynthesisConfig,
    pub reward: RewardConfig,
    pub pipeline: PipelineConfig,
    pub generator: GeneratorConfig,
    pub embedding: EmbeddingConfig,
}

impl Settings {
    /// Load settings from the optional file and the environment
    ///
    /// An explicitly given `config_path` must exist; the implicit
    /// `<data dir>/motivate.toml` is used only if present.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        match config_path {
            Some(path) => {
                if !path.exists() {
                    return Err(MotivateError::Config(config::ConfigError::Message(format!(
                        "config file not found: {}",
                        path.display()
                    ))));
                }
                debug!("Loading configuration from {}", path.display());
                builder = builder.add_source(config::File::from(path));
            }
            None => {
                let implicit = default_data_dir().join(CONFIG_FILE_NAME);
                if implicit.exists() {
                    debug!("Loading configuration from {}", implicit.display());
                    builder = builder.add_source(config::File::from(implicit));
                }
            }
        }

        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );

        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Parse settings from a TOML document (no environment overrides)
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let settings: Settings = config::Config::builder()
            .add_source(config::File::from_str(content, config::FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Render the effective settings as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| MotivateError::Config(config::ConfigError::Message(e.to_string())))
    }

    pub fn validate(&self) -> Result<()> {
        self.learning.validate()?;
        self.synthesis.validate()?;
        self.reward.validate()?;
        self.embedding.validate()?;

        if self.pipeline.auto_train_every == 0 {
            return Err(MotivateError::Config(config::ConfigError::Message(
                "pipeline.auto_train_every must be positive".to_string(),
            )));
        }
        if self.pipeline.min_feedback == 0 {
            return Err(MotivateError::Config(config::ConfigError::Message(
                "pipeline.min_feedback must be positive".to_string(),
            )));
        }
        if self.generator.base_url.trim().is_empty() {
            return Err(MotivateError::Config(config::ConfigError::Message(
                "generator.base_url cannot be empty".to_string(),
            )));
        }
        Ok(())
    }
}
