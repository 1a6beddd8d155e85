//! Contrastive target strategies
//!
//! A strategy picks the OCEAN vector the contrasting response is generated
//! under. `opposite` is the default and the only one whose output is fully
//! determined by its input.

use crate::error::{MotivateError, Result};
use crate::types::{Dimension, OceanVector};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

/// Derives a contrasting profile from the profile a response was shown with
pub trait ContrastStrategy: Send + Sync {
    fn contrast(&self, original: &OceanVector) -> OceanVector;

    fn name(&self) -> &'static str;
}

/// Reflect every dimension through 0.5
#[derive(Debug, Default, Clone, Copy)]
pub struct OppositeStrategy;

impl ContrastStrategy for OppositeStrategy {
    fn contrast(&self, original: &OceanVector) -> OceanVector {
        original.opposite()
    }

    fn name(&self) -> &'static str {
        "opposite"
    }
}

fn lock_rng(rng: &Mutex<StdRng>) -> std::sync::MutexGuard<'_, StdRng> {
    rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Push one randomly chosen dimension to the far pole (0.9 or 0.1)
#[derive(Debug)]
pub struct SingleDimensionStrategy {
    rng: Mutex<StdRng>,
}

impl SingleDimensionStrategy {
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl Default for SingleDimensionStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl ContrastStrategy for SingleDimensionStrategy {
    fn contrast(&self, original: &OceanVector) -> OceanVector {
        let dim = Dimension::ALL[lock_rng(&self.rng).gen_range(0..Dimension::ALL.len())];
        let value = if original.get(dim) < 0.5 { 0.9 } else { 0.1 };
        original.with(dim, value)
    }

    fn name(&self) -> &'static str {
        "single_dimension"
    }
}

/// Draw every dimension uniformly from [0.1, 0.9]
#[derive(Debug)]
pub struct RandomStrategy {
    rng: Mutex<StdRng>,
}

impl RandomStrategy {
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl Default for RandomStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl ContrastStrategy for RandomStrategy {
    fn contrast(&self, original: &OceanVector) -> OceanVector {
        let mut rng = lock_rng(&self.rng);
        original.map(|_, _| rng.gen_range(0.1..=0.9))
    }

    fn name(&self) -> &'static str {
        "random"
    }
}

/// Strategy selector used in configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    #[default]
    Opposite,
    SingleDimension,
    Random,
}

impl std::str::FromStr for StrategyKind {
    type Err = MotivateError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "opposite" => Ok(StrategyKind::Opposite),
            "single_dimension" | "single_dim" => Ok(StrategyKind::SingleDimension),
            "random" => Ok(StrategyKind::Random),
            other => Err(MotivateError::ValidationError(format!(
                "unknown contrast strategy '{}'",
                other
            ))),
        }
    }
}

/// Build a strategy; `seed` makes the random strategies reproducible
pub fn build_strategy(kind: StrategyKind, seed: Option<u64>) -> Arc<dyn ContrastStrategy> {
    match (kind, seed) {
        (StrategyKind::Opposite, _) => Arc::new(OppositeStrategy),
        (StrategyKind::SingleDimension, Some(seed)) => {
            Arc::new(SingleDimensionStrategy::with_seed(seed))
        }
        (StrategyKind::SingleDimension, None) => Arc::new(SingleDimensionStrategy::new()),
        (StrategyKind::Random, Some(seed)) => Arc::new(RandomStrategy::with_seed(seed)),
        (StrategyKind::Random, None) => Arc::new(RandomStrategy::new()),
    }
}
