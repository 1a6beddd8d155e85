//! Dynamic learning-rate schedule.
//!
//! `rate = max(min_rate, base_rate * decay_factor ^ (feedback_count / step_size))`

use crate::error::{MotivateError, Result};
use serde::{Deserialize, Serialize};

/// Exponentially decaying learning rate with a floor
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LearningRateSchedule {
    /// Rate applied to the very first feedback
    pub base_rate: f64,
    /// Floor that keeps late feedback from stagnating
    pub min_rate: f64,
    /// Multiplier applied once per `step_size` feedback events
    pub decay_factor: f64,
    pub step_size: f64,
}

impl Default for LearningRateSchedule {
    fn default() -> Self {
        Self {
            base_rate: 0.25,
            min_rate: 0.05,
            decay_factor: 0.85,
            step_size: 10.0,
        }
    }
}

impl LearningRateSchedule {
    /// Adjustment magnitude for a profile that has absorbed `feedback_count` events
    pub fn rate(&self, feedback_count: u64) -> f64 {
        let exponent = feedback_count as f64 / self.step_size;
        let rate = self.base_rate * self.decay_factor.powf(exponent);
        rate.max(self.min_rate)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.base_rate > 0.0 && self.base_rate < 1.0) {
            return Err(MotivateError::ValidationError(format!(
                "base_rate must be in (0, 1), got {}",
                self.base_rate
            )));
        }
        if !(self.min_rate > 0.0 && self.min_rate <= self.base_rate) {
            return Err(MotivateError::ValidationError(format!(
                "min_rate must be in (0, base_rate], got {}",
                self.min_rate
            )));
        }
        if !(self.decay_factor > 0.0 && self.decay_factor <= 1.0) {
            return Err(MotivateError::ValidationError(format!(
                "decay_factor must be in (0, 1], got {}",
                self.decay_factor
            )));
        }
        if !(self.step_size > 0.0) {
            return Err(MotivateError::ValidationError(format!(
                "step_size must be positive, got {}",
                self.step_size
            )));
        }
        Ok(())
    }
}

/// Human-readable band for a learning rate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ImpactLevel {
    VeryHigh,
    High,
    Medium,
    Low,
    Minimal,
}

impl ImpactLevel {
    pub fn from_rate(rate: f64) -> Self {
        if rate >= 0.20 {
            ImpactLevel::VeryHigh
        } else if rate >= 0.15 {
            ImpactLevel::High
        } else if rate >= 0.10 {
            ImpactLevel::Medium
        } else if rate >= 0.07 {
            ImpactLevel::Low
        } else {
            ImpactLevel::Minimal
        }
    }
}

impl std::fmt::Display for ImpactLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImpactLevel::VeryHigh => write!(f, "very high"),
            ImpactLevel::High => write!(f, "high"),
            ImpactLevel::Medium => write!(f, "medium"),
            ImpactLevel::Low => write!(f, "low"),
            ImpactLevel::Minimal => write!(f, "minimal"),
        }
    }
}
