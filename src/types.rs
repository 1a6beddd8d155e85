//! Core data types for the Motivate preference learning engine
//!
//! This module defines the records that flow between the learning components:
//! OCEAN vectors and profiles, feedback events, ledger cursors, and the
//! preference pairs consumed by the reward model. Field names are the
//! persisted contract; the storage medium lives in [`crate::storage`].

use crate::error::{MotivateError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Neutral value every dimension starts at
pub const BALANCED: f64 = 0.5;

/// One of the five Big-Five personality dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Openness,
    Conscientiousness,
    Extraversion,
    Agreeableness,
    Neuroticism,
}

impl Dimension {
    /// All dimensions in canonical O-C-E-A-N order
    pub const ALL: [Dimension; 5] = [
        Dimension::Openness,
        Dimension::Conscientiousness,
        Dimension::Extraversion,
        Dimension::Agreeableness,
        Dimension::Neuroticism,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Dimension::Openness => "openness",
            Dimension::Conscientiousness => "conscientiousness",
            Dimension::Extraversion => "extraversion",
            Dimension::Agreeableness => "agreeableness",
            Dimension::Neuroticism => "neuroticism",
        }
    }
}

impl std::fmt::Display for Dimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Five bounded scalars, each in `[0.0, 1.0]`
///
/// Construction through [`OceanVector::new`] validates the range; the
/// fields stay public so deserialized records can be checked with
/// [`OceanVector::validate`] at the store boundary.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OceanVector {
    pub openness: f64,
    pub conscientiousness: f64,
    pub extraversion: f64,
    pub agreeableness: f64,
    pub neuroticism: f64,
}

impl OceanVector {
    /// Create a validated vector
    pub fn new(
        openness: f64,
        conscientiousness: f64,
        extraversion: f64,
        agreeableness: f64,
        neuroticism: f64,
    ) -> Result<Self> {
        let vector = Self {
            openness,
            conscientiousness,
            extraversion,
            agreeableness,
            neuroticism,
        };
        vector.validate()?;
        Ok(vector)
    }

    /// The balanced all-0.5 vector
    pub fn balanced() -> Self {
        Self::splat(BALANCED)
    }

    fn splat(value: f64) -> Self {
        Self {
            openness: value,
            conscientiousness: value,
            extraversion: value,
            agreeableness: value,
            neuroticism: value,
        }
    }

    /// Build from `[o, c, e, a, n]`
    pub fn from_array(values: [f64; 5]) -> Result<Self> {
        Self::new(values[0], values[1], values[2], values[3], values[4])
    }

    pub fn to_array(&self) -> [f64; 5] {
        [
            self.openness,
            self.conscientiousness,
            self.extraversion,
            self.agreeableness,
            self.neuroticism,
        ]
    }

    pub fn get(&self, dimension: Dimension) -> f64 {
        match dimension {
            Dimension::Openness => self.openness,
            Dimension::Conscientiousness => self.conscientiousness,
            Dimension::Extraversion => self.extraversion,
            Dimension::Agreeableness => self.agreeableness,
            Dimension::Neuroticism => self.neuroticism,
        }
    }

    /// Return a copy with one dimension replaced (unvalidated)
    pub fn with(mut self, dimension: Dimension, value: f64) -> Self {
        match dimension {
            Dimension::Openness => self.openness = value,
            Dimension::Conscientiousness => self.conscientiousness = value,
            Dimension::Extraversion => self.extraversion = value,
            Dimension::Agreeableness => self.agreeableness = value,
            Dimension::Neuroticism => self.neuroticism = value,
        }
        self
    }

    /// Apply `f` to every dimension
    pub fn map<F>(&self, mut f: F) -> Self
    where
        F: FnMut(Dimension, f64) -> f64,
    {
        Dimension::ALL
            .iter()
            .fold(*self, |acc, &dim| acc.with(dim, f(dim, self.get(dim))))
    }

    /// Reject NaN or any field outside `[0, 1]`
    pub fn validate(&self) -> Result<()> {
        for dim in Dimension::ALL {
            let value = self.get(dim);
            if !(0.0..=1.0).contains(&value) {
                return Err(MotivateError::ValidationError(format!(
                    "{} = {} is outside [0, 1]",
                    dim, value
                )));
            }
        }
        Ok(())
    }

    /// Reflect every dimension through 0.5
    pub fn opposite(&self) -> Self {
        self.map(|_, v| 1.0 - v)
    }

    /// Largest per-dimension absolute difference
    pub fn max_abs_diff(&self, other: &OceanVector) -> f64 {
        Dimension::ALL
            .iter()
            .map(|&d| (self.get(d) - other.get(d)).abs())
            .fold(0.0, f64::max)
    }

    pub fn approx_eq(&self, other: &OceanVector, epsilon: f64) -> bool {
        self.max_abs_diff(other) <= epsilon
    }
}

impl Default for OceanVector {
    fn default() -> Self {
        Self::balanced()
    }
}

impl std::fmt::Display for OceanVector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "O={:.2} C={:.2} E={:.2} A={:.2} N={:.2}",
            self.openness,
            self.conscientiousness,
            self.extraversion,
            self.agreeableness,
            self.neuroticism
        )
    }
}

/// Binary feedback label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Feedback {
    Positive,
    Negative,
}

impl Feedback {
    pub fn from_positive(positive: bool) -> Self {
        if positive {
            Feedback::Positive
        } else {
            Feedback::Negative
        }
    }

    pub fn is_positive(&self) -> bool {
        matches!(self, Feedback::Positive)
    }
}

impl std::fmt::Display for Feedback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Feedback::Positive => write!(f, "positive"),
            Feedback::Negative => write!(f, "negative"),
        }
    }
}

/// A user's learned OCEAN preferences plus learning metadata
///
/// Persisted flat: the five dimensions sit next to the metadata fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(flatten)]
    pub current: OceanVector,

    /// Number of feedback events folded into `current`
    pub feedback_count: u64,

    /// Effective rate applied by the most recent update
    #[serde(default)]
    pub last_learning_rate: Option<f64>,

    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
}

impl UserProfile {
    pub fn validate(&self) -> Result<()> {
        self.current.validate()?;
        if let Some(rate) = self.last_learning_rate {
            if !(rate > 0.0 && rate <= 1.0) {
                return Err(MotivateError::ValidationError(format!(
                    "last_learning_rate = {} is outside (0, 1]",
                    rate
                )));
            }
        }
        Ok(())
    }
}

impl Default for UserProfile {
    fn default() -> Self {
        Self {
            current: OceanVector::balanced(),
            feedback_count: 0,
            last_learning_rate: None,
            last_updated: None,
        }
    }
}

/// One piece of user feedback on a generated response
///
/// Immutable once appended to the ledger. Whether it has been turned into a
/// preference pair is tracked by the [`LedgerCursor`], never on the record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackEvent {
    pub prompt: String,
    pub response: String,
    pub ocean_profile: OceanVector,
    pub feedback: Feedback,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl FeedbackEvent {
    pub fn new(
        prompt: impl Into<String>,
        response: impl Into<String>,
        ocean_profile: OceanVector,
        feedback: Feedback,
    ) -> Result<Self> {
        let event = Self {
            prompt: prompt.into(),
            response: response.into(),
            ocean_profile,
            feedback,
            timestamp: Utc::now(),
            session_id: None,
        };
        event.validate()?;
        Ok(event)
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.prompt.trim().is_empty() {
            return Err(MotivateError::ValidationError(
                "feedback prompt cannot be empty".to_string(),
            ));
        }
        self.ocean_profile.validate()
    }
}

/// Number of ledger entries already converted into preference pairs
///
/// Equivalently, the index of the next unprocessed entry. Only ever moves
/// forward.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LedgerCursor(pub u64);

impl LedgerCursor {
    pub fn position(&self) -> u64 {
        self.0
    }

    pub fn advance(&self, consumed: u64) -> Self {
        Self(self.0 + consumed)
    }

    /// Whether the entry at `index` has already been folded into pairs
    pub fn covers(&self, index: u64) -> bool {
        index < self.0
    }
}

impl std::fmt::Display for LedgerCursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which side of a pair is preferred
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preference {
    A,
    B,
}

/// Where a preference pair came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PairSource {
    OceanFeedbackPositive,
    OceanFeedbackNegative,
    Manual,
}

impl PairSource {
    pub fn is_feedback_derived(&self) -> bool {
        !matches!(self, PairSource::Manual)
    }
}

/// Two responses to the same prompt with a preference label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreferencePair {
    pub text_a: String,
    pub text_b: String,
    pub profile_a: OceanVector,
    pub profile_b: OceanVector,
    pub preferred: Preference,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(default = "default_source")]
    pub source: PairSource,
}

fn default_source() -> PairSource {
    PairSource::Manual
}

impl PreferencePair {
    /// A hand-seeded pair (pre-bootstrap corpus)
    pub fn manual(
        text_a: impl Into<String>,
        text_b: impl Into<String>,
        profile_a: OceanVector,
        profile_b: OceanVector,
        preferred: Preference,
    ) -> Result<Self> {
        let pair = Self {
            text_a: text_a.into(),
            text_b: text_b.into(),
            profile_a,
            profile_b,
            preferred,
            prompt: None,
            source: PairSource::Manual,
        };
        pair.validate()?;
        Ok(pair)
    }

    pub fn validate(&self) -> Result<()> {
        self.profile_a.validate()?;
        self.profile_b.validate()
    }

    pub fn preferred_text(&self) -> &str {
        match self.preferred {
            Preference::A => &self.text_a,
            Preference::B => &self.text_b,
        }
    }
}
