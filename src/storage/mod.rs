//! Storage layer for the preference learning engine
//!
//! Defines the logical store contracts the learning components depend on,
//! with in-process ([`memory`]) and file-backed ([`file`]) implementations:
//! - [`ProfileStore`]: the latest [`UserProfile`], replaced atomically
//! - [`AppendLog`]: append-only, totally ordered record logs (feedback
//!   ledger, preference pair corpus)
//! - [`CursorStore`]: the synthesis [`LedgerCursor`]

pub mod file;
pub mod memory;

use crate::error::{MotivateError, Result};
use crate::types::{FeedbackEvent, LedgerCursor, PreferencePair, UserProfile};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

pub use file::{FileCursorStore, FileProfileStore, JsonlLog};
pub use memory::{MemoryCursorStore, MemoryLog, MemoryProfileStore};

/// Holds the current profile for one user
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Latest profile (the balanced default if none was ever written)
    async fn get(&self) -> Result<UserProfile>;

    /// Replace the stored profile
    ///
    /// Fails with `ValidationError` on out-of-range values or a
    /// `feedback_count` smaller than the stored one.
    async fn set(&self, profile: UserProfile) -> Result<()>;

    /// Reinitialize to the balanced default with `feedback_count = 0`
    async fn reset(&self) -> Result<UserProfile>;
}

/// A record that can be appended to an [`AppendLog`]
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    fn validate(&self) -> Result<()>;
}

impl Record for FeedbackEvent {
    fn validate(&self) -> Result<()> {
        FeedbackEvent::validate(self)
    }
}

impl Record for PreferencePair {
    fn validate(&self) -> Result<()> {
        PreferencePair::validate(self)
    }
}

/// Append-only log with a total order over appends
#[async_trait]
pub trait AppendLog<T: Record>: Send + Sync {
    /// Append a record, returning its index
    async fn append(&self, record: T) -> Result<u64>;

    /// Append a batch, returning the index of its first record
    ///
    /// Every record is validated before anything is written; either the
    /// whole batch lands or none of it does.
    async fn append_all(&self, records: Vec<T>) -> Result<u64>;

    /// Every record with index `>= cursor`, in log order
    ///
    /// Reads a snapshot: records appended after the call starts are not
    /// observed. Safe to call repeatedly with the same cursor.
    async fn tail_since(&self, cursor: LedgerCursor) -> Result<Vec<(u64, T)>>;

    /// Number of records in the log
    async fn len(&self) -> Result<u64>;

    async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    /// Every record, in log order
    async fn read_all(&self) -> Result<Vec<T>> {
        Ok(self
            .tail_since(LedgerCursor::default())
            .await?
            .into_iter()
            .map(|(_, record)| record)
            .collect())
    }
}

/// The feedback ledger
pub type FeedbackLedger = dyn AppendLog<FeedbackEvent>;

/// The preference pair corpus
pub type PairCorpus = dyn AppendLog<PreferencePair>;

/// Persists the synthesis cursor
#[async_trait]
pub trait CursorStore: Send + Sync {
    /// Stored cursor (zero if never written)
    async fn load(&self) -> Result<LedgerCursor>;

    /// Persist a new cursor; it may never move backwards
    async fn store(&self, cursor: LedgerCursor) -> Result<()>;
}

/// Check that `next` may replace `previous` in a [`ProfileStore`]
pub fn validate_profile_transition(previous: &UserProfile, next: &UserProfile) -> Result<()> {
    next.validate()?;
    if next.feedback_count < previous.feedback_count {
        return Err(MotivateError::ValidationError(format!(
            "feedback_count cannot decrease ({} -> {})",
            previous.feedback_count, next.feedback_count
        )));
    }
    Ok(())
}

/// Check that a cursor only moves forward
pub(crate) fn validate_cursor_transition(previous: LedgerCursor, next: LedgerCursor) -> Result<()> {
    if next < previous {
        return Err(MotivateError::Storage(format!(
            "cursor cannot move backwards ({} -> {})",
            previous, next
        )));
    }
    Ok(())
}

/// Slice out the records at or after `cursor`, rejecting a cursor past the end
pub(crate) fn slice_since<T: Clone>(records: &[T], cursor: LedgerCursor) -> Result<Vec<(u64, T)>> {
    let start = cursor.position();
    if start > records.len() as u64 {
        return Err(MotivateError::Storage(format!(
            "cursor {} is beyond log length {}",
            start,
            records.len()
        )));
    }
    Ok(records
        .iter()
        .enumerate()
        .skip(start as usize)
        .map(|(i, r)| (i as u64, r.clone()))
        .collect())
}
