//! In-process store implementations
//!
//! Used by tests and by embedders that manage persistence themselves.
//! Every mutation happens under a single write lock, so readers never see
//! a partially applied change.

use crate::error::Result;
use crate::storage::{
    slice_since, validate_cursor_transition, validate_profile_transition, AppendLog, CursorStore,
    ProfileStore, Record,
};
use crate::types::{LedgerCursor, UserProfile};
use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

/// Profile store held in memory
#[derive(Debug, Default)]
pub struct MemoryProfileStore {
    profile: RwLock<UserProfile>,
}

impl MemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing profile
    pub fn with_profile(profile: UserProfile) -> Result<Self> {
        profile.validate()?;
        Ok(Self {
            profile: RwLock::new(profile),
        })
    }
}

#[async_trait]
impl ProfileStore for MemoryProfileStore {
    async fn get(&self) -> Result<UserProfile> {
        Ok(self.profile.read().await.clone())
    }

    async fn set(&self, profile: UserProfile) -> Result<()> {
        let mut guard = self.profile.write().await;
        validate_profile_transition(&guard, &profile)?;
        *guard = profile;
        Ok(())
    }

    async fn reset(&self) -> Result<UserProfile> {
        let mut guard = self.profile.write().await;
        *guard = UserProfile::default();
        debug!("Profile reset to balanced default");
        Ok(guard.clone())
    }
}

/// Append-only log held in memory
#[derive(Debug)]
pub struct MemoryLog<T> {
    records: RwLock<Vec<T>>,
}

impl<T> Default for MemoryLog<T> {
    fn default() -> Self {
        Self {
            records: RwLock::new(Vec::new()),
        }
    }
}

impl<T: Record> MemoryLog<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a log with pre-existing records
    pub fn from_records(records: Vec<T>) -> Result<Self> {
        for record in &records {
            record.validate()?;
        }
        Ok(Self {
            records: RwLock::new(records),
        })
    }
}

#[async_trait]
impl<T: Record> AppendLog<T> for MemoryLog<T> {
    async fn append(&self, record: T) -> Result<u64> {
        record.validate()?;
        let mut records = self.records.write().await;
        records.push(record);
        Ok(records.len() as u64 - 1)
    }

    async fn append_all(&self, batch: Vec<T>) -> Result<u64> {
        for record in &batch {
            record.validate()?;
        }
        let mut records = self.records.write().await;
        let index = records.len() as u64;
        records.extend(batch);
        Ok(index)
    }

    async fn tail_since(&self, cursor: LedgerCursor) -> Result<Vec<(u64, T)>> {
        let records = self.records.read().await;
        slice_since(&records, cursor)
    }

    async fn len(&self) -> Result<u64> {
        Ok(self.records.read().await.len() as u64)
    }
}

/// Cursor held in memory
#[derive(Debug, Default)]
pub struct MemoryCursorStore {
    cursor: Mutex<LedgerCursor>,
}

impl MemoryCursorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CursorStore for MemoryCursorStore {
    async fn load(&self) -> Result<LedgerCursor> {
        Ok(*self.cursor.lock().await)
    }

    async fn store(&self, cursor: LedgerCursor) -> Result<()> {
        let mut guard = self.cursor.lock().await;
        validate_cursor_transition(*guard, cursor)?;
        *guard = cursor;
        Ok(())
    }
}
