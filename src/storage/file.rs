//! File-backed store implementations
//!
//! - Profile and cursor: a single JSON document, replaced by writing a
//!   sibling temp file and renaming it over the original.
//! - Logs: JSON lines, one record per line, appended under a lock.

use crate::error::{MotivateError, Result};
use crate::storage::{
    slice_since, validate_cursor_transition, validate_profile_transition, AppendLog, CursorStore,
    ProfileStore, Record,
};
use crate::types::{LedgerCursor, UserProfile};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Write `bytes` to `path` so readers see either the old or the new content
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await?;
        }
    }

    let mut tmp_name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    let mut file = fs::File::create(&tmp_path).await?;
    file.write_all(bytes).await?;
    file.sync_all().await?;
    drop(file);

    fs::rename(&tmp_path, path).await?;
    Ok(())
}

async fn read_optional(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path).await {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Profile persisted as a flat JSON object
#[derive(Debug)]
pub struct FileProfileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileProfileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read(&self) -> Result<UserProfile> {
        match read_optional(&self.path).await? {
            Some(content) => {
                let profile: UserProfile = serde_json::from_str(&content)?;
                profile.validate()?;
                Ok(profile)
            }
            None => Ok(UserProfile::default()),
        }
    }

    async fn write(&self, profile: &UserProfile) -> Result<()> {
        let json = serde_json::to_vec_pretty(profile)?;
        write_atomic(&self.path, &json).await
    }
}

#[async_trait]
impl ProfileStore for FileProfileStore {
    async fn get(&self) -> Result<UserProfile> {
        self.read().await
    }

    async fn set(&self, profile: UserProfile) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let previous = self.read().await?;
        validate_profile_transition(&previous, &profile)?;
        self.write(&profile).await?;
        debug!(
            "Stored profile #{} to {}",
            profile.feedback_count,
            self.path.display()
        );
        Ok(())
    }

    async fn reset(&self) -> Result<UserProfile> {
        let _guard = self.write_lock.lock().await;
        let profile = UserProfile::default();
        self.write(&profile).await?;
        info!("Profile at {} reset to balanced default", self.path.display());
        Ok(profile)
    }
}

/// Append-only JSON-lines log
///
/// Blank lines are ignored. A line that fails to parse or validate is
/// reported with its line number, except an unterminated final line: that is
/// what an interrupted append leaves behind, so it is skipped and cut off
/// before the next write.
#[derive(Debug)]
pub struct JsonlLog<T> {
    path: PathBuf,
    lock: Mutex<()>,
    _record: PhantomData<fn() -> T>,
}

/// Parsed log contents
struct Loaded<T> {
    records: Vec<T>,
    /// Byte offset of a torn final line
    torn_at: Option<u64>,
    /// The file ends without a newline after a complete record
    needs_newline: bool,
}

impl<T: Record> JsonlLog<T> {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
            _record: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Loaded<T>> {
        let content = match read_optional(&self.path).await? {
            Some(content) => content,
            None => {
                return Ok(Loaded {
                    records: Vec::new(),
                    torn_at: None,
                    needs_newline: false,
                })
            }
        };

        let mut records = Vec::new();
        let mut torn_at = None;
        let mut offset = 0usize;
        let mut needs_newline = false;

        for (line_no, raw) in content.split_inclusive('\n').enumerate() {
            let start = offset;
            offset += raw.len();
            let terminated = raw.ends_with('\n');
            let line = raw.trim_end_matches(&['\n', '\r'][..]);
            if line.trim().is_empty() {
                continue;
            }

            let record: T = match serde_json::from_str(line) {
                Ok(record) => record,
                Err(e) if !terminated => {
                    warn!(
                        "{}:{}: skipping unterminated record ({})",
                        self.path.display(),
                        line_no + 1,
                        e
                    );
                    torn_at = Some(start as u64);
                    break;
                }
                Err(e) => {
                    return Err(MotivateError::Storage(format!(
                        "{}:{}: malformed record: {}",
                        self.path.display(),
                        line_no + 1,
                        e
                    )))
                }
            };
            record.validate().map_err(|e| {
                MotivateError::ValidationError(format!(
                    "{}:{}: invalid record: {}",
                    self.path.display(),
                    line_no + 1,
                    e
                ))
            })?;
            needs_newline = !terminated;
            records.push(record);
        }

        Ok(Loaded {
            records,
            torn_at,
            needs_newline,
        })
    }

    async fn write_lines(&self, loaded: &Loaded<T>, lines: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        if let Some(offset) = loaded.torn_at {
            let file = fs::OpenOptions::new().write(true).open(&self.path).await?;
            file.set_len(offset).await?;
            file.sync_all().await?;
            info!(
                "Truncated torn record at byte {} of {}",
                offset,
                self.path.display()
            );
        }

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        if loaded.needs_newline {
            file.write_all(b"\n").await?;
        }
        file.write_all(lines.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl<T: Record> AppendLog<T> for JsonlLog<T> {
    async fn append(&self, record: T) -> Result<u64> {
        self.append_all(vec![record]).await
    }

    async fn append_all(&self, records: Vec<T>) -> Result<u64> {
        let mut lines = String::new();
        for record in &records {
            record.validate()?;
            lines.push_str(&serde_json::to_string(record)?);
            lines.push('\n');
        }

        let _guard = self.lock.lock().await;
        let loaded = self.load().await?;
        let index = loaded.records.len() as u64;
        if records.is_empty() {
            return Ok(index);
        }

        self.write_lines(&loaded, &lines).await?;
        debug!(
            "Appended {} records at index {} to {}",
            records.len(),
            index,
            self.path.display()
        );
        Ok(index)
    }

    async fn tail_since(&self, cursor: LedgerCursor) -> Result<Vec<(u64, T)>> {
        let _guard = self.lock.lock().await;
        let loaded = self.load().await?;
        slice_since(&loaded.records, cursor)
    }

    async fn len(&self) -> Result<u64> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.records.len() as u64)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct CursorRecord {
    count: u64,
    #[serde(default)]
    last_updated: Option<DateTime<Utc>>,
}

/// Cursor persisted as `{"count": n, "last_updated": ...}`
#[derive(Debug)]
pub struct FileCursorStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileCursorStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    async fn read(&self) -> Result<LedgerCursor> {
        match read_optional(&self.path).await? {
            Some(content) => {
                let record: CursorRecord = serde_json::from_str(&content)?;
                Ok(LedgerCursor(record.count))
            }
            None => Ok(LedgerCursor::default()),
        }
    }
}

#[async_trait]
impl CursorStore for FileCursorStore {
    async fn load(&self) -> Result<LedgerCursor> {
        let _guard = self.lock.lock().await;
        self.read().await
    }

    async fn store(&self, cursor: LedgerCursor) -> Result<()> {
        let _guard = self.lock.lock().await;
        let previous = self.read().await?;
        validate_cursor_transition(previous, cursor)?;

        let record = CursorRecord {
            count: cursor.position(),
            last_updated: Some(Utc::now()),
        };
        write_atomic(&self.path, &serde_json::to_vec_pretty(&record)?).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Feedback, FeedbackEvent, OceanVector, Preference, PreferencePair};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_profile_round_trips_through_file() {
        let dir = TempDir::new().unwrap();
        let store = FileProfileStore::new(dir.path().join("nested").join("profile.json"));

        assert_eq!(store.get().await.unwrap(), UserProfile::default());

        let mut profile = UserProfile::default();
        profile.feedback_count = 1;
        profile.current.agreeableness = 0.575;
        profile.last_learning_rate = Some(0.25);
        profile.last_updated = Some(Utc::now());
        store.set(profile.clone()).await.unwrap();

        let reopened = FileProfileStore::new(store.path().to_path_buf());
        assert_eq!(reopened.get().await.unwrap(), profile);

        let raw = std::fs::read_to_string(store.path()).unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json["agreeableness"], 0.575);
        assert_eq!(json["feedback_count"], 1);
    }

    #[tokio::test]
    async fn test_profile_file_rejects_out_of_range() {
        let dir = TempDir::new().unwrap();
        let store = FileProfileStore::new(dir.path().join("profile.json"));

        let mut profile = UserProfile::default();
        profile.current.openness = 1.5;
        assert!(store.set(profile).await.is_err());
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn test_jsonl_log_appends_and_reads() {
        let dir = TempDir::new().unwrap();
        let log: JsonlLog<FeedbackEvent> = JsonlLog::new(dir.path().join("feedback.jsonl"));

        for (i, feedback) in [Feedback::Positive, Feedback::Negative, Feedback::Positive]
            .into_iter()
            .enumerate()
        {
            let event = FeedbackEvent::new(
                format!("prompt {}", i),
                format!("response {}", i),
                OceanVector::balanced(),
                feedback,
            )
            .unwrap();
            assert_eq!(log.append(event).await.unwrap(), i as u64);
        }

        assert_eq!(log.len().await.unwrap(), 3);
        let tail = log.tail_since(LedgerCursor(2)).await.unwrap();
        assert_eq!(tail.len(), 1);
        assert_eq!(tail[0].0, 2);
        assert_eq!(tail[0].1.prompt, "prompt 2");

        let raw = std::fs::read_to_string(log.path()).unwrap();
        assert_eq!(raw.lines().count(), 3);
        assert!(raw.contains("\"feedback\":\"negative\""));
    }

    #[tokio::test]
    async fn test_jsonl_log_reports_corrupt_line() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pairs.jsonl");
        std::fs::write(&path, "\n{not json}\n").unwrap();

        let log: JsonlLog<PreferencePair> = JsonlLog::new(&path);
        let err = log.len().await.unwrap_err();
        assert!(matches!(err, MotivateError::Storage(ref msg) if msg.contains(":2:")));
    }

    #[tokio::test]
    async fn test_jsonl_log_skips_blank_lines() {
        let dir = TempDir::new().unwrap();
        let log: JsonlLog<PreferencePair> = JsonlLog::new(dir.path().join("pairs.jsonl"));
        let pair = PreferencePair::manual(
            "warm",
            "blunt",
            OceanVector::balanced(),
            OceanVector::balanced(),
            Preference::A,
        )
        .unwrap();
        log.append(pair.clone()).await.unwrap();

        let mut raw = std::fs::read_to_string(log.path()).unwrap();
        raw.push('\n');
        std::fs::write(log.path(), raw).unwrap();

        assert_eq!(log.read_all().await.unwrap(), vec![pair]);
    }

    fn event(prompt: &str) -> FeedbackEvent {
        FeedbackEvent::new(prompt, "response", OceanVector::balanced(), Feedback::Positive)
            .unwrap()
    }

    #[tokio::test]
    async fn test_jsonl_log_rejects_out_of_range_record() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pairs.jsonl");
        let pair = PreferencePair::manual(
            "warm",
            "blunt",
            OceanVector::balanced(),
            OceanVector::balanced(),
            Preference::A,
        )
        .unwrap();
        let mut json = serde_json::to_value(&pair).unwrap();
        json["profile_a"]["openness"] = serde_json::json!(7.0);
        std::fs::write(&path, format!("{}\n", json)).unwrap();

        let log: JsonlLog<PreferencePair> = JsonlLog::new(&path);
        let err = log.read_all().await.unwrap_err();
        assert!(matches!(err, MotivateError::ValidationError(ref msg) if msg.contains(":1:")));
        assert!(log.append(pair).await.is_err());
    }

    #[tokio::test]
    async fn test_jsonl_log_recovers_from_torn_tail() {
        let dir = TempDir::new().unwrap();
        let log: JsonlLog<FeedbackEvent> = JsonlLog::new(dir.path().join("feedback.jsonl"));
        log.append(event("one")).await.unwrap();
        log.append(event("two")).await.unwrap();

        let mut raw = std::fs::read_to_string(log.path()).unwrap();
        raw.push_str("{\"prompt\":\"thr");
        std::fs::write(log.path(), raw).unwrap();

        assert_eq!(log.len().await.unwrap(), 2);
        assert_eq!(log.tail_since(LedgerCursor(2)).await.unwrap().len(), 0);

        assert_eq!(log.append(event("three")).await.unwrap(), 2);
        let prompts: Vec<String> = log
            .read_all()
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.prompt)
            .collect();
        assert_eq!(prompts, vec!["one", "two", "three"]);

        let raw = std::fs::read_to_string(log.path()).unwrap();
        assert_eq!(raw.lines().count(), 3);
        assert!(!raw.contains("\"thr"));
    }

    #[tokio::test]
    async fn test_jsonl_log_torn_line_in_middle_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("feedback.jsonl");
        let good = serde_json::to_string(&event("ok")).unwrap();
        std::fs::write(&path, format!("{}\n{{\"prompt\":\"thr\n{}\n", good, good)).unwrap();

        let log: JsonlLog<FeedbackEvent> = JsonlLog::new(&path);
        let err = log.len().await.unwrap_err();
        assert!(matches!(err, MotivateError::Storage(ref msg) if msg.contains(":2:")));
    }

    #[tokio::test]
    async fn test_jsonl_log_appends_after_unterminated_record() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("feedback.jsonl");
        std::fs::write(&path, serde_json::to_string(&event("one")).unwrap()).unwrap();

        let log: JsonlLog<FeedbackEvent> = JsonlLog::new(&path);
        assert_eq!(log.len().await.unwrap(), 1);
        assert_eq!(log.append(event("two")).await.unwrap(), 1);
        assert_eq!(log.len().await.unwrap(), 2);
        assert_eq!(std::fs::read_to_string(&path).unwrap().lines().count(), 2);
    }

    #[tokio::test]
    async fn test_append_all_writes_nothing_on_invalid_record() {
        let dir = TempDir::new().unwrap();
        let log: JsonlLog<FeedbackEvent> = JsonlLog::new(dir.path().join("feedback.jsonl"));
        log.append(event("seed")).await.unwrap();

        let mut bad = event("bad");
        bad.ocean_profile.neuroticism = -0.2;
        let err = log
            .append_all(vec![event("a"), bad, event("b")])
            .await
            .unwrap_err();
        assert!(matches!(err, MotivateError::ValidationError(_)));
        assert_eq!(log.len().await.unwrap(), 1);

        assert_eq!(log.append_all(vec![event("a"), event("b")]).await.unwrap(), 1);
        assert_eq!(log.len().await.unwrap(), 3);
        assert_eq!(log.append_all(Vec::new()).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_cursor_file_format() {
        let dir = TempDir::new().unwrap();
        let store = FileCursorStore::new(dir.path().join("cursor.json"));
        assert_eq!(store.load().await.unwrap(), LedgerCursor(0));

        store.store(LedgerCursor(3)).await.unwrap();
        assert_eq!(store.load().await.unwrap(), LedgerCursor(3));
        assert!(store.store(LedgerCursor(1)).await.is_err());

        let raw = std::fs::read_to_string(dir.path().join("cursor.json")).unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json["count"], 3);
        assert!(json["last_updated"].is_string());
    }
}
