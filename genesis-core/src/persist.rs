//! World persistence.
//!
//! A world is stored as one JSON record under a fixed key. Saves are
//! fire-and-forget: the record is serialized immediately and written in a
//! background task, and a newer save always wins over an older one that
//! finishes late. Loading never fails; a missing, corrupt or foreign
//! record simply means there is nothing to resume.

use crate::concept::Concept;
use crate::session::{WorldProfile, WorldSession};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::fs;
use tokio::task::JoinHandle;

/// Key of the single world record.
pub const STORAGE_KEY: &str = "combobox_save";

/// Current record format version.
const SAVE_VERSION: u32 = 1;

/// Errors from persistence operations.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },

    #[error("Background save failed: {0}")]
    Task(String),
}

fn default_version() -> u32 {
    SAVE_VERSION
}

/// On-disk shape of a world.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedWorld {
    /// Format version; records written before versioning count as current.
    #[serde(default = "default_version")]
    pub version: u32,

    pub actor_name: String,

    pub world_name: String,

    #[serde(rename = "trait")]
    pub actor_trait: String,

    pub concepts: Vec<Concept>,

    /// When the record was written (RFC 3339).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<String>,
}

impl SavedWorld {
    pub fn new(session: &WorldSession) -> Self {
        Self {
            version: SAVE_VERSION,
            actor_name: session.profile.actor_name.clone(),
            world_name: session.profile.world_name.clone(),
            actor_trait: session.profile.actor_trait.clone(),
            concepts: session.concepts.clone(),
            saved_at: Some(chrono::Utc::now().to_rfc3339()),
        }
    }

    pub fn into_session(self) -> WorldSession {
        WorldSession {
            profile: WorldProfile::new(self.actor_name, self.actor_trait, self.world_name),
            concepts: self.concepts,
        }
    }

    /// Parse a record, rejecting unknown versions.
    pub fn from_json(content: &str) -> Result<Self, PersistError> {
        let saved: Self = serde_json::from_str(content)?;
        if saved.version != SAVE_VERSION {
            return Err(PersistError::VersionMismatch {
                expected: SAVE_VERSION,
                found: saved.version,
            });
        }
        Ok(saved)
    }
}

/// Durable key-value medium for world records.
#[async_trait]
pub trait SaveStorage: Send + Sync {
    async fn read(&self, key: &str) -> Result<Option<String>, PersistError>;

    async fn write(&self, key: &str, contents: String) -> Result<(), PersistError>;

    async fn remove(&self, key: &str) -> Result<(), PersistError>;
}

/// Stores each record as `{dir}/{key}.json`.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the record stored under `key`.
    pub fn record_path(&self, key: &str) -> PathBuf {
        let sanitized = key
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '_' { c } else { '_' })
            .collect::<String>();
        self.dir.join(format!("{sanitized}.json"))
    }
}

#[async_trait]
impl SaveStorage for FileStorage {
    async fn read(&self, key: &str) -> Result<Option<String>, PersistError> {
        match fs::read_to_string(self.record_path(key)).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, key: &str, contents: String) -> Result<(), PersistError> {
        fs::create_dir_all(&self.dir).await?;
        let path = self.record_path(key);
        // Write beside the record and rename so readers never see half a file.
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, contents).await?;
        fs::rename(&tmp, &path).await?;
        tracing::debug!(path = %path.display(), "world record written");
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), PersistError> {
        match fs::remove_file(self.record_path(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Process-local storage, for tests and throwaway worlds.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    records: std::sync::Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn records(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Raw contents stored under `key`.
    pub fn raw(&self, key: &str) -> Option<String> {
        self.records().get(key).cloned()
    }

    /// Overwrite a record with arbitrary contents.
    pub fn put_raw(&self, key: &str, contents: impl Into<String>) {
        self.records().insert(key.to_string(), contents.into());
    }
}

#[async_trait]
impl SaveStorage for MemoryStorage {
    async fn read(&self, key: &str) -> Result<Option<String>, PersistError> {
        Ok(self.raw(key))
    }

    async fn write(&self, key: &str, contents: String) -> Result<(), PersistError> {
        self.put_raw(key, contents);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), PersistError> {
        self.records().remove(key);
        Ok(())
    }
}

/// Handle to a background save. Dropping it does not cancel the write.
#[derive(Debug)]
pub struct SaveHandle {
    task: Option<JoinHandle<Result<(), PersistError>>>,
}

impl SaveHandle {
    /// Wait for the write to finish.
    pub async fn wait(self) -> Result<(), PersistError> {
        match self.task {
            Some(task) => task.await.map_err(|e| PersistError::Task(e.to_string()))?,
            None => Err(PersistError::Task("no async runtime available".to_string())),
        }
    }
}

/// Saves and loads the world record.
#[derive(Clone)]
pub struct PersistenceAdapter {
    storage: Arc<dyn SaveStorage>,
    key: String,
    /// Sequence number of the most recently issued write.
    issued: Arc<AtomicU64>,
    /// Sequence number of the most recent write that completed or was superseded.
    settled: Arc<tokio::sync::Mutex<u64>>,
    /// Held while a snapshot is taken and numbered, so sequence order is snapshot order.
    issuing: Arc<std::sync::Mutex<()>>,
}

impl PersistenceAdapter {
    pub fn new(storage: Arc<dyn SaveStorage>) -> Self {
        Self {
            storage,
            key: STORAGE_KEY.to_string(),
            issued: Arc::new(AtomicU64::new(0)),
            settled: Arc::new(tokio::sync::Mutex::new(0)),
            issuing: Arc::new(std::sync::Mutex::new(())),
        }
    }

    /// Store the record under a different key.
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Save in the background without waiting.
    ///
    /// The session is serialized before returning, so later mutations do
    /// not leak into this save.
    pub fn save(&self, session: &WorldSession) -> SaveHandle {
        self.save_with(|| session.clone())
    }

    /// Save a snapshot taken by `snapshot` in the background.
    ///
    /// The snapshot is taken and numbered atomically with respect to other
    /// saves, so when callers race the one that snapshotted last wins.
    pub fn save_with<F>(&self, snapshot: F) -> SaveHandle
    where
        F: FnOnce() -> WorldSession,
    {
        let _issuing = self
            .issuing
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let contents = match serde_json::to_string_pretty(&SavedWorld::new(&snapshot())) {
            Ok(contents) => contents,
            Err(e) => {
                tracing::warn!(error = %e, "failed to serialize world");
                return SaveHandle { task: None };
            }
        };

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("no async runtime, world not saved");
            return SaveHandle { task: None };
        };

        let seq = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        let storage = self.storage.clone();
        let settled = self.settled.clone();
        let key = self.key.clone();

        let task = runtime.spawn(async move {
            let mut settled = settled.lock().await;
            if *settled > seq {
                tracing::debug!(seq, "skipping superseded save");
                return Ok(());
            }
            let result = storage.write(&key, contents).await;
            *settled = seq;
            if let Err(ref e) = result {
                tracing::warn!(error = %e, "failed to save world");
            }
            result
        });

        SaveHandle { task: Some(task) }
    }

    /// Save and wait for the write to complete.
    pub async fn save_now(&self, session: &WorldSession) -> Result<(), PersistError> {
        self.save(session).wait().await
    }

    /// Wait until every save issued so far has settled.
    pub async fn flush(&self) {
        let target = self.issued.load(Ordering::SeqCst);
        loop {
            if *self.settled.lock().await >= target {
                return;
            }
            tokio::task::yield_now().await;
        }
    }

    /// Load the saved world, treating any problem as "nothing saved".
    pub async fn load(&self) -> Option<WorldSession> {
        match self.try_load().await {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!(key = %self.key, error = %e, "discarding unreadable save");
                None
            }
        }
    }

    /// Load the saved world, reporting why a record could not be read.
    pub async fn try_load(&self) -> Result<Option<WorldSession>, PersistError> {
        let Some(content) = self.storage.read(&self.key).await? else {
            return Ok(None);
        };
        Ok(Some(SavedWorld::from_json(&content)?.into_session()))
    }

    /// Delete the record. Saves issued before this call will not recreate it.
    pub async fn clear(&self) -> Result<(), PersistError> {
        let seq = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        let mut settled = self.settled.lock().await;
        let result = self.storage.remove(&self.key).await;
        *settled = seq;
        result
    }
}
