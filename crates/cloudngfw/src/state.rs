//! Local resource records
//!
//! Every composite id the orchestration layer hands out maps to a
//! [`ResourceRecord`] holding what was last observed about it. A
//! [`RecordStore`] keeps them in `.cloudngfw/records.json`; workflows run
//! against a [`StoreSession`], which holds the store lock for one step and
//! writes the records back on commit.

use crate::error::{CloudError, Result};
use crate::id::ResourceKind;
use crate::tags::TagBag;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::io::ErrorKind;
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

const STATE_VERSION: u32 = 1;
const STORE_DIR: &str = ".cloudngfw";
const RECORDS_FILE: &str = "records.json";
const PREVIOUS_FILE: &str = "records.prev.json";
const SCRATCH_FILE: &str = "records.json.tmp";
const LOCK_FILE: &str = "records.lock";
const LOCK_TTL_MINUTES: i64 = 60;

/// All records, keyed by composite id
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalState {
    pub version: u32,
    pub updated_at: DateTime<Utc>,
    pub resources: HashMap<String, ResourceRecord>,
}

impl Default for GlobalState {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            updated_at: Utc::now(),
            resources: HashMap::new(),
        }
    }
}

impl GlobalState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record under its own id
    pub fn set_record(&mut self, record: ResourceRecord) {
        self.resources.insert(record.id.clone(), record);
        self.updated_at = Utc::now();
    }

    pub fn remove_record(&mut self, id: &str) -> Option<ResourceRecord> {
        let result = self.resources.remove(id);
        if result.is_some() {
            self.updated_at = Utc::now();
        }
        result
    }

    pub fn get_record(&self, id: &str) -> Option<&ResourceRecord> {
        self.resources.get(id)
    }

    pub fn get_record_mut(&mut self, id: &str) -> Option<&mut ResourceRecord> {
        self.resources.get_mut(id)
    }

    /// Records of one kind, ordered by id
    pub fn records_of_kind(&self, kind: ResourceKind) -> Vec<&ResourceRecord> {
        let mut records: Vec<_> = self
            .resources
            .values()
            .filter(|r| r.kind == kind)
            .collect();
        records.sort_by(|a, b| a.id.cmp(&b.id));
        records
    }
}

/// What is known locally about one managed resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceRecord {
    pub kind: ResourceKind,

    /// Composite id; never changes after creation
    pub id: String,

    #[serde(default)]
    pub tags: TagBag,

    /// Last observed remote status
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    /// Remote attributes worth keeping (endpoint ids, stack id, ...)
    #[serde(default)]
    pub attributes: HashMap<String, serde_json::Value>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ResourceRecord {
    pub fn new(kind: ResourceKind, id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            kind,
            id: id.into(),
            tags: TagBag::new(),
            status: None,
            attributes: HashMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_tags(mut self, tags: TagBag) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_status(mut self, status: impl ToString) -> Self {
        self.status = Some(status.to_string());
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    pub fn set_status(&mut self, status: impl ToString) {
        self.status = Some(status.to_string());
        self.updated_at = Utc::now();
    }

    pub fn set_tags(&mut self, tags: TagBag) {
        self.tags = tags;
        self.updated_at = Utc::now();
    }

    pub fn set_attribute(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.attributes.insert(key.into(), value);
        self.updated_at = Utc::now();
    }

    pub fn get_attribute<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.attributes
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}

/// Where the records of one project live on disk
#[derive(Debug, Clone)]
pub struct RecordStore {
    dir: PathBuf,
}

impl RecordStore {
    pub fn new(project_root: impl AsRef<Path>) -> Self {
        Self {
            dir: project_root.as_ref().join(STORE_DIR),
        }
    }

    pub fn records_path(&self) -> PathBuf {
        self.dir.join(RECORDS_FILE)
    }

    fn previous_path(&self) -> PathBuf {
        self.dir.join(PREVIOUS_FILE)
    }

    fn lock_path(&self) -> PathBuf {
        self.dir.join(LOCK_FILE)
    }

    /// Read the records without locking. No file means no records.
    pub async fn load(&self) -> Result<GlobalState> {
        let content = match fs::read_to_string(self.records_path()).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(GlobalState::new()),
            Err(e) => return Err(e.into()),
        };

        let state: GlobalState = serde_json::from_str(&content)?;
        if state.version > STATE_VERSION {
            return Err(CloudError::StateError(format!(
                "records written by format {}, this build reads up to {}",
                state.version, STATE_VERSION
            )));
        }

        debug!(records = state.resources.len(), "Loaded records");
        Ok(state)
    }

    /// Lock the store for one workflow step and load the records
    pub async fn begin(&self, operation: &str) -> Result<StoreSession<'_>> {
        let lock = self.lock(operation).await?;
        let state = self.load().await?;
        Ok(StoreSession {
            store: self,
            state,
            lock,
        })
    }

    /// Write through a scratch file so a crash never leaves a torn file.
    /// The replaced file is kept as `records.prev.json`.
    async fn persist(&self, state: &GlobalState) -> Result<()> {
        fs::create_dir_all(&self.dir).await?;

        let scratch = self.dir.join(SCRATCH_FILE);
        fs::write(&scratch, serde_json::to_vec_pretty(state)?).await?;

        let current = self.records_path();
        if fs::try_exists(&current).await? {
            fs::copy(&current, self.previous_path()).await?;
        }
        fs::rename(&scratch, &current).await?;

        debug!(records = state.resources.len(), "Saved records");
        Ok(())
    }

    async fn lock(&self, operation: &str) -> Result<StoreLock> {
        fs::create_dir_all(&self.dir).await?;
        let path = self.lock_path();
        let holder = serde_json::to_vec_pretty(&LockHolder::current(operation))?;

        // a stale lock is cleared once, then creation is retried
        for _ in 0..2 {
            match fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(mut file) => {
                    file.write_all(&holder).await?;
                    file.flush().await?;
                    debug!(operation = %operation, "Locked record store");
                    return Ok(StoreLock {
                        path,
                        released: false,
                    });
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    let existing = match fs::read_to_string(&path).await {
                        Ok(content) => serde_json::from_str::<LockHolder>(&content)?,
                        Err(e) if e.kind() == ErrorKind::NotFound => continue,
                        Err(e) => return Err(e.into()),
                    };
                    if !existing.is_stale() {
                        return Err(CloudError::LockError(format!(
                            "record store is locked by {}",
                            existing
                        )));
                    }
                    warn!(holder = %existing, "Clearing stale record store lock");
                    match fs::remove_file(&path).await {
                        Ok(()) => {}
                        Err(e) if e.kind() == ErrorKind::NotFound => {}
                        Err(e) => return Err(e.into()),
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(CloudError::LockError(
            "record store lock changed hands while clearing a stale lock".to_string(),
        ))
    }
}

/// Contents of the lock file
#[derive(Debug, Serialize, Deserialize)]
struct LockHolder {
    host: String,
    pid: u32,
    operation: String,
    since: DateTime<Utc>,
}

impl LockHolder {
    fn current(operation: &str) -> Self {
        Self {
            host: std::env::var("HOSTNAME")
                .or_else(|_| std::env::var("HOST"))
                .unwrap_or_else(|_| "unknown".to_string()),
            pid: std::process::id(),
            operation: operation.to_string(),
            since: Utc::now(),
        }
    }

    fn is_stale(&self) -> bool {
        Utc::now().signed_duration_since(self.since) >= chrono::Duration::minutes(LOCK_TTL_MINUTES)
    }
}

impl fmt::Display for LockHolder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} on {} (pid {}) since {}",
            self.operation, self.host, self.pid, self.since
        )
    }
}

/// Exclusive hold on a [`RecordStore`]; the lock file goes away on release or drop
#[derive(Debug)]
struct StoreLock {
    path: PathBuf,
    released: bool,
}

impl StoreLock {
    async fn release(mut self) -> Result<()> {
        self.released = true;
        match fs::remove_file(&self.path).await {
            Ok(()) => {
                debug!("Unlocked record store");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        if !self.released {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

/// Records loaded under the store lock.
///
/// Derefs to [`GlobalState`] so it can be handed straight to a workflow.
/// Dropping a session releases the lock and discards the changes.
#[derive(Debug)]
pub struct StoreSession<'a> {
    store: &'a RecordStore,
    state: GlobalState,
    lock: StoreLock,
}

impl StoreSession<'_> {
    /// Save the records and release the lock
    pub async fn commit(self) -> Result<()> {
        self.store.persist(&self.state).await?;
        self.lock.release().await
    }

    /// Release the lock without saving
    pub async fn abandon(self) -> Result<()> {
        self.lock.release().await
    }
}

impl Deref for StoreSession<'_> {
    type Target = GlobalState;

    fn deref(&self) -> &GlobalState {
        &self.state
    }
}

impl DerefMut for StoreSession<'_> {
    fn deref_mut(&mut self) -> &mut GlobalState {
        &mut self.state
    }
}
