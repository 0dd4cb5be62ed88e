//! Durable local store.
//!
//! [`LocalStore`] wraps the engine [`Database`] behind an async lock and
//! persists a snapshot through a [`StorageBackend`] after every write. A
//! write is staged on a copy of the database and only becomes visible once
//! the snapshot is saved, so each write call is all-or-nothing.
//!
//! If the store cannot be opened the handle is still returned, but in a
//! degraded state: reads return nothing and writes fail with
//! [`SyncError::StorageUnavailable`]. Opening is never retried.

use crate::error::{Result, SyncError};
use async_trait::async_trait;
use serde_json::Value;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use tablesync_engine::{
    Database, DatabaseSnapshot, IndexQuery, Key, PendingReview, ReviewSubmission, OFFLINE_REVIEWS,
};
use tokio::sync::Mutex;

/// Raw snapshot persistence.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Read the stored snapshot, `None` if nothing was stored yet.
    async fn load(&self) -> io::Result<Option<String>>;

    /// Replace the stored snapshot.
    async fn save(&self, contents: &str) -> io::Result<()>;
}

/// Snapshot kept in a single JSON file.
#[derive(Debug, Clone)]
pub struct FileBackend {
    path: PathBuf,
}

impl FileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        PathBuf::from(tmp)
    }
}

#[async_trait]
impl StorageBackend for FileBackend {
    async fn load(&self) -> io::Result<Option<String>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn save(&self, contents: &str) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        // Write then rename so a crash never leaves a half-written snapshot
        let tmp = self.temp_path();
        tokio::fs::write(&tmp, contents).await?;
        tokio::fs::rename(&tmp, &self.path).await
    }
}

/// Snapshot kept in memory. Clones share the same contents.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    contents: Arc<StdMutex<Option<String>>>,
    fail_loads: Arc<AtomicBool>,
    fail_saves: Arc<AtomicBool>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with an existing snapshot.
    pub fn with_contents(contents: impl Into<String>) -> Self {
        let backend = Self::default();
        *backend.lock() = Some(contents.into());
        backend
    }

    /// Make subsequent loads fail, as if storage were disabled.
    pub fn fail_loads(&self, fail: bool) {
        self.fail_loads.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent saves fail, as if the quota were exhausted.
    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// Currently stored snapshot.
    pub fn contents(&self) -> Option<String> {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<String>> {
        self.contents.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn load(&self) -> io::Result<Option<String>> {
        if self.fail_loads.load(Ordering::SeqCst) {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "storage disabled",
            ));
        }
        Ok(self.contents())
    }

    async fn save(&self, contents: &str) -> io::Result<()> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::Other, "quota exceeded"));
        }
        *self.lock() = Some(contents.to_string());
        Ok(())
    }
}

struct Inner {
    db: Option<Mutex<Database>>,
    backend: Box<dyn StorageBackend>,
    unavailable_reason: Option<String>,
}

/// Handle to the local database. Cheap to clone.
#[derive(Clone)]
pub struct LocalStore {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for LocalStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalStore")
            .field("available", &self.is_available())
            .finish()
    }
}

impl LocalStore {
    /// Open the store, running schema migrations for older snapshots.
    ///
    /// Never fails: a backend that cannot be read, a corrupt snapshot or an
    /// unsupported version all yield a degraded handle.
    pub async fn open(backend: impl StorageBackend + 'static) -> Self {
        let backend: Box<dyn StorageBackend> = Box::new(backend);

        match Self::load(backend.as_ref()).await {
            Ok(db) => Self {
                inner: Arc::new(Inner {
                    db: Some(Mutex::new(db)),
                    backend,
                    unavailable_reason: None,
                }),
            },
            Err(e) => {
                tracing::warn!("Local store unavailable, continuing network-only: {}", e);
                Self::degraded(backend, e.to_string())
            }
        }
    }

    /// Open a store persisted to a JSON file.
    pub async fn open_file(path: impl Into<PathBuf>) -> Self {
        Self::open(FileBackend::new(path)).await
    }

    /// Open an empty store that lives only in memory.
    pub async fn in_memory() -> Self {
        Self::open(MemoryBackend::new()).await
    }

    /// A store that could not be opened.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::degraded(Box::new(MemoryBackend::new()), reason.into())
    }

    fn degraded(backend: Box<dyn StorageBackend>, reason: String) -> Self {
        Self {
            inner: Arc::new(Inner {
                db: None,
                backend,
                unavailable_reason: Some(reason),
            }),
        }
    }

    async fn load(backend: &dyn StorageBackend) -> Result<Database> {
        let snapshot = backend
            .load()
            .await?
            .map(|json| DatabaseSnapshot::from_json(&json))
            .transpose()?;

        let (db, report) = Database::open(snapshot)?;

        if report.upgraded() {
            for version in &report.applied {
                if let Some(step) = tablesync_engine::MIGRATIONS
                    .iter()
                    .find(|m| m.version == *version)
                {
                    tracing::info!(version, "Upgrading local store: {}", step.description);
                }
            }
            // The upgraded layout must be durable before the store is used
            backend.save(&db.export_state().to_json()?).await?;
        }

        tracing::debug!(version = db.version(), "Local store opened");
        Ok(db)
    }

    /// Whether the store opened successfully.
    pub fn is_available(&self) -> bool {
        self.inner.db.is_some()
    }

    fn unavailable_error(&self) -> SyncError {
        SyncError::StorageUnavailable(
            self.inner
                .unavailable_reason
                .clone()
                .unwrap_or_else(|| "store not opened".to_string()),
        )
    }

    async fn read<T: Default>(&self, op: impl FnOnce(&Database) -> Result<T>) -> Result<T> {
        match &self.inner.db {
            Some(db) => op(&*db.lock().await),
            None => Ok(T::default()),
        }
    }

    async fn write<T>(&self, op: impl FnOnce(&mut Database) -> Result<T>) -> Result<T> {
        let db = self
            .inner
            .db
            .as_ref()
            .ok_or_else(|| self.unavailable_error())?;

        let mut db = db.lock().await;
        let mut staged = db.clone();
        let output = op(&mut staged)?;

        let json = staged.export_state().to_json()?;
        self.inner.backend.save(&json).await?;
        *db = staged;

        Ok(output)
    }

    /// Current schema version, `None` when unavailable.
    pub async fn version(&self) -> Option<u32> {
        match &self.inner.db {
            Some(db) => Some(db.lock().await.version()),
            None => None,
        }
    }

    /// All records in a collection, or only those matching an index query.
    pub async fn get_all(&self, collection: &str, query: Option<&IndexQuery>) -> Result<Vec<Value>> {
        self.read(|db| {
            Ok(db
                .get_all(collection, query)?
                .into_iter()
                .cloned()
                .collect())
        })
        .await
    }

    /// One record by primary key.
    pub async fn get(&self, collection: &str, key: &Key) -> Result<Option<Value>> {
        self.read(|db| Ok(db.get(collection, key)?.cloned())).await
    }

    /// First record matching an index value.
    pub async fn get_by_index(
        &self,
        collection: &str,
        index: &str,
        key: &Key,
    ) -> Result<Option<Value>> {
        self.read(|db| Ok(db.get_by_index(collection, index, key)?.cloned()))
            .await
    }

    /// Number of records in a collection.
    pub async fn count(&self, collection: &str) -> Result<usize> {
        self.read(|db| Ok(db.count(collection)?)).await
    }

    /// Insert or replace a record.
    pub async fn put(&self, collection: &str, record: Value) -> Result<Key> {
        self.write(|db| Ok(db.put(collection, record)?)).await
    }

    /// Insert or replace several records in one write.
    pub async fn put_all(&self, collection: &str, records: Vec<Value>) -> Result<usize> {
        self.write(|db| {
            let count = records.len();
            for record in records {
                db.put(collection, record)?;
            }
            Ok(count)
        })
        .await
    }

    /// Insert a record whose key must be new.
    pub async fn add(&self, collection: &str, record: Value) -> Result<Key> {
        self.write(|db| Ok(db.add(collection, record)?)).await
    }

    /// Delete every record in a collection.
    pub async fn clear(&self, collection: &str) -> Result<usize> {
        self.write(|db| Ok(db.clear(collection)?)).await
    }

    /// Queue a review submission for later replay.
    ///
    /// The id is the current epoch-millisecond time, bumped past any queued id.
    pub async fn add_pending(&self, submission: &ReviewSubmission) -> Result<PendingReview> {
        let now = chrono::Utc::now().timestamp_millis();
        self.write(|db| {
            let pending = PendingReview {
                id: db.next_int_key(OFFLINE_REVIEWS, now)?,
                data: submission.clone(),
            };
            db.add(OFFLINE_REVIEWS, serde_json::to_value(&pending)?)?;
            Ok(pending)
        })
        .await
    }

    /// All queued submissions, oldest first.
    pub async fn pending(&self) -> Result<Vec<PendingReview>> {
        self.read(|db| decode_pending(db.get_all(OFFLINE_REVIEWS, None)?))
            .await
    }

    /// Remove and return every queued submission in one write.
    pub async fn take_pending(&self) -> Result<Vec<PendingReview>> {
        if !self.is_available() {
            return Ok(Vec::new());
        }
        self.write(|db| {
            let pending = decode_pending(db.get_all(OFFLINE_REVIEWS, None)?)?;
            db.clear(OFFLINE_REVIEWS)?;
            Ok(pending)
        })
        .await
    }
}

fn decode_pending(values: Vec<&Value>) -> Result<Vec<PendingReview>> {
    values
        .into_iter()
        .map(|v| serde_json::from_value::<PendingReview>(v.clone()).map_err(SyncError::from))
        .collect()
}
