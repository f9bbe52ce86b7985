//! Storage abstraction layer for the tracker.
//!
//! The pipeline stages never talk to each other directly; they only share
//! three stores. Each store is a narrow trait so the JSON files used today
//! can be swapped for an embedded or networked store without touching the
//! discovery, collection or presentation logic.

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::BTreeSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::config::TrackerConfig;
use crate::error::{TrackerError, TrackerResult};
use crate::types::{Cursor, HolderHistory, MintId, Snapshot};

/// Bookmark of the newest processed feed event. Written only by discovery.
#[async_trait]
pub trait CursorStore: Send + Sync {
    /// Returns the empty string when nothing has been processed yet.
    async fn load_cursor(&self) -> TrackerResult<Cursor>;

    async fn save_cursor(&self, cursor: &str) -> TrackerResult<()>;
}

/// Deduplicated, ordered set of known mints. Written only by discovery.
#[async_trait]
pub trait MintRegistryStore: Send + Sync {
    async fn load_registry(&self) -> TrackerResult<Vec<MintId>>;

    /// Replaces the whole registry.
    async fn save_registry(&self, mints: &[MintId]) -> TrackerResult<()>;
}

/// Per-mint snapshot history plus the set of mints frozen by the retention
/// policy. Written only by the collector, read by the dashboard.
#[async_trait]
pub trait HolderHistoryStore: Send + Sync {
    async fn load_history(&self) -> TrackerResult<HolderHistory>;

    /// Replaces the whole history document.
    async fn save_history(&self, history: &HolderHistory) -> TrackerResult<()>;

    /// Appends one snapshot to a mint's sequence.
    async fn append_snapshot(&self, mint: &str, snapshot: Snapshot) -> TrackerResult<()> {
        let mut history = self.load_history().await?;
        history.entry(mint.to_string()).or_default().push(snapshot);
        self.save_history(&history).await
    }

    async fn load_inactive(&self) -> TrackerResult<BTreeSet<MintId>>;

    async fn save_inactive(&self, inactive: &BTreeSet<MintId>) -> TrackerResult<()>;
}

/// JSON-file implementation of all three stores.
///
/// Every write goes to a sibling temp file that is then renamed over the
/// target, so a concurrent reader sees either the old or the new document.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    registry_path: PathBuf,
    history_path: PathBuf,
    cursor_path: PathBuf,
    inactive_path: PathBuf,
}

impl JsonFileStore {
    pub fn new(
        registry_path: impl Into<PathBuf>,
        history_path: impl Into<PathBuf>,
        cursor_path: impl Into<PathBuf>,
        inactive_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            registry_path: registry_path.into(),
            history_path: history_path.into(),
            cursor_path: cursor_path.into(),
            inactive_path: inactive_path.into(),
        }
    }

    /// Build a store rooted at the configured data directory.
    pub fn from_config(config: &TrackerConfig) -> Self {
        Self::new(
            config.registry_path(),
            config.history_path(),
            config.cursor_path(),
            config.inactive_path(),
        )
    }

    /// Store with the default file names inside `dir`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let mut config = TrackerConfig::default();
        config.storage.data_dir = dir.as_ref().to_path_buf();
        Self::from_config(&config)
    }

    pub fn history_path(&self) -> &Path {
        &self.history_path
    }
}

/// Downgrade a malformed store document to the empty default.
///
/// I/O failures still propagate: a writer that cannot read its own store must
/// not replace it with an empty document.
pub fn recover_malformed<T: Default>(result: TrackerResult<T>, store: &str) -> TrackerResult<T> {
    match result {
        Err(e @ TrackerError::Parse { .. }) => {
            warn!("Malformed {} store, starting from empty: {}", store, e);
            Ok(T::default())
        }
        other => other,
    }
}

/// Read a file, mapping "does not exist" to `None`.
async fn read_optional(path: &Path) -> TrackerResult<Option<String>> {
    match fs::read_to_string(path).await {
        Ok(contents) => Ok(Some(contents)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(source) => Err(TrackerError::StoreRead {
            path: path.to_path_buf(),
            source,
        }),
    }
}

async fn read_json<T: DeserializeOwned + Default>(path: &Path) -> TrackerResult<T> {
    match read_optional(path).await? {
        Some(contents) if !contents.trim().is_empty() => serde_json::from_str(&contents)
            .map_err(|e| TrackerError::parse(path.display().to_string(), e)),
        _ => Ok(T::default()),
    }
}

async fn write_atomic(path: &Path, contents: &[u8]) -> TrackerResult<()> {
    let write_err = |source| TrackerError::StoreWrite {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    fs::write(&tmp, contents).await.map_err(write_err)?;
    fs::rename(&tmp, path).await.map_err(write_err)?;
    debug!("Wrote {} bytes to {}", contents.len(), path.display());
    Ok(())
}

async fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> TrackerResult<()> {
    let data = serde_json::to_vec_pretty(value)
        .map_err(|e| TrackerError::parse(path.display().to_string(), e))?;
    write_atomic(path, &data).await
}

#[async_trait]
impl CursorStore for JsonFileStore {
    async fn load_cursor(&self) -> TrackerResult<Cursor> {
        Ok(read_optional(&self.cursor_path)
            .await?
            .map(|s| s.trim().to_string())
            .unwrap_or_default())
    }

    async fn save_cursor(&self, cursor: &str) -> TrackerResult<()> {
        write_atomic(&self.cursor_path, cursor.as_bytes()).await
    }
}

#[async_trait]
impl MintRegistryStore for JsonFileStore {
    async fn load_registry(&self) -> TrackerResult<Vec<MintId>> {
        read_json(&self.registry_path).await
    }

    async fn save_registry(&self, mints: &[MintId]) -> TrackerResult<()> {
        write_json(&self.registry_path, mints).await
    }
}

#[async_trait]
impl HolderHistoryStore for JsonFileStore {
    async fn load_history(&self) -> TrackerResult<HolderHistory> {
        read_json(&self.history_path).await
    }

    async fn save_history(&self, history: &HolderHistory) -> TrackerResult<()> {
        write_json(&self.history_path, history).await
    }

    async fn load_inactive(&self) -> TrackerResult<BTreeSet<MintId>> {
        read_json(&self.inactive_path).await
    }

    async fn save_inactive(&self, inactive: &BTreeSet<MintId>) -> TrackerResult<()> {
        write_json(&self.inactive_path, inactive).await
    }
}

/// In-memory stores, used by tests and for dry runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    cursor: RwLock<Cursor>,
    registry: RwLock<Vec<MintId>>,
    history: RwLock<HolderHistory>,
    inactive: RwLock<BTreeSet<MintId>>,
    fail_writes: AtomicBool,
    fail_reads: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_registry(mints: Vec<MintId>) -> Self {
        Self {
            registry: RwLock::new(mints),
            ..Self::default()
        }
    }

    /// Make every subsequent write fail with `StoreWrite`.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent read fail with `StoreRead`.
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    fn check_read(&self) -> TrackerResult<()> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(TrackerError::StoreRead {
                path: PathBuf::from("memory"),
                source: std::io::Error::new(ErrorKind::Other, "simulated read failure"),
            });
        }
        Ok(())
    }

    fn check_write(&self) -> TrackerResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(TrackerError::StoreWrite {
                path: PathBuf::from("memory"),
                source: std::io::Error::new(ErrorKind::Other, "simulated write failure"),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl CursorStore for MemoryStore {
    async fn load_cursor(&self) -> TrackerResult<Cursor> {
        self.check_read()?;
        Ok(self.cursor.read().await.clone())
    }

    async fn save_cursor(&self, cursor: &str) -> TrackerResult<()> {
        self.check_write()?;
        *self.cursor.write().await = cursor.to_string();
        Ok(())
    }
}

#[async_trait]
impl MintRegistryStore for MemoryStore {
    async fn load_registry(&self) -> TrackerResult<Vec<MintId>> {
        self.check_read()?;
        Ok(self.registry.read().await.clone())
    }

    async fn save_registry(&self, mints: &[MintId]) -> TrackerResult<()> {
        self.check_write()?;
        *self.registry.write().await = mints.to_vec();
        Ok(())
    }
}

#[async_trait]
impl HolderHistoryStore for MemoryStore {
    async fn load_history(&self) -> TrackerResult<HolderHistory> {
        self.check_read()?;
        Ok(self.history.read().await.clone())
    }

    async fn save_history(&self, history: &HolderHistory) -> TrackerResult<()> {
        self.check_write()?;
        *self.history.write().await = history.clone();
        Ok(())
    }

    async fn load_inactive(&self) -> TrackerResult<BTreeSet<MintId>> {
        self.check_read()?;
        Ok(self.inactive.read().await.clone())
    }

    async fn save_inactive(&self, inactive: &BTreeSet<MintId>) -> TrackerResult<()> {
        self.check_write()?;
        *self.inactive.write().await = inactive.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_files_load_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::in_dir(dir.path());

        assert_eq!(store.load_cursor().await.unwrap(), "");
        assert!(store.load_registry().await.unwrap().is_empty());
        assert!(store.load_history().await.unwrap().is_empty());
        assert!(store.load_inactive().await.unwrap().is_empty());
    }

    #[test]
    fn test_recover_malformed_only_swallows_parse_errors() {
        let source = serde_json::from_str::<Vec<String>>("[").unwrap_err();
        let parsed: TrackerResult<Vec<String>> = Err(TrackerError::parse("registry", source));
        assert!(recover_malformed(parsed, "registry").unwrap().is_empty());

        let io: TrackerResult<Vec<String>> = Err(TrackerError::StoreRead {
            path: PathBuf::from("x"),
            source: std::io::Error::new(ErrorKind::PermissionDenied, "denied"),
        });
        assert!(recover_malformed(io, "registry").is_err());
    }

    #[tokio::test]
    async fn test_malformed_history_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::in_dir(dir.path());
        std::fs::write(store.history_path(), "{\"mint\": [").unwrap();

        let err = store.load_history().await.unwrap_err();
        assert!(matches!(err, TrackerError::Parse { .. }));
    }

    #[tokio::test]
    async fn test_write_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::in_dir(dir.path());

        store.save_cursor("event-1").await.unwrap();

        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["last_processed_id.txt".to_string()]);
        assert_eq!(store.load_cursor().await.unwrap(), "event-1");
    }

    #[tokio::test]
    async fn test_creates_missing_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::in_dir(dir.path().join("nested/data"));

        store.save_registry(&["aPump".to_string()]).await.unwrap();
        assert_eq!(store.load_registry().await.unwrap(), vec!["aPump".to_string()]);
    }

    #[tokio::test]
    async fn test_append_snapshot_default_method() {
        let store = MemoryStore::new();
        store.append_snapshot("aPump", Snapshot::new(1_000, 1)).await.unwrap();
        store.append_snapshot("aPump", Snapshot::new(2_000, 4)).await.unwrap();

        let history = store.load_history().await.unwrap();
        assert_eq!(history["aPump"], vec![Snapshot::new(1_000, 1), Snapshot::new(2_000, 4)]);
    }

    #[tokio::test]
    async fn test_memory_store_failure_switches() {
        let store = MemoryStore::new();
        store.set_fail_writes(true);
        assert!(matches!(
            store.save_cursor("x").await,
            Err(TrackerError::StoreWrite { .. })
        ));

        store.set_fail_reads(true);
        assert!(matches!(
            store.load_history().await,
            Err(TrackerError::StoreRead { .. })
        ));
    }
}
