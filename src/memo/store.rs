/// On-disk memoization store
///
/// Layout: one file per entry, `<store dir>/<hex key>.json`. Each file holds an
/// `EntryEnvelope` (format version, operation name, creation time and the
/// serialized value). Entries are written once via temp file + rename and are
/// never updated; the only removal path is clearing the whole store.
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

use super::key::{derive_key, CacheKey, CallArgs};
use crate::error::{Error, Result};
use crate::logging::{operations, status};

/// File extension of entry files
pub const ENTRY_EXTENSION: &str = "json";

const ENVELOPE_VERSION: u32 = 1;

/// Serialized form of one cache entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryEnvelope<T> {
    pub version: u32,
    pub operation: String,
    pub created_at: DateTime<Utc>,
    pub value: T,
}

/// Entry header as read by `list` (value left undecoded)
#[derive(Debug, Clone)]
pub struct EntryInfo {
    pub key: CacheKey,
    pub operation: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub size_bytes: u64,
}

#[derive(Deserialize)]
struct EnvelopeHeader {
    operation: String,
    created_at: DateTime<Utc>,
}

/// On-disk totals of a store
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub total_entries: usize,
    pub total_size_bytes: u64,
}

/// Hits and misses observed by this process
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub hits: u64,
    pub misses: u64,
    pub recovered: u64,
}

impl SessionStats {
    /// Activity since an earlier snapshot
    pub fn since(&self, earlier: &SessionStats) -> SessionStats {
        SessionStats {
            hits: self.hits - earlier.hits,
            misses: self.misses - earlier.misses,
            recovered: self.recovered - earlier.recovered,
        }
    }
}

/// Content-addressed store of operation results
#[derive(Debug)]
pub struct MemoStore {
    dir: PathBuf,
    hits: AtomicU64,
    misses: AtomicU64,
    recovered: AtomicU64,
}

impl MemoStore {
    /// Open a store, creating its directory if needed
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        ensure_store(&dir)?;

        Ok(Self {
            dir,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            recovered: AtomicU64::new(0),
        })
    }

    /// Open an existing store for reading only
    ///
    /// Nothing is created or written, so listing a cache never changes it.
    pub fn inspect(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        let meta = fs::metadata(&dir).map_err(|e| Error::io(&dir, e))?;
        if !meta.is_dir() {
            return Err(Error::NotADirectory(dir));
        }

        Ok(Self {
            dir,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            recovered: AtomicU64::new(0),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the entry file for a key
    pub fn entry_path(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(format!("{}.{}", key, ENTRY_EXTENSION))
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entry_path(key).is_file()
    }

    /// Return the memoized result of `operation(args)`, invoking it on a miss
    ///
    /// A failed invocation writes nothing, so the next call retries it.
    /// An entry that cannot be decoded is treated as a miss and replaced.
    pub fn get_or_compute<T, F>(&self, operation: &str, args: &CallArgs, invoke: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Result<T>,
    {
        let key = derive_key(operation, args);

        match self.read::<T>(&key) {
            Ok(Some(value)) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!(
                    operation = operations::GET,
                    status = status::HIT,
                    call = operation,
                    key = %key,
                    "cache hit"
                );
                return Ok(value);
            }
            Ok(None) => {}
            Err(Error::Serialization { key, source }) => {
                self.recovered.fetch_add(1, Ordering::Relaxed);
                warn!(
                    operation = operations::GET,
                    status = status::CORRUPT,
                    call = operation,
                    key = %key,
                    error = %source,
                    "unreadable cache entry, recomputing"
                );
            }
            Err(e) => return Err(e),
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        debug!(
            operation = operations::GET,
            status = status::MISS,
            call = operation,
            key = %key,
            "cache miss"
        );

        let value = invoke()?;
        self.write(&key, operation, &value)?;

        Ok(value)
    }

    /// Read and decode an entry
    ///
    /// `Ok(None)` when absent, `Error::Serialization` when present but undecodable.
    pub fn read<T: DeserializeOwned>(&self, key: &CacheKey) -> Result<Option<T>> {
        let path = self.entry_path(key);

        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::io(path, e)),
        };

        let envelope: EntryEnvelope<T> =
            serde_json::from_slice(&bytes).map_err(|source| Error::Serialization {
                key: key.to_string(),
                source,
            })?;

        Ok(Some(envelope.value))
    }

    /// Persist an entry atomically (temp file in the store, then rename)
    fn write<T: Serialize>(&self, key: &CacheKey, operation: &str, value: &T) -> Result<()> {
        let envelope = EntryEnvelope {
            version: ENVELOPE_VERSION,
            operation: operation.to_string(),
            created_at: Utc::now(),
            value,
        };

        let json = serde_json::to_vec_pretty(&envelope).map_err(|source| Error::Serialization {
            key: key.to_string(),
            source,
        })?;

        let path = self.entry_path(key);

        let mut temp = tempfile::Builder::new()
            .prefix(".tmp-")
            .tempfile_in(&self.dir)
            .map_err(|e| Error::io(&self.dir, e))?;
        temp.write_all(&json).map_err(|e| Error::io(temp.path(), e))?;
        temp.as_file()
            .sync_all()
            .map_err(|e| Error::io(temp.path(), e))?;
        temp.persist(&path).map_err(|e| Error::io(&path, e.error))?;

        debug!(
            operation = operations::PUT,
            status = status::SUCCESS,
            call = operation,
            key = %key,
            size_bytes = json.len(),
            "cache entry written"
        );

        Ok(())
    }

    /// List entries, sorted by key
    pub fn list(&self) -> Result<Vec<EntryInfo>> {
        let mut entries = Vec::new();

        for (key, path, size_bytes) in self.entry_files()? {
            // Only the header is decoded; unreadable entries are still listed
            let header = fs::read(&path)
                .ok()
                .and_then(|bytes| serde_json::from_slice::<EnvelopeHeader>(&bytes).ok());

            entries.push(EntryInfo {
                key,
                operation: header.as_ref().map(|h| h.operation.clone()),
                created_at: header.map(|h| h.created_at),
                size_bytes,
            });
        }

        entries.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(entries)
    }

    /// Count entries and their size on disk
    pub fn stats(&self) -> Result<StoreStats> {
        let files = self.entry_files()?;

        Ok(StoreStats {
            total_entries: files.len(),
            total_size_bytes: files.iter().map(|(_, _, size)| size).sum(),
        })
    }

    /// Hits, misses and corrupt-entry recoveries seen by this handle
    pub fn session_stats(&self) -> SessionStats {
        SessionStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            recovered: self.recovered.load(Ordering::Relaxed),
        }
    }

    /// Delete every entry in this store
    pub fn clear(&self) -> Result<usize> {
        clear_store(&self.dir)
    }

    fn entry_files(&self) -> Result<Vec<(CacheKey, PathBuf, u64)>> {
        let mut files = Vec::new();

        let read_dir = fs::read_dir(&self.dir).map_err(|e| Error::io(&self.dir, e))?;
        for entry in read_dir {
            let entry = entry.map_err(|e| Error::io(&self.dir, e))?;
            let path = entry.path();

            let Some(key) = entry_key(&path) else {
                continue;
            };

            let metadata = entry.metadata().map_err(|e| Error::io(&path, e))?;
            if metadata.is_file() {
                files.push((key, path, metadata.len()));
            }
        }

        Ok(files)
    }
}

/// Key of an entry file, `None` for anything else in the directory
fn entry_key(path: &Path) -> Option<CacheKey> {
    if path.extension()?.to_str()? != ENTRY_EXTENSION {
        return None;
    }
    CacheKey::parse(path.file_stem()?.to_str()?)
}

/// Create a store directory if absent
///
/// Idempotent. Fails if `path` is an existing non-directory or if the
/// directory is not writable.
pub fn ensure_store(path: &Path) -> Result<()> {
    if path.exists() && !path.is_dir() {
        return Err(Error::NotADirectory(path.to_path_buf()));
    }

    fs::create_dir_all(path).map_err(|e| Error::io(path, e))?;

    // Check writability; the temp file removes itself on drop
    tempfile::Builder::new()
        .prefix(".write-check-")
        .tempfile_in(path)
        .map_err(|e| Error::io(path, e))?;

    Ok(())
}

/// Delete all files directly inside a store directory
///
/// Subdirectories are left alone. A missing directory is not an error.
/// Returns the number of files removed.
pub fn clear_store(path: &Path) -> Result<usize> {
    if !path.exists() {
        return Ok(0);
    }
    if !path.is_dir() {
        return Err(Error::NotADirectory(path.to_path_buf()));
    }

    let mut removed = 0;
    for entry in fs::read_dir(path).map_err(|e| Error::io(path, e))? {
        let entry = entry.map_err(|e| Error::io(path, e))?;
        let file_type = entry.file_type().map_err(|e| Error::io(entry.path(), e))?;

        if file_type.is_dir() {
            continue;
        }

        fs::remove_file(entry.path()).map_err(|e| Error::io(entry.path(), e))?;
        removed += 1;
    }

    debug!(
        operation = operations::CLEAR,
        status = status::SUCCESS,
        path = %path.display(),
        entry_count = removed,
        "store cleared"
    );

    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use tempfile::TempDir;

    fn store(temp: &TempDir) -> MemoStore {
        MemoStore::open(temp.path().join("store")).unwrap()
    }

    #[test]
    fn test_ensure_store_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("a/b/c");

        ensure_store(&dir).unwrap();
        ensure_store(&dir).unwrap();

        assert!(dir.is_dir());
        // Write check file must not linger
        assert_eq!(fs::read_dir(&dir).unwrap().count(), 0);
    }

    #[test]
    fn test_ensure_store_rejects_file() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("not-a-dir");
        fs::write(&file, "x").unwrap();

        let err = ensure_store(&file).unwrap_err();
        assert!(matches!(err, Error::NotADirectory(_)));
    }

    #[test]
    fn test_ensure_store_fails_under_regular_file() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("file.txt"), "x").unwrap();

        // Cannot be created even with root privileges
        let err = ensure_store(&temp.path().join("file.txt/store")).unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }

    #[test]
    fn test_inspect_does_not_create_or_write() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("missing");

        assert!(matches!(
            MemoStore::inspect(&missing).unwrap_err(),
            Error::Io { .. }
        ));
        assert!(!missing.exists());

        let file = temp.path().join("file.txt");
        fs::write(&file, "x").unwrap();
        assert!(matches!(
            MemoStore::inspect(&file).unwrap_err(),
            Error::NotADirectory(_)
        ));

        let dir = temp.path().join("store");
        fs::create_dir(&dir).unwrap();
        let before = fs::metadata(&dir).unwrap().modified().unwrap();
        let store = MemoStore::inspect(&dir).unwrap();
        assert_eq!(store.stats().unwrap().total_entries, 0);
        assert_eq!(fs::read_dir(&dir).unwrap().count(), 0);
        assert_eq!(fs::metadata(&dir).unwrap().modified().unwrap(), before);
    }

    #[test]
    fn test_hit_does_not_invoke() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        let calls = Cell::new(0);
        let args = CallArgs::new().named("account", "A");

        for _ in 0..5 {
            let value: Vec<String> = store
                .get_or_compute("extract", &args, || {
                    calls.set(calls.get() + 1);
                    Ok(vec!["x".to_string(), "y".to_string()])
                })
                .unwrap();
            assert_eq!(value, vec!["x", "y"]);
        }

        assert_eq!(calls.get(), 1);
        assert_eq!(
            store.session_stats(),
            SessionStats {
                hits: 4,
                misses: 1,
                recovered: 0
            }
        );
        assert_eq!(store.stats().unwrap().total_entries, 1);
    }

    #[test]
    fn test_failure_is_not_cached() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        let args = CallArgs::new().named("account", "B");
        let key = derive_key("extract", &args);

        let result: Result<String> = store.get_or_compute("extract", &args, || {
            Err(Error::Inference("quota exceeded".to_string()))
        });
        assert!(matches!(result, Err(Error::Inference(_))));
        assert!(!store.contains(&key));
        assert_eq!(store.stats().unwrap().total_entries, 0);

        // Retry re-invokes and then caches
        let calls = Cell::new(0);
        let value: String = store
            .get_or_compute("extract", &args, || {
                calls.set(calls.get() + 1);
                Ok("ok".to_string())
            })
            .unwrap();
        assert_eq!(value, "ok");
        assert_eq!(calls.get(), 1);
        assert!(store.contains(&key));
    }

    #[test]
    fn test_corrupt_entry_is_recomputed() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        let args = CallArgs::new().arg("https://example.com/page");
        let key = derive_key("fetch", &args);

        fs::write(store.entry_path(&key), b"{\"version\": 1, \"opera").unwrap();

        let value: String = store
            .get_or_compute("fetch", &args, || Ok("<html></html>".to_string()))
            .unwrap();
        assert_eq!(value, "<html></html>");
        assert_eq!(store.session_stats().recovered, 1);

        // Entry was replaced with a decodable one
        let cached: Option<String> = store.read(&key).unwrap();
        assert_eq!(cached.as_deref(), Some("<html></html>"));
    }

    #[test]
    fn test_entry_layout() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        let args = CallArgs::new().named("account", "C");
        let key = derive_key("summarize", &args);

        let _: String = store
            .get_or_compute("summarize", &args, || Ok("summary".to_string()))
            .unwrap();

        let path = store.entry_path(&key);
        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            format!("{}.json", key)
        );

        let envelope: EntryEnvelope<String> =
            serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        assert_eq!(envelope.version, 1);
        assert_eq!(envelope.operation, "summarize");
        assert_eq!(envelope.value, "summary");

        // No temp files left behind
        assert_eq!(fs::read_dir(store.dir()).unwrap().count(), 1);
    }

    #[test]
    fn test_list_and_stats() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);

        for text in ["one", "two", "three"] {
            let args = CallArgs::new().named("account", text);
            let _: String = store
                .get_or_compute("summarize", &args, || Ok(text.to_uppercase()))
                .unwrap();
        }
        // Stray files are ignored
        fs::write(store.dir().join("notes.txt"), "hello").unwrap();

        let entries = store.list().unwrap();
        assert_eq!(entries.len(), 3);
        assert!(entries.windows(2).all(|w| w[0].key < w[1].key));
        assert!(entries
            .iter()
            .all(|e| e.operation.as_deref() == Some("summarize")));

        let stats = store.stats().unwrap();
        assert_eq!(stats.total_entries, 3);
        assert!(stats.total_size_bytes > 0);
    }

    #[test]
    fn test_clear_store_is_one_level() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);

        for text in ["a", "b"] {
            let args = CallArgs::new().arg(text);
            let _: String = store
                .get_or_compute("fetch", &args, || Ok(text.to_string()))
                .unwrap();
        }
        let nested = store.dir().join("nested");
        fs::create_dir(&nested).unwrap();
        fs::write(nested.join("keep.json"), "{}").unwrap();

        let removed = store.clear().unwrap();
        assert_eq!(removed, 2);
        assert_eq!(store.stats().unwrap().total_entries, 0);
        assert!(nested.join("keep.json").exists());
    }

    #[test]
    fn test_clear_missing_store() {
        let temp = TempDir::new().unwrap();
        assert_eq!(clear_store(&temp.path().join("missing")).unwrap(), 0);
    }
}
