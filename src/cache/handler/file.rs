//! File-backed storage handler.
//!
//! Each key is one file directly under the base directory, named after the
//! key. A file holds a JSON record:
//!
//! ```text
//! {"expires_at_ms":1760000000000,"value":{"type":"text","data":"..."}}
//! ```
//!
//! ## Write path
//!
//! 1. Encode the record.
//! 2. Write it to `.<uuid>.tmp` in the same directory while holding an
//!    exclusive advisory lock, then fsync.
//! 3. Rename the temp file onto `<key>`.
//!
//! The rename is atomic because both paths are on the same filesystem, so a
//! reader sees the old entry or the new one, never a partial write.
//! Concurrent writers to one key are not serialized: the last rename wins.
//!
//! A writer killed between steps 2 and 3 leaves its temp file behind.
//! [`FileHandler::init`] removes temp files older than the configured age and
//! [`FileHandler::clear`] removes everything.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use fs2::FileExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use super::StorageHandler;
use crate::cache::CacheValue;

/// Temp files older than this are considered orphaned by [`FileHandler::init`].
pub const DEFAULT_STALE_TEMP_AGE: Duration = Duration::from_secs(15 * 60);

const TEMP_SUFFIX: &str = ".tmp";

/// Longest key accepted, in bytes. Keys are file names, and 255 bytes is the
/// usual `NAME_MAX`.
pub const MAX_KEY_LEN: usize = 255;

#[derive(Debug, Serialize, Deserialize)]
struct Record {
    /// Unix time in milliseconds after which the entry is dead. `None` never expires.
    expires_at_ms: Option<u64>,
    value: CacheValue,
}

impl Record {
    fn new(value: CacheValue, ttl: Option<Duration>) -> Self {
        let expires_at_ms = ttl.map(|ttl| {
            let ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
            now_ms().saturating_add(ttl_ms)
        });
        Self {
            expires_at_ms,
            value,
        }
    }

    fn is_expired(&self) -> bool {
        self.expires_at_ms.is_some_and(|at| now_ms() >= at)
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

/// Keys become file names, so anything that could leave the base directory
/// or collide with a temp file is refused.
fn is_valid_key(key: &str) -> bool {
    !key.is_empty()
        && key.len() <= MAX_KEY_LEN
        && !key.starts_with('.')
        && !key.contains(['/', '\\', '\0'])
}

fn is_temp_file(name: &str) -> bool {
    name.starts_with('.') && name.ends_with(TEMP_SUFFIX)
}

/// Stores one value per file under a base directory.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use rttp_cache::cache::{CacheValue, FileHandler, StorageHandler};
///
/// let dir = tempfile::tempdir().unwrap();
/// let handler = FileHandler::new(dir.path().join("cache"));
/// assert!(handler.init());
///
/// assert!(handler.set("greeting", CacheValue::from("hi"), Some(Duration::from_secs(60))));
/// assert_eq!(handler.get("greeting"), Some(CacheValue::from("hi")));
/// assert!(handler.delete("greeting"));
/// assert_eq!(handler.get("greeting"), None);
/// ```
#[derive(Debug, Clone)]
pub struct FileHandler {
    path: PathBuf,
    stale_temp_age: Duration,
}

impl FileHandler {
    /// Creates a handler rooted at `path`. Call [`init`](StorageHandler::init)
    /// before use to create the directory.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            stale_temp_age: DEFAULT_STALE_TEMP_AGE,
        }
    }

    /// Sets the age after which `init` treats a temp file as orphaned.
    #[must_use]
    pub fn with_stale_temp_age(mut self, age: Duration) -> Self {
        self.stale_temp_age = age;
        self
    }

    /// Returns the base directory.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Removes temp files at least `max_age` old and returns how many were removed.
    pub fn reap_temp_files(&self, max_age: Duration) -> usize {
        let Ok(entries) = fs::read_dir(&self.path) else {
            return 0;
        };

        let mut removed = 0;
        for entry in entries.flatten() {
            let name = entry.file_name();
            if !name.to_str().is_some_and(is_temp_file) {
                continue;
            }
            let age = entry
                .metadata()
                .and_then(|m| m.modified())
                .ok()
                .and_then(|modified| modified.elapsed().ok())
                .unwrap_or_default();
            if age >= max_age && fs::remove_file(entry.path()).is_ok() {
                debug!(file = ?name, "removed orphaned cache temp file");
                removed += 1;
            }
        }
        removed
    }

    fn entry_path(&self, key: &str) -> io::Result<PathBuf> {
        if is_valid_key(key) {
            Ok(self.path.join(key))
        } else {
            Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid cache key {key:?}"),
            ))
        }
    }

    fn write_record(&self, key: &str, record: &Record) -> io::Result<()> {
        let target = self.entry_path(key)?;
        let encoded = serde_json::to_vec(record)?;

        // Same directory as the target so the rename never crosses filesystems.
        // The name leaves the key out so any valid key gets a valid temp name.
        let temp = self
            .path
            .join(format!(".{}{TEMP_SUFFIX}", Uuid::new_v4().simple()));

        let write = || -> io::Result<()> {
            let mut file = OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&temp)?;
            file.lock_exclusive()?;
            file.write_all(&encoded)?;
            file.sync_all()?;
            FileExt::unlock(&file)?;
            drop(file);
            fs::rename(&temp, &target)
        };

        let result = write();
        if result.is_err() {
            let _ = fs::remove_file(&temp);
        }
        result
    }

    fn read_record(&self, key: &str) -> Option<Record> {
        let path = self.entry_path(key).ok()?;
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return None,
            Err(e) => {
                debug!(key, error = %e, "cache file unreadable, treating as miss");
                return None;
            }
        };

        let record: Record = match serde_json::from_slice(&bytes) {
            Ok(record) => record,
            Err(e) => {
                warn!(key, error = %e, "cache file undecodable, treating as miss");
                return None;
            }
        };

        if record.is_expired() {
            debug!(key, "cache entry expired");
            // A writer may have replaced the file since it was read; losing that
            // fresh entry only costs a miss.
            let _ = fs::remove_file(&path);
            return None;
        }

        Some(record)
    }
}

impl StorageHandler for FileHandler {
    fn init(&self) -> bool {
        if let Err(e) = fs::create_dir_all(&self.path) {
            warn!(path = %self.path.display(), error = %e, "failed to create cache directory");
            return false;
        }
        self.reap_temp_files(self.stale_temp_age);
        true
    }

    fn is_supported(&self) -> bool {
        true
    }

    fn set(&self, key: &str, value: CacheValue, ttl: Option<Duration>) -> bool {
        match self.write_record(key, &Record::new(value, ttl)) {
            Ok(()) => true,
            Err(e) => {
                warn!(key, error = %e, "failed to write cache file");
                false
            }
        }
    }

    fn get(&self, key: &str) -> Option<CacheValue> {
        self.read_record(key).map(|record| record.value)
    }

    fn delete(&self, key: &str) -> bool {
        let Ok(path) = self.entry_path(key) else {
            return false;
        };
        match fs::remove_file(&path) {
            Ok(()) => true,
            Err(e) if e.kind() == io::ErrorKind::NotFound => true,
            Err(e) => {
                warn!(key, error = %e, "failed to delete cache file");
                false
            }
        }
    }

    fn clear(&self) -> bool {
        if !self.path.is_dir() {
            return false;
        }
        match fs::remove_dir_all(&self.path) {
            Ok(()) => true,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "failed to clear cache directory");
                false
            }
        }
    }

    fn clear_group(&self, group: &str) -> bool {
        let entries = match fs::read_dir(&self.path) {
            Ok(entries) => entries,
            Err(e) => {
                debug!(path = %self.path.display(), error = %e, "cache directory not readable");
                return false;
            }
        };

        let mut ok = true;
        for entry in entries.flatten() {
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if is_valid_key(name) && name.starts_with(group) && !self.delete(name) {
                ok = false;
            }
        }
        ok
    }

    fn increment(&self, key: &str, offset: i64) -> Option<i64> {
        let (current, expires_at_ms) = match self.read_record(key) {
            None => (0, None),
            Some(Record {
                value: CacheValue::Int(n),
                expires_at_ms,
            }) => (n, expires_at_ms),
            Some(_) => {
                debug!(key, "cannot increment a non-integer cache value");
                return None;
            }
        };

        let next = current.checked_add(offset)?;
        let record = Record {
            expires_at_ms,
            value: CacheValue::Int(next),
        };
        match self.write_record(key, &record) {
            Ok(()) => Some(next),
            Err(e) => {
                warn!(key, error = %e, "failed to write cache counter");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use tempfile::TempDir;

    use super::*;

    fn handler() -> (TempDir, FileHandler) {
        let dir = TempDir::new().unwrap();
        let handler = FileHandler::new(dir.path().join("cache"));
        assert!(handler.init());
        (dir, handler)
    }

    fn temp_files(h: &FileHandler) -> Vec<String> {
        fs::read_dir(h.path())
            .unwrap()
            .flatten()
            .filter_map(|e| e.file_name().into_string().ok())
            .filter(|n| is_temp_file(n))
            .collect()
    }

    #[test]
    fn set_then_get_each_variant() {
        let (_dir, h) = handler();
        let values = [
            CacheValue::Int(-42),
            CacheValue::from("plain text with \"quotes\" and\nnewlines"),
            CacheValue::Bytes(vec![0, 1, 2, 254, 255]),
        ];
        for (i, value) in values.into_iter().enumerate() {
            let key = format!("k{i}");
            assert!(h.set(&key, value.clone(), None));
            assert_eq!(h.get(&key), Some(value));
        }
        assert!(temp_files(&h).is_empty());
    }

    #[test]
    fn missing_key_returns_default() {
        let (_dir, h) = handler();
        assert_eq!(h.get("nope"), None);
        assert_eq!(h.get_or("nope", CacheValue::Int(9)), CacheValue::Int(9));
    }

    #[test]
    fn overwrite_replaces_value() {
        let (_dir, h) = handler();
        assert!(h.set("k", "old".into(), None));
        assert!(h.set("k", "new".into(), None));
        assert_eq!(h.get("k"), Some("new".into()));
    }

    #[test]
    fn expired_entry_is_a_miss_and_removed() {
        let (_dir, h) = handler();
        assert!(h.set("short", "v".into(), Some(Duration::ZERO)));
        assert_eq!(h.get("short"), None);
        assert!(!h.path().join("short").exists());

        assert!(h.set("long", "v".into(), Some(Duration::from_secs(3600))));
        assert_eq!(h.get("long"), Some("v".into()));
    }

    #[test]
    fn undecodable_file_is_a_miss() {
        let (_dir, h) = handler();
        fs::write(h.path().join("junk"), b"{\"expires_at_ms\":null,\"val").unwrap();
        assert_eq!(h.get("junk"), None);
    }

    #[test]
    fn orphaned_temp_file_never_shadows_entry() {
        let (_dir, h) = handler();
        assert!(h.set("k", "complete".into(), None));

        // A writer killed before its rename leaves a truncated temp file.
        fs::write(h.path().join(".deadbeef.tmp"), b"{\"expires_at_ms\":nu").unwrap();
        assert_eq!(h.get("k"), Some("complete".into()));

        fs::write(h.path().join(".cafe.tmp"), b"{").unwrap();
        assert_eq!(h.get("fresh"), None);
    }

    #[test]
    fn rejects_path_like_keys() {
        let (dir, h) = handler();
        for key in ["", "../escape", "a/b", "a\\b", ".hidden", "nul\0byte"] {
            assert!(!h.set(key, "v".into(), None), "key {key:?}");
            assert_eq!(h.get(key), None);
        }
        assert!(!dir.path().join("escape").exists());
    }

    #[test]
    fn long_keys_up_to_the_name_limit_work() {
        let (_dir, h) = handler();
        for len in [230, MAX_KEY_LEN] {
            let key = "k".repeat(len);
            assert!(h.set(&key, CacheValue::Int(1), None), "{len}-byte key");
            assert_eq!(h.increment(&key, 2), Some(3));
            assert_eq!(h.get(&key), Some(CacheValue::Int(3)));
            assert!(h.set_multiple(vec![(key.clone(), "v".into())], None));
            assert!(h.delete(&key));
        }
        assert!(temp_files(&h).is_empty());

        let too_long = "k".repeat(MAX_KEY_LEN + 1);
        assert!(!h.set(&too_long, CacheValue::Int(1), None));
        assert_eq!(h.get(&too_long), None);
    }

    #[test]
    fn delete_is_idempotent() {
        let (_dir, h) = handler();
        assert!(h.set("k", "v".into(), None));
        assert!(h.delete("k"));
        assert!(h.delete("k"));
        assert!(h.delete("never-written"));
        assert_eq!(h.get("k"), None);
    }

    #[test]
    fn clear_removes_everything_including_directory() {
        let (_dir, h) = handler();
        assert!(h.set("a", "1".into(), None));
        assert!(h.set("b", "2".into(), None));
        fs::create_dir(h.path().join("nested")).unwrap();
        fs::write(h.path().join("nested").join("inner"), b"x").unwrap();
        fs::write(h.path().join(".1234.tmp"), b"x").unwrap();

        assert!(h.clear());
        assert!(!h.path().exists());
        assert!(!h.clear(), "clearing a missing directory fails");

        assert!(h.init());
        assert!(h.set("a", "again".into(), None));
        assert_eq!(h.get("a"), Some("again".into()));
    }

    #[test]
    fn bulk_operations() {
        let (_dir, h) = handler();
        let entries = vec![
            ("one".to_owned(), CacheValue::Int(1)),
            ("two".to_owned(), CacheValue::Int(2)),
        ];
        assert!(h.set_multiple(entries, None));

        let got = h.get_multiple(&["one", "two", "three"], &CacheValue::Int(0));
        assert_eq!(got.len(), 3);
        assert_eq!(got["one"], CacheValue::Int(1));
        assert_eq!(got["two"], CacheValue::Int(2));
        assert_eq!(got["three"], CacheValue::Int(0));

        assert!(h.delete_multiple(&["one", "three"]));
        assert_eq!(h.get("one"), None);
        assert_eq!(h.get("two"), Some(CacheValue::Int(2)));
    }

    #[test]
    fn set_multiple_is_best_effort() {
        let (_dir, h) = handler();
        let entries = vec![
            ("bad/key".to_owned(), CacheValue::Int(1)),
            ("good".to_owned(), CacheValue::Int(2)),
        ];
        assert!(!h.set_multiple(entries, None));
        assert_eq!(h.get("good"), Some(CacheValue::Int(2)));
    }

    #[test]
    fn clear_group_only_touches_prefix() {
        let (_dir, h) = handler();
        assert!(h.set("users-1", "a".into(), None));
        assert!(h.set("users-2", "b".into(), None));
        assert!(h.set("posts-1", "c".into(), None));

        assert!(h.clear_group("users-"));
        assert_eq!(h.get("users-1"), None);
        assert_eq!(h.get("users-2"), None);
        assert_eq!(h.get("posts-1"), Some("c".into()));
    }

    #[test]
    fn clear_group_without_directory_fails() {
        let dir = TempDir::new().unwrap();
        let h = FileHandler::new(dir.path().join("absent"));
        assert!(!h.clear_group("x"));
    }

    #[test]
    fn counters() {
        let (_dir, h) = handler();
        assert_eq!(h.increment("hits", 1), Some(1));
        assert_eq!(h.increment("hits", 5), Some(6));
        assert_eq!(h.decrement("hits", 2), Some(4));
        assert_eq!(h.get("hits"), Some(CacheValue::Int(4)));

        assert!(h.set("name", "text".into(), None));
        assert_eq!(h.increment("name", 1), None);

        assert!(h.set("max", CacheValue::Int(i64::MAX), None));
        assert_eq!(h.increment("max", 1), None);
    }

    #[test]
    fn counter_keeps_expiry() {
        let (_dir, h) = handler();
        assert!(h.set("n", CacheValue::Int(1), Some(Duration::from_secs(3600))));
        let before: Record = serde_json::from_slice(&fs::read(h.path().join("n")).unwrap()).unwrap();

        assert_eq!(h.increment("n", 1), Some(2));
        let after: Record = serde_json::from_slice(&fs::read(h.path().join("n")).unwrap()).unwrap();
        assert!(before.expires_at_ms.is_some());
        assert_eq!(after.expires_at_ms, before.expires_at_ms);
    }

    #[test]
    fn increment_on_expired_entry_starts_from_zero() {
        let (_dir, h) = handler();
        assert!(h.set("n", CacheValue::Int(10), Some(Duration::ZERO)));
        assert_eq!(h.increment("n", 1), Some(1));
        assert_eq!(h.get("n"), Some(CacheValue::Int(1)));
    }

    #[test]
    fn reap_respects_age() {
        let (_dir, h) = handler();
        fs::write(h.path().join(".aaaa.tmp"), b"partial").unwrap();
        assert!(h.set("k", "v".into(), None));

        assert_eq!(h.reap_temp_files(Duration::from_secs(3600)), 0);
        assert_eq!(temp_files(&h).len(), 1);

        assert_eq!(h.reap_temp_files(Duration::ZERO), 1);
        assert!(temp_files(&h).is_empty());
        assert_eq!(h.get("k"), Some("v".into()));
    }

    #[test]
    fn init_reaps_stale_temp_files() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache");
        fs::create_dir_all(&path).unwrap();
        fs::write(path.join(".bbbb.tmp"), b"partial").unwrap();

        let h = FileHandler::new(&path).with_stale_temp_age(Duration::ZERO);
        assert!(h.init());
        assert!(temp_files(&h).is_empty());
    }

    #[test]
    fn concurrent_readers_never_see_torn_writes() {
        let (_dir, h) = handler();
        let h = Arc::new(h);
        let a = "a".repeat(256 * 1024);
        let b = "b".repeat(256 * 1024);
        assert!(h.set("shared", a.clone().into(), None));

        let writers: Vec<_> = [a.clone(), b.clone()]
            .into_iter()
            .map(|payload| {
                let h = Arc::clone(&h);
                thread::spawn(move || {
                    for _ in 0..20 {
                        assert!(h.set("shared", payload.clone().into(), None));
                    }
                })
            })
            .collect();

        let reader = {
            let h = Arc::clone(&h);
            thread::spawn(move || {
                for _ in 0..200 {
                    let value = h.get("shared").expect("entry always present");
                    let text = value.as_text().unwrap().to_owned();
                    assert!(text == a || text == b, "observed a torn value");
                }
            })
        };

        for w in writers {
            w.join().unwrap();
        }
        reader.join().unwrap();
        assert!(temp_files(&h).is_empty());
    }
}
