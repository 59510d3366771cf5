//! Pluggable key/value storage used by the response cache.
//!
//! Every backend implements [`StorageHandler`]. Two are provided:
//!
//! - [`NullHandler`]: accepts everything, stores nothing. Used when caching is
//!   turned off so callers never need to branch on it.
//! - [`FileHandler`]: one file per key, written atomically.
//!
//! Handler methods report storage failures as `false` / `None` rather than
//! errors: a failed cache write must never stop the real response from being
//! served.

use std::collections::HashMap;
use std::time::Duration;

use super::CacheValue;

pub mod file;
pub mod null;

pub use file::FileHandler;
pub use null::NullHandler;

/// A key/value store with optional per-entry time-to-live.
///
/// Implementations are shared across request tasks behind an `Arc`, so they
/// must be `Send + Sync`. Methods block on I/O; async callers should run them
/// on a blocking thread.
///
/// The `*_multiple` methods have default implementations that apply the
/// single-key operation to each entry in order. They are best-effort: every
/// entry is attempted, and the result is `true` only if all of them succeeded.
pub trait StorageHandler: Send + Sync {
    /// Prepares the backend for use. Returns `false` if it cannot be used.
    fn init(&self) -> bool;

    /// Returns `true` if the backend can run in the current environment.
    fn is_supported(&self) -> bool;

    /// Stores `value` under `key`. `None` keeps it until deleted.
    fn set(&self, key: &str, value: CacheValue, ttl: Option<Duration>) -> bool;

    /// Stores every entry with the same `ttl`.
    fn set_multiple(&self, entries: Vec<(String, CacheValue)>, ttl: Option<Duration>) -> bool {
        entries
            .into_iter()
            .fold(true, |ok, (key, value)| self.set(&key, value, ttl) && ok)
    }

    /// Returns the live value under `key`, or `None` on a miss.
    fn get(&self, key: &str) -> Option<CacheValue>;

    /// Returns the live value under `key`, or `default` on a miss.
    fn get_or(&self, key: &str, default: CacheValue) -> CacheValue {
        self.get(key).unwrap_or(default)
    }

    /// Looks up every key, mapping misses to `default`.
    fn get_multiple(&self, keys: &[&str], default: &CacheValue) -> HashMap<String, CacheValue> {
        keys.iter()
            .map(|key| ((*key).to_owned(), self.get_or(key, default.clone())))
            .collect()
    }

    /// Removes `key`. Removing an absent key succeeds.
    fn delete(&self, key: &str) -> bool;

    /// Removes every key.
    fn delete_multiple(&self, keys: &[&str]) -> bool {
        keys.iter().fold(true, |ok, key| self.delete(key) && ok)
    }

    /// Removes every entry.
    fn clear(&self) -> bool;

    /// Removes every entry whose key starts with `group`.
    fn clear_group(&self, group: &str) -> bool;

    /// Adds `offset` to the integer under `key` (absent counts as `0`) and
    /// returns the new value.
    ///
    /// Returns `None` if the stored value is not an integer, the result would
    /// overflow, or the write fails.
    fn increment(&self, key: &str, offset: i64) -> Option<i64>;

    /// Subtracts `offset` from the integer under `key`; see
    /// [`increment`](Self::increment).
    fn decrement(&self, key: &str, offset: i64) -> Option<i64> {
        self.increment(key, offset.checked_neg()?)
    }
}
