//! A storage handler that stores nothing.

use std::collections::HashMap;
use std::time::Duration;

use super::StorageHandler;
use crate::cache::CacheValue;

/// Every operation appears to work but has no effect.
///
/// Writes report success, reads miss, and counters return fixed values.
/// Selected by [`StorageConfig::Disabled`](crate::cache::StorageConfig::Disabled).
///
/// # Examples
///
/// ```
/// use rttp_cache::cache::{CacheValue, NullHandler, StorageHandler};
///
/// let handler = NullHandler;
/// assert!(handler.set("key", CacheValue::from("value"), None));
/// assert_eq!(handler.get_or("key", CacheValue::Int(0)), CacheValue::Int(0));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct NullHandler;

impl StorageHandler for NullHandler {
    fn init(&self) -> bool {
        true
    }

    fn is_supported(&self) -> bool {
        true
    }

    fn set(&self, _key: &str, _value: CacheValue, _ttl: Option<Duration>) -> bool {
        true
    }

    fn set_multiple(&self, _entries: Vec<(String, CacheValue)>, _ttl: Option<Duration>) -> bool {
        true
    }

    fn get(&self, _key: &str) -> Option<CacheValue> {
        None
    }

    fn get_multiple(&self, _keys: &[&str], _default: &CacheValue) -> HashMap<String, CacheValue> {
        HashMap::new()
    }

    fn delete(&self, _key: &str) -> bool {
        true
    }

    fn delete_multiple(&self, _keys: &[&str]) -> bool {
        true
    }

    fn clear(&self) -> bool {
        true
    }

    fn clear_group(&self, _group: &str) -> bool {
        true
    }

    fn increment(&self, _key: &str, _offset: i64) -> Option<i64> {
        Some(1)
    }

    fn decrement(&self, _key: &str, _offset: i64) -> Option<i64> {
        Some(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_succeed_without_storing() {
        let h = NullHandler;
        assert!(h.init());
        assert!(h.is_supported());
        assert!(h.set("a", CacheValue::Int(1), Some(Duration::from_secs(5))));
        assert!(h.set_multiple(vec![("b".into(), "x".into())], None));
        assert_eq!(h.get("a"), None);
        assert_eq!(h.get("b"), None);
    }

    #[test]
    fn reads_return_defaults() {
        let h = NullHandler;
        assert_eq!(h.get_or("a", "fallback".into()), CacheValue::from("fallback"));
        assert!(h.get_multiple(&["a", "b"], &CacheValue::Int(0)).is_empty());
    }

    #[test]
    fn removals_and_counters_are_fixed() {
        let h = NullHandler;
        assert!(h.delete("missing"));
        assert!(h.delete_multiple(&["x", "y"]));
        assert!(h.clear());
        assert!(h.clear_group("g"));
        assert_eq!(h.increment("n", 10), Some(1));
        assert_eq!(h.decrement("n", 10), Some(0));
    }
}
