//! Configuration values for the response cache.
//!
//! These types only describe the cache; reading them from a file or the
//! environment is left to the application. They deserialize from the shape:
//!
//! ```text
//! { "ttl": 60, "cache_query_string": ["sort"], "storage": { "handler": "file", "path": "/var/cache/app" } }
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use serde::Deserialize;
use tracing::warn;

use super::handler::{FileHandler, NullHandler, StorageHandler};

/// Which query parameters take part in the cache key.
///
/// Deserializes from `false` ([`Disabled`](Self::Disabled)), `true`
/// ([`All`](Self::All)) or a list of parameter names ([`Only`](Self::Only)).
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "RawQueryStringPolicy")]
pub enum QueryStringPolicy {
    /// The query string is ignored.
    #[default]
    Disabled,
    /// Every parameter counts. Each distinct query produces its own entry.
    All,
    /// Only the named parameters count; the rest are ignored.
    Only(Vec<String>),
}

impl QueryStringPolicy {
    /// Builds an allow-list policy from parameter names.
    pub fn only<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Only(names.into_iter().map(Into::into).collect())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawQueryStringPolicy {
    Flag(bool),
    Names(Vec<String>),
}

impl From<RawQueryStringPolicy> for QueryStringPolicy {
    fn from(raw: RawQueryStringPolicy) -> Self {
        match raw {
            RawQueryStringPolicy::Flag(false) => Self::Disabled,
            RawQueryStringPolicy::Flag(true) => Self::All,
            RawQueryStringPolicy::Names(names) => Self::Only(names),
        }
    }
}

/// Selects the storage handler backing the cache.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(tag = "handler", rename_all = "snake_case")]
pub enum StorageConfig {
    /// Caching turned off globally: every write is dropped, every read misses.
    #[default]
    Disabled,
    /// One file per entry under `path`.
    File { path: PathBuf },
}

impl StorageConfig {
    /// Constructs and initializes the configured handler.
    ///
    /// A handler that is unsupported or fails to initialize is replaced by a
    /// [`NullHandler`], so the application keeps serving uncached responses.
    pub fn build(&self) -> Arc<dyn StorageHandler> {
        match self {
            Self::Disabled => Arc::new(NullHandler),
            Self::File { path } => {
                let handler = FileHandler::new(path);
                if handler.is_supported() && handler.init() {
                    Arc::new(handler)
                } else {
                    warn!(
                        path = %path.display(),
                        "file cache handler unavailable, caching disabled"
                    );
                    Arc::new(NullHandler)
                }
            }
        }
    }
}

/// Settings for a [`ResponseCache`](super::ResponseCache).
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ResponseCacheConfig {
    /// Seconds a stored response stays valid. `0` disables writes.
    pub ttl: u64,
    pub cache_query_string: QueryStringPolicy,
    pub storage: StorageConfig,
}

impl ResponseCacheConfig {
    /// Creates a configuration with caching disabled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the time-to-live in seconds.
    #[must_use]
    pub fn with_ttl(mut self, ttl: u64) -> Self {
        self.ttl = ttl;
        self
    }

    /// Sets the query-string policy.
    #[must_use]
    pub fn with_query_string(mut self, policy: QueryStringPolicy) -> Self {
        self.cache_query_string = policy;
        self
    }

    /// Sets the storage backend.
    #[must_use]
    pub fn with_storage(mut self, storage: StorageConfig) -> Self {
        self.storage = storage;
        self
    }
}
