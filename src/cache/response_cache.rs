//! Whole-response caching keyed by request URI.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};
use url::form_urlencoded;

use super::config::{QueryStringPolicy, ResponseCacheConfig};
use super::envelope::Envelope;
use super::error::{CacheError, CorruptKind};
use super::handler::StorageHandler;
use super::value::CacheValue;
use crate::http::{Request, Response};

/// Hex characters kept from the digest: 128 bits.
const KEY_HEX_LEN: usize = 32;

/// Stores responses and rebuilds them for later matching requests.
///
/// The cache key covers the `Host` header, the path, and whichever query
/// parameters the [`QueryStringPolicy`] selects. Parameters are sorted before
/// hashing, so their order in the URL never matters.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use rttp_cache::cache::{FileHandler, QueryStringPolicy, ResponseCache, StorageHandler};
/// use rttp_cache::http::{Request, Response, StatusCode};
///
/// let dir = tempfile::tempdir().unwrap();
/// let handler = FileHandler::new(dir.path());
/// assert!(handler.init());
///
/// let cache = ResponseCache::new(Arc::new(handler), QueryStringPolicy::Disabled).with_ttl(60);
/// let (request, _) = Request::parse(b"GET /about HTTP/1.1\r\nHost: example.com\r\n\r\n").unwrap();
///
/// let response = Response::new(StatusCode::Ok).header("Content-Type", "text/plain").body("hello");
/// assert!(cache.make(&request, &response));
///
/// let cached = cache.get(&request, Response::default()).unwrap().unwrap();
/// assert_eq!(cached.body_slice(), b"hello");
/// ```
pub struct ResponseCache {
    handler: Arc<dyn StorageHandler>,
    ttl: u64,
    query_policy: QueryStringPolicy,
}

impl ResponseCache {
    /// Creates a cache over `handler` with writes disabled (`ttl == 0`).
    pub fn new(handler: Arc<dyn StorageHandler>, query_policy: QueryStringPolicy) -> Self {
        Self {
            handler,
            ttl: 0,
            query_policy,
        }
    }

    /// Builds the configured storage handler and a cache on top of it.
    pub fn from_config(config: &ResponseCacheConfig) -> Self {
        Self::new(config.storage.build(), config.cache_query_string.clone()).with_ttl(config.ttl)
    }

    /// Sets the time-to-live in seconds.
    #[must_use]
    pub fn with_ttl(mut self, ttl: u64) -> Self {
        self.ttl = ttl;
        self
    }

    /// Sets the time-to-live in seconds. `0` stops [`make`](Self::make) from
    /// writing; lookups still happen.
    pub fn set_ttl(&mut self, ttl: u64) {
        self.ttl = ttl;
    }

    /// Returns the TTL in seconds applied to new entries. `0` means nothing
    /// is written.
    pub fn ttl(&self) -> u64 {
        self.ttl
    }

    /// Returns the storage handler entries are kept in.
    pub fn handler(&self) -> &Arc<dyn StorageHandler> {
        &self.handler
    }

    /// Derives the cache key for `request`.
    ///
    /// The key is the first 128 bits of a BLAKE3 digest of
    /// `host + path [+ "?" + canonical query]`, as lowercase hex.
    pub fn generate_cache_key(&self, request: &Request) -> String {
        let query = self.canonical_query(request.query_string().unwrap_or_default());

        let mut uri = String::with_capacity(128);
        if let Some(host) = request.host() {
            uri.push_str(&host.to_ascii_lowercase());
        }
        uri.push_str(request.path());
        if !query.is_empty() {
            uri.push('?');
            uri.push_str(&query);
        }

        blake3::hash(uri.as_bytes()).to_hex()[..KEY_HEX_LEN].to_owned()
    }

    /// Stores `response` for `request`.
    ///
    /// Returns `true` without touching storage when the TTL is `0`. Otherwise
    /// returns whether the storage handler accepted the entry. The response
    /// is only read, so it can still be sent afterwards.
    pub fn make(&self, request: &Request, response: &Response) -> bool {
        if self.ttl == 0 {
            return true;
        }
        self.store(&self.generate_cache_key(request), response)
    }

    /// Like [`make`](Self::make), for a key computed earlier with
    /// [`generate_cache_key`](Self::generate_cache_key).
    pub fn store(&self, key: &str, response: &Response) -> bool {
        if self.ttl == 0 {
            return true;
        }

        let blob = match Envelope::from_response(response).encode() {
            Ok(blob) => blob,
            Err(e) => {
                warn!(key, error = %CacheError::from(e), "response not cached");
                return false;
            }
        };

        let stored = self.handler.set(
            key,
            CacheValue::Text(blob),
            Some(Duration::from_secs(self.ttl)),
        );
        debug!(key, stored, ttl = self.ttl, "response cache store");
        stored
    }

    /// Looks up a cached response for `request`, rebuilt on top of `template`.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Corrupt`] if an entry exists but fails
    /// validation. A missing entry is `Ok(None)`, never an error.
    pub fn get(&self, request: &Request, template: Response) -> Result<Option<Response>, CacheError> {
        self.fetch(&self.generate_cache_key(request), template)
    }

    /// Like [`get`](Self::get), for a key computed earlier with
    /// [`generate_cache_key`](Self::generate_cache_key).
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Corrupt`] if the stored entry cannot be trusted.
    pub fn fetch(&self, key: &str, template: Response) -> Result<Option<Response>, CacheError> {
        let Some(stored) = self.handler.get(key) else {
            debug!(key, "response cache miss");
            return Ok(None);
        };

        let corrupt = |kind: CorruptKind| CacheError::Corrupt {
            key: key.to_owned(),
            kind,
        };

        let CacheValue::Text(blob) = stored else {
            return Err(corrupt(CorruptKind::NonTextPayload));
        };
        let envelope = Envelope::decode(&blob).map_err(corrupt)?;

        debug!(key, status = envelope.status.as_u16(), "response cache hit");
        Ok(Some(envelope.apply_to(template)))
    }

    fn canonical_query(&self, raw: &str) -> String {
        if self.query_policy == QueryStringPolicy::Disabled {
            return String::new();
        }

        let raw = raw.split('#').next().unwrap_or_default();
        let mut pairs: Vec<(String, String)> = form_urlencoded::parse(raw.as_bytes())
            .into_owned()
            .filter(|(name, _)| match &self.query_policy {
                QueryStringPolicy::Only(names) => names.iter().any(|allowed| allowed == name),
                _ => true,
            })
            .collect();
        // Sorting values too makes repeated parameters order-independent.
        pairs.sort();

        form_urlencoded::Serializer::new(String::new())
            .extend_pairs(&pairs)
            .finish()
    }
}
