//! HTTP response caching.
//!
//! A [`ResponseCache`] turns a response into an [`Envelope`], stores it through
//! a [`StorageHandler`] under a key derived from the request, and rebuilds an
//! equivalent response for later matching requests.
//!
//! ## Pieces
//!
//! - [`ResponseCache`]: key derivation, `make` (store) and `get` (rebuild).
//! - [`StorageHandler`]: key/value backend contract, with [`NullHandler`]
//!   and [`FileHandler`].
//! - [`ResponseCacheMiddleware`]: plugs the cache into the middleware chain.
//! - [`ResponseCacheConfig`]: TTL, query-string policy, and handler choice.
//!
//! ## Errors
//!
//! A miss is `Ok(None)`. Storage failures surface as `false` from the handler
//! and never block the real response. Data that is present but cannot be
//! trusted is a [`CacheError::Corrupt`], which callers must not treat as a
//! miss.

mod config;
mod envelope;
mod error;
pub mod handler;
mod middleware;
mod response_cache;
mod value;

pub use config::{QueryStringPolicy, ResponseCacheConfig, StorageConfig};
pub use envelope::Envelope;
pub use error::{CacheError, CorruptKind};
pub use handler::{FileHandler, NullHandler, StorageHandler};
pub use middleware::ResponseCacheMiddleware;
pub use response_cache::ResponseCache;
pub use value::CacheValue;
