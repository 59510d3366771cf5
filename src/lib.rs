//! # rttp-cache
//!
//! Whole-response HTTP caching for the rttp framework, with pluggable
//! key/value storage.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use rttp_cache::cache::{FileHandler, QueryStringPolicy, ResponseCache, StorageHandler};
//! use rttp_cache::http::{Request, Response, StatusCode};
//!
//! let dir = tempfile::tempdir().unwrap();
//! let handler = FileHandler::new(dir.path().join("pages"));
//! assert!(handler.init());
//!
//! let cache = ResponseCache::new(Arc::new(handler), QueryStringPolicy::only(["sort"]))
//!     .with_ttl(60);
//!
//! let (request, _) =
//!     Request::parse(b"GET /products?sort=price&page=2 HTTP/1.1\r\nHost: shop\r\n\r\n").unwrap();
//! let response = Response::new(StatusCode::Ok).body("catalogue");
//! assert!(cache.make(&request, &response));
//!
//! // `page` is ignored and parameter order does not matter.
//! let (later, _) =
//!     Request::parse(b"GET /products?page=5&sort=price HTTP/1.1\r\nHost: shop\r\n\r\n").unwrap();
//! let cached = cache.get(&later, Response::default()).unwrap().unwrap();
//! assert_eq!(cached.body_slice(), b"catalogue");
//! ```

pub mod cache;
pub mod context;
pub mod http;
pub mod middleware;

// ── Convenience re-exports ────────────────────────────────────────────────────
pub use cache::{CacheError, ResponseCache, StorageHandler};
pub use http::{Headers, Method, Request, Response, StatusCode};
