//! Middleware that serves and stores responses through a [`ResponseCache`].

use std::sync::Arc;

use tokio::task;
use tracing::{debug, error, warn};

use super::ResponseCache;
use crate::{
    Response,
    context::Context,
    middleware::{Middleware, Next, ResponseFuture},
};

/// Answers `GET` requests from the cache and caches successful responses.
///
/// # Behavior
///
/// - Only `GET` requests are looked up or stored; other methods pass through.
/// - On a hit, the cached response is returned and the rest of the chain is
///   **not** called.
/// - On a miss, the chain runs and a 2xx response is stored before being
///   returned. Whether storing succeeds never changes the response.
/// - A corrupt entry is logged at `error`, deleted, and the response is
///   regenerated, so corrupt data never reaches the client.
///
/// Storage calls block, so they run on Tokio's blocking pool.
///
/// # Examples
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use rttp_cache::cache::{ResponseCache, ResponseCacheConfig, ResponseCacheMiddleware, StorageConfig};
///
/// let config = ResponseCacheConfig::new()
///     .with_ttl(60)
///     .with_storage(StorageConfig::File { path: "/var/cache/app".into() });
/// let middleware = ResponseCacheMiddleware::new(Arc::new(ResponseCache::from_config(&config)));
/// ```
pub struct ResponseCacheMiddleware {
    cache: Arc<ResponseCache>,
}

impl ResponseCacheMiddleware {
    /// Creates the middleware over a shared cache.
    pub fn new(cache: Arc<ResponseCache>) -> Self {
        Self { cache }
    }
}

impl Middleware for ResponseCacheMiddleware {
    fn handle(&self, ctx: Context, next: Next) -> ResponseFuture {
        let cache = Arc::clone(&self.cache);

        Box::pin(async move {
            let method = ctx.request().method();
            if !method.is_cacheable() {
                debug!(%method, "response cache bypassed");
                return next.run(ctx).await;
            }

            let key = cache.generate_cache_key(ctx.request());

            let lookup = {
                let cache = Arc::clone(&cache);
                let key = key.clone();
                task::spawn_blocking(move || cache.fetch(&key, Response::default())).await
            };

            match lookup {
                Ok(Ok(Some(cached))) => return cached,
                Ok(Ok(None)) => {}
                Ok(Err(e)) => {
                    error!(error = %e, "corrupt response cache entry, regenerating");
                    let cache = Arc::clone(&cache);
                    let key = key.clone();
                    match task::spawn_blocking(move || cache.handler().delete(&key)).await {
                        Ok(true) => {}
                        Ok(false) => warn!("failed to delete corrupt response cache entry"),
                        Err(e) => warn!(error = %e, "response cache delete task failed"),
                    }
                }
                Err(e) => warn!(error = %e, "response cache lookup task failed"),
            }

            let response = next.run(ctx).await;
            if !response.status().is_success() {
                debug!(status = %response.status(), "response not cacheable");
                return response;
            }
            if cache.ttl() == 0 {
                return response;
            }

            let snapshot = response.clone();
            let stored = task::spawn_blocking(move || cache.store(&key, &snapshot)).await;
            match stored {
                Ok(true) => {}
                Ok(false) => debug!("response not cached"),
                Err(e) => warn!(error = %e, "response cache store task failed"),
            }
            response
        })
    }
}
