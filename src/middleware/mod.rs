//! Ordered middleware chain that the response cache sits in.
//!
//! A request travels down a `Vec<MiddlewareHandler>` one layer at a time.
//! Each layer gets the [`Context`] and a [`Next`] for the rest of the chain,
//! and either answers directly (a cache hit) or calls [`Next::run`] and
//! works with what comes back (storing a fresh response). The last entry is
//! normally the application handler, which ignores its `Next`.
//!
//! [`ResponseCacheMiddleware`](crate::cache::ResponseCacheMiddleware) is the
//! layer this crate provides.

use std::{future::Future, pin::Pin, sync::Arc};

use crate::{Response, StatusCode, context::Context};

/// Boxed future returned by every layer.
pub type ResponseFuture = Pin<Box<dyn Future<Output = Response> + Send>>;

/// One layer of the chain, type-erased and shared.
///
/// Closures work directly as long as their return type is spelled out:
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use rttp_cache::{Response, context::Context};
/// use rttp_cache::middleware::{MiddlewareHandler, Next, ResponseFuture};
///
/// let app: MiddlewareHandler = Arc::new(|ctx: Context, _next: Next| -> ResponseFuture {
///     let path = ctx.request().path().to_owned();
///     Box::pin(async move { Response::default().body(format!("page {path}")) })
/// });
/// ```
pub type MiddlewareHandler = Arc<dyn Fn(Context, Next) -> ResponseFuture + Send + Sync + 'static>;

/// Wraps a [`Middleware`] value so it can be placed in the chain.
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use rttp_cache::cache::{NullHandler, QueryStringPolicy, ResponseCache, ResponseCacheMiddleware};
/// use rttp_cache::middleware::from_middleware;
///
/// let cache = ResponseCache::new(Arc::new(NullHandler), QueryStringPolicy::Disabled);
/// let layer = from_middleware(Arc::new(ResponseCacheMiddleware::new(Arc::new(cache))));
/// ```
pub fn from_middleware<M>(middleware: Arc<M>) -> MiddlewareHandler
where
    M: Middleware + 'static,
{
    Arc::new(move |ctx: Context, next: Next| middleware.handle(ctx, next))
}

/// The remainder of the chain below the current layer.
///
/// `run` consumes it, so a layer can forward a request at most once.
pub struct Next {
    chain: Vec<MiddlewareHandler>,
    position: usize,
}

impl Next {
    /// Starts at the top of `chain`.
    pub fn new(chain: Vec<MiddlewareHandler>) -> Self {
        Self { chain, position: 0 }
    }

    /// Hands `ctx` to the next layer.
    ///
    /// Running off the end of the chain means nothing answered the request,
    /// which yields a `500`.
    pub async fn run(mut self, ctx: Context) -> Response {
        let Some(layer) = self.chain.get(self.position).cloned() else {
            return Response::new(StatusCode::InternalServerError)
                .body("request reached the end of the middleware chain unanswered");
        };
        self.position += 1;
        layer(ctx, self).await
    }
}

/// A layer that can answer a request itself or pass it on.
///
/// Implementors are shared across Tokio tasks, so they must be `Send + Sync`
/// and return a `Send` future.
pub trait Middleware: Send + Sync {
    /// Handles one request. Call `next.run(ctx)` to defer to the layers below.
    fn handle(&self, ctx: Context, next: Next) -> ResponseFuture;
}
