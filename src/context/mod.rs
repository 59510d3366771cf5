//! Per-request context passed through the middleware pipeline.

use crate::Request;

/// Per-request context.
pub struct Context {
    request: Request,
}

impl Context {
    /// Wraps a parsed request for one trip through the pipeline.
    pub fn new(request: Request) -> Self {
        Self { request }
    }

    /// The request being handled. Cache keys are derived from it.
    pub fn request(&self) -> &Request {
        &self.request
    }
}
