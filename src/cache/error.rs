//! Error types for the response cache.

use thiserror::Error;

/// Why a stored cache entry could not be trusted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CorruptKind {
    #[error("stored payload is not text")]
    NonTextPayload,

    #[error("payload is not valid JSON: {0}")]
    Deserialize(String),

    #[error("payload is not a mapping")]
    NotAMapping,

    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    #[error("`headers` is not a mapping")]
    HeadersNotAMapping,

    #[error("header `{0}` does not have a string value")]
    InvalidHeaderValue(String),

    #[error("`output` is not a base64 string")]
    InvalidOutput,

    #[error("`status` is not a supported HTTP status code: {0}")]
    InvalidStatus(String),

    #[error("`reason` is not a string")]
    InvalidReason,
}

/// Errors produced by [`ResponseCache`](super::ResponseCache).
///
/// A cache miss is never an error; it is reported as `Ok(None)`.
#[derive(Debug, Error)]
pub enum CacheError {
    /// A stored entry exists but cannot be turned back into a response.
    #[error("corrupt cache data under key {key}: {kind}")]
    Corrupt {
        key: String,
        #[source]
        kind: CorruptKind,
    },

    /// A response could not be serialized for storage.
    #[error("failed to encode cache entry: {0}")]
    Encode(#[from] serde_json::Error),
}

impl CacheError {
    /// Returns `true` if this error reports corrupt stored data.
    pub fn is_corrupt(&self) -> bool {
        matches!(self, Self::Corrupt { .. })
    }
}
