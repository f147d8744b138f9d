//! Error types.
//!
//! `StoreError` describes failures of the external record store. It lives in
//! `safetrain-core` so the engine can decide which reads may soft-fail and
//! which must propagate without string matching.

use thiserror::Error;

/// Errors that can occur when talking to the record store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store returned a 429 rate limit response.
    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    /// Authentication failed (invalid or missing API key).
    #[error("authentication failed: {0}")]
    Unauthorized(String),

    /// The table or record does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The store returned an error response.
    #[error("store error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// The request timed out.
    #[error("request timed out after {0}s")]
    Timeout(u64),

    /// A network error occurred.
    #[error("network error: {0}")]
    Network(String),

    /// A record could not be decoded into the expected shape.
    #[error("malformed record in {table}: {message}")]
    Decode { table: String, message: String },
}

impl StoreError {
    /// Returns `true` if retrying the same call cannot succeed.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            StoreError::Unauthorized(_) | StoreError::NotFound(_) | StoreError::Decode { .. }
        )
    }
}

/// Errors returned by the engine's request-level operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The request is missing a required identifier or carries an invalid
    /// value. Raised before the store is touched.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The requested template does not exist.
    #[error("template not found: {0}")]
    TemplateNotFound(String),

    /// A primary read or the attempt header write failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type EngineResult<T> = Result<T, EngineError>;

/// Reject blank identifiers with an `InvalidRequest` naming the field.
pub(crate) fn require_id(value: &str, field: &str) -> EngineResult<()> {
    if value.trim().is_empty() {
        return Err(EngineError::InvalidRequest(format!("{field} is required")));
    }
    Ok(())
}
