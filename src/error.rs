//! Error types for the batch fetcher.
//!
//! Per-request failures (timeouts, connection errors) are *not* errors at
//! this level: they are recovered locally into [`crate::FetchResult::Failure`]
//! values. The variants here are batch-level only: when one of these is
//! returned, the result sequence's length invariant cannot be guaranteed and
//! the caller must handle it explicitly.

use thiserror::Error;

/// Result type alias using the volley error type.
pub type Result<T> = std::result::Result<T, VolleyError>;

/// Batch-level error type.
#[derive(Error, Debug)]
pub enum VolleyError {
    /// Validation error (e.g., an empty request target)
    #[error("Validation error: {0}")]
    Validation(String),

    /// The shared HTTP client could not be constructed
    #[error("Failed to acquire HTTP client: {0}")]
    ClientInit(#[source] reqwest::Error),

    /// The batch was cancelled before all requests settled
    #[error("Batch cancelled before completion")]
    Cancelled,

    /// General error from anyhow
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
