//! Descriptor and result types for one batch of requests.
//!
//! A batch is a plain value exchange: the caller hands over a sequence of
//! [`RequestDescriptor`]s and gets back one [`FetchResult`] per descriptor.
//! Nothing here persists across calls.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, VolleyError};

/// Describes one request to perform within a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestDescriptor {
    /// The request address (e.g., a URL). Always non-empty.
    pub target: String,

    /// Per-request timeout override. `None` uses the batch-wide default
    /// from [`crate::FetcherConfig::per_request_timeout`].
    pub timeout: Option<Duration>,
}

impl RequestDescriptor {
    /// Create a descriptor for `target` using the batch-wide default timeout.
    ///
    /// # Errors
    /// Returns [`VolleyError::Validation`] if `target` is empty.
    pub fn new(target: impl Into<String>) -> Result<Self> {
        let target = target.into();
        if target.is_empty() {
            return Err(VolleyError::Validation(
                "request target must be non-empty".to_string(),
            ));
        }
        Ok(Self {
            target,
            timeout: None,
        })
    }

    /// Set a per-request timeout, overriding the batch-wide default.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Why a single request failed.
///
/// This enum distinguishes the different ways one request can fail so that
/// callers can branch on the failure kind rather than parsing message text.
/// A failure of this kind never aborts the batch; it is carried as data in
/// [`FetchResult::Failure`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "details")]
pub enum FailureKind {
    /// The request did not settle within its timeout budget.
    Timeout,

    /// Transport-level failure: connection refused/reset, DNS failure, TLS
    /// handshake failure.
    Connect { error: String },

    /// The request could not be built or sent (e.g., malformed target URL).
    InvalidRequest { error: String },

    /// A response arrived but its body could not be read.
    MalformedResponse { error: String },

    /// The fetch task terminated unexpectedly (panic). The descriptor's
    /// result slot is still filled, never dropped.
    TaskTerminated,

    /// Any other client-level failure.
    Other { error: String },
}

impl FailureKind {
    /// Returns a human-readable error message for this failure kind.
    pub fn to_error_message(&self) -> String {
        match self {
            FailureKind::Timeout => "Request timed out".to_string(),
            FailureKind::Connect { error } => {
                format!("Connection failed: {}", error)
            }
            FailureKind::InvalidRequest { error } => {
                format!("Failed to build request: {}", error)
            }
            FailureKind::MalformedResponse { error } => {
                format!("Failed to read response body: {}", error)
            }
            FailureKind::TaskTerminated => "Fetch task terminated unexpectedly".to_string(),
            FailureKind::Other { error } => {
                format!("Request failed: {}", error)
            }
        }
    }
}

/// Outcome of one request within a batch.
///
/// `Success` means a response was received and its status code is available
/// (a non-2xx status is still `Success`; status classification is left to
/// the caller). Any transport failure, timeout, or client exception is
/// `Failure`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum FetchResult {
    /// A response was received.
    Success {
        /// The descriptor's target, echoed back.
        target: String,
        /// HTTP status code of the response.
        status: u16,
        /// Response body truncated to the configured preview length.
        preview: String,
    },
    /// The request did not produce a response.
    Failure {
        /// The descriptor's target, echoed back.
        target: String,
        /// What went wrong.
        kind: FailureKind,
    },
}

impl FetchResult {
    /// Get the target regardless of outcome.
    pub fn target(&self) -> &str {
        match self {
            FetchResult::Success { target, .. } => target,
            FetchResult::Failure { target, .. } => target,
        }
    }

    /// Check if this result is a success.
    pub fn is_success(&self) -> bool {
        matches!(self, FetchResult::Success { .. })
    }

    /// Human-readable description of the failure, if this is one.
    pub fn error_description(&self) -> Option<String> {
        match self {
            FetchResult::Success { .. } => None,
            FetchResult::Failure { kind, .. } => Some(kind.to_error_message()),
        }
    }
}
