//! HTTP client abstraction for issuing requests.
//!
//! This module defines the `HttpClient` trait to abstract HTTP request
//! execution, enabling testability with mock implementations. The trait's
//! error channel is the closed [`FailureKind`] taxonomy, so the fetcher can
//! classify per-request failures without parsing error strings.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::{Result, VolleyError};
use crate::request::FailureKind;

/// Response from an HTTP request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// HTTP status code
    pub status: u16,
    /// Response body as a string
    pub body: String,
}

/// Per-request outcome at the client boundary.
pub type SendResult = std::result::Result<HttpResponse, FailureKind>;

/// Trait for executing HTTP requests.
///
/// This abstraction allows for different implementations (production vs.
/// testing) and makes the batch fetcher testable without real HTTP calls.
/// Implementations must be safe for concurrent use: one client instance is
/// shared across all in-flight requests of a batch.
///
/// # Example
/// ```ignore
/// let client = ReqwestHttpClient::new()?;
/// let response = client.send("https://example.com", Duration::from_secs(10)).await;
/// ```
#[async_trait]
pub trait HttpClient: Send + Sync + Clone {
    /// Issue a single GET request against `target`.
    ///
    /// `timeout` is the wall-clock budget for this one request. A failure
    /// here is per-request data, not a batch error: timeouts, connection
    /// errors, and malformed responses all come back as a [`FailureKind`].
    async fn send(&self, target: &str, timeout: Duration) -> SendResult;
}

// ============================================================================
// Production Implementation using reqwest
// ============================================================================

/// Production HTTP client using reqwest.
///
/// `reqwest::Client` pools connections internally and is cheap to clone, so
/// one instance can serve every concurrent request of a batch.
#[derive(Clone)]
pub struct ReqwestHttpClient {
    client: reqwest::Client,
}

impl ReqwestHttpClient {
    /// Create a new reqwest-based HTTP client.
    ///
    /// # Errors
    /// Returns [`VolleyError::ClientInit`] if the underlying client cannot
    /// be constructed (e.g., TLS backend initialization failure).
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(VolleyError::ClientInit)?;
        Ok(Self { client })
    }
}

/// Classify a reqwest error into the per-request failure taxonomy.
fn classify_send_error(error: &reqwest::Error) -> FailureKind {
    if error.is_timeout() {
        FailureKind::Timeout
    } else if error.is_connect() {
        FailureKind::Connect {
            error: error.to_string(),
        }
    } else if error.is_builder() || error.is_request() {
        FailureKind::InvalidRequest {
            error: error.to_string(),
        }
    } else {
        FailureKind::Other {
            error: error.to_string(),
        }
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    #[tracing::instrument(skip(self), fields(url = %target))]
    async fn send(&self, target: &str, timeout: Duration) -> SendResult {
        tracing::debug!(timeout_ms = timeout.as_millis() as u64, "Sending GET request");

        let response = self
            .client
            .get(target)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "HTTP request failed");
                classify_send_error(&e)
            })?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| {
            tracing::warn!(status = status, error = %e, "Failed to read response body");
            FailureKind::MalformedResponse {
                error: e.to_string(),
            }
        })?;

        tracing::debug!(
            status = status,
            response_len = body.len(),
            "HTTP request completed"
        );

        Ok(HttpResponse { status, body })
    }
}

// ============================================================================
// Test/Mock Implementation
// ============================================================================

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::oneshot;

/// Mock HTTP client for testing.
///
/// Allows configuring predetermined responses for specific targets without
/// making actual HTTP calls, and instruments the number of requests
/// currently in flight so tests can observe concurrency behavior.
///
/// # Example
/// ```ignore
/// let mock = MockHttpClient::new();
/// mock.add_response(
///     "https://example.com",
///     Ok(HttpResponse { status: 200, body: "hello".to_string() }),
/// );
/// ```
#[derive(Clone)]
pub struct MockHttpClient {
    responses: Arc<Mutex<HashMap<String, Vec<MockResponse>>>>,
    calls: Arc<Mutex<Vec<MockCall>>>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

/// A mock response that can optionally wait for a trigger before completing.
enum MockResponse {
    /// Immediate response
    Immediate(SendResult),
    /// Response that waits for a trigger signal before completing
    Triggered {
        response: SendResult,
        trigger: Arc<Mutex<Option<oneshot::Receiver<()>>>>,
    },
}

/// Record of a call made to the mock HTTP client.
#[derive(Debug, Clone)]
pub struct MockCall {
    pub target: String,
    pub timeout: Duration,
}

impl MockHttpClient {
    /// Create a new mock HTTP client.
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(HashMap::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Add a predetermined response for a target.
    ///
    /// Multiple responses can be added for the same target - they will be
    /// returned in FIFO order.
    pub fn add_response(&self, target: &str, response: SendResult) {
        self.responses
            .lock()
            .entry(target.to_string())
            .or_default()
            .push(MockResponse::Immediate(response));
    }

    /// Add a response that will wait for a manual trigger before completing.
    ///
    /// Returns a sender that when triggered (by sending `()` or dropping)
    /// will cause the request to complete with the given response. Useful
    /// for holding a request in flight while asserting on siblings.
    pub fn add_response_with_trigger(&self, target: &str, response: SendResult) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.responses
            .lock()
            .entry(target.to_string())
            .or_default()
            .push(MockResponse::Triggered {
                response,
                trigger: Arc::new(Mutex::new(Some(rx))),
            });
        tx
    }

    /// Get all calls that have been made to this mock client.
    pub fn get_calls(&self) -> Vec<MockCall> {
        self.calls.lock().clone()
    }

    /// Get the number of calls made.
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Get the number of requests currently in-flight (executing).
    ///
    /// Useful for testing cancellation and admission limits - if a request
    /// is aborted or times out, the in-flight count decreases.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Get the highest in-flight count observed so far.
    ///
    /// This is the instrument for concurrency-cap tests: with a cap of k,
    /// this must never exceed k.
    pub fn max_in_flight_count(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

impl Default for MockHttpClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpClient for MockHttpClient {
    async fn send(&self, target: &str, timeout: Duration) -> SendResult {
        // Increment in-flight counter and record the peak
        let active = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(active, Ordering::SeqCst);

        // Guard to ensure we decrement even if cancelled/panicked
        let in_flight = self.in_flight.clone();
        let _guard = InFlightGuard { in_flight };

        // Record this call
        self.calls.lock().push(MockCall {
            target: target.to_string(),
            timeout,
        });

        // Look up the response
        let mock_response = {
            let mut responses = self.responses.lock();
            if let Some(response_queue) = responses.get_mut(target) {
                if !response_queue.is_empty() {
                    Some(response_queue.remove(0))
                } else {
                    None
                }
            } else {
                None
            }
        };

        match mock_response {
            Some(MockResponse::Immediate(response)) => response,
            Some(MockResponse::Triggered { response, trigger }) => {
                // Wait for the trigger signal before returning the response
                let rx = {
                    let mut trigger_guard = trigger.lock();
                    trigger_guard.take()
                };

                if let Some(rx) = rx {
                    // Wait for trigger (ignore the result - we proceed either way)
                    let _ = rx.await;
                }

                response
            }
            None => Err(FailureKind::Other {
                error: format!("No mock response configured for {}", target),
            }),
        }
    }
}

/// Guard that decrements the in-flight counter when dropped.
/// This ensures the counter is decremented even if the task is cancelled or
/// the request future is dropped on timeout.
struct InFlightGuard {
    in_flight: Arc<AtomicUsize>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}
