//! The batch fetcher: fan out one request per descriptor, fan in one result
//! per descriptor, in input order.
//!
//! Every descriptor gets its own task on a [`JoinSet`]; an optional
//! [`Semaphore`] enforces the admission limit. Each task writes its result
//! into a slot indexed by the descriptor's input position, so completion
//! order never leaks to the caller.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::error::{Result, VolleyError};
use crate::http::{HttpClient, ReqwestHttpClient};
use crate::request::{FailureKind, FetchResult, RequestDescriptor};

/// Configuration for a batch fetch.
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    /// Wall-clock budget for a single request. Descriptors may override this
    /// individually.
    pub per_request_timeout: Duration,

    /// Maximum number of simultaneously in-flight requests. `None` (or
    /// `Some(0)`) means every descriptor may run concurrently. Waiting
    /// descriptors are admitted FIFO as slots free up.
    pub max_concurrency: Option<usize>,

    /// Maximum length of a result's body preview, in Unicode code points.
    pub preview_length: usize,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            per_request_timeout: Duration::from_secs(10),
            max_concurrency: None,
            preview_length: 200,
        }
    }
}

/// Truncate `body` to at most `limit` code points, always a prefix.
fn truncate_preview(body: &str, limit: usize) -> String {
    match body.char_indices().nth(limit) {
        Some((byte_index, _)) => body[..byte_index].to_string(),
        None => body.to_string(),
    }
}

/// Executes a batch of requests concurrently through a shared HTTP client.
///
/// The client is shared read-only across all in-flight requests; the
/// [`HttpClient`] bound requires it to be safe for concurrent use.
pub struct BatchFetcher<H: HttpClient> {
    client: H,
    config: FetcherConfig,
}

impl BatchFetcher<ReqwestHttpClient> {
    /// Create a fetcher backed by a real HTTP client.
    ///
    /// # Errors
    /// Returns [`VolleyError::ClientInit`] if the client cannot be acquired.
    /// This is the only construction-time failure; everything that goes
    /// wrong with individual requests later is per-request data.
    pub fn new(config: FetcherConfig) -> Result<Self> {
        Ok(Self {
            client: ReqwestHttpClient::new()?,
            config,
        })
    }
}

impl<H: HttpClient + 'static> BatchFetcher<H> {
    /// Create a fetcher with an injected client capability.
    pub fn with_client(client: H, config: FetcherConfig) -> Self {
        Self { client, config }
    }

    /// Execute every descriptor and return one result per descriptor, in
    /// input order.
    ///
    /// Per-request failures (timeout, connection error, malformed response)
    /// are isolated into [`FetchResult::Failure`] values; they never abort
    /// the batch or affect sibling requests. The call returns only after
    /// every descriptor has settled.
    pub async fn fetch_all(&self, descriptors: Vec<RequestDescriptor>) -> Result<Vec<FetchResult>> {
        self.fetch_all_with_cancellation(descriptors, CancellationToken::new())
            .await
    }

    /// Like [`Self::fetch_all`], with an external cancellation signal for the
    /// whole batch.
    ///
    /// On cancellation, in-flight requests are aborted (best-effort) and the
    /// call fails with [`VolleyError::Cancelled`] instead of returning
    /// partial results.
    #[tracing::instrument(skip(self, descriptors, cancel), fields(descriptors = descriptors.len()))]
    pub async fn fetch_all_with_cancellation(
        &self,
        descriptors: Vec<RequestDescriptor>,
        cancel: CancellationToken,
    ) -> Result<Vec<FetchResult>> {
        if descriptors.is_empty() {
            return Ok(Vec::new());
        }

        let semaphore = self
            .config
            .max_concurrency
            .filter(|&limit| limit > 0)
            .map(|limit| Arc::new(Semaphore::new(limit)));

        tracing::debug!(
            max_concurrency = self.config.max_concurrency,
            "Dispatching batch"
        );

        // Targets are kept so a panicked task's slot can still be filled.
        let targets: Vec<String> = descriptors.iter().map(|d| d.target.clone()).collect();

        let mut join_set: JoinSet<(usize, FetchResult)> = JoinSet::new();
        for (index, descriptor) in descriptors.into_iter().enumerate() {
            let client = self.client.clone();
            let timeout = descriptor
                .timeout
                .unwrap_or(self.config.per_request_timeout);
            let preview_length = self.config.preview_length;
            let semaphore = semaphore.clone();

            join_set.spawn(async move {
                // Wait for admission before the timeout clock starts; time
                // spent queued behind the cap doesn't count against the
                // request's budget. The semaphore is never closed, so a
                // failed acquire just means running uncapped.
                let _permit = match semaphore {
                    Some(semaphore) => semaphore.acquire_owned().await.ok(),
                    None => None,
                };

                let target = descriptor.target;
                let result =
                    match tokio::time::timeout(timeout, client.send(&target, timeout)).await {
                        Ok(Ok(response)) => {
                            tracing::debug!(url = %target, status = response.status, "Request succeeded");
                            FetchResult::Success {
                                target,
                                status: response.status,
                                preview: truncate_preview(&response.body, preview_length),
                            }
                        }
                        Ok(Err(kind)) => {
                            tracing::debug!(url = %target, error = %kind.to_error_message(), "Request failed");
                            FetchResult::Failure { target, kind }
                        }
                        Err(_elapsed) => {
                            tracing::debug!(url = %target, timeout_ms = timeout.as_millis() as u64, "Request timed out");
                            FetchResult::Failure {
                                target,
                                kind: FailureKind::Timeout,
                            }
                        }
                    };
                (index, result)
            });
        }

        let mut slots: Vec<Option<FetchResult>> = targets.iter().map(|_| None).collect();

        loop {
            tokio::select! {
                joined = join_set.join_next() => {
                    match joined {
                        None => break,
                        Some(Ok((index, result))) => {
                            slots[index] = Some(result);
                        }
                        Some(Err(join_error)) => {
                            // A panicked task loses its index; the slot is
                            // backfilled below from `targets`.
                            tracing::error!(error = %join_error, "Fetch task terminated unexpectedly");
                        }
                    }
                }
                _ = cancel.cancelled() => {
                    tracing::warn!("Batch cancelled, aborting in-flight requests");
                    join_set.abort_all();
                    return Err(VolleyError::Cancelled);
                }
            }
        }

        let results: Vec<FetchResult> = slots
            .into_iter()
            .zip(targets)
            .map(|(slot, target)| {
                slot.unwrap_or(FetchResult::Failure {
                    target,
                    kind: FailureKind::TaskTerminated,
                })
            })
            .collect();

        tracing::info!(
            total = results.len(),
            failed = results.iter().filter(|r| !r.is_success()).count(),
            "Batch settled"
        );

        Ok(results)
    }
}

/// Execute one batch with an HTTP client scoped to this single call.
///
/// The client is acquired after the empty-input check and released once all
/// results are collected. Callers issuing repeated batches should hold a
/// [`BatchFetcher`] instead to reuse the client's connection pool.
///
/// # Errors
/// Returns [`VolleyError::ClientInit`] if the client cannot be acquired.
pub async fn fetch_all(
    descriptors: Vec<RequestDescriptor>,
    config: FetcherConfig,
) -> Result<Vec<FetchResult>> {
    if descriptors.is_empty() {
        return Ok(Vec::new());
    }
    let fetcher = BatchFetcher::new(config)?;
    fetcher.fetch_all(descriptors).await
}
