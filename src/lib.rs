//! Bounded-concurrency batch fetcher for HTTP requests.
//!
//! This crate provides a [`BatchFetcher`] that takes an ordered sequence of
//! request descriptors, issues each request concurrently through an injected
//! [`HttpClient`] capability, and returns exactly one [`FetchResult`] per
//! descriptor, in the original input order regardless of completion order.
//!
//! Individual request failures (timeouts, connection errors, malformed
//! responses) are isolated into [`FetchResult::Failure`] values and never
//! abort the batch or affect sibling requests. The only batch-level errors
//! are failing to acquire the HTTP client and external cancellation.
//!
//! ```ignore
//! let fetcher = BatchFetcher::new(FetcherConfig::default())?;
//! let results = fetcher
//!     .fetch_all(vec![RequestDescriptor::new("https://example.com")?])
//!     .await?;
//! ```

pub mod error;
pub mod fetch;
pub mod http;
pub mod request;

// Re-export commonly used types
pub use error::{Result, VolleyError};
pub use fetch::{fetch_all, BatchFetcher, FetcherConfig};
pub use http::{HttpClient, HttpResponse, MockHttpClient, ReqwestHttpClient};
pub use request::{FailureKind, FetchResult, RequestDescriptor};
