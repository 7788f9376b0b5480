//! Job queue implementations.
//!
//! - [`LocalQueue`] - in-process worker pool with a priority backlog
//! - [`RateLimitedQueue`] - wraps any queue with a submission rate limit
//! - [`HttpFetcher`] - plain HTTP fetcher for the local queue

pub mod http;
pub mod local;
pub mod rate_limited;

use async_trait::async_trait;

use crate::error::ServiceResult;
use crate::traits::queue::FetchJob;
use crate::types::document::FetchedDocument;

pub use http::HttpFetcher;
pub use local::LocalQueue;
pub use rate_limited::{JobQueueExt, RateLimitedQueue, RateLimitedQueueBuilder};

/// Fetches the content of one job. Used by [`LocalQueue`] workers.
#[async_trait]
pub trait Fetcher: Send + Sync + 'static {
    /// Fetch the job's URL.
    async fn fetch(&self, job: &FetchJob) -> ServiceResult<FetchedDocument>;

    /// Get the fetcher name (for logging/debugging).
    fn name(&self) -> &str {
        "unknown"
    }
}
