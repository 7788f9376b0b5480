//! Rate-limited queue wrapper.
//!
//! Wraps any JobQueue implementation with a submission rate limit using the
//! governor crate. Waiting and releasing are not limited.

use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use nonzero_ext::nonzero;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::error::QueueResult;
use crate::traits::queue::{FetchJob, JobQueue};
use crate::types::document::FetchedDocument;

type DefaultRateLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

fn non_zero(value: u32) -> NonZeroU32 {
    NonZeroU32::new(value).unwrap_or(nonzero!(1u32))
}

/// A queue wrapper that enforces a submission rate.
///
/// Uses the governor crate for precise rate limiting with burst support.
pub struct RateLimitedQueue<Q: JobQueue> {
    inner: Q,
    limiter: Arc<DefaultRateLimiter>,
}

impl<Q: JobQueue> RateLimitedQueue<Q> {
    /// Create a new rate-limited queue.
    ///
    /// # Arguments
    /// * `queue` - The underlying queue to wrap
    /// * `submissions_per_second` - Maximum submissions per second (zero is treated as one)
    pub fn new(queue: Q, submissions_per_second: u32) -> Self {
        Self::with_quota(queue, Quota::per_second(non_zero(submissions_per_second)))
    }

    /// Create with a custom quota.
    pub fn with_quota(queue: Q, quota: Quota) -> Self {
        Self {
            inner: queue,
            limiter: Arc::new(RateLimiter::direct(quota)),
        }
    }

    /// Create with burst support.
    pub fn with_burst(queue: Q, submissions_per_second: u32, burst: u32) -> Self {
        let quota = Quota::per_second(non_zero(submissions_per_second)).allow_burst(non_zero(burst));
        Self::with_quota(queue, quota)
    }

    /// Get the wrapped queue.
    pub fn inner(&self) -> &Q {
        &self.inner
    }
}

#[async_trait]
impl<Q: JobQueue> JobQueue for RateLimitedQueue<Q> {
    async fn submit(&self, job: FetchJob, id: Uuid, priority: i32) -> QueueResult<()> {
        self.limiter.until_ready().await;
        self.inner.submit(job, id, priority).await
    }

    async fn await_result(&self, id: Uuid, timeout: Duration) -> QueueResult<FetchedDocument> {
        self.inner.await_result(id, timeout).await
    }

    async fn release(&self, id: Uuid) {
        self.inner.release(id).await
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

/// Builder for RateLimitedQueue with ergonomic configuration.
pub struct RateLimitedQueueBuilder<Q: JobQueue> {
    queue: Q,
    submissions_per_second: u32,
    burst: Option<u32>,
}

impl<Q: JobQueue> RateLimitedQueueBuilder<Q> {
    /// Create a new builder.
    pub fn new(queue: Q) -> Self {
        Self {
            queue,
            submissions_per_second: 1,
            burst: None,
        }
    }

    /// Set submissions per second.
    pub fn submissions_per_second(mut self, rate: u32) -> Self {
        self.submissions_per_second = rate;
        self
    }

    /// Set burst size.
    pub fn burst(mut self, burst: u32) -> Self {
        self.burst = Some(burst);
        self
    }

    /// Build the rate-limited queue.
    pub fn build(self) -> RateLimitedQueue<Q> {
        match self.burst {
            Some(burst) => RateLimitedQueue::with_burst(self.queue, self.submissions_per_second, burst),
            None => RateLimitedQueue::new(self.queue, self.submissions_per_second),
        }
    }
}

/// Extension trait for easy rate limiting.
pub trait JobQueueExt: JobQueue + Sized {
    /// Wrap this queue with a submission rate limit.
    fn rate_limited(self, submissions_per_second: u32) -> RateLimitedQueue<Self> {
        RateLimitedQueue::new(self, submissions_per_second)
    }

    /// Wrap with rate limiting and burst support.
    fn rate_limited_with_burst(self, submissions_per_second: u32, burst: u32) -> RateLimitedQueue<Self> {
        RateLimitedQueue::with_burst(self, submissions_per_second, burst)
    }
}

impl<Q: JobQueue + Sized> JobQueueExt for Q {}
