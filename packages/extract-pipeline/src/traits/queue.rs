//! Job queue trait for fetch jobs.
//!
//! The queue is the boundary to the worker system that actually fetches
//! page content. Jobs are submitted with a unique id and a priority, waited
//! on with a timeout, and released once the caller is done with them.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use crate::error::QueueResult;
use crate::types::{document::FetchedDocument, request::PlanTier};

/// Minimal scrape options sent with every fetch job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeOptions {
    /// Output formats requested from the worker
    pub formats: Vec<String>,

    /// Strip navigation, footers and other boilerplate
    pub only_main_content: bool,
}

impl Default for ScrapeOptions {
    fn default() -> Self {
        Self {
            formats: vec!["markdown".to_string()],
            only_main_content: true,
        }
    }
}

/// A unit of work for the fetch queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchJob {
    pub url: String,
    pub account_id: String,
    pub plan: PlanTier,
    pub origin: String,
    pub scrape_options: ScrapeOptions,
}

impl FetchJob {
    /// Create a job for a URL with default scrape options.
    pub fn new(url: impl Into<String>, account_id: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            account_id: account_id.into(),
            plan: PlanTier::default(),
            origin: "api".to_string(),
            scrape_options: ScrapeOptions::default(),
        }
    }

    /// Set the plan tier.
    pub fn with_plan(mut self, plan: PlanTier) -> Self {
        self.plan = plan;
        self
    }

    /// Set the origin.
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = origin.into();
        self
    }
}

/// External fetch queue.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Submit a job. Lower priority values are served first.
    async fn submit(&self, job: FetchJob, id: Uuid, priority: i32) -> QueueResult<()>;

    /// Wait for a job's document, giving up after `timeout`.
    ///
    /// Giving up does not stop the job; call [`JobQueue::release`].
    async fn await_result(&self, id: Uuid, timeout: Duration) -> QueueResult<FetchedDocument>;

    /// Drop the job and any stored result.
    async fn release(&self, id: Uuid);

    /// Get the queue name (for logging/debugging).
    fn name(&self) -> &str {
        "unknown"
    }
}
