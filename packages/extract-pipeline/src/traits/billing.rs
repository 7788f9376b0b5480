//! Billing ledger and job log collaborators.
//!
//! Both are side effects of a completed extraction. The pipeline never
//! awaits them; see [`crate::events`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ServiceResult;

/// Credit ledger.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Billing: Send + Sync {
    /// Deduct credits from an account.
    async fn deduct(
        &self,
        account_id: &str,
        subscription_id: Option<String>,
        amount: u64,
    ) -> ServiceResult<()>;
}

/// Persistent job log.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait JobLogger: Send + Sync {
    /// Record a finished job.
    async fn record_job(&self, record: &JobRecord) -> ServiceResult<()>;
}

/// Structured job-completion record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub job_id: Uuid,
    pub success: bool,
    pub message: String,
    pub num_docs: usize,
    pub docs: Vec<serde_json::Value>,
    /// Seconds between request start and completion
    pub time_taken: f64,
    pub account_id: String,
    pub mode: String,
    /// Input URLs, comma separated
    pub url: String,
    pub origin: String,
    pub num_tokens: u64,
    pub recorded_at: DateTime<Utc>,
}
