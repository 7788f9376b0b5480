//! Configuration types for the extraction pipeline.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One step of the relevance acceptance cascade.
///
/// Steps are tried in order; each runs only while fewer than
/// `PipelineConfig::min_accepted` candidates have been accepted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AcceptancePolicy {
    /// Accept every candidate scoring strictly above `min_score`.
    Threshold { min_score: f32 },

    /// Accept the single highest-scoring candidate that is not blocked.
    BestAvailable,
}

impl AcceptancePolicy {
    /// Threshold step.
    pub fn threshold(min_score: f32) -> Self {
        Self::Threshold { min_score }
    }

    /// Short label used in logs and trace warnings.
    pub fn label(&self) -> String {
        match self {
            Self::Threshold { min_score } => format!("score > {}", min_score),
            Self::BestAvailable => "best available".to_string(),
        }
    }
}

/// Configuration for the extraction pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Candidates kept per input URL before relevance filtering.
    ///
    /// Default: 100.
    pub max_candidates: usize,

    /// Accepted candidates kept after ranking.
    ///
    /// Default: 10.
    pub max_ranked: usize,

    /// Ordered acceptance cascade.
    ///
    /// Default: `score > 0.75`, then `score > 0.5`, then best available.
    pub acceptance: Vec<AcceptancePolicy>,

    /// Minimum accepted candidates before the cascade stops relaxing.
    pub min_accepted: usize,

    /// Fetch wait used when the scaled request timeout is zero or missing.
    pub default_fetch_timeout_ms: u64,

    /// Share of the request timeout granted to each fetch wait.
    pub fetch_timeout_scale: f64,

    /// Priority passed to the priority collaborator before plan adjustment.
    pub base_priority: i32,

    /// Credits deducted per resolved link.
    pub credits_per_link: u64,

    /// Maximum URLs accepted in a single request.
    pub max_input_urls: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_candidates: 100,
            max_ranked: 10,
            acceptance: vec![
                AcceptancePolicy::threshold(0.75),
                AcceptancePolicy::threshold(0.5),
                AcceptancePolicy::BestAvailable,
            ],
            min_accepted: 1,
            default_fetch_timeout_ms: 30_000,
            fetch_timeout_scale: 0.7,
            base_priority: 10,
            credits_per_link: 5,
            max_input_urls: 10,
        }
    }
}

impl PipelineConfig {
    /// Create a new config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the candidate cap.
    pub fn with_max_candidates(mut self, max: usize) -> Self {
        self.max_candidates = max;
        self
    }

    /// Set the ranking cap.
    pub fn with_max_ranked(mut self, max: usize) -> Self {
        self.max_ranked = max;
        self
    }

    /// Replace the acceptance cascade.
    pub fn with_acceptance(mut self, policies: impl IntoIterator<Item = AcceptancePolicy>) -> Self {
        self.acceptance = policies.into_iter().collect();
        self
    }

    /// Set the default fetch timeout.
    pub fn with_default_fetch_timeout_ms(mut self, ms: u64) -> Self {
        self.default_fetch_timeout_ms = ms;
        self
    }

    /// Set credits charged per resolved link.
    pub fn with_credits_per_link(mut self, credits: u64) -> Self {
        self.credits_per_link = credits;
        self
    }

    /// Set the maximum number of input URLs.
    pub fn with_max_input_urls(mut self, max: usize) -> Self {
        self.max_input_urls = max;
        self
    }

    /// Effective wait for a single fetch job.
    ///
    /// `floor(request_timeout * scale)`, or the default when that is zero.
    pub fn fetch_timeout(&self, request_timeout_ms: Option<u64>) -> Duration {
        let scaled = request_timeout_ms
            .map(|ms| (ms as f64 * self.fetch_timeout_scale).floor() as u64)
            .unwrap_or(0);

        let ms = if scaled == 0 {
            self.default_fetch_timeout_ms
        } else {
            scaled
        };

        Duration::from_millis(ms)
    }
}
