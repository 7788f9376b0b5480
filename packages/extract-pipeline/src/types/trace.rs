//! Per-URL trace records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where a URL is in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TraceStatus {
    /// Seen as an input or discovered candidate
    Mapped,
    /// Submitted for fetching
    Scraped,
    /// Failed; terminal
    Error,
}

impl TraceStatus {
    /// Whether moving from `self` to `next` is allowed.
    ///
    /// Status only moves forward; `Error` is reachable from anywhere and is
    /// never left.
    pub fn can_advance_to(self, next: TraceStatus) -> bool {
        match (self, next) {
            (Self::Error, _) => false,
            (_, Self::Error) => true,
            (Self::Mapped, Self::Scraped) => true,
            _ => false,
        }
    }
}

/// Timestamps, each set at most once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceTiming {
    pub discovered_at: DateTime<Utc>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub scraped_at: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

/// Content sizes recorded after a successful fetch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentStats {
    pub raw_content_length: usize,
    pub processed_content_length: usize,
    pub tokens_used: u64,
}

/// Audit record of one URL's journey through the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UrlTrace {
    pub url: String,

    pub status: TraceStatus,

    pub timing: TraceTiming,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub relevance_score: Option<f32>,

    pub used_in_completion: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_stats: Option<ContentStats>,
}

impl UrlTrace {
    /// A freshly mapped URL.
    pub fn mapped(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            status: TraceStatus::Mapped,
            timing: TraceTiming {
                discovered_at: Utc::now(),
                scraped_at: None,
                completed_at: None,
            },
            relevance_score: None,
            used_in_completion: false,
            warning: None,
            error: None,
            content_stats: None,
        }
    }

    /// Move to a new status if the transition is allowed.
    ///
    /// Returns whether the status changed.
    pub fn advance(&mut self, next: TraceStatus) -> bool {
        if !self.status.can_advance_to(next) {
            return false;
        }
        self.status = next;
        if next == TraceStatus::Error {
            self.used_in_completion = false;
        }
        true
    }

    /// Mark as failed with a message.
    pub fn fail(&mut self, message: impl Into<String>) {
        self.advance(TraceStatus::Error);
        self.used_in_completion = false;
        self.error = Some(message.into());
    }

    /// Whether this URL failed.
    pub fn is_error(&self) -> bool {
        self.status == TraceStatus::Error
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_transitions() {
        assert!(TraceStatus::Mapped.can_advance_to(TraceStatus::Scraped));
        assert!(TraceStatus::Mapped.can_advance_to(TraceStatus::Error));
        assert!(TraceStatus::Scraped.can_advance_to(TraceStatus::Error));
        assert!(!TraceStatus::Scraped.can_advance_to(TraceStatus::Mapped));
        assert!(!TraceStatus::Error.can_advance_to(TraceStatus::Scraped));
        assert!(!TraceStatus::Error.can_advance_to(TraceStatus::Error));
    }

    #[test]
    fn test_fail_clears_used_in_completion() {
        let mut trace = UrlTrace::mapped("https://example.com");
        trace.used_in_completion = true;
        trace.fail("timeout");

        assert!(trace.is_error());
        assert!(!trace.used_in_completion);
        assert_eq!(trace.error.as_deref(), Some("timeout"));
    }

    #[test]
    fn test_serializes_camel_case() {
        let mut trace = UrlTrace::mapped("https://example.com");
        trace.relevance_score = Some(0.8);
        let json = serde_json::to_value(&trace).unwrap();

        assert_eq!(json["status"], "mapped");
        assert_eq!(json["usedInCompletion"], false);
        assert!(json["timing"]["discoveredAt"].is_string());
        assert!(json.get("error").is_none());
        assert!(json.get("relevanceScore").is_some());
    }
}
