//! Trace ledger: one [`UrlTrace`] per distinct URL seen in a request.
//!
//! The ledger is shared by the resolver and dispatcher tasks of a single
//! request. Entries are keyed by [`url_key`], so `https://A.com/` and
//! `https://a.com` share one trace. All updates go through a mutex and
//! respect the status rules of [`UrlTrace::advance`].

use chrono::Utc;
use indexmap::IndexMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::types::{
    document::url_key,
    trace::{ContentStats, TraceStatus, UrlTrace},
};

/// Warning for accepted candidates cut by the ranking cap.
pub const RANKING_LIMIT_WARNING: &str = "Excluded due to ranking limit";

/// Warning for candidates that never cleared an acceptance step.
pub const BELOW_THRESHOLD_WARNING: &str = "Relevance score below threshold";

/// Concurrent per-request trace store.
#[derive(Debug, Clone, Default)]
pub struct TraceLedger {
    entries: Arc<Mutex<IndexMap<String, UrlTrace>>>,
}

impl TraceLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, IndexMap<String, UrlTrace>> {
        // Traces are plain data; poisoning is ignored.
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Record a URL as mapped. Returns `true` if it was not seen before.
    pub fn record(&self, url: &str) -> bool {
        let mut entries = self.lock();
        let key = url_key(url);
        if entries.contains_key(&key) {
            return false;
        }
        entries.insert(key, UrlTrace::mapped(url));
        true
    }

    /// Apply `f` to the trace for `url`. Returns `false` if there is none.
    pub fn update(&self, url: &str, f: impl FnOnce(&mut UrlTrace)) -> bool {
        match self.lock().get_mut(&url_key(url)) {
            Some(trace) => {
                f(trace);
                true
            }
            None => false,
        }
    }

    /// Apply `f` to the trace for `url`, creating a mapped trace first if needed.
    fn upsert(&self, url: &str, f: impl FnOnce(&mut UrlTrace)) {
        let mut entries = self.lock();
        let trace = entries
            .entry(url_key(url))
            .or_insert_with(|| UrlTrace::mapped(url));
        f(trace);
    }

    /// Mark a URL as failed.
    pub fn mark_error(&self, url: &str, message: impl Into<String>) {
        let message = message.into();
        self.upsert(url, |trace| trace.fail(message));
    }

    /// Mark a URL as submitted for fetching.
    pub fn mark_scraped(&self, url: &str) {
        self.upsert(url, |trace| {
            if trace.advance(TraceStatus::Scraped) {
                trace.timing.scraped_at.get_or_insert_with(Utc::now);
            }
        });
    }

    /// Record a successful fetch and its content sizes.
    ///
    /// A fetched document always feeds the extraction, so this also marks
    /// the URL as used and clears any exclusion warning left by a ranking
    /// that saw the same URL through another input.
    pub fn mark_completed(&self, url: &str, raw_length: usize, processed_length: usize) {
        self.update(url, |trace| {
            if trace.is_error() {
                return;
            }
            trace.timing.completed_at.get_or_insert_with(Utc::now);
            trace.content_stats = Some(ContentStats {
                raw_content_length: raw_length,
                processed_content_length: processed_length,
                tokens_used: 0,
            });
            trace.used_in_completion = true;
            if matches!(
                trace.warning.as_deref(),
                Some(RANKING_LIMIT_WARNING | BELOW_THRESHOLD_WARNING)
            ) {
                trace.warning = None;
            }
        });
    }

    /// Set whether a URL feeds the extraction. Failed URLs never do.
    pub fn set_used(&self, url: &str, used: bool) {
        self.update(url, |trace| {
            trace.used_in_completion = used && !trace.is_error();
        });
    }

    /// Record a relevance score.
    pub fn set_score(&self, url: &str, score: f32) {
        self.update(url, |trace| trace.relevance_score = Some(score));
    }

    /// Attach a warning and drop the URL from the extraction input.
    ///
    /// A URL already accepted through another input keeps its place.
    pub fn exclude(&self, url: &str, warning: impl Into<String>) {
        let warning = warning.into();
        self.update(url, |trace| {
            if trace.used_in_completion {
                return;
            }
            trace.warning = Some(warning);
        });
    }

    /// Record tokens attributed to a URL's content.
    pub fn set_tokens(&self, url: &str, tokens: u64) -> bool {
        self.update(url, |trace| {
            if let Some(stats) = trace.content_stats.as_mut() {
                stats.tokens_used = tokens;
            }
        })
    }

    /// Current trace for a URL.
    pub fn get(&self, url: &str) -> Option<UrlTrace> {
        self.lock().get(&url_key(url)).cloned()
    }

    /// Copy of every trace, in first-seen order.
    pub fn snapshot(&self) -> Vec<UrlTrace> {
        self.lock().values().cloned().collect()
    }

    /// Number of distinct URLs.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no URL has been recorded.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
