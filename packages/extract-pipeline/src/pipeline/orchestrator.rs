//! The Extractor - main entry point for the extraction pipeline.
//!
//! One call to [`Extractor::extract`] runs a whole request:
//!
//! 1. validate the request
//! 2. resolve every input URL in parallel (discovery + relevance filtering)
//! 3. flatten and dedupe the resolved URLs
//! 4. fetch them in parallel through the job queue
//! 5. run structured extraction and attribute token usage
//! 6. emit billing and job-log events without waiting on them
//!
//! The trace ledger is attached to every response, including failures.

use chrono::Utc;
use futures::future::join_all;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{ExtractError, Result};
use crate::events::{DiscardSink, EventSink, PipelineEvent};
use crate::pipeline::{
    aggregate::aggregate, dispatch::Dispatcher, ledger::TraceLedger, resolve::Resolver,
};
use crate::traits::{
    ai::{Completion, AI},
    billing::JobRecord,
    blocklist::{Blocklist, UrlBlocklist},
    discovery::Discovery,
    priority::{PriorityPolicy, TierPriority},
    queue::JobQueue,
    scorer::Scorer,
};
use crate::types::{
    config::PipelineConfig,
    document::url_key,
    request::{ExtractRequest, RequestContext},
    response::ExtractResponse,
};

/// Job-log mode for extraction requests.
const JOB_MODE: &str = "extract";

/// Orchestrates discovery, filtering, fetching and extraction.
///
/// # Example
///
/// ```rust,ignore
/// let extractor = Extractor::new(discovery, scorer, queue, ai)
///     .with_events(Arc::new(sink));
///
/// let request = ExtractRequest::new(["https://example.com/*"])
///     .with_prompt("Names and roles of the leadership team");
/// let response = extractor.extract(&RequestContext::new("team-1"), request).await;
/// ```
#[derive(Clone)]
pub struct Extractor {
    discovery: Arc<dyn Discovery>,
    scorer: Arc<dyn Scorer>,
    queue: Arc<dyn JobQueue>,
    ai: Arc<dyn AI>,
    priority: Arc<dyn PriorityPolicy>,
    blocklist: Arc<dyn Blocklist>,
    events: Arc<dyn EventSink>,
    config: PipelineConfig,
}

impl Extractor {
    /// Create an extractor with default priority, blocklist and a discarding event sink.
    pub fn new(
        discovery: Arc<dyn Discovery>,
        scorer: Arc<dyn Scorer>,
        queue: Arc<dyn JobQueue>,
        ai: Arc<dyn AI>,
    ) -> Self {
        Self {
            discovery,
            scorer,
            queue,
            ai,
            priority: Arc::new(TierPriority::new()),
            blocklist: Arc::new(UrlBlocklist::with_default_domains()),
            events: Arc::new(DiscardSink),
            config: PipelineConfig::default(),
        }
    }

    /// Set the priority policy.
    pub fn with_priority(mut self, priority: Arc<dyn PriorityPolicy>) -> Self {
        self.priority = priority;
        self
    }

    /// Set the blocklist.
    pub fn with_blocklist(mut self, blocklist: Arc<dyn Blocklist>) -> Self {
        self.blocklist = blocklist;
        self
    }

    /// Set the event sink for billing and job logging.
    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Set the pipeline configuration.
    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Get a reference to the configuration.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run an extraction request to completion.
    ///
    /// Never fails: terminal errors become an unsuccessful response that
    /// still carries the trace ledger.
    pub async fn extract(&self, ctx: &RequestContext, request: ExtractRequest) -> ExtractResponse {
        let scrape_id = Uuid::new_v4();
        let ledger = TraceLedger::new();

        match self.run(scrape_id, ctx, &request, &ledger).await {
            Ok(completion) => ExtractResponse::completed(
                scrape_id,
                completion.data,
                completion.warning,
                ledger.snapshot(),
            ),
            Err(e) => {
                warn!(
                    scrape_id = %scrape_id,
                    status = e.status_code(),
                    error = %e,
                    traces = ledger.len(),
                    "Extraction failed"
                );
                ExtractResponse::failed(scrape_id, &e, ledger.snapshot())
            }
        }
    }

    async fn run(
        &self,
        scrape_id: Uuid,
        ctx: &RequestContext,
        request: &ExtractRequest,
        ledger: &TraceLedger,
    ) -> Result<Completion> {
        let started = Instant::now();
        request.validate(self.config.max_input_urls)?;

        info!(
            scrape_id = %scrape_id,
            account_id = %ctx.account_id,
            urls = request.urls.len(),
            "Starting extraction"
        );

        let links = self.resolve_all(request, ledger).await;
        if links.is_empty() {
            return Err(ExtractError::NoLinks);
        }

        let dispatcher = Dispatcher {
            queue: self.queue.as_ref(),
            priority: self.priority.as_ref(),
            config: &self.config,
            ledger,
        };
        let documents = dispatcher.dispatch(&links, ctx, request).await?;

        let completion = aggregate(&documents, &links, request, self.ai.as_ref(), ledger).await?;

        self.emit_side_effects(scrape_id, ctx, request, &links, documents.len(), &completion, started);

        info!(
            scrape_id = %scrape_id,
            links = links.len(),
            documents = documents.len(),
            tokens_used = completion.tokens_used,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Extraction complete"
        );
        Ok(completion)
    }

    /// Resolve every input URL in parallel and dedupe the results.
    async fn resolve_all(&self, request: &ExtractRequest, ledger: &TraceLedger) -> Vec<String> {
        let resolver = Resolver {
            discovery: self.discovery.as_ref(),
            scorer: self.scorer.as_ref(),
            ai: self.ai.as_ref(),
            blocklist: self.blocklist.as_ref(),
            config: &self.config,
            ledger,
        };

        let resolved = join_all(request.urls.iter().map(|url| resolver.resolve(url, request))).await;
        dedupe(resolved.into_iter().flatten())
    }

    #[allow(clippy::too_many_arguments)]
    fn emit_side_effects(
        &self,
        scrape_id: Uuid,
        ctx: &RequestContext,
        request: &ExtractRequest,
        links: &[String],
        num_docs: usize,
        completion: &Completion,
        started: Instant,
    ) {
        self.events.emit(PipelineEvent::Billing {
            account_id: ctx.account_id.clone(),
            subscription_id: ctx.subscription_id.clone(),
            credits: links.len() as u64 * self.config.credits_per_link,
        });

        self.events.emit(PipelineEvent::JobCompleted(JobRecord {
            job_id: scrape_id,
            success: true,
            message: "Extract completed".to_string(),
            num_docs,
            docs: completion.data.iter().cloned().collect(),
            time_taken: started.elapsed().as_secs_f64(),
            account_id: ctx.account_id.clone(),
            mode: JOB_MODE.to_string(),
            url: request.urls.join(", "),
            origin: request.origin.clone(),
            num_tokens: completion.tokens_used,
            recorded_at: Utc::now(),
        }));
    }
}

/// Drop URLs whose [`url_key`] was already seen, keeping first spellings.
pub fn dedupe(urls: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    urls.into_iter()
        .filter(|url| seen.insert(url_key(url)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_dedupe() {
        let urls = dedupe(
            [
                "https://a.com/x",
                "https://A.com/x/",
                "https://a.com/y",
            ]
            .map(String::from),
        );
        assert_eq!(urls, vec!["https://a.com/x", "https://a.com/y"]);
    }

    proptest! {
        #[test]
        fn prop_dedupe_has_unique_keys(
            paths in prop::collection::vec((0..8u8, any::<bool>(), any::<bool>()), 0..40)
        ) {
            let urls: Vec<String> = paths
                .iter()
                .map(|(n, upper, slash)| {
                    let host = if *upper { "A.COM" } else { "a.com" };
                    format!("https://{}/{}{}", host, n, if *slash { "/" } else { "" })
                })
                .collect();
            let distinct: HashSet<String> = urls.iter().map(|u| url_key(u)).collect();

            let deduped = dedupe(urls);
            let keys: HashSet<String> = deduped.iter().map(|u| url_key(u)).collect();

            prop_assert_eq!(keys.len(), deduped.len());
            prop_assert_eq!(keys, distinct);
        }
    }
}
