//! Fetch dispatch: one queue job per resolved URL, all in parallel.
//!
//! A failed or timed-out job marks its URL's trace and is left out; its
//! siblings carry on. Only a systemic queue failure
//! ([`QueueError::Upstream`]) ends the request.

use futures::future::join_all;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{ExtractError, QueueError, QueueResult, Result};
use crate::pipeline::ledger::TraceLedger;
use crate::traits::{
    priority::PriorityPolicy,
    queue::{FetchJob, JobQueue},
};
use crate::types::{
    config::PipelineConfig,
    document::FetchedDocument,
    request::{ExtractRequest, RequestContext},
};

/// Dispatches fetch jobs for one request.
pub struct Dispatcher<'a> {
    pub queue: &'a dyn JobQueue,
    pub priority: &'a dyn PriorityPolicy,
    pub config: &'a PipelineConfig,
    pub ledger: &'a TraceLedger,
}

impl<'a> Dispatcher<'a> {
    /// Fetch every URL concurrently and return the documents that arrived.
    ///
    /// Zero documents is a valid outcome.
    pub async fn dispatch(
        &self,
        urls: &[String],
        ctx: &RequestContext,
        request: &ExtractRequest,
    ) -> Result<Vec<FetchedDocument>> {
        let results = join_all(urls.iter().map(|url| async move {
            let result = self.fetch_one(url, ctx, request).await;
            (url, result)
        }))
        .await;

        let mut documents = Vec::with_capacity(results.len());
        let mut upstream = None;

        for (url, result) in results {
            match result {
                Ok(doc) => {
                    self.ledger
                        .mark_completed(url, doc.raw_content_length(), doc.content_length());
                    documents.push(doc.with_requested_url(url.as_str()));
                }
                Err(e) => {
                    warn!(url = %url, error = %e, "Fetch failed");
                    self.ledger.mark_error(url, e.to_string());
                    if let QueueError::Upstream { status, message } = e {
                        upstream.get_or_insert((status, message));
                    }
                }
            }
        }

        if let Some((status, message)) = upstream {
            return Err(ExtractError::Upstream { status, message });
        }

        info!(
            queue = self.queue.name(),
            requested = urls.len(),
            fetched = documents.len(),
            "Fetch dispatch complete"
        );
        Ok(documents)
    }

    async fn fetch_one(
        &self,
        url: &str,
        ctx: &RequestContext,
        request: &ExtractRequest,
    ) -> QueueResult<FetchedDocument> {
        self.ledger.mark_scraped(url);

        let timeout = self.config.fetch_timeout(request.timeout);
        let priority = self
            .priority
            .compute_priority(ctx.plan, &ctx.account_id, self.config.base_priority)
            .await;

        let id = Uuid::new_v4();
        let timeout_ms = timeout.as_millis() as u64;
        let job = FetchJob::new(url, &ctx.account_id)
            .with_plan(ctx.plan)
            .with_origin(&request.origin);

        debug!(url = %url, job_id = %id, priority, timeout_ms, "Submitting fetch job");

        let result = match self.queue.submit(job, id, priority).await {
            Ok(()) => self.queue.await_result(id, timeout).await,
            Err(e) => Err(e),
        };

        self.queue.release(id).await;
        result
    }
}
