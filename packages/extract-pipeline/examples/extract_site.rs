//! Extract Site - end-to-end run against real services
//!
//! Resolves a URL or site pattern, fetches the relevant pages with the
//! in-process queue and prints the extraction response as JSON.
//!
//! Uses OpenAI for rephrasing, relevance embeddings and extraction. Site
//! patterns are discovered from the base page's links, or with the
//! Firecrawl map API when built with the `firecrawl` feature.
//!
//! ```bash
//! OPENAI_API_KEY=sk-... cargo run --example extract_site --features openai -- \
//!     "https://example.com/*" "Who are the founders?"
//! ```

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use extract_pipeline::{
    error::ServiceResult, Billing, ChannelSink, EmbeddingScorer, ExtractRequest, Extractor,
    HttpFetcher, JobLogger, JobQueueExt, JobRecord, LocalQueue, OpenAI, RequestContext,
};

/// Billing that only logs deductions.
struct LogBilling;

#[async_trait]
impl Billing for LogBilling {
    async fn deduct(
        &self,
        account_id: &str,
        subscription_id: Option<String>,
        amount: u64,
    ) -> ServiceResult<()> {
        tracing::info!(account_id, ?subscription_id, amount, "Credits deducted");
        Ok(())
    }
}

/// Job log that only logs records.
struct LogJobs;

#[async_trait]
impl JobLogger for LogJobs {
    async fn record_job(&self, record: &JobRecord) -> ServiceResult<()> {
        tracing::info!(
            job_id = %record.job_id,
            num_docs = record.num_docs,
            num_tokens = record.num_tokens,
            time_taken = record.time_taken,
            "Job recorded"
        );
        Ok(())
    }
}

#[cfg(feature = "firecrawl")]
fn discovery() -> Result<Arc<dyn extract_pipeline::Discovery>> {
    Ok(Arc::new(
        extract_pipeline::FirecrawlDiscovery::from_env().context("Failed to configure Firecrawl")?,
    ))
}

#[cfg(not(feature = "firecrawl"))]
fn discovery() -> Result<Arc<dyn extract_pipeline::Discovery>> {
    Ok(Arc::new(
        extract_pipeline::PageLinkDiscovery::new().context("Failed to build HTTP client")?,
    ))
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,extract_pipeline=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut args = std::env::args().skip(1);
    let (Some(url), Some(prompt)) = (args.next(), args.next()) else {
        bail!("usage: extract_site <url or pattern> <prompt>");
    };

    let ai = OpenAI::from_env().context("Failed to configure OpenAI")?;
    let fetcher = HttpFetcher::new().context("Failed to build HTTP client")?;
    let queue = LocalQueue::new(fetcher, 4).rate_limited_with_burst(5, 10);

    let (events, worker) = ChannelSink::spawn(Arc::new(LogBilling), Arc::new(LogJobs));

    let extractor = Extractor::new(
        discovery()?,
        Arc::new(EmbeddingScorer::new(ai.clone())),
        Arc::new(queue),
        Arc::new(ai),
    )
    .with_events(Arc::new(events));

    let request = ExtractRequest::new([url])
        .with_prompt(prompt)
        .with_timeout_ms(60_000)
        .with_origin("example");
    let response = extractor
        .extract(&RequestContext::new("local"), request)
        .await;

    println!("{}", serde_json::to_string_pretty(&response)?);

    // Closing the sink lets the worker drain and stop
    drop(extractor);
    worker.await.context("Event worker panicked")?;

    if !response.success {
        bail!(
            "extraction failed with status {}",
            response.status_code()
        );
    }
    Ok(())
}
