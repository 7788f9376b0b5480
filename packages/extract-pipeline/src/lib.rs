//! Extraction Orchestration Pipeline
//!
//! Turns an extraction request (URLs or site patterns plus a prompt and/or
//! JSON schema) into structured data grounded in the fetched pages.
//!
//! # Pipeline
//!
//! 1. **Resolve** - literal URLs pass through; `https://site.com/*` patterns
//!    are expanded by a discovery service
//! 2. **Filter** - candidates are scored against the prompt and accepted by a
//!    cascading threshold policy (0.75, then 0.5, then best-available)
//! 3. **Dispatch** - every link is fetched through the job queue; per-URL
//!    failures are isolated, upstream failures abort the batch
//! 4. **Aggregate** - one structured extraction over all documents, with the
//!    token cost attributed back to each source
//!
//! Every URL's journey is recorded in a trace returned with the response,
//! successful or not.
//!
//! # Usage
//!
//! ```rust,ignore
//! use extract_pipeline::{Extractor, ExtractRequest, RequestContext};
//!
//! let extractor = Extractor::new(discovery, scorer, queue, ai)
//!     .with_events(events);
//!
//! let request = ExtractRequest::new(["https://example.com/*"])
//!     .with_prompt("Who founded the company?");
//! let response = extractor.extract(&RequestContext::new("acct_1"), request).await;
//! ```
//!
//! # Modules
//!
//! - [`traits`] - Collaborator abstractions (Discovery, Scorer, JobQueue, AI, ...)
//! - [`types`] - Requests, responses, traces and documents
//! - [`pipeline`] - Resolution, filtering, dispatch, aggregation and orchestration
//! - [`queue`] - Job queue implementations (LocalQueue, RateLimitedQueue)
//! - [`discovery`] - Discovery implementations (page links, Firecrawl)
//! - [`events`] - Billing and job-log side effects
//! - [`security`] - Credential handling
//! - [`testing`] - Mock implementations for testing

pub mod discovery;
pub mod error;
pub mod events;
pub mod pipeline;
pub mod queue;
pub mod security;
pub mod testing;
pub mod traits;
pub mod types;

#[cfg(feature = "openai")]
pub mod ai;

// Re-export core types at crate root
pub use error::{
    ExtractError, QueueError, ResolveError, SecurityError, ServiceError, ValidationError,
};
pub use events::{ChannelSink, DiscardSink, EventSink, PipelineEvent};
pub use traits::{
    ai::{Completion, CompletionRequest, AI},
    billing::{Billing, JobLogger, JobRecord},
    blocklist::{Blocklist, UrlBlocklist},
    discovery::{DiscoverOptions, Discovery, DiscoveryResult},
    priority::{PriorityPolicy, TierPriority},
    queue::{FetchJob, JobQueue, ScrapeOptions},
    scorer::{Embedder, EmbeddingScorer, ScoredLink, Scorer},
};
pub use types::{
    config::{AcceptancePolicy, PipelineConfig},
    document::{CandidateLink, DocumentMetadata, FetchedDocument},
    request::{ExtractRequest, PlanTier, RequestContext},
    response::ExtractResponse,
    trace::{ContentStats, TraceStatus, TraceTiming, UrlTrace},
};

// Re-export the orchestrator and ledger
pub use pipeline::{Extractor, TraceLedger};

// Re-export implementations
pub use discovery::PageLinkDiscovery;
pub use queue::{Fetcher, HttpFetcher, JobQueueExt, LocalQueue, RateLimitedQueue};

#[cfg(feature = "firecrawl")]
pub use discovery::FirecrawlDiscovery;

#[cfg(feature = "openai")]
pub use ai::OpenAI;

// Re-export testing utilities
pub use testing::{MockAI, MockDiscovery, MockQueue, MockScorer, RecordingSink, TestScenario};
