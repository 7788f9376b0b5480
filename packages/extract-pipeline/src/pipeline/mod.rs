//! Extraction pipeline - the core of the library.
//!
//! The pipeline orchestrates:
//! - Resolution (literal URLs, site patterns through discovery)
//! - Relevance filtering with a cascading acceptance policy
//! - Fetch dispatch through the job queue, isolating per-URL failures
//! - Aggregation (structured extraction + token attribution)
//! - The trace ledger recording every URL's journey

pub mod aggregate;
pub mod dispatch;
pub mod ledger;
pub mod orchestrator;
pub mod prompts;
pub mod relevance;
pub mod resolve;

pub use aggregate::{aggregate, attribute_tokens, build_context, unwrap_data, wrap_schema};
pub use dispatch::Dispatcher;
pub use ledger::{TraceLedger, BELOW_THRESHOLD_WARNING, RANKING_LIMIT_WARNING};
pub use orchestrator::{dedupe, Extractor};
pub use prompts::{extraction_prompt_hash, format_system_prompt, GROUNDING_PROMPT, REPHRASE_PROMPT};
pub use relevance::{apply_cascade, build_query, filter_candidates, rank, Ranking};
pub use resolve::Resolver;
