//! Core trait abstractions for the extraction pipeline.
//!
//! These traits define the external collaborators the pipeline sequences:
//! discovery, relevance scoring, the fetch queue, dispatch priority,
//! completion, blocklist, billing and job logging.

pub mod ai;
pub mod billing;
pub mod blocklist;
pub mod discovery;
pub mod priority;
pub mod queue;
pub mod scorer;
