//! AI implementations for the extraction pipeline.
//!
//! This module provides reference implementations of the `AI` and
//! `Embedder` traits. Users can use these directly or implement their own.

#[cfg(feature = "openai")]
mod openai;

#[cfg(feature = "openai")]
pub use openai::{OpenAI, TRUNCATED_WARNING};
