//! AI trait for LLM operations.
//!
//! The AI trait abstracts the completion capabilities the pipeline needs:
//! - Rephrasing the user's prompt into a discovery search query
//! - Structured extraction grounded in fetched content

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ServiceResult;

/// Input to a structured extraction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionRequest {
    /// Full system prompt (caller prefix + grounding instruction)
    pub system_prompt: String,

    /// What to extract
    pub prompt: Option<String>,

    /// JSON schema the output must follow
    pub schema: Option<serde_json::Value>,

    /// Concatenated document renderings
    pub context: String,
}

/// Output of a structured extraction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Completion {
    /// Extracted data
    pub data: Option<serde_json::Value>,

    /// Non-fatal note from the model (e.g. truncated context)
    pub warning: Option<String>,

    /// Total tokens consumed by the call
    pub tokens_used: u64,
}

impl Completion {
    /// Create a completion with data and a token count.
    pub fn new(data: serde_json::Value, tokens_used: u64) -> Self {
        Self {
            data: Some(data),
            warning: None,
            tokens_used,
        }
    }

    /// Attach a warning.
    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warning = Some(warning.into());
        self
    }
}

/// AI trait for LLM operations.
///
/// Implementations wrap specific LLM providers (OpenAI, Anthropic, etc.)
/// and handle the specifics of prompting and response parsing.
#[async_trait]
pub trait AI: Send + Sync {
    /// Rephrase an extraction prompt into a short search query.
    ///
    /// An empty answer is treated as "no rephrase" by the pipeline.
    async fn rephrase_query(&self, prompt: &str) -> ServiceResult<String>;

    /// Extract structured data from the provided context.
    async fn extract(&self, request: &CompletionRequest) -> ServiceResult<Completion>;
}
