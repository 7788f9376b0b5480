//! OpenAI implementation of the AI and Embedder traits.
//!
//! A reference implementation using gpt-4o-mini for rephrasing and
//! extraction and text-embedding-3-small for relevance scoring.
//!
//! # Example
//!
//! ```rust,ignore
//! use extract_pipeline::ai::OpenAI;
//!
//! let ai = OpenAI::from_env()?.with_model("gpt-4o");
//! let scorer = EmbeddingScorer::new(ai.clone());
//! ```

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::error::{ServiceError, ServiceResult};
use crate::pipeline::prompts::REPHRASE_PROMPT;
use crate::security::ApiCredentials;
use crate::traits::ai::{Completion, CompletionRequest, AI};
use crate::traits::scorer::Embedder;

/// Default OpenAI API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Warning attached when the model stopped at its output limit.
pub const TRUNCATED_WARNING: &str = "The extraction output was truncated by the model's token limit.";

/// OpenAI-based AI implementation.
#[derive(Clone)]
pub struct OpenAI {
    client: Client,
    credentials: ApiCredentials,
    model: String,
    embedding_model: String,
}

impl OpenAI {
    /// Create a new OpenAI client with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_credentials(ApiCredentials::new(api_key, DEFAULT_BASE_URL))
    }

    /// Create from environment variable `OPENAI_API_KEY`.
    pub fn from_env() -> ServiceResult<Self> {
        Ok(Self::with_credentials(ApiCredentials::from_env(
            "OPENAI_API_KEY",
            DEFAULT_BASE_URL,
        )?))
    }

    /// Create with explicit credentials.
    pub fn with_credentials(credentials: ApiCredentials) -> Self {
        Self {
            client: Client::new(),
            credentials,
            model: "gpt-4o-mini".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
        }
    }

    /// Set the chat model (default: gpt-4o-mini).
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the embedding model (default: text-embedding-3-small).
    pub fn with_embedding_model(mut self, model: impl Into<String>) -> Self {
        self.embedding_model = model.into();
        self
    }

    /// Set a custom base URL (for Azure, proxies, etc.).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.credentials = self.credentials.with_base_url(url);
        self
    }

    /// Get the current model name.
    pub fn model(&self) -> &str {
        &self.model
    }

    async fn post<B: Serialize, R: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &B,
    ) -> ServiceResult<R> {
        let response = self
            .client
            .post(self.credentials.endpoint(path))
            .header("Authorization", self.credentials.bearer())
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| ServiceError::Http(Box::new(e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), path, "OpenAI request failed");
            return Err(ServiceError::Api {
                status: status.as_u16(),
                message: format!("OpenAI error: {}", error_text),
            });
        }

        response
            .json()
            .await
            .map_err(|e| ServiceError::InvalidResponse(e.to_string()))
    }

    async fn chat(&self, request: &ChatRequest) -> ServiceResult<(ChatChoice, u64)> {
        let response: ChatResponse = self.post("chat/completions", request).await?;
        let tokens = response.usage.map(|u| u.total_tokens).unwrap_or(0);

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ServiceError::InvalidResponse("No response from OpenAI".into()))?;
        Ok((choice, tokens))
    }
}

/// Build the chat request for a structured extraction.
fn extraction_request(model: &str, request: &CompletionRequest) -> ChatRequest {
    let mut user = String::new();
    if let Some(prompt) = &request.prompt {
        user.push_str(prompt);
        user.push_str("\n\n");
    }
    user.push_str("Content:\n");
    user.push_str(&request.context);

    let response_format = match &request.schema {
        Some(schema) => json!({
            "type": "json_schema",
            "json_schema": {
                "name": "extraction",
                "strict": false,
                "schema": schema,
            }
        }),
        None => json!({ "type": "json_object" }),
    };

    ChatRequest {
        model: model.to_string(),
        messages: vec![
            ChatMessage::new("system", &request.system_prompt),
            ChatMessage::new("user", user),
        ],
        temperature: Some(0.0),
        response_format: Some(response_format),
    }
}

/// Turn the model's answer into a completion.
fn parse_completion(choice: ChatChoice, tokens_used: u64) -> ServiceResult<Completion> {
    let content = choice.message.content.unwrap_or_default();
    let data: Value = serde_json::from_str(strip_code_fence(&content))?;

    let mut completion = Completion::new(data, tokens_used);
    if choice.finish_reason.as_deref() == Some("length") {
        completion = completion.with_warning(TRUNCATED_WARNING);
    }
    Ok(completion)
}

fn strip_code_fence(content: &str) -> &str {
    content
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
}

#[async_trait]
impl AI for OpenAI {
    async fn rephrase_query(&self, prompt: &str) -> ServiceResult<String> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage::new("system", REPHRASE_PROMPT),
                ChatMessage::new("user", prompt),
            ],
            temperature: Some(0.0),
            response_format: None,
        };

        let (choice, _) = self.chat(&request).await?;
        let query = choice.message.content.unwrap_or_default().trim().to_string();
        debug!(prompt, query = %query, "Rephrased prompt");
        Ok(query)
    }

    async fn extract(&self, request: &CompletionRequest) -> ServiceResult<Completion> {
        let chat_request = extraction_request(&self.model, request);
        debug!(
            model = %self.model,
            context_length = request.context.len(),
            has_schema = request.schema.is_some(),
            "Running extraction"
        );

        let (choice, tokens) = self.chat(&chat_request).await?;
        parse_completion(choice, tokens)
    }
}

#[async_trait]
impl Embedder for OpenAI {
    async fn embed(&self, text: &str) -> ServiceResult<Vec<f32>> {
        let mut embeddings = self.embed_batch(&[text.to_string()]).await?;
        embeddings
            .pop()
            .ok_or_else(|| ServiceError::InvalidResponse("No embedding returned".into()))
    }

    async fn embed_batch(&self, texts: &[String]) -> ServiceResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = EmbeddingRequest {
            model: self.embedding_model.clone(),
            input: texts.to_vec(),
        };
        let response: EmbeddingResponse = self.post("embeddings", &request).await?;

        let mut data = response.data;
        data.sort_by_key(|d| d.index);
        Ok(data.into_iter().map(|d| d.embedding).collect())
    }
}

// =============================================================================
// API types
// =============================================================================

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<Value>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

impl ChatMessage {
    fn new(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    total_tokens: u64,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest {
    model: String,
    input: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}
