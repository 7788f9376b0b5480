//! Extraction aggregation.
//!
//! Concatenates the fetched documents, runs structured extraction over
//! them and attributes the reported token usage back to each source URL.

use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::error::{ExtractError, Result};
use crate::pipeline::{
    ledger::TraceLedger,
    prompts::{extraction_prompt_hash, format_system_prompt},
};
use crate::traits::ai::{Completion, CompletionRequest, AI};
use crate::types::{document::FetchedDocument, request::ExtractRequest};

/// Property an array schema is wrapped under.
pub const ARRAY_WRAPPER_KEY: &str = "items";

/// Join document renderings into one extraction context.
pub fn build_context(documents: &[FetchedDocument]) -> String {
    documents
        .iter()
        .map(FetchedDocument::render)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Wrap a top-level array schema in an object.
///
/// Structured output requires an object at the root. Returns the schema to
/// send and whether the result must be unwrapped.
pub fn wrap_schema(schema: Option<&Value>) -> (Option<Value>, bool) {
    match schema {
        Some(schema) if schema.get("type").and_then(Value::as_str) == Some("array") => (
            Some(json!({
                "type": "object",
                "properties": { ARRAY_WRAPPER_KEY: schema },
                "required": [ARRAY_WRAPPER_KEY],
            })),
            true,
        ),
        other => (other.cloned(), false),
    }
}

/// Undo [`wrap_schema`] on extracted data.
pub fn unwrap_data(data: Option<Value>, wrapped: bool) -> Option<Value> {
    match data {
        Some(Value::Object(mut map)) if wrapped => map.remove(ARRAY_WRAPPER_KEY),
        other => other,
    }
}

/// Split `total` tokens across documents by raw content length.
///
/// `floor(total * len_i / sum(len))`; the remainder is dropped. Shares are
/// keyed by the URL the document was fetched for, so a redirected source
/// still lands on its trace. Documents without a source URL get nothing but
/// still count towards the sum.
pub fn attribute_tokens(total: u64, documents: &[FetchedDocument]) -> Vec<(String, u64)> {
    let sum: u128 = documents
        .iter()
        .map(|d| d.raw_content_length() as u128)
        .sum();

    documents
        .iter()
        .filter_map(|d| {
            let source = d.source_url()?;
            let url = d.requested_url().unwrap_or(source);
            let share = match sum {
                0 => 0,
                sum => total as u128 * d.raw_content_length() as u128 / sum,
            };
            Some((url.to_string(), share as u64))
        })
        .collect()
}

/// Run structured extraction over fetched documents.
///
/// `links` are the resolved URLs, listed in the system prompt.
pub async fn aggregate(
    documents: &[FetchedDocument],
    links: &[String],
    request: &ExtractRequest,
    ai: &dyn AI,
    ledger: &TraceLedger,
) -> Result<Completion> {
    let (schema, wrapped) = wrap_schema(request.schema.as_ref());
    let completion_request = CompletionRequest {
        system_prompt: format_system_prompt(request.system_prompt.as_deref(), links),
        prompt: request.prompt().map(str::to_string),
        schema,
        context: build_context(documents),
    };

    let prompt_hash = extraction_prompt_hash(
        &completion_request.system_prompt,
        completion_request.prompt.as_deref(),
        completion_request.schema.as_ref(),
    );
    debug!(
        documents = documents.len(),
        prompt_hash = %prompt_hash,
        context_len = completion_request.context.len(),
        wrapped_schema = wrapped,
        "Running structured extraction"
    );

    let mut completion = ai
        .extract(&completion_request)
        .await
        .map_err(ExtractError::Completion)?;
    completion.data = unwrap_data(completion.data.take(), wrapped);

    for (url, tokens) in attribute_tokens(completion.tokens_used, documents) {
        if !ledger.set_tokens(&url, tokens) {
            warn!(url = %url, tokens, "No trace for document; tokens not attributed");
        }
    }

    info!(
        documents = documents.len(),
        tokens_used = completion.tokens_used,
        prompt_hash = %prompt_hash,
        "Extraction complete"
    );
    Ok(completion)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockAI;
    use proptest::prelude::*;

    #[test]
    fn test_attribute_tokens_proportional() {
        let docs = vec![
            FetchedDocument::new("https://a.com", "x".repeat(100)),
            FetchedDocument::new("https://b.com", "x".repeat(300)),
        ];
        assert_eq!(
            attribute_tokens(40, &docs),
            vec![("https://a.com".to_string(), 10), ("https://b.com".to_string(), 30)]
        );
    }

    #[test]
    fn test_attribute_tokens_drops_remainder() {
        let docs = vec![
            FetchedDocument::new("https://a.com", "x"),
            FetchedDocument::new("https://b.com", "x"),
            FetchedDocument::new("https://c.com", "x"),
        ];
        let shares = attribute_tokens(10, &docs);
        assert!(shares.iter().all(|(_, t)| *t == 3));
        assert_eq!(shares.iter().map(|(_, t)| t).sum::<u64>(), 9);
    }

    #[test]
    fn test_attribute_tokens_skips_unsourced() {
        let docs = vec![
            FetchedDocument::new("https://a.com", "x".repeat(100)),
            FetchedDocument::new("https://b.com", "x".repeat(100)).without_source(),
        ];
        assert_eq!(attribute_tokens(40, &docs), vec![("https://a.com".to_string(), 20)]);
    }

    #[test]
    fn test_attribute_tokens_uses_raw_length() {
        let docs = vec![
            FetchedDocument::new("https://a.com", "x".repeat(10)).with_raw_content_length(300),
            FetchedDocument::new("https://b.com", "x".repeat(10)).with_raw_content_length(100),
        ];
        assert_eq!(
            attribute_tokens(40, &docs),
            vec![("https://a.com".to_string(), 30), ("https://b.com".to_string(), 10)]
        );
    }

    #[test]
    fn test_attribute_tokens_follows_requested_url() {
        let docs = vec![FetchedDocument::new("https://www.a.com/home", "x")
            .with_requested_url("https://a.com")];
        assert_eq!(attribute_tokens(40, &docs), vec![("https://a.com".to_string(), 40)]);
    }

    #[test]
    fn test_attribute_tokens_empty_content() {
        let docs = vec![FetchedDocument::new("https://a.com", "")];
        assert_eq!(attribute_tokens(40, &docs), vec![("https://a.com".to_string(), 0)]);
    }

    #[test]
    fn test_wrap_array_schema() {
        let schema = json!({"type": "array", "items": {"type": "string"}});
        let (wrapped, was_wrapped) = wrap_schema(Some(&schema));

        assert!(was_wrapped);
        let wrapped = wrapped.unwrap();
        assert_eq!(wrapped["type"], "object");
        assert_eq!(wrapped["properties"]["items"], schema);

        let data = unwrap_data(Some(json!({"items": ["a", "b"]})), true);
        assert_eq!(data, Some(json!(["a", "b"])));
    }

    #[test]
    fn test_object_schema_untouched() {
        let schema = json!({"type": "object"});
        assert_eq!(wrap_schema(Some(&schema)), (Some(schema), false));
        assert_eq!(wrap_schema(None), (None, false));
    }

    #[test]
    fn test_build_context_joins_renderings() {
        let docs = vec![
            FetchedDocument::new("https://a.com", "alpha"),
            FetchedDocument::new("https://b.com", "beta"),
        ];
        let context = build_context(&docs);
        assert!(context.starts_with("alpha"));
        assert!(context.contains("URL: https://a.com\n\nbeta"));
    }

    #[tokio::test]
    async fn test_aggregate_attributes_tokens() {
        let ledger = TraceLedger::new();
        for (url, len) in [("https://a.com", 100), ("https://b.com", 300)] {
            ledger.record(url);
            ledger.mark_scraped(url);
            ledger.mark_completed(url, len, len);
        }
        let docs = vec![
            FetchedDocument::new("https://a.com", "x".repeat(100)),
            FetchedDocument::new("https://b.com", "x".repeat(300)),
        ];
        let ai = MockAI::new().with_completion(json!({"name": "Acme"}), 40);
        let request = ExtractRequest::new(["https://a.com"])
            .with_prompt("company name")
            .with_system_prompt("Be exact.");
        let links = vec!["https://a.com".to_string(), "https://b.com".to_string()];

        let completion = aggregate(&docs, &links, &request, &ai, &ledger).await.unwrap();

        assert_eq!(completion.data, Some(json!({"name": "Acme"})));
        let tokens = |url: &str| ledger.get(url).unwrap().content_stats.unwrap().tokens_used;
        assert_eq!(tokens("https://a.com"), 10);
        assert_eq!(tokens("https://b.com"), 30);

        let seen = ai.extract_requests();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].system_prompt.starts_with("Be exact.\n"));
        assert!(seen[0].system_prompt.ends_with("https://a.com, https://b.com"));
        assert_eq!(seen[0].prompt.as_deref(), Some("company name"));
    }

    #[tokio::test]
    async fn test_aggregate_attributes_redirected_document() {
        let ledger = TraceLedger::new();
        ledger.record("https://a.com");
        ledger.mark_scraped("https://a.com");
        ledger.mark_completed("https://a.com", 50, 50);
        let docs = vec![FetchedDocument::new("https://www.a.com/en/", "x".repeat(50))
            .with_requested_url("https://a.com")];
        let ai = MockAI::new().with_completion(json!({"name": "Acme"}), 25);
        let request = ExtractRequest::new(["https://a.com"]).with_prompt("company name");
        let links = vec!["https://a.com".to_string()];

        aggregate(&docs, &links, &request, &ai, &ledger).await.unwrap();

        let trace = ledger.get("https://a.com").unwrap();
        assert_eq!(trace.content_stats.unwrap().tokens_used, 25);
        assert!(ledger.get("https://www.a.com/en/").is_none());
    }

    #[tokio::test]
    async fn test_aggregate_completion_failure() {
        let ai = MockAI::new().failing_extract();
        let request = ExtractRequest::new(["https://a.com"]).with_prompt("x");

        let result = aggregate(&[], &[], &request, &ai, &TraceLedger::new()).await;

        assert!(matches!(result, Err(ExtractError::Completion(_))));
    }

    proptest! {
        #[test]
        fn attributed_tokens_never_exceed_total(
            total in 0u64..1_000_000,
            lengths in prop::collection::vec(0usize..5_000, 1..8),
        ) {
            let docs: Vec<_> = lengths
                .iter()
                .enumerate()
                .map(|(i, len)| FetchedDocument::new(format!("https://{}.com", i), "x".repeat(*len)))
                .collect();

            let shares = attribute_tokens(total, &docs);
            prop_assert_eq!(shares.len(), docs.len());

            let sum: u64 = shares.iter().map(|(_, t)| t).sum();
            prop_assert!(sum <= total);
            // Floor loses less than one token per document
            if lengths.iter().any(|l| *l > 0) {
                prop_assert!(total - sum < docs.len() as u64);
            }
        }
    }
}
