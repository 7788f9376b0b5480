//! LLM prompts for the extraction pipeline.

use sha2::{Digest, Sha256};

/// Grounding instruction appended to every extraction system prompt.
///
/// The comma-separated list of resolved links follows it.
pub const GROUNDING_PROMPT: &str = "Always prioritize using the provided content to answer the question. Do not make up an answer. Be concise and follow the schema always if provided. Here are the urls the user provided of which he wants to extract information from: ";

/// System prompt for rephrasing an extraction prompt into a search query.
pub const REPHRASE_PROMPT: &str = r#"You are a search query optimizer. Rewrite the user's extraction request as a short search query (a few keywords) that would find the pages containing the requested information on a website.

Reply with the query only. No quotes, no explanation."#;

/// Build the full extraction system prompt.
pub fn format_system_prompt(prefix: Option<&str>, links: &[String]) -> String {
    let mut prompt = String::new();
    if let Some(prefix) = prefix.map(str::trim).filter(|p| !p.is_empty()) {
        prompt.push_str(prefix);
        prompt.push('\n');
    }
    prompt.push_str(GROUNDING_PROMPT);
    prompt.push_str(&links.join(", "));
    prompt
}

/// Fingerprint of an extraction's instructions.
///
/// Same system prompt, prompt and schema give the same hash, so runs can be
/// correlated in logs.
pub fn extraction_prompt_hash(
    system_prompt: &str,
    prompt: Option<&str>,
    schema: Option<&serde_json::Value>,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(system_prompt.as_bytes());
    hasher.update([0]);
    hasher.update(prompt.unwrap_or("").as_bytes());
    hasher.update([0]);
    if let Some(schema) = schema {
        hasher.update(schema.to_string().as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_system_prompt() {
        let links = vec!["https://a.com".to_string(), "https://b.com".to_string()];
        let prompt = format_system_prompt(Some("You are a recruiter."), &links);

        assert!(prompt.starts_with("You are a recruiter.\nAlways prioritize"));
        assert!(prompt.ends_with("https://a.com, https://b.com"));
    }

    #[test]
    fn test_format_system_prompt_without_prefix() {
        let prompt = format_system_prompt(Some("  "), &[]);
        assert_eq!(prompt, GROUNDING_PROMPT);
    }

    #[test]
    fn test_extraction_prompt_hash() {
        let schema = serde_json::json!({"type": "object"});
        let a = extraction_prompt_hash("sys", Some("find"), Some(&schema));
        let b = extraction_prompt_hash("sys", Some("find"), Some(&schema));
        let c = extraction_prompt_hash("sys", Some("find"), None);

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
    }
}
