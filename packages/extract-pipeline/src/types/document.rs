//! Candidate links and fetched documents.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Identity key for deduplication: lowercase, no trailing slash.
pub fn url_key(url: &str) -> String {
    url.trim().trim_end_matches('/').to_lowercase()
}

/// Host of a URL with a leading `www.` removed.
pub fn host_without_www(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let host = parsed.host_str()?;
    Some(host.strip_prefix("www.").unwrap_or(host).to_string())
}

/// A URL found by discovery, with whatever context the discovery service had.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CandidateLink {
    pub url: String,

    #[serde(default)]
    pub title: Option<String>,

    #[serde(default)]
    pub description: Option<String>,
}

impl CandidateLink {
    /// Create a bare candidate.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: None,
            description: None,
        }
    }

    /// Set the title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Dedup key.
    pub fn key(&self) -> String {
        url_key(&self.url)
    }

    /// Text sent to the relevance scorer.
    pub fn scoring_text(&self) -> String {
        let mut text = self.url.clone();
        for part in [&self.title, &self.description].into_iter().flatten() {
            if !part.trim().is_empty() {
                text.push(' ');
                text.push_str(part.trim());
            }
        }
        text
    }
}

/// Metadata the fetch collaborator attaches to a document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMetadata {
    #[serde(rename = "sourceURL", default)]
    pub source_url: Option<String>,

    #[serde(default)]
    pub title: Option<String>,

    #[serde(default)]
    pub status_code: Option<u16>,

    #[serde(flatten, default)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// Metadata key for the page size before conversion to markdown.
pub const RAW_CONTENT_LENGTH_KEY: &str = "rawContentLength";

/// Content returned by a fetch job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchedDocument {
    /// Page content, usually markdown
    pub content: String,

    pub metadata: DocumentMetadata,

    #[serde(default = "Utc::now")]
    pub fetched_at: DateTime<Utc>,

    /// URL the fetch job was submitted for. Set by the dispatcher.
    #[serde(skip)]
    pub requested_url: Option<String>,
}

impl FetchedDocument {
    /// Create a document for a source URL.
    pub fn new(source_url: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            metadata: DocumentMetadata {
                source_url: Some(source_url.into()),
                ..Default::default()
            },
            fetched_at: Utc::now(),
            requested_url: None,
        }
    }

    /// Set the title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.metadata.title = Some(title.into());
        self
    }

    /// Drop the source URL (as some fetchers do on redirects).
    pub fn without_source(mut self) -> Self {
        self.metadata.source_url = None;
        self
    }

    /// Record the raw page size reported by the fetcher.
    pub fn with_raw_content_length(mut self, length: usize) -> Self {
        self.metadata
            .extra
            .insert(RAW_CONTENT_LENGTH_KEY.to_string(), length.into());
        self
    }

    /// Record the URL the document was fetched for.
    pub fn with_requested_url(mut self, url: impl Into<String>) -> Self {
        self.requested_url = Some(url.into());
        self
    }

    /// Content length in bytes.
    pub fn content_length(&self) -> usize {
        self.content.len()
    }

    /// Page size before processing, falling back to the content length.
    pub fn raw_content_length(&self) -> usize {
        self.metadata
            .extra
            .get(RAW_CONTENT_LENGTH_KEY)
            .and_then(serde_json::Value::as_u64)
            .map_or(self.content_length(), |n| n as usize)
    }

    /// Source URL, if the fetcher reported one.
    pub fn source_url(&self) -> Option<&str> {
        self.metadata.source_url.as_deref()
    }

    /// URL the document was fetched for, if known.
    pub fn requested_url(&self) -> Option<&str> {
        self.requested_url.as_deref()
    }

    /// Render for the extraction context: content plus minimal metadata.
    pub fn render(&self) -> String {
        let mut rendered = self.content.clone();
        rendered.push_str("\n\n---\n");
        if let Some(url) = &self.metadata.source_url {
            rendered.push_str(&format!("URL: {}\n", url));
        }
        if let Some(title) = &self.metadata.title {
            rendered.push_str(&format!("Title: {}\n", title));
        }
        rendered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_key_normalizes() {
        assert_eq!(url_key("https://Example.com/About/"), "https://example.com/about");
        assert_eq!(url_key("https://example.com/about"), "https://example.com/about");
    }

    #[test]
    fn test_host_without_www() {
        assert_eq!(
            host_without_www("https://www.example.com/a"),
            Some("example.com".to_string())
        );
        assert_eq!(
            host_without_www("https://docs.example.com"),
            Some("docs.example.com".to_string())
        );
        assert_eq!(host_without_www("nope"), None);
    }

    #[test]
    fn test_scoring_text() {
        let link = CandidateLink::new("https://example.com/team")
            .with_title("Our Team")
            .with_description("  ");
        assert_eq!(link.scoring_text(), "https://example.com/team Our Team");
    }

    #[test]
    fn test_document_metadata_wire_name() {
        let doc: FetchedDocument = serde_json::from_str(
            r#"{"content": "hi", "metadata": {"sourceURL": "https://a.com", "ogImage": "x"}}"#,
        )
        .unwrap();
        assert_eq!(doc.source_url(), Some("https://a.com"));
        assert_eq!(doc.metadata.extra.get("ogImage"), Some(&serde_json::json!("x")));
    }

    #[test]
    fn test_raw_content_length() {
        let doc = FetchedDocument::new("https://a.com", "short");
        assert_eq!(doc.raw_content_length(), 5);

        let doc = doc.with_raw_content_length(2048);
        assert_eq!(doc.raw_content_length(), 2048);
        assert_eq!(doc.content_length(), 5);

        let wire: FetchedDocument = serde_json::from_str(
            r#"{"content": "hi", "metadata": {"sourceURL": "https://a.com", "rawContentLength": 90}}"#,
        )
        .unwrap();
        assert_eq!(wire.raw_content_length(), 90);
        assert_eq!(wire.requested_url(), None);
    }

    #[test]
    fn test_render_includes_source() {
        let doc = FetchedDocument::new("https://a.com", "# Hello").with_title("Home");
        let rendered = doc.render();
        assert!(rendered.starts_with("# Hello"));
        assert!(rendered.contains("URL: https://a.com"));
        assert!(rendered.contains("Title: Home"));
    }
}
