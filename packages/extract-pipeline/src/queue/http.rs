//! HTTP-based fetcher implementation.
//!
//! Fetches a page with a plain GET and reduces its HTML to markdown. For
//! JavaScript-heavy sites put a rendering scraper behind [`JobQueue`]
//! instead.
//!
//! [`JobQueue`]: crate::traits::queue::JobQueue

use async_trait::async_trait;
use chrono::Utc;
use regex::Regex;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{ServiceError, ServiceResult};
use crate::queue::Fetcher;
use crate::traits::queue::FetchJob;
use crate::types::document::{DocumentMetadata, FetchedDocument};

/// Ordered HTML-to-markdown rewrite rules.
static MARKDOWN_RULES: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (r"(?is)<script[^>]*>.*?</script>", ""),
        (r"(?is)<style[^>]*>.*?</style>", ""),
        (r"(?is)<h1[^>]*>(.*?)</h1>", "# $1\n"),
        (r"(?is)<h2[^>]*>(.*?)</h2>", "## $1\n"),
        (r"(?is)<h3[^>]*>(.*?)</h3>", "### $1\n"),
        (r"(?is)<p[^>]*>(.*?)</p>", "$1\n\n"),
        (r"(?i)<br\s*/?>", "\n"),
        (r#"(?is)<a[^>]*href=["']([^"']+)["'][^>]*>(.*?)</a>"#, "[$2]($1)"),
        (r"(?is)<li[^>]*>(.*?)</li>", "- $1\n"),
        (r"<[^>]+>", ""),
        (r"\n{3,}", "\n\n"),
    ]
    .into_iter()
    .filter_map(|(pattern, replacement)| Regex::new(pattern).ok().map(|re| (re, replacement)))
    .collect()
});

/// Page chrome removed when only main content is requested.
static CHROME: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    ["nav", "header", "footer", "aside"]
        .into_iter()
        .filter_map(|tag| Regex::new(&format!(r"(?is)<{tag}[^>]*>.*?</{tag}>")).ok())
        .collect()
});

static TITLE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").ok());

/// Fetcher that GETs pages over HTTP.
///
/// # Example
///
/// ```rust,ignore
/// let queue = LocalQueue::new(HttpFetcher::new()?, 8);
/// ```
pub struct HttpFetcher {
    client: reqwest::Client,
    user_agent: String,
}

impl HttpFetcher {
    /// Create a fetcher with a 30 second request timeout.
    pub fn new() -> ServiceResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ServiceError::Http(Box::new(e)))?;
        Ok(Self::with_client(client))
    }

    /// Create a fetcher around an existing client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client,
            user_agent: "ExtractPipeline/1.0".to_string(),
        }
    }

    /// Set a custom user agent.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, job: &FetchJob) -> ServiceResult<FetchedDocument> {
        debug!(url = %job.url, "HTTP fetch starting");
        let response = self
            .client
            .get(&job.url)
            .header("User-Agent", &self.user_agent)
            .send()
            .await
            .map_err(|e| {
                warn!(url = %job.url, error = %e, "HTTP request failed");
                ServiceError::Http(Box::new(e))
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ServiceError::Api {
                status: status.as_u16(),
                message: format!("HTTP {} fetching {}", status, job.url),
            });
        }

        // Capture final URL after redirects
        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let html = response
            .text()
            .await
            .map_err(|e| ServiceError::Http(Box::new(e)))?;

        let document = page_document(
            &job.url,
            &final_url,
            status.as_u16(),
            content_type,
            &html,
            job.scrape_options.only_main_content,
        );
        debug!(
            url = %job.url,
            raw_content_length = html.len(),
            content_length = document.content_length(),
            "Page fetched successfully"
        );
        Ok(document)
    }

    fn name(&self) -> &str {
        "http"
    }
}

/// Build a document from a fetched HTML page.
///
/// The raw HTML size is kept in the metadata next to the markdown content.
pub fn page_document(
    url: &str,
    final_url: &str,
    status_code: u16,
    content_type: Option<String>,
    html: &str,
    only_main_content: bool,
) -> FetchedDocument {
    let mut metadata = DocumentMetadata {
        source_url: Some(url.to_string()),
        title: extract_title(html),
        status_code: Some(status_code),
        ..Default::default()
    };
    metadata.extra.insert("url".to_string(), final_url.into());
    if let Some(ct) = content_type {
        metadata.extra.insert("contentType".to_string(), ct.into());
    }

    FetchedDocument {
        content: html_to_markdown(html, only_main_content),
        metadata,
        fetched_at: Utc::now(),
        requested_url: None,
    }
    .with_raw_content_length(html.len())
}

/// Convert HTML to markdown (simplified).
pub fn html_to_markdown(html: &str, only_main_content: bool) -> String {
    let mut text = html.to_string();

    if only_main_content {
        for re in CHROME.iter() {
            text = re.replace_all(&text, "").into_owned();
        }
    }

    for (re, replacement) in MARKDOWN_RULES.iter() {
        text = re.replace_all(&text, *replacement).into_owned();
    }

    // Decode HTML entities
    text = text
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&");

    text.trim().to_string()
}

/// Extract title from HTML.
pub fn extract_title(html: &str) -> Option<String> {
    TITLE
        .as_ref()?
        .captures(html)
        .and_then(|cap| cap.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_html_to_markdown() {
        let html = r#"
            <h1>Title</h1>
            <p>Paragraph text.</p>
            <a href="https://example.com">Link</a>
            <ul><li>One</li><li>Two &amp; three</li></ul>
        "#;

        let md = html_to_markdown(html, false);

        assert!(md.contains("# Title"));
        assert!(md.contains("Paragraph text."));
        assert!(md.contains("[Link](https://example.com)"));
        assert!(md.contains("- One"));
        assert!(md.contains("- Two & three"));
        assert!(!md.contains('<'));
    }

    #[test]
    fn test_main_content_strips_chrome() {
        let html = r#"<nav><a href="/">Home</a></nav><p>Body</p><footer>Copyright</footer>"#;

        let main = html_to_markdown(html, true);
        assert_eq!(main, "Body");

        let full = html_to_markdown(html, false);
        assert!(full.contains("Copyright"));
        assert!(full.contains("[Home](/)"));
    }

    #[test]
    fn test_scripts_removed() {
        let html = "<script>var x = '<p>no</p>';</script><p>yes</p>";
        assert_eq!(html_to_markdown(html, false), "yes");
    }

    #[test]
    fn test_page_document_keeps_raw_size() {
        let html = "<html><head><title>Team</title></head><body><nav>Menu</nav><p>Ada</p></body></html>";
        let doc = page_document(
            "https://acme.com/team",
            "https://www.acme.com/team",
            200,
            Some("text/html".to_string()),
            html,
            true,
        );

        assert!(doc.content.ends_with("Ada"));
        assert!(!doc.content.contains("Menu"));
        assert_eq!(doc.raw_content_length(), html.len());
        assert!(doc.content_length() < doc.raw_content_length());
        assert_eq!(doc.source_url(), Some("https://acme.com/team"));
        assert_eq!(doc.metadata.title.as_deref(), Some("Team"));
        assert_eq!(
            doc.metadata.extra.get("url"),
            Some(&serde_json::json!("https://www.acme.com/team"))
        );
    }

    #[test]
    fn test_extract_title() {
        let html = "<html><head><title> Page Title </title></head></html>";
        assert_eq!(extract_title(html), Some("Page Title".to_string()));
        assert_eq!(extract_title("<html><body>No title</body></html>"), None);
    }
}
