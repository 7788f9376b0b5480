//! Discovery from the links on the base page.
//!
//! Fetches the base URL once and returns the links it contains, with their
//! anchor text as title. No crawling beyond the first page.

use async_trait::async_trait;
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

use crate::error::{ServiceError, ServiceResult};
use crate::traits::discovery::{DiscoverOptions, Discovery, DiscoveryResult};
use crate::types::document::CandidateLink;

static ANCHOR: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r#"(?is)<a[^>]*href\s*=\s*["']([^"']+)["'][^>]*>(.*?)</a>"#).ok()
});

static TAG: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"<[^>]+>").ok());

/// Discovery that lists the links on the base page.
pub struct PageLinkDiscovery {
    client: reqwest::Client,
    user_agent: String,
}

impl PageLinkDiscovery {
    /// Create a discovery with a 30 second request timeout.
    pub fn new() -> ServiceResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ServiceError::Http(Box::new(e)))?;
        Ok(Self {
            client,
            user_agent: "ExtractPipeline/1.0".to_string(),
        })
    }

    /// Set a custom user agent.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

/// Whether `link` may be returned for a discovery rooted at `base`.
pub fn should_include(link: &Url, base: &Url, options: &DiscoverOptions) -> bool {
    if !matches!(link.scheme(), "http" | "https") {
        return false;
    }
    if options.allow_external_links {
        return true;
    }

    let base_host = base.host_str().unwrap_or("").trim_start_matches("www.");
    let link_host = link.host_str().unwrap_or("").trim_start_matches("www.");

    link_host == base_host
        || (options.include_subdomains && link_host.ends_with(&format!(".{}", base_host)))
}

/// Extract candidate links from HTML, resolved against `base`.
pub fn extract_links(base: &Url, html: &str, options: &DiscoverOptions) -> Vec<CandidateLink> {
    let (Some(anchor), Some(tag)) = (ANCHOR.as_ref(), TAG.as_ref()) else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for cap in anchor.captures_iter(html) {
        let (Some(href), Some(text)) = (cap.get(1), cap.get(2)) else {
            continue;
        };
        let href = href.as_str().trim();

        // Skip anchors, javascript, mailto
        if href.starts_with('#')
            || href.starts_with("javascript:")
            || href.starts_with("mailto:")
            || href.starts_with("tel:")
        {
            continue;
        }

        let Ok(mut resolved) = base.join(href) else {
            continue;
        };
        resolved.set_fragment(None);
        if !should_include(&resolved, base, options) {
            continue;
        }

        let url = resolved.to_string();
        if !seen.insert(url.clone()) {
            continue;
        }

        let title = tag.replace_all(text.as_str(), "").trim().to_string();
        let mut link = CandidateLink::new(url);
        if !title.is_empty() {
            link = link.with_title(title);
        }
        links.push(link);
    }

    links
}

#[async_trait]
impl Discovery for PageLinkDiscovery {
    async fn discover(&self, options: &DiscoverOptions) -> ServiceResult<DiscoveryResult> {
        let base = Url::parse(&options.base_url)
            .map_err(|e| ServiceError::InvalidResponse(format!("invalid base URL: {}", e)))?;

        debug!(url = %base, "Fetching base page for links");
        let response = self
            .client
            .get(base.clone())
            .header("User-Agent", &self.user_agent)
            .send()
            .await
            .map_err(|e| ServiceError::Http(Box::new(e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ServiceError::Api {
                status: status.as_u16(),
                message: format!("HTTP {} fetching {}", status, base),
            });
        }

        // Resolve relative links against the final URL after redirects
        let final_url = response.url().clone();
        let html = response
            .text()
            .await
            .map_err(|e| ServiceError::Http(Box::new(e)))?;

        let mut links = extract_links(&final_url, &html, options);
        if let Some(limit) = options.limit {
            links.truncate(limit);
        }

        info!(base_url = %options.base_url, links = links.len(), "Discovered page links");
        Ok(DiscoveryResult {
            candidate_links: links,
            raw_links: Vec::new(),
        })
    }

    fn name(&self) -> &str {
        "page-links"
    }
}
