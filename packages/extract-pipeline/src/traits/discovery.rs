//! Discovery trait: expand a base URL into candidate links.

use async_trait::async_trait;

use crate::error::ServiceResult;
use crate::types::document::CandidateLink;

/// What to discover.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoverOptions {
    /// Base URL with any pattern suffix removed
    pub base_url: String,

    /// Search query used to bias discovery (the rephrased prompt)
    pub query: Option<String>,

    /// Follow subdomains of the base host
    pub include_subdomains: bool,

    /// Allow links that leave the base host
    pub allow_external_links: bool,

    /// Upper bound forwarded to the discovery service
    pub limit: Option<usize>,
}

impl DiscoverOptions {
    /// Create options for a base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            query: None,
            include_subdomains: true,
            allow_external_links: false,
            limit: None,
        }
    }

    /// Set the query.
    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    /// Set the limit.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// What discovery found.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiscoveryResult {
    /// Links with title/description context
    pub candidate_links: Vec<CandidateLink>,

    /// Bare links (e.g. from a sitemap)
    pub raw_links: Vec<String>,
}

impl DiscoveryResult {
    /// Create a result from bare links.
    pub fn from_links(links: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            candidate_links: Vec::new(),
            raw_links: links.into_iter().map(|l| l.into()).collect(),
        }
    }

    /// Add a candidate with context.
    pub fn with_candidate(mut self, link: CandidateLink) -> Self {
        self.candidate_links.push(link);
        self
    }

    /// Total links reported.
    pub fn len(&self) -> usize {
        self.candidate_links.len() + self.raw_links.len()
    }

    /// Whether nothing was found.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Site discovery service (site map, search-backed map, crawler).
#[async_trait]
pub trait Discovery: Send + Sync {
    /// Discover links under `options.base_url`.
    async fn discover(&self, options: &DiscoverOptions) -> ServiceResult<DiscoveryResult>;

    /// Get the discovery name (for logging/debugging).
    fn name(&self) -> &str {
        "unknown"
    }
}
