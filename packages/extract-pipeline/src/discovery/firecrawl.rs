//! Firecrawl map API discovery.
//!
//! Calls `POST /map`, which returns the links of a site ranked by the
//! search query.
//!
//! # Example
//!
//! ```rust,ignore
//! use extract_pipeline::discovery::FirecrawlDiscovery;
//!
//! let discovery = FirecrawlDiscovery::from_env()?;
//! ```

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{ServiceError, ServiceResult};
use crate::security::ApiCredentials;
use crate::traits::discovery::{DiscoverOptions, Discovery, DiscoveryResult};

/// Default Firecrawl API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.firecrawl.dev/v1";

/// Environment variable holding the API key.
pub const API_KEY_VAR: &str = "FIRECRAWL_API_KEY";

/// Discovery backed by the Firecrawl map endpoint.
#[derive(Clone)]
pub struct FirecrawlDiscovery {
    client: Client,
    credentials: ApiCredentials,
}

impl FirecrawlDiscovery {
    /// Create a discovery client with an API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_credentials(ApiCredentials::new(api_key, DEFAULT_BASE_URL))
    }

    /// Create from environment variable `FIRECRAWL_API_KEY`.
    pub fn from_env() -> ServiceResult<Self> {
        Ok(Self::with_credentials(ApiCredentials::from_env(
            API_KEY_VAR,
            DEFAULT_BASE_URL,
        )?))
    }

    /// Create with explicit credentials.
    pub fn with_credentials(credentials: ApiCredentials) -> Self {
        Self {
            client: Client::new(),
            credentials,
        }
    }

    /// Set a custom base URL (self-hosted instances, proxies).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.credentials = self.credentials.with_base_url(url);
        self
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
            let message = response.text().await.unwrap_or_default();
            return Err(ServiceError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let text = response
            .text()
            .await
            .map_err(|e| ServiceError::Http(Box::new(e)))?;
        Ok(serde_json::from_str(&text)?)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MapRequest<'a> {
    url: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    search: Option<&'a str>,
    include_subdomains: bool,
    ignore_sitemap: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    limit: Option<usize>,
}

impl<'a> MapRequest<'a> {
    fn from_options(options: &'a DiscoverOptions) -> Self {
        Self {
            url: &options.base_url,
            search: options.query.as_deref(),
            include_subdomains: options.include_subdomains,
            ignore_sitemap: false,
            limit: options.limit,
        }
    }
}

#[derive(Debug, Deserialize)]
struct MapResponse {
    success: bool,
    #[serde(default)]
    links: Vec<String>,
    #[serde(default)]
    error: Option<String>,
}

impl MapResponse {
    fn into_result(self) -> ServiceResult<DiscoveryResult> {
        if !self.success {
            return Err(ServiceError::InvalidResponse(
                self.error.unwrap_or_else(|| "map request was not successful".into()),
            ));
        }
        Ok(DiscoveryResult::from_links(self.links))
    }
}

#[async_trait]
impl Discovery for FirecrawlDiscovery {
    async fn discover(&self, options: &DiscoverOptions) -> ServiceResult<DiscoveryResult> {
        debug!(base_url = %options.base_url, query = ?options.query, "Mapping site");

        let response: MapResponse = self.post("map", &MapRequest::from_options(options)).await?;
        let result = response.into_result()?;

        info!(base_url = %options.base_url, links = result.len(), "Site mapped");
        Ok(result)
    }

    fn name(&self) -> &str {
        "firecrawl"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_map_request_body() {
        let options = DiscoverOptions::new("https://example.com")
            .with_query("team members")
            .with_limit(50);

        let body = serde_json::to_value(MapRequest::from_options(&options)).unwrap();

        assert_eq!(
            body,
            json!({
                "url": "https://example.com",
                "search": "team members",
                "includeSubdomains": true,
                "ignoreSitemap": false,
                "limit": 50
            })
        );
    }

    #[test]
    fn test_map_request_omits_empty_fields() {
        let options = DiscoverOptions::new("https://example.com");
        let body = serde_json::to_value(MapRequest::from_options(&options)).unwrap();
        assert!(body.get("search").is_none());
        assert!(body.get("limit").is_none());
    }

    #[test]
    fn test_map_response() {
        let response: MapResponse = serde_json::from_value(json!({
            "success": true,
            "links": ["https://example.com/a", "https://example.com/b"]
        }))
        .unwrap();
        let result = response.into_result().unwrap();
        assert_eq!(result.raw_links.len(), 2);
        assert!(result.candidate_links.is_empty());

        let failed: MapResponse =
            serde_json::from_value(json!({"success": false, "error": "quota exceeded"})).unwrap();
        assert!(matches!(
            failed.into_result(),
            Err(ServiceError::InvalidResponse(m)) if m == "quota exceeded"
        ));
    }

    #[test]
    fn test_debug_does_not_leak_key() {
        let discovery = FirecrawlDiscovery::new("fc-secret");
        assert!(!format!("{:?}", discovery.credentials).contains("fc-secret"));
    }
}
