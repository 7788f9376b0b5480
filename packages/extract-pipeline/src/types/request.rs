//! Extraction request and caller context.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Wildcard suffix marking a site-wide pattern (`https://example.com/*`).
pub const PATTERN_SUFFIX: &str = "/*";

/// An extraction request as submitted by the caller.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractRequest {
    /// Literal URLs or site patterns
    pub urls: Vec<String>,

    /// What to extract, in natural language
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,

    /// JSON schema the extracted data should follow
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<serde_json::Value>,

    /// Prefix for the extraction system prompt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,

    /// Treat every URL as a discovery root, even literal ones
    #[serde(default)]
    pub allow_external_links: bool,

    /// Let discovery follow subdomains
    #[serde(default = "default_include_subdomains")]
    pub include_subdomains: bool,

    /// Discovery limit forwarded to the discovery collaborator
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,

    /// Request timeout in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,

    /// Where the request came from (recorded in the job log)
    #[serde(default = "default_origin")]
    pub origin: String,
}

fn default_include_subdomains() -> bool {
    true
}

fn default_origin() -> String {
    "api".to_string()
}

impl ExtractRequest {
    /// Create a request for the given URLs.
    pub fn new(urls: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            urls: urls.into_iter().map(|u| u.into()).collect(),
            include_subdomains: true,
            origin: default_origin(),
            ..Default::default()
        }
    }

    /// Set the prompt.
    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    /// Set the schema.
    pub fn with_schema(mut self, schema: serde_json::Value) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Set the system prompt prefix.
    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }

    /// Allow external links.
    pub fn allow_external_links(mut self) -> Self {
        self.allow_external_links = true;
        self
    }

    /// Set the request timeout.
    pub fn with_timeout_ms(mut self, ms: u64) -> Self {
        self.timeout = Some(ms);
        self
    }

    /// Set the discovery limit.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Set the origin.
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = origin.into();
        self
    }

    /// Non-empty prompt, if any.
    pub fn prompt(&self) -> Option<&str> {
        self.prompt
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
    }

    /// Validate the request body.
    pub fn validate(&self, max_urls: usize) -> Result<(), ValidationError> {
        if self.urls.is_empty() {
            return Err(ValidationError::NoUrls);
        }
        if self.urls.len() > max_urls {
            return Err(ValidationError::TooManyUrls {
                count: self.urls.len(),
                max: max_urls,
            });
        }

        for raw in &self.urls {
            let parsed = url::Url::parse(&base_url(raw)).map_err(|_| {
                ValidationError::InvalidUrl { url: raw.clone() }
            })?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(ValidationError::UnsupportedScheme {
                    url: raw.clone(),
                    scheme: parsed.scheme().to_string(),
                });
            }
        }

        if self.prompt().is_none() && self.schema.is_none() {
            return Err(ValidationError::MissingInstructions);
        }

        if self.limit == Some(0) {
            return Err(ValidationError::ZeroLimit);
        }

        Ok(())
    }
}

/// Whether the URL is a site pattern rather than a literal page.
pub fn is_site_pattern(url: &str) -> bool {
    url.contains('*')
}

/// Strip the pattern suffix from a URL.
pub fn base_url(url: &str) -> String {
    url.replace(PATTERN_SUFFIX, "").trim_end_matches('*').to_string()
}

/// Billing plan of the caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanTier {
    #[default]
    Free,
    Hobby,
    Standard,
    Growth,
    Scale,
    Enterprise,
}

/// Who is making the request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestContext {
    /// Account (team) the request is billed to
    pub account_id: String,

    /// Subscription the credits are drawn from
    pub subscription_id: Option<String>,

    /// Plan tier, used for dispatch priority
    pub plan: PlanTier,
}

impl RequestContext {
    /// Create a context for an account on the free plan.
    pub fn new(account_id: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            subscription_id: None,
            plan: PlanTier::Free,
        }
    }

    /// Set the plan tier.
    pub fn with_plan(mut self, plan: PlanTier) -> Self {
        self.plan = plan;
        self
    }

    /// Set the subscription id.
    pub fn with_subscription(mut self, id: impl Into<String>) -> Self {
        self.subscription_id = Some(id.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_defaults_from_json() {
        let request: ExtractRequest = serde_json::from_str(
            r#"{"urls": ["https://example.com/*"], "prompt": "team members"}"#,
        )
        .unwrap();

        assert!(!request.allow_external_links);
        assert!(request.include_subdomains);
        assert_eq!(request.origin, "api");
        assert_eq!(request.prompt(), Some("team members"));
    }

    #[test]
    fn test_camel_case_fields() {
        let request: ExtractRequest = serde_json::from_str(
            r#"{"urls": ["https://a.com"], "schema": {}, "allowExternalLinks": true, "systemPrompt": "be brief"}"#,
        )
        .unwrap();

        assert!(request.allow_external_links);
        assert_eq!(request.system_prompt.as_deref(), Some("be brief"));
    }

    #[test]
    fn test_validate() {
        let ok = ExtractRequest::new(["https://example.com/*"]).with_prompt("x");
        assert!(ok.validate(10).is_ok());

        let empty = ExtractRequest::new(Vec::<String>::new()).with_prompt("x");
        assert_eq!(empty.validate(10), Err(ValidationError::NoUrls));

        let many = ExtractRequest::new(["https://a.com", "https://b.com"]).with_prompt("x");
        assert!(matches!(
            many.validate(1),
            Err(ValidationError::TooManyUrls { count: 2, max: 1 })
        ));

        let bad = ExtractRequest::new(["not a url"]).with_prompt("x");
        assert!(matches!(bad.validate(10), Err(ValidationError::InvalidUrl { .. })));

        let ftp = ExtractRequest::new(["ftp://example.com"]).with_prompt("x");
        assert!(matches!(
            ftp.validate(10),
            Err(ValidationError::UnsupportedScheme { .. })
        ));

        let blank = ExtractRequest::new(["https://a.com"]).with_prompt("   ");
        assert_eq!(blank.validate(10), Err(ValidationError::MissingInstructions));

        let zero = ExtractRequest::new(["https://a.com"])
            .with_prompt("x")
            .with_limit(0);
        assert_eq!(zero.validate(10), Err(ValidationError::ZeroLimit));
    }

    #[test]
    fn test_site_pattern() {
        assert!(is_site_pattern("https://example.com/*"));
        assert!(!is_site_pattern("https://example.com/about"));
        assert_eq!(base_url("https://example.com/*"), "https://example.com");
        assert_eq!(base_url("https://example.com/blog/*"), "https://example.com/blog");
        assert_eq!(base_url("https://example.com"), "https://example.com");
    }
}
