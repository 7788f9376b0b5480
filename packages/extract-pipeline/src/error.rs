//! Typed errors for the extraction pipeline.
//!
//! Uses `thiserror` for library errors (not `anyhow`) to provide
//! strongly-typed, composable error handling.
//!
//! Errors fall in two families:
//! - per-URL errors (`ResolveError`, `QueueError` other than `Upstream`) are
//!   recorded in the trace ledger and never abort the request
//! - terminal errors (`ExtractError`) end the request, always with whatever
//!   trace ledger was accumulated attached to the response

use thiserror::Error;

/// Boxed error used for opaque collaborator failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Terminal outcomes that end an extraction request.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// Request body failed validation; the pipeline never started
    #[error("invalid request: {0}")]
    Validation(#[from] ValidationError),

    /// No URL survived resolution across all inputs
    #[error("No valid URLs found to scrape. Try adjusting your search criteria or including more URLs.")]
    NoLinks,

    /// The fetch stage failed systemically (e.g. queue unavailable)
    #[error("{message}")]
    Upstream { status: u16, message: String },

    /// The structured-extraction collaborator failed
    #[error("extraction failed: {0}")]
    Completion(#[source] ServiceError),
}

impl ExtractError {
    /// HTTP-style status for this outcome.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) | Self::NoLinks => 400,
            Self::Upstream { status, .. } => *status,
            Self::Completion(_) => 500,
        }
    }
}

/// Malformed request body.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// `urls` is empty
    #[error("at least one URL is required")]
    NoUrls,

    /// More URLs than the configured maximum
    #[error("too many URLs: {count} (max {max})")]
    TooManyUrls { count: usize, max: usize },

    /// URL could not be parsed
    #[error("invalid URL: {url}")]
    InvalidUrl { url: String },

    /// URL scheme is not http(s)
    #[error("unsupported URL scheme '{scheme}' in {url}")]
    UnsupportedScheme { url: String, scheme: String },

    /// Neither prompt nor schema were given
    #[error("either 'schema' or 'prompt' must be provided")]
    MissingInstructions,

    /// `limit` was zero
    #[error("limit must be greater than zero")]
    ZeroLimit,
}

/// Per-URL resolution failures, recorded on the URL's trace.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// URL is on the blocklist
    #[error("URL is blocked")]
    Blocked { url: String },

    /// URL (or the base URL of a pattern) could not be parsed
    #[error("invalid URL: {url}")]
    InvalidUrl { url: String },

    /// Discovery collaborator failed
    #[error("discovery failed: {0}")]
    Discovery(#[source] ServiceError),

    /// Relevance scorer failed
    #[error("relevance scoring failed: {0}")]
    Scoring(#[source] ServiceError),
}

/// Errors reported by the fetch queue.
#[derive(Debug, Error)]
pub enum QueueError {
    /// Waiting for the job exceeded the timeout
    #[error("job {job_id} timed out after {timeout_ms}ms")]
    Timeout { job_id: String, timeout_ms: u64 },

    /// The job ran and failed
    #[error("job failed: {0}")]
    JobFailed(String),

    /// No job with this id is known to the queue
    #[error("unknown job: {0}")]
    UnknownJob(String),

    /// The job was released before it finished
    #[error("job {0} was cancelled")]
    Cancelled(String),

    /// The queue itself is unavailable or rejected the request
    #[error("{message}")]
    Upstream { status: u16, message: String },
}

impl QueueError {
    /// Whether this error affects the whole batch rather than one URL.
    pub fn is_systemic(&self) -> bool {
        matches!(self, Self::Upstream { .. })
    }
}

/// Failures of external collaborators (discovery, scorer, AI, billing, ...).
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Transport failed
    #[error("HTTP error: {0}")]
    Http(#[source] BoxError),

    /// Service answered with a non-success status
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    /// Service answered with something we could not interpret
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Service is not configured or not reachable
    #[error("service unavailable: {0}")]
    Unavailable(String),

    /// JSON parsing error
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),
}

/// Blocklist rejections.
#[derive(Debug, Error)]
pub enum SecurityError {
    /// URL scheme not allowed (e.g., file://, ftp://)
    #[error("disallowed URL scheme: {0}")]
    DisallowedScheme(String),

    /// Host is blocked (e.g., localhost, internal IPs)
    #[error("blocked host: {0}")]
    BlockedHost(String),

    /// IP in blocked CIDR range (e.g., 10.0.0.0/8)
    #[error("blocked IP range: {0}")]
    BlockedCidr(String),

    /// Host matches a blocked domain
    #[error("blocked domain: {0}")]
    BlockedDomain(String),

    /// URL has no host
    #[error("URL has no host")]
    NoHost,

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),
}

/// Result type alias for terminal pipeline operations.
pub type Result<T> = std::result::Result<T, ExtractError>;

/// Result type alias for collaborator calls.
pub type ServiceResult<T> = std::result::Result<T, ServiceError>;

/// Result type alias for queue operations.
pub type QueueResult<T> = std::result::Result<T, QueueError>;

/// Result type alias for blocklist checks.
pub type SecurityResult<T> = std::result::Result<T, SecurityError>;

/// Result type alias for per-URL resolution.
pub type ResolveResult<T> = std::result::Result<T, ResolveError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(ExtractError::NoLinks.status_code(), 400);
        assert_eq!(
            ExtractError::Validation(ValidationError::NoUrls).status_code(),
            400
        );
        assert_eq!(
            ExtractError::Upstream {
                status: 503,
                message: "queue down".into()
            }
            .status_code(),
            503
        );
        assert_eq!(
            ExtractError::Completion(ServiceError::Unavailable("llm".into())).status_code(),
            500
        );
    }

    #[test]
    fn test_only_upstream_is_systemic() {
        assert!(QueueError::Upstream {
            status: 502,
            message: "bad gateway".into()
        }
        .is_systemic());
        assert!(!QueueError::JobFailed("boom".into()).is_systemic());
        assert!(!QueueError::Timeout {
            job_id: "j".into(),
            timeout_ms: 10
        }
        .is_systemic());
    }

    #[test]
    fn test_blocked_message() {
        let err = ResolveError::Blocked {
            url: "https://facebook.com".into(),
        };
        assert_eq!(err.to_string(), "URL is blocked");
    }
}
