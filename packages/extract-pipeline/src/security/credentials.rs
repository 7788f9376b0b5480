//! API credentials for external services.
//!
//! Keys are held in a [`SecretString`] so they stay out of logs and debug
//! output; they are only exposed when building a request header.

use secrecy::{ExposeSecret, SecretString};
use std::fmt;

use crate::error::{ServiceError, ServiceResult};

/// API key plus endpoint for an external service.
#[derive(Clone)]
pub struct ApiCredentials {
    /// API key (secret)
    pub api_key: SecretString,

    /// API base URL
    pub base_url: String,
}

impl ApiCredentials {
    /// Create credentials for a service.
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            api_key: SecretString::from(api_key.into()),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Read the API key from an environment variable.
    pub fn from_env(var: &str, base_url: impl Into<String>) -> ServiceResult<Self> {
        let api_key = std::env::var(var)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| ServiceError::Unavailable(format!("{} environment variable not set", var)))?;
        Ok(Self::new(api_key, base_url))
    }

    /// Set the base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// `Authorization` header value.
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.api_key.expose_secret())
    }

    /// Full URL for an endpoint path.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

impl fmt::Debug for ApiCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiCredentials")
            .field("api_key", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .finish()
    }
}
