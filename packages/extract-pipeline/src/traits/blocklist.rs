//! Blocklist trait and URL blocklist for SSRF protection and domain policy.

use regex::Regex;
use std::collections::HashSet;
use std::net::IpAddr;

use crate::error::{SecurityError, SecurityResult};

/// Decides whether a URL may be used at all.
pub trait Blocklist: Send + Sync {
    /// Whether the URL is blocked.
    fn is_blocked(&self, url: &str) -> bool;
}

/// Domains that are never scraped by default (social networks).
pub const DEFAULT_BLOCKED_DOMAINS: &[&str] = &[
    "facebook.com",
    "x.com",
    "twitter.com",
    "instagram.com",
    "linkedin.com",
    "pinterest.com",
    "snapchat.com",
    "tiktok.com",
    "whatsapp.com",
];

/// URL blocklist.
///
/// Blocks:
/// - Access to internal services (localhost, 127.0.0.1)
/// - Access to private IP ranges (10.x, 172.16.x, 192.168.x)
/// - Access to cloud metadata services (169.254.x)
/// - Non-HTTP(S) schemes (file://, ftp://)
/// - Configured domains, including their subdomains
#[derive(Debug, Clone)]
pub struct UrlBlocklist {
    /// Allowed URL schemes
    allowed_schemes: HashSet<String>,

    /// Blocked hostnames
    blocked_hosts: HashSet<String>,

    /// Blocked CIDR ranges
    blocked_cidrs: Vec<ipnet::IpNet>,

    /// Blocked domains (host or any subdomain)
    blocked_domains: Vec<Regex>,

    /// Additional allowed hosts (bypass normal validation)
    allowed_hosts: HashSet<String>,
}

impl Default for UrlBlocklist {
    fn default() -> Self {
        Self::new()
    }
}

impl UrlBlocklist {
    /// Create a blocklist with default SSRF rules and no blocked domains.
    pub fn new() -> Self {
        let blocked_cidrs = [
            "10.0.0.0/8",
            "172.16.0.0/12",
            "192.168.0.0/16",
            "169.254.0.0/16", // Link-local / cloud metadata
            "127.0.0.0/8",    // Loopback
            "::1/128",        // IPv6 loopback
            "fc00::/7",       // IPv6 private
            "fe80::/10",      // IPv6 link-local
        ]
        .into_iter()
        .filter_map(|cidr| cidr.parse().ok())
        .collect();

        Self {
            allowed_schemes: ["http", "https"].into_iter().map(String::from).collect(),
            blocked_hosts: [
                "localhost",
                "127.0.0.1",
                "::1",
                "[::1]",
                "0.0.0.0",
                "metadata.google.internal",
                "metadata.gke.internal",
                "instance-data",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            blocked_cidrs,
            blocked_domains: Vec::new(),
            allowed_hosts: HashSet::new(),
        }
    }

    /// Default SSRF rules plus [`DEFAULT_BLOCKED_DOMAINS`].
    pub fn with_default_domains() -> Self {
        DEFAULT_BLOCKED_DOMAINS
            .iter()
            .fold(Self::new(), |list, domain| list.block_domain(*domain))
    }

    /// Add an allowed host (bypasses validation).
    pub fn allow_host(mut self, host: impl Into<String>) -> Self {
        self.allowed_hosts.insert(host.into());
        self
    }

    /// Block an additional host.
    pub fn block_host(mut self, host: impl Into<String>) -> Self {
        self.blocked_hosts.insert(host.into());
        self
    }

    /// Block an additional CIDR range.
    pub fn block_cidr(mut self, cidr: ipnet::IpNet) -> Self {
        self.blocked_cidrs.push(cidr);
        self
    }

    /// Block a domain and all of its subdomains.
    pub fn block_domain(mut self, domain: impl AsRef<str>) -> Self {
        let domain = domain.as_ref().trim().trim_start_matches("www.").to_lowercase();
        let pattern = format!(r"(^|\.){}$", regex::escape(&domain));
        if let Ok(re) = Regex::new(&pattern) {
            self.blocked_domains.push(re);
        }
        self
    }

    /// Validate a URL, returning why it is blocked.
    pub fn validate(&self, url: &str) -> SecurityResult<()> {
        let parsed = url::Url::parse(url)?;

        // Check scheme
        if !self.allowed_schemes.contains(parsed.scheme()) {
            return Err(SecurityError::DisallowedScheme(parsed.scheme().to_string()));
        }

        // Get host
        let host = parsed.host_str().ok_or(SecurityError::NoHost)?.to_lowercase();

        // Check allowed hosts first (bypass other checks)
        if self.allowed_hosts.contains(&host) {
            return Ok(());
        }

        // Check blocked hosts
        if self.blocked_hosts.contains(&host) {
            return Err(SecurityError::BlockedHost(host));
        }

        // Check blocked CIDRs for IP addresses
        let bare = host.trim_start_matches('[').trim_end_matches(']');
        if let Ok(ip) = bare.parse::<IpAddr>() {
            for cidr in &self.blocked_cidrs {
                if cidr.contains(&ip) {
                    return Err(SecurityError::BlockedCidr(ip.to_string()));
                }
            }
        }

        if self.blocked_domains.iter().any(|re| re.is_match(&host)) {
            return Err(SecurityError::BlockedDomain(host));
        }

        Ok(())
    }
}

impl Blocklist for UrlBlocklist {
    fn is_blocked(&self, url: &str) -> bool {
        match self.validate(url) {
            Ok(()) => false,
            Err(e) => {
                tracing::debug!(url = %url, reason = %e, "URL blocked");
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blocks_localhost() {
        let list = UrlBlocklist::new();
        assert!(list.is_blocked("http://localhost/"));
        assert!(list.is_blocked("http://127.0.0.1/"));
        assert!(list.is_blocked("http://[::1]/"));
    }

    #[test]
    fn test_blocks_private_ips() {
        let list = UrlBlocklist::new();
        assert!(list.is_blocked("http://10.0.0.1/"));
        assert!(list.is_blocked("http://172.16.0.1/"));
        assert!(list.is_blocked("http://192.168.1.1/"));
        assert!(list.is_blocked("http://169.254.169.254/"));
    }

    #[test]
    fn test_blocks_non_http_and_garbage() {
        let list = UrlBlocklist::new();
        assert!(list.is_blocked("file:///etc/passwd"));
        assert!(list.is_blocked("ftp://example.com/"));
        assert!(list.is_blocked("not a url"));
    }

    #[test]
    fn test_blocks_domains_and_subdomains() {
        let list = UrlBlocklist::with_default_domains();
        assert!(list.is_blocked("https://facebook.com/acme"));
        assert!(list.is_blocked("https://www.facebook.com/acme"));
        assert!(list.is_blocked("https://m.facebook.com/acme"));
        assert!(!list.is_blocked("https://notfacebook.com/"));
        assert!(!list.is_blocked("https://example.com/"));
    }

    #[test]
    fn test_allowed_hosts_bypass() {
        let list = UrlBlocklist::new().allow_host("localhost");
        assert!(!list.is_blocked("http://localhost/"));
    }
}
