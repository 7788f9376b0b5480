//! URL resolution: turn one input URL into concrete URLs to fetch.
//!
//! Literal URLs resolve to themselves after a blocklist check. Site
//! patterns (and every URL when external links are allowed) go through
//! discovery, dedup, the candidate cap and, when a prompt is present,
//! relevance filtering.
//!
//! Failures are recorded on the input URL's trace and resolve to nothing;
//! they never abort the other inputs.

use std::collections::HashSet;
use tracing::{debug, info, warn};

use crate::error::{ResolveError, ResolveResult};
use crate::pipeline::{ledger::TraceLedger, relevance};
use crate::traits::{
    ai::AI,
    blocklist::Blocklist,
    discovery::{DiscoverOptions, Discovery, DiscoveryResult},
    scorer::Scorer,
};
use crate::types::{
    config::PipelineConfig,
    document::CandidateLink,
    request::{base_url, is_site_pattern, ExtractRequest},
};

/// Resolves input URLs for one request.
pub struct Resolver<'a> {
    pub discovery: &'a dyn Discovery,
    pub scorer: &'a dyn Scorer,
    pub ai: &'a dyn AI,
    pub blocklist: &'a dyn Blocklist,
    pub config: &'a PipelineConfig,
    pub ledger: &'a TraceLedger,
}

impl<'a> Resolver<'a> {
    /// Resolve one input URL, recording any failure on its trace.
    pub async fn resolve(&self, url: &str, request: &ExtractRequest) -> Vec<String> {
        self.ledger.record(url);

        match self.try_resolve(url, request).await {
            Ok(urls) => {
                debug!(url = %url, resolved = urls.len(), "Resolved input URL");
                urls
            }
            Err(e) => {
                warn!(url = %url, error = %e, "Failed to resolve URL");
                self.ledger.mark_error(url, e.to_string());
                Vec::new()
            }
        }
    }

    async fn try_resolve(&self, url: &str, request: &ExtractRequest) -> ResolveResult<Vec<String>> {
        if !is_site_pattern(url) && !request.allow_external_links {
            if self.blocklist.is_blocked(url) {
                return Err(ResolveError::Blocked { url: url.to_string() });
            }
            self.ledger.set_used(url, true);
            return Ok(vec![url.to_string()]);
        }

        let base = base_url(url);
        if url::Url::parse(&base).is_err() {
            return Err(ResolveError::InvalidUrl { url: base });
        }

        let prompt = request.prompt();
        let mut options = DiscoverOptions::new(&base);
        options.include_subdomains = request.include_subdomains;
        options.allow_external_links = request.allow_external_links;
        options.limit = request.limit;
        if let Some(prompt) = prompt {
            options.query = Some(self.rephrase(prompt).await);
        }

        let discovered = self
            .discovery
            .discover(&options)
            .await
            .map_err(ResolveError::Discovery)?;
        info!(
            base_url = %base,
            discovery = self.discovery.name(),
            links = discovered.len(),
            "Discovered links"
        );

        let mut candidates = self.merge(discovered);
        if candidates.is_empty() {
            if self.blocklist.is_blocked(&base) {
                return Err(ResolveError::Blocked { url: base });
            }
            debug!(base_url = %base, "Discovery found nothing; falling back to base URL");
            self.ledger.record(&base);
            candidates.push(CandidateLink::new(&base));
        }
        candidates.truncate(self.config.max_candidates);

        let accepted = match prompt {
            Some(prompt) if candidates.len() > 1 => {
                let query = relevance::build_query(Some(prompt), &base, request.allow_external_links);
                relevance::filter_candidates(
                    &query,
                    &candidates,
                    self.scorer,
                    self.blocklist,
                    self.config,
                    self.ledger,
                )
                .await?
            }
            _ => {
                for candidate in &candidates {
                    self.ledger.set_used(&candidate.url, true);
                }
                candidates
            }
        };

        Ok(accepted.into_iter().map(|c| c.url).collect())
    }

    /// Rephrase the prompt into a search query, falling back to the prompt.
    async fn rephrase(&self, prompt: &str) -> String {
        match self.ai.rephrase_query(prompt).await {
            Ok(query) if !query.trim().is_empty() => query.trim().to_string(),
            Ok(_) => prompt.to_string(),
            Err(e) => {
                warn!(error = %e, "Query rephrase failed; using prompt as query");
                prompt.to_string()
            }
        }
    }

    /// Merge candidate and raw links, dropping duplicates and blocked URLs.
    ///
    /// Every newly seen URL gets a mapped trace; blocked ones are marked
    /// as errors.
    fn merge(&self, discovered: DiscoveryResult) -> Vec<CandidateLink> {
        let DiscoveryResult {
            candidate_links,
            raw_links,
        } = discovered;

        let mut seen = HashSet::new();
        let mut merged = Vec::new();

        for link in candidate_links
            .into_iter()
            .chain(raw_links.into_iter().map(CandidateLink::new))
        {
            if link.url.trim().is_empty() || !seen.insert(link.key()) {
                continue;
            }
            self.ledger.record(&link.url);

            if self.blocklist.is_blocked(&link.url) {
                self.ledger
                    .mark_error(&link.url, ResolveError::Blocked { url: link.url.clone() }.to_string());
                continue;
            }
            merged.push(link);
        }

        merged
    }
}
