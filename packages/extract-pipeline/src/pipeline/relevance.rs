//! Relevance filtering of discovered candidates.
//!
//! Candidates are scored against a query and accepted through the
//! configured [`AcceptancePolicy`] cascade, then ranked and capped.

use std::collections::HashSet;
use tracing::{debug, info};

use crate::error::{ResolveError, ResolveResult};
use crate::pipeline::ledger::{TraceLedger, BELOW_THRESHOLD_WARNING, RANKING_LIMIT_WARNING};
use crate::traits::{
    blocklist::Blocklist,
    scorer::{ScoredLink, Scorer},
};
use crate::types::{
    config::{AcceptancePolicy, PipelineConfig},
    document::{host_without_www, CandidateLink},
};

/// Build the scoring query for candidates under `url`.
pub fn build_query(prompt: Option<&str>, url: &str, allow_external_links: bool) -> String {
    let host = host_without_www(url).unwrap_or_else(|| url.to_string());
    match prompt {
        Some(prompt) if allow_external_links => format!("{} {}", prompt, host),
        Some(prompt) => format!("{} site:{}", prompt, host),
        None => format!("site:{}", host),
    }
}

/// Ranked result of relevance filtering.
#[derive(Debug, Clone, Default)]
pub struct Ranking {
    /// Accepted and within the cap, best first
    pub accepted: Vec<ScoredLink>,

    /// Accepted but cut by the cap
    pub over_limit: Vec<ScoredLink>,

    /// Never accepted
    pub rejected: Vec<ScoredLink>,

    /// Cascade step that produced the accepted set
    pub policy: Option<AcceptancePolicy>,
}

/// Run the acceptance cascade over scored candidates.
///
/// Each step replaces the accepted set and runs only while fewer than
/// `min_accepted` candidates are accepted. Thresholds are exclusive.
pub fn apply_cascade(
    scored: &[ScoredLink],
    policies: &[AcceptancePolicy],
    min_accepted: usize,
    blocklist: &dyn Blocklist,
) -> (Vec<ScoredLink>, Option<AcceptancePolicy>) {
    let mut accepted = Vec::new();
    let mut applied = None;

    for policy in policies {
        if !accepted.is_empty() && accepted.len() >= min_accepted {
            break;
        }

        accepted = match policy {
            AcceptancePolicy::Threshold { min_score } => scored
                .iter()
                .filter(|s| s.score > *min_score)
                .cloned()
                .collect(),
            AcceptancePolicy::BestAvailable => scored
                .iter()
                .filter(|s| !blocklist.is_blocked(&s.link.url))
                .max_by(|a, b| a.score.total_cmp(&b.score))
                .cloned()
                .into_iter()
                .collect(),
        };
        applied = Some(*policy);
        debug!(policy = %policy.label(), accepted = accepted.len(), "Applied acceptance step");
    }

    (accepted, applied)
}

/// Cascade, sort by score and cap at `config.max_ranked`.
pub fn rank(scored: Vec<ScoredLink>, config: &PipelineConfig, blocklist: &dyn Blocklist) -> Ranking {
    let (mut accepted, policy) =
        apply_cascade(&scored, &config.acceptance, config.min_accepted, blocklist);

    accepted.sort_by(|a, b| b.score.total_cmp(&a.score));
    let over_limit = if accepted.len() > config.max_ranked {
        accepted.split_off(config.max_ranked)
    } else {
        Vec::new()
    };

    let kept: HashSet<String> = accepted
        .iter()
        .chain(over_limit.iter())
        .map(|s| s.link.key())
        .collect();
    let rejected = scored
        .into_iter()
        .filter(|s| !kept.contains(&s.link.key()))
        .collect();

    Ranking {
        accepted,
        over_limit,
        rejected,
        policy,
    }
}

/// Score candidates, rank them and record the outcome on their traces.
///
/// Returns the accepted candidates, best first. An empty result is not an
/// error: the input simply resolved to nothing.
pub async fn filter_candidates(
    query: &str,
    candidates: &[CandidateLink],
    scorer: &dyn Scorer,
    blocklist: &dyn Blocklist,
    config: &PipelineConfig,
    ledger: &TraceLedger,
) -> ResolveResult<Vec<CandidateLink>> {
    let scored = scorer
        .score(query, candidates)
        .await
        .map_err(ResolveError::Scoring)?;

    for s in &scored {
        ledger.set_score(&s.link.url, s.score);
    }

    let ranking = rank(scored, config, blocklist);

    for s in &ranking.accepted {
        ledger.set_used(&s.link.url, true);
    }
    for s in &ranking.over_limit {
        ledger.exclude(&s.link.url, RANKING_LIMIT_WARNING);
    }
    for s in &ranking.rejected {
        ledger.exclude(&s.link.url, BELOW_THRESHOLD_WARNING);
    }

    info!(
        query = %query,
        candidates = candidates.len(),
        accepted = ranking.accepted.len(),
        over_limit = ranking.over_limit.len(),
        policy = ?ranking.policy.map(|p| p.label()),
        "Filtered candidates by relevance"
    );

    Ok(ranking.accepted.into_iter().map(|s| s.link).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockScorer;
    use crate::traits::blocklist::UrlBlocklist;

    fn scored(pairs: &[(&str, f32)]) -> Vec<ScoredLink> {
        pairs
            .iter()
            .map(|(url, score)| ScoredLink::new(CandidateLink::new(*url), *score))
            .collect()
    }

    fn urls(links: &[ScoredLink]) -> Vec<&str> {
        links.iter().map(|s| s.link.url.as_str()).collect()
    }

    #[test]
    fn test_build_query() {
        assert_eq!(
            build_query(Some("team"), "https://www.acme.com/about", false),
            "team site:acme.com"
        );
        assert_eq!(
            build_query(Some("team"), "https://www.acme.com/about", true),
            "team acme.com"
        );
        assert_eq!(build_query(None, "https://acme.com", false), "site:acme.com");
    }

    #[test]
    fn test_cascade_strict_threshold() {
        let config = PipelineConfig::default();
        let input = scored(&[("https://a", 0.8), ("https://b", 0.6), ("https://c", 0.3)]);
        let ranking = rank(input, &config, &UrlBlocklist::new());

        assert_eq!(urls(&ranking.accepted), vec!["https://a"]);
        assert_eq!(ranking.policy, Some(AcceptancePolicy::threshold(0.75)));
        assert_eq!(ranking.rejected.len(), 2);
    }

    #[test]
    fn test_cascade_relaxes() {
        let config = PipelineConfig::default();
        let input = scored(&[("https://b", 0.55), ("https://a", 0.6)]);
        let ranking = rank(input, &config, &UrlBlocklist::new());

        assert_eq!(urls(&ranking.accepted), vec!["https://a", "https://b"]);
        assert_eq!(ranking.policy, Some(AcceptancePolicy::threshold(0.5)));
    }

    #[test]
    fn test_cascade_best_available() {
        let config = PipelineConfig::default();
        let input = scored(&[("https://a", 0.2), ("https://b", 0.1)]);
        let ranking = rank(input, &config, &UrlBlocklist::new());

        assert_eq!(urls(&ranking.accepted), vec!["https://a"]);
        assert_eq!(ranking.policy, Some(AcceptancePolicy::BestAvailable));
    }

    #[test]
    fn test_best_available_skips_blocked() {
        let config = PipelineConfig::default();
        let input = scored(&[("https://facebook.com/acme", 0.4), ("https://acme.com", 0.1)]);
        let ranking = rank(input, &config, &UrlBlocklist::with_default_domains());

        assert_eq!(urls(&ranking.accepted), vec!["https://acme.com"]);
    }

    #[test]
    fn test_threshold_is_exclusive() {
        let config = PipelineConfig::default().with_acceptance([AcceptancePolicy::threshold(0.5)]);
        let input = scored(&[("https://a", 0.5)]);
        let ranking = rank(input, &config, &UrlBlocklist::new());

        assert!(ranking.accepted.is_empty());
    }

    #[test]
    fn test_rank_caps_accepted() {
        let config = PipelineConfig::default();
        let input: Vec<ScoredLink> = (0..25)
            .map(|i| ScoredLink::new(CandidateLink::new(format!("https://a.com/{}", i)), 0.9 - i as f32 * 0.001))
            .collect();
        let ranking = rank(input, &config, &UrlBlocklist::new());

        assert_eq!(ranking.accepted.len(), 10);
        assert_eq!(ranking.over_limit.len(), 15);
        assert_eq!(ranking.accepted[0].link.url, "https://a.com/0");
    }

    #[tokio::test]
    async fn test_filter_updates_traces() {
        let ledger = TraceLedger::new();
        let candidates: Vec<CandidateLink> = ["https://a.com/team", "https://a.com/blog"]
            .into_iter()
            .map(CandidateLink::new)
            .collect();
        for c in &candidates {
            ledger.record(&c.url);
        }

        let scorer = MockScorer::new()
            .with_score("https://a.com/team", 0.9)
            .with_score("https://a.com/blog", 0.2);

        let accepted = filter_candidates(
            "team site:a.com",
            &candidates,
            &scorer,
            &UrlBlocklist::new(),
            &PipelineConfig::default(),
            &ledger,
        )
        .await
        .unwrap();

        assert_eq!(accepted.len(), 1);
        let team = ledger.get("https://a.com/team").unwrap();
        assert!(team.used_in_completion);
        assert_eq!(team.relevance_score, Some(0.9));

        let blog = ledger.get("https://a.com/blog").unwrap();
        assert!(!blog.used_in_completion);
        assert_eq!(blog.warning.as_deref(), Some(BELOW_THRESHOLD_WARNING));
    }

    #[tokio::test]
    async fn test_filter_scorer_failure() {
        let scorer = MockScorer::new().failing();
        let result = filter_candidates(
            "q",
            &[CandidateLink::new("https://a.com")],
            &scorer,
            &UrlBlocklist::new(),
            &PipelineConfig::default(),
            &TraceLedger::new(),
        )
        .await;

        assert!(matches!(result, Err(ResolveError::Scoring(_))));
    }
}
