//! Testing utilities including mock implementations.
//!
//! These are useful for testing applications that use the extraction
//! pipeline without real discovery, queue, scoring or LLM calls.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use uuid::Uuid;

use crate::error::{QueueError, QueueResult, ServiceError, ServiceResult};
use crate::events::{EventSink, PipelineEvent};
use crate::pipeline::Extractor;
use crate::traits::{
    ai::{Completion, CompletionRequest, AI},
    discovery::{DiscoverOptions, Discovery, DiscoveryResult},
    queue::{FetchJob, JobQueue},
    scorer::{ScoredLink, Scorer},
};
use crate::types::document::{url_key, CandidateLink, FetchedDocument};

/// A mock discovery service.
///
/// Returns predefined links per base URL; unknown base URLs discover nothing.
#[derive(Default)]
pub struct MockDiscovery {
    /// Predefined results by base URL key
    results: Arc<RwLock<HashMap<String, DiscoveryResult>>>,

    /// Base URLs that should fail
    fail_urls: Arc<RwLock<HashSet<String>>>,

    /// Call tracking
    calls: Arc<RwLock<Vec<DiscoverOptions>>>,
}

impl MockDiscovery {
    /// Create a new mock discovery service.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add bare links found under a base URL.
    pub fn with_links(
        self,
        base_url: &str,
        links: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.results
            .write()
            .unwrap()
            .entry(url_key(base_url))
            .or_default()
            .raw_links
            .extend(links.into_iter().map(Into::into));
        self
    }

    /// Add links with title/description context under a base URL.
    pub fn with_candidates(
        self,
        base_url: &str,
        candidates: impl IntoIterator<Item = CandidateLink>,
    ) -> Self {
        self.results
            .write()
            .unwrap()
            .entry(url_key(base_url))
            .or_default()
            .candidate_links
            .extend(candidates);
        self
    }

    /// Make discovery fail for a base URL.
    pub fn failing(self, base_url: &str) -> Self {
        self.fail_urls.write().unwrap().insert(url_key(base_url));
        self
    }

    /// Get all calls made to this mock.
    pub fn calls(&self) -> Vec<DiscoverOptions> {
        self.calls.read().unwrap().clone()
    }
}

#[async_trait]
impl Discovery for MockDiscovery {
    async fn discover(&self, options: &DiscoverOptions) -> ServiceResult<DiscoveryResult> {
        self.calls.write().unwrap().push(options.clone());

        let key = url_key(&options.base_url);
        if self.fail_urls.read().unwrap().contains(&key) {
            return Err(ServiceError::Api {
                status: 502,
                message: format!("mock discovery failed for {}", options.base_url),
            });
        }

        Ok(self
            .results
            .read()
            .unwrap()
            .get(&key)
            .cloned()
            .unwrap_or_default())
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// A mock relevance scorer with fixed per-URL scores.
#[derive(Default)]
pub struct MockScorer {
    /// Scores by URL key
    scores: Arc<RwLock<HashMap<String, f32>>>,

    /// Score for URLs without a predefined one
    default_score: f32,

    /// Fail every call
    fail: bool,

    /// Call tracking: (query, candidate count)
    calls: Arc<RwLock<Vec<(String, usize)>>>,
}

impl MockScorer {
    /// Create a mock scoring everything 0.0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the score for a URL.
    pub fn with_score(self, url: &str, score: f32) -> Self {
        self.scores.write().unwrap().insert(url_key(url), score);
        self
    }

    /// Set the score for URLs without a predefined one.
    pub fn with_default_score(mut self, score: f32) -> Self {
        self.default_score = score;
        self
    }

    /// Make every call fail.
    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    /// Get all calls made to this mock.
    pub fn calls(&self) -> Vec<(String, usize)> {
        self.calls.read().unwrap().clone()
    }
}

#[async_trait]
impl Scorer for MockScorer {
    async fn score(&self, query: &str, candidates: &[CandidateLink]) -> ServiceResult<Vec<ScoredLink>> {
        self.calls
            .write()
            .unwrap()
            .push((query.to_string(), candidates.len()));

        if self.fail {
            return Err(ServiceError::Unavailable("mock scorer".to_string()));
        }

        let scores = self.scores.read().unwrap();
        Ok(candidates
            .iter()
            .map(|c| {
                let score = scores.get(&c.key()).copied().unwrap_or(self.default_score);
                ScoredLink::new(c.clone(), score)
            })
            .collect())
    }
}

/// A mock AI implementation for testing.
///
/// Rephrasing echoes the prompt unless a rephrase is predefined; extraction
/// returns the configured completion and records every request.
#[derive(Default)]
pub struct MockAI {
    /// Predefined rephrases by prompt
    rephrases: Arc<RwLock<HashMap<String, String>>>,

    /// Completion returned by every extraction
    completion: Arc<RwLock<Option<Completion>>>,

    fail_rephrase: bool,

    fail_extract: bool,

    /// Extraction requests received
    requests: Arc<RwLock<Vec<CompletionRequest>>>,
}

impl MockAI {
    /// Create a new mock AI with default behavior.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a predefined rephrase for a prompt.
    pub fn with_rephrase(self, prompt: impl Into<String>, query: impl Into<String>) -> Self {
        self.rephrases
            .write()
            .unwrap()
            .insert(prompt.into(), query.into());
        self
    }

    /// Set the extraction result.
    pub fn with_completion(self, data: serde_json::Value, tokens_used: u64) -> Self {
        *self.completion.write().unwrap() = Some(Completion::new(data, tokens_used));
        self
    }

    /// Set a warning on the extraction result.
    pub fn with_warning(self, warning: impl Into<String>) -> Self {
        let mut completion = self.completion.write().unwrap();
        let current = completion.take().unwrap_or_default();
        *completion = Some(current.with_warning(warning));
        drop(completion);
        self
    }

    /// Make rephrasing fail.
    pub fn failing_rephrase(mut self) -> Self {
        self.fail_rephrase = true;
        self
    }

    /// Make extraction fail.
    pub fn failing_extract(mut self) -> Self {
        self.fail_extract = true;
        self
    }

    /// Get every extraction request received.
    pub fn extract_requests(&self) -> Vec<CompletionRequest> {
        self.requests.read().unwrap().clone()
    }
}

#[async_trait]
impl AI for MockAI {
    async fn rephrase_query(&self, prompt: &str) -> ServiceResult<String> {
        if self.fail_rephrase {
            return Err(ServiceError::Unavailable("mock rephrase".to_string()));
        }
        Ok(self
            .rephrases
            .read()
            .unwrap()
            .get(prompt)
            .cloned()
            .unwrap_or_else(|| prompt.to_string()))
    }

    async fn extract(&self, request: &CompletionRequest) -> ServiceResult<Completion> {
        self.requests.write().unwrap().push(request.clone());

        if self.fail_extract {
            return Err(ServiceError::Api {
                status: 500,
                message: "mock extraction failed".to_string(),
            });
        }

        Ok(self
            .completion
            .read()
            .unwrap()
            .clone()
            .unwrap_or_else(|| Completion::new(serde_json::json!({}), 0)))
    }
}

/// A mock fetch queue.
///
/// Jobs resolve to predefined documents, failures or delays keyed by URL.
/// URLs with nothing configured fail.
#[derive(Default)]
pub struct MockQueue {
    documents: Arc<RwLock<HashMap<String, FetchedDocument>>>,
    failures: Arc<RwLock<HashMap<String, String>>>,
    delays: Arc<RwLock<HashMap<String, Duration>>>,

    /// Systemic error returned by every wait
    upstream: Arc<RwLock<Option<(u16, String)>>>,

    /// Submitted jobs by id, with their priority
    jobs: Arc<RwLock<HashMap<Uuid, (FetchJob, i32)>>>,

    /// Call tracking
    submitted: Arc<RwLock<Vec<(FetchJob, i32)>>>,
    timeouts: Arc<RwLock<Vec<Duration>>>,
    released: Arc<RwLock<Vec<Uuid>>>,
}

impl MockQueue {
    /// Create a new mock queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `content` for a URL.
    pub fn with_content(self, url: &str, content: impl Into<String>) -> Self {
        self.with_document(url, FetchedDocument::new(url, content))
    }

    /// Serve a document for a URL.
    pub fn with_document(self, url: &str, document: FetchedDocument) -> Self {
        self.documents.write().unwrap().insert(url_key(url), document);
        self
    }

    /// Fail jobs for a URL.
    pub fn with_failure(self, url: &str, message: impl Into<String>) -> Self {
        self.failures
            .write()
            .unwrap()
            .insert(url_key(url), message.into());
        self
    }

    /// Delay jobs for a URL. A delay at or beyond the wait timeout times out.
    pub fn with_delay(self, url: &str, delay: Duration) -> Self {
        self.delays.write().unwrap().insert(url_key(url), delay);
        self
    }

    /// Fail every wait with a systemic error.
    pub fn with_upstream_error(self, status: u16, message: impl Into<String>) -> Self {
        *self.upstream.write().unwrap() = Some((status, message.into()));
        self
    }

    /// Jobs submitted, with priorities.
    pub fn submitted(&self) -> Vec<(FetchJob, i32)> {
        self.submitted.read().unwrap().clone()
    }

    /// Priorities of submitted jobs.
    pub fn priorities(&self) -> Vec<i32> {
        self.submitted().into_iter().map(|(_, p)| p).collect()
    }

    /// Timeouts passed to `await_result`.
    pub fn timeouts(&self) -> Vec<Duration> {
        self.timeouts.read().unwrap().clone()
    }

    /// Released job ids.
    pub fn released(&self) -> Vec<Uuid> {
        self.released.read().unwrap().clone()
    }

    /// Jobs submitted but not yet released.
    pub fn outstanding(&self) -> usize {
        self.jobs.read().unwrap().len()
    }
}

#[async_trait]
impl JobQueue for MockQueue {
    async fn submit(&self, job: FetchJob, id: Uuid, priority: i32) -> QueueResult<()> {
        self.submitted.write().unwrap().push((job.clone(), priority));
        self.jobs.write().unwrap().insert(id, (job, priority));
        Ok(())
    }

    async fn await_result(&self, id: Uuid, timeout: Duration) -> QueueResult<FetchedDocument> {
        self.timeouts.write().unwrap().push(timeout);

        if let Some((status, message)) = self.upstream.read().unwrap().clone() {
            return Err(QueueError::Upstream { status, message });
        }

        let url = self
            .jobs
            .read()
            .unwrap()
            .get(&id)
            .map(|(job, _)| job.url.clone())
            .ok_or_else(|| QueueError::UnknownJob(id.to_string()))?;
        let key = url_key(&url);

        let delay = self.delays.read().unwrap().get(&key).copied();
        if let Some(delay) = delay {
            if delay >= timeout {
                tokio::time::sleep(timeout).await;
                return Err(QueueError::Timeout {
                    job_id: id.to_string(),
                    timeout_ms: timeout.as_millis() as u64,
                });
            }
            tokio::time::sleep(delay).await;
        }

        if let Some(message) = self.failures.read().unwrap().get(&key) {
            return Err(QueueError::JobFailed(message.clone()));
        }

        self.documents
            .read()
            .unwrap()
            .get(&key)
            .cloned()
            .ok_or_else(|| QueueError::JobFailed(format!("no content for {}", url)))
    }

    async fn release(&self, id: Uuid) {
        self.jobs.write().unwrap().remove(&id);
        self.released.write().unwrap().push(id);
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Event sink that keeps every event for assertions.
#[derive(Default, Clone)]
pub struct RecordingSink {
    events: Arc<RwLock<Vec<PipelineEvent>>>,
}

impl RecordingSink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Events emitted so far.
    pub fn events(&self) -> Vec<PipelineEvent> {
        self.events.read().unwrap().clone()
    }

    /// Total credits in billing events.
    pub fn billed_credits(&self) -> u64 {
        self.events()
            .iter()
            .map(|e| match e {
                PipelineEvent::Billing { credits, .. } => *credits,
                _ => 0,
            })
            .sum()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: PipelineEvent) {
        self.events.write().unwrap().push(event);
    }
}

/// Builder for creating test scenarios.
///
/// Wires mocks into an [`Extractor`] and keeps handles for assertions.
pub struct TestScenario {
    pub discovery: Arc<MockDiscovery>,
    pub scorer: Arc<MockScorer>,
    pub queue: Arc<MockQueue>,
    pub ai: Arc<MockAI>,
    pub events: RecordingSink,
}

impl Default for TestScenario {
    fn default() -> Self {
        Self::new()
    }
}

impl TestScenario {
    /// Create a scenario where nothing is discovered or fetchable.
    pub fn new() -> Self {
        Self {
            discovery: Arc::new(MockDiscovery::new()),
            scorer: Arc::new(MockScorer::new()),
            queue: Arc::new(MockQueue::new()),
            ai: Arc::new(MockAI::new()),
            events: RecordingSink::new(),
        }
    }

    /// Replace the discovery mock.
    pub fn with_discovery(mut self, discovery: MockDiscovery) -> Self {
        self.discovery = Arc::new(discovery);
        self
    }

    /// Replace the scorer mock.
    pub fn with_scorer(mut self, scorer: MockScorer) -> Self {
        self.scorer = Arc::new(scorer);
        self
    }

    /// Replace the queue mock.
    pub fn with_queue(mut self, queue: MockQueue) -> Self {
        self.queue = Arc::new(queue);
        self
    }

    /// Replace the AI mock.
    pub fn with_ai(mut self, ai: MockAI) -> Self {
        self.ai = Arc::new(ai);
        self
    }

    /// Build an extractor over the mocks.
    pub fn extractor(&self) -> Extractor {
        Extractor::new(
            self.discovery.clone(),
            self.scorer.clone(),
            self.queue.clone(),
            self.ai.clone(),
        )
        .with_events(Arc::new(self.events.clone()))
    }
}
