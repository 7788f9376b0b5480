//! In-process job queue.
//!
//! A fixed pool of Tokio workers drains a priority backlog (lowest
//! priority value first, FIFO within a priority). Each job's result is
//! published on a watch channel. Releasing a job cancels it: a pending job
//! is skipped and a running fetch is dropped.

use async_trait::async_trait;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{QueueError, QueueResult};
use crate::queue::Fetcher;
use crate::traits::queue::{FetchJob, JobQueue};
use crate::types::document::FetchedDocument;

type Outcome = Option<Result<FetchedDocument, String>>;

/// A job waiting for a worker.
struct Pending {
    id: Uuid,
    priority: i32,
    seq: u64,
    job: FetchJob,
    result: watch::Sender<Outcome>,
    cancel: CancellationToken,
}

impl PartialEq for Pending {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Pending {}

impl PartialOrd for Pending {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Pending {
    // BinaryHeap pops the greatest: lowest priority, then oldest
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// A submitted job as seen by waiters.
struct Handle {
    result: watch::Receiver<Outcome>,
    cancel: CancellationToken,
}

struct Shared<F> {
    fetcher: F,
    backlog: Mutex<BinaryHeap<Pending>>,
    jobs: Mutex<HashMap<Uuid, Handle>>,
    notify: Notify,
    seq: AtomicU64,
    shutdown: CancellationToken,
}

impl<F> Shared<F> {
    fn backlog(&self) -> MutexGuard<'_, BinaryHeap<Pending>> {
        self.backlog.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn jobs(&self) -> MutexGuard<'_, HashMap<Uuid, Handle>> {
        self.jobs.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// In-process job queue backed by a worker pool.
///
/// Must be created inside a Tokio runtime. Workers stop when the queue is
/// dropped.
///
/// # Example
///
/// ```rust,ignore
/// let queue = LocalQueue::new(HttpFetcher::new()?, 8);
/// ```
pub struct LocalQueue<F: Fetcher> {
    shared: Arc<Shared<F>>,
}

impl<F: Fetcher> LocalQueue<F> {
    /// Create a queue and spawn `workers` worker tasks (at least one).
    pub fn new(fetcher: F, workers: usize) -> Self {
        let shared = Arc::new(Shared {
            fetcher,
            backlog: Mutex::new(BinaryHeap::new()),
            jobs: Mutex::new(HashMap::new()),
            notify: Notify::new(),
            seq: AtomicU64::new(0),
            shutdown: CancellationToken::new(),
        });

        let workers = workers.max(1);
        for worker in 0..workers {
            tokio::spawn(run_worker(worker, shared.clone()));
        }
        info!(workers, fetcher = shared.fetcher.name(), "Local queue started");

        Self { shared }
    }

    /// Jobs waiting for a worker.
    pub fn backlog_len(&self) -> usize {
        self.shared.backlog().len()
    }

    /// Jobs submitted and not yet released.
    pub fn active_jobs(&self) -> usize {
        self.shared.jobs().len()
    }

    /// Stop all workers. Later submissions fail.
    pub fn shutdown(&self) {
        self.shared.shutdown.cancel();
    }
}

impl<F: Fetcher> Drop for LocalQueue<F> {
    fn drop(&mut self) {
        self.shared.shutdown.cancel();
    }
}

async fn run_worker<F: Fetcher>(worker: usize, shared: Arc<Shared<F>>) {
    debug!(worker, "Queue worker started");

    loop {
        let next = shared.backlog().pop();

        let pending = match next {
            Some(pending) => pending,
            None => {
                tokio::select! {
                    _ = shared.notify.notified() => {}
                    _ = shared.shutdown.cancelled() => break,
                }
                continue;
            }
        };

        if pending.cancel.is_cancelled() {
            debug!(worker, job_id = %pending.id, "Skipping released job");
            continue;
        }

        debug!(worker, job_id = %pending.id, url = %pending.job.url, "Fetching");
        let outcome = tokio::select! {
            result = shared.fetcher.fetch(&pending.job) => Some(result.map_err(|e| e.to_string())),
            _ = pending.cancel.cancelled() => None,
            _ = shared.shutdown.cancelled() => None,
        };

        match outcome {
            Some(result) => {
                if let Err(e) = &result {
                    warn!(worker, job_id = %pending.id, url = %pending.job.url, error = %e, "Fetch job failed");
                }
                // No receivers left means the job was released meanwhile
                let _ = pending.result.send(Some(result));
            }
            None => debug!(worker, job_id = %pending.id, "Fetch job cancelled"),
        }
    }

    debug!(worker, "Queue worker stopped");
}

#[async_trait]
impl<F: Fetcher> JobQueue for LocalQueue<F> {
    async fn submit(&self, job: FetchJob, id: Uuid, priority: i32) -> QueueResult<()> {
        if self.shared.shutdown.is_cancelled() {
            return Err(QueueError::Upstream {
                status: 503,
                message: "Job queue is shut down".to_string(),
            });
        }

        let (tx, rx) = watch::channel(None);
        let cancel = self.shared.shutdown.child_token();

        self.shared.jobs().insert(
            id,
            Handle {
                result: rx,
                cancel: cancel.clone(),
            },
        );
        self.shared.backlog().push(Pending {
            id,
            priority,
            seq: self.shared.seq.fetch_add(1, AtomicOrdering::Relaxed),
            job,
            result: tx,
            cancel,
        });
        self.shared.notify.notify_one();

        Ok(())
    }

    async fn await_result(&self, id: Uuid, timeout: Duration) -> QueueResult<FetchedDocument> {
        let mut rx = self
            .shared
            .jobs()
            .get(&id)
            .map(|handle| handle.result.clone())
            .ok_or_else(|| QueueError::UnknownJob(id.to_string()))?;

        let waited = tokio::time::timeout(timeout, async move {
            rx.wait_for(Option::is_some).await.map(|outcome| outcome.clone())
        })
        .await;

        match waited {
            Ok(Ok(Some(Ok(document)))) => Ok(document),
            Ok(Ok(Some(Err(message)))) => Err(QueueError::JobFailed(message)),
            Ok(Ok(None)) | Ok(Err(_)) => Err(QueueError::Cancelled(id.to_string())),
            Err(_) => Err(QueueError::Timeout {
                job_id: id.to_string(),
                timeout_ms: timeout.as_millis() as u64,
            }),
        }
    }

    async fn release(&self, id: Uuid) {
        if let Some(handle) = self.shared.jobs().remove(&id) {
            handle.cancel.cancel();
        }
    }

    fn name(&self) -> &str {
        "local"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ServiceError, ServiceResult};
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct ScriptedFetcher {
        delays: HashMap<String, Duration>,
        order: Mutex<Vec<String>>,
        finished: AtomicUsize,
    }

    impl ScriptedFetcher {
        fn with_delay(mut self, url: &str, delay: Duration) -> Self {
            self.delays.insert(url.to_string(), delay);
            self
        }
    }

    #[async_trait]
    impl Fetcher for Arc<ScriptedFetcher> {
        async fn fetch(&self, job: &FetchJob) -> ServiceResult<FetchedDocument> {
            self.order.lock().unwrap().push(job.url.clone());
            if let Some(delay) = self.delays.get(&job.url) {
                tokio::time::sleep(*delay).await;
            }
            self.finished.fetch_add(1, AtomicOrdering::SeqCst);
            if job.url.contains("broken") {
                return Err(ServiceError::Api {
                    status: 500,
                    message: "server error".into(),
                });
            }
            Ok(FetchedDocument::new(&job.url, format!("content of {}", job.url)))
        }
    }

    fn job(url: &str) -> FetchJob {
        FetchJob::new(url, "acct")
    }

    #[tokio::test]
    async fn test_submit_and_await() {
        let queue = LocalQueue::new(Arc::new(ScriptedFetcher::default()), 2);
        let id = Uuid::new_v4();
        queue.submit(job("https://a.com"), id, 10).await.unwrap();

        let doc = queue.await_result(id, Duration::from_secs(1)).await.unwrap();
        assert_eq!(doc.content, "content of https://a.com");
        assert_eq!(doc.source_url(), Some("https://a.com"));

        queue.release(id).await;
        assert_eq!(queue.active_jobs(), 0);
    }

    #[tokio::test]
    async fn test_failed_job() {
        let queue = LocalQueue::new(Arc::new(ScriptedFetcher::default()), 1);
        let id = Uuid::new_v4();
        queue.submit(job("https://broken.com"), id, 10).await.unwrap();

        let err = queue.await_result(id, Duration::from_secs(1)).await.unwrap_err();
        assert!(matches!(err, QueueError::JobFailed(ref m) if m.contains("server error")));
    }

    #[tokio::test]
    async fn test_unknown_job() {
        let queue = LocalQueue::new(Arc::new(ScriptedFetcher::default()), 1);
        let err = queue
            .await_result(Uuid::new_v4(), Duration::from_millis(10))
            .await
            .unwrap_err();
        assert!(matches!(err, QueueError::UnknownJob(_)));
    }

    #[tokio::test]
    async fn test_timeout_then_release_cancels() {
        let fetcher = Arc::new(
            ScriptedFetcher::default().with_delay("https://slow.com", Duration::from_millis(300)),
        );
        let queue = LocalQueue::new(fetcher.clone(), 1);
        let id = Uuid::new_v4();
        queue.submit(job("https://slow.com"), id, 10).await.unwrap();

        let err = queue
            .await_result(id, Duration::from_millis(20))
            .await
            .unwrap_err();
        assert!(matches!(err, QueueError::Timeout { timeout_ms: 20, .. }));

        queue.release(id).await;
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(fetcher.finished.load(AtomicOrdering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_priority_order() {
        let fetcher = Arc::new(
            ScriptedFetcher::default().with_delay("https://first.com", Duration::from_millis(50)),
        );
        let queue = LocalQueue::new(fetcher.clone(), 1);

        let first = Uuid::new_v4();
        queue.submit(job("https://first.com"), first, 0).await.unwrap();
        // Let the worker pick up the first job before the rest arrive
        tokio::time::sleep(Duration::from_millis(10)).await;

        let mut ids = vec![first];
        for (url, priority) in [("https://low.com", 30), ("https://high.com", 1), ("https://mid.com", 10)] {
            let id = Uuid::new_v4();
            queue.submit(job(url), id, priority).await.unwrap();
            ids.push(id);
        }
        for id in ids {
            queue.await_result(id, Duration::from_secs(1)).await.unwrap();
        }

        assert_eq!(
            *fetcher.order.lock().unwrap(),
            vec!["https://first.com", "https://high.com", "https://mid.com", "https://low.com"]
        );
    }

    #[tokio::test]
    async fn test_submit_after_shutdown() {
        let queue = LocalQueue::new(Arc::new(ScriptedFetcher::default()), 1);
        queue.shutdown();

        let err = queue
            .submit(job("https://a.com"), Uuid::new_v4(), 10)
            .await
            .unwrap_err();
        assert!(err.is_systemic());
    }
}
