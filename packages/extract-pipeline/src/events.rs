//! Fire-and-forget side effects.
//!
//! The orchestrator emits [`PipelineEvent`]s into an [`EventSink`] and moves
//! on. A worker drains the channel and talks to billing and the job log;
//! its failures are logged and never reach the response.

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::traits::billing::{Billing, JobLogger, JobRecord};

/// Side effect requested by the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    /// Deduct credits for a completed extraction
    Billing {
        account_id: String,
        subscription_id: Option<String>,
        credits: u64,
    },

    /// Record the finished job
    JobCompleted(JobRecord),
}

/// Non-blocking destination for pipeline events.
pub trait EventSink: Send + Sync {
    /// Hand off an event. Must not block or fail the caller.
    fn emit(&self, event: PipelineEvent);
}

/// Sink that drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiscardSink;

impl EventSink for DiscardSink {
    fn emit(&self, event: PipelineEvent) {
        debug!(?event, "Discarding pipeline event");
    }
}

/// Sink backed by an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<PipelineEvent>,
}

impl ChannelSink {
    /// Create a sink and the receiver a worker should drain.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<PipelineEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Create a sink with a spawned worker delivering to billing and the job log.
    pub fn spawn<B, L>(billing: Arc<B>, logger: Arc<L>) -> (Self, JoinHandle<()>)
    where
        B: Billing + ?Sized + 'static,
        L: JobLogger + ?Sized + 'static,
    {
        let (sink, rx) = Self::new();
        let handle = spawn_event_worker(rx, billing, logger);
        (sink, handle)
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: PipelineEvent) {
        if self.tx.send(event).is_err() {
            warn!("Event worker has stopped; dropping pipeline event");
        }
    }
}

/// Drain events until every sender is dropped.
pub fn spawn_event_worker<B, L>(
    mut rx: mpsc::UnboundedReceiver<PipelineEvent>,
    billing: Arc<B>,
    logger: Arc<L>,
) -> JoinHandle<()>
where
    B: Billing + ?Sized + 'static,
    L: JobLogger + ?Sized + 'static,
{
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            deliver(event, billing.as_ref(), logger.as_ref()).await;
        }
        debug!("Event worker finished");
    })
}

/// Deliver one event, logging failures.
pub async fn deliver<B, L>(event: PipelineEvent, billing: &B, logger: &L)
where
    B: Billing + ?Sized,
    L: JobLogger + ?Sized,
{
    match event {
        PipelineEvent::Billing {
            account_id,
            subscription_id,
            credits,
        } => {
            if let Err(e) = billing
                .deduct(&account_id, subscription_id, credits)
                .await
            {
                error!(account_id = %account_id, credits, error = %e, "Failed to bill account");
            }
        }
        PipelineEvent::JobCompleted(record) => {
            if let Err(e) = logger.record_job(&record).await {
                error!(job_id = %record.job_id, error = %e, "Failed to log job");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServiceError;
    use crate::traits::billing::{MockBilling, MockJobLogger};
    use chrono::Utc;
    use uuid::Uuid;

    fn record() -> JobRecord {
        JobRecord {
            job_id: Uuid::new_v4(),
            success: true,
            message: "Extract completed".to_string(),
            num_docs: 1,
            docs: vec![],
            time_taken: 0.5,
            account_id: "acct".to_string(),
            mode: "extract".to_string(),
            url: "https://a.com".to_string(),
            origin: "api".to_string(),
            num_tokens: 10,
            recorded_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_worker_delivers_billing_and_log() {
        let mut billing = MockBilling::new();
        billing
            .expect_deduct()
            .withf(|account, sub, amount| account == "acct" && sub.is_none() && *amount == 15)
            .times(1)
            .returning(|_, _, _| Ok(()));

        let mut logger = MockJobLogger::new();
        logger.expect_record_job().times(1).returning(|_| Ok(()));

        let (sink, handle) = ChannelSink::spawn(Arc::new(billing), Arc::new(logger));
        sink.emit(PipelineEvent::Billing {
            account_id: "acct".to_string(),
            subscription_id: None,
            credits: 15,
        });
        sink.emit(PipelineEvent::JobCompleted(record()));
        drop(sink);

        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_failures_do_not_stop_worker() {
        let mut billing = MockBilling::new();
        billing
            .expect_deduct()
            .times(2)
            .returning(|_, _, _| Err(ServiceError::Unavailable("ledger".into())));

        let mut logger = MockJobLogger::new();
        logger
            .expect_record_job()
            .times(1)
            .returning(|_| Err(ServiceError::Unavailable("log".into())));

        let (sink, handle) = ChannelSink::spawn(Arc::new(billing), Arc::new(logger));
        for _ in 0..2 {
            sink.emit(PipelineEvent::Billing {
                account_id: "acct".to_string(),
                subscription_id: Some("sub".to_string()),
                credits: 5,
            });
        }
        sink.emit(PipelineEvent::JobCompleted(record()));
        drop(sink);

        handle.await.unwrap();
    }

    #[test]
    fn test_emit_after_worker_gone_is_silent() {
        let (sink, rx) = ChannelSink::new();
        drop(rx);
        sink.emit(PipelineEvent::JobCompleted(record()));
    }
}
