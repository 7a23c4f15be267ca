//! Outbound side effects
//!
//! Ticket prints and status notifications are queued as [`OutboundJob`]s and
//! delivered by one [`OutboundWorker`]. Each job retries on its own with
//! exponential backoff; exhausted jobs are logged and counted. Nothing here
//! reports back to the cache or the reconciler.

mod notifier;

pub use notifier::{StatusNotifier, WebhookNotifier};

use comanda_printer::{Ticket, TicketSink};
use shared::NotifyPayload;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::config::OutboundConfig;
use crate::error::OutboundError;

#[derive(Debug, Clone, PartialEq)]
pub enum OutboundJob {
    Print(Ticket),
    Notify(NotifyPayload),
}

impl fmt::Display for OutboundJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Print(ticket) => write!(f, "print {} #{}", ticket.station, ticket.order_number),
            Self::Notify(payload) => write!(f, "notify #{}", payload.order_number),
        }
    }
}

/// Delivery counters
#[derive(Debug, Default)]
pub struct OutboundStats {
    enqueued: AtomicU64,
    delivered: AtomicU64,
    retried: AtomicU64,
    failed: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutboundStatsSnapshot {
    pub enqueued: u64,
    pub delivered: u64,
    pub retried: u64,
    pub failed: u64,
}

impl OutboundStatsSnapshot {
    /// Jobs that reached a terminal state
    pub fn settled(&self) -> u64 {
        self.delivered + self.failed
    }
}

impl OutboundStats {
    pub fn snapshot(&self) -> OutboundStatsSnapshot {
        OutboundStatsSnapshot {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            retried: self.retried.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// Producer side of the outbound channel
#[derive(Debug, Clone)]
pub struct OutboundQueue {
    tx: mpsc::UnboundedSender<OutboundJob>,
    stats: Arc<OutboundStats>,
}

impl OutboundQueue {
    /// Queue plus the receiver to hand to [`OutboundWorker::run`]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<OutboundJob>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                tx,
                stats: Arc::new(OutboundStats::default()),
            },
            rx,
        )
    }

    pub fn enqueue(&self, job: OutboundJob) {
        self.stats.enqueued.fetch_add(1, Ordering::Relaxed);
        if let Err(e) = self.tx.send(job) {
            self.stats.failed.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(job = %e.0, "Outbound worker stopped, dropping job");
        }
    }

    pub fn stats(&self) -> OutboundStatsSnapshot {
        self.stats.snapshot()
    }

    pub(crate) fn stats_handle(&self) -> Arc<OutboundStats> {
        Arc::clone(&self.stats)
    }
}

/// Drains the outbound channel
#[derive(Clone)]
pub struct OutboundWorker {
    printer: Arc<dyn TicketSink>,
    notifier: Arc<dyn StatusNotifier>,
    config: OutboundConfig,
    stats: Arc<OutboundStats>,
}

impl OutboundWorker {
    pub fn new(
        printer: Arc<dyn TicketSink>,
        notifier: Arc<dyn StatusNotifier>,
        config: OutboundConfig,
        queue: &OutboundQueue,
    ) -> Self {
        Self {
            printer,
            notifier,
            config,
            stats: queue.stats_handle(),
        }
    }

    /// Run until `shutdown` or until every queue handle is dropped. Jobs
    /// still retrying at shutdown are cancelled.
    pub async fn run(self, mut rx: mpsc::UnboundedReceiver<OutboundJob>, shutdown: CancellationToken) {
        tracing::info!("Outbound worker started");
        let mut inflight = JoinSet::new();

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                job = rx.recv() => match job {
                    Some(job) => {
                        let worker = self.clone();
                        inflight.spawn(async move { worker.deliver(job).await });
                    }
                    None => {
                        // Senders gone: finish what is in flight
                        while inflight.join_next().await.is_some() {}
                        break;
                    }
                },
                Some(_) = inflight.join_next(), if !inflight.is_empty() => {}
            }
        }

        if !inflight.is_empty() {
            tracing::info!(pending = inflight.len(), "Cancelling outbound deliveries");
        }
        inflight.abort_all();
        tracing::info!("Outbound worker stopped");
    }

    async fn attempt(&self, job: &OutboundJob) -> Result<(), OutboundError> {
        match job {
            OutboundJob::Print(ticket) => self.printer.deliver(ticket).await?,
            OutboundJob::Notify(payload) => self.notifier.notify(payload).await?,
        }
        Ok(())
    }

    async fn deliver(&self, job: OutboundJob) {
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match self.attempt(&job).await {
                Ok(()) => {
                    self.stats.delivered.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!(job = %job, attempt, "Outbound job delivered");
                    return;
                }
                Err(e) if e.is_retryable() && attempt < max_attempts => {
                    let delay = self.config.delay_for(attempt);
                    self.stats.retried.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(
                        job = %job,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Outbound delivery failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    self.stats.failed.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(job = %job, attempt, error = %e, "Outbound delivery abandoned");
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use comanda_printer::{PrintError, PrintResult, Station, TicketKind};
    use parking_lot::Mutex;
    use std::time::Duration;

    /// Fails the first `failures` deliveries with `error`
    struct FlakySink {
        failures: Mutex<u32>,
        retryable: bool,
        delivered: Mutex<Vec<u32>>,
    }

    #[async_trait]
    impl TicketSink for FlakySink {
        async fn deliver(&self, ticket: &Ticket) -> PrintResult<()> {
            let mut failures = self.failures.lock();
            if *failures > 0 {
                *failures -= 1;
                return Err(if self.retryable {
                    PrintError::Connection("refused".into())
                } else {
                    PrintError::InvalidConfig("no url".into())
                });
            }
            self.delivered.lock().push(ticket.order_number);
            Ok(())
        }
    }

    fn ticket(n: u32) -> Ticket {
        Ticket::new(Station::Kitchen, TicketKind::Order, n, "Ana", "x")
    }

    async fn settle(queue: &OutboundQueue, expected: u64) {
        while queue.stats().settled() < expected {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    fn start(sink: Arc<FlakySink>) -> (OutboundQueue, CancellationToken) {
        let (queue, rx) = OutboundQueue::channel();
        let worker = OutboundWorker::new(
            sink,
            Arc::new(WebhookNotifier::new(None)),
            OutboundConfig::default(),
            &queue,
        );
        let shutdown = CancellationToken::new();
        tokio::spawn(worker.run(rx, shutdown.clone()));
        (queue, shutdown)
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_then_delivers() {
        let sink = Arc::new(FlakySink {
            failures: Mutex::new(2),
            retryable: true,
            delivered: Mutex::new(Vec::new()),
        });
        let (queue, shutdown) = start(sink.clone());

        queue.enqueue(OutboundJob::Print(ticket(7)));
        settle(&queue, 1).await;

        let stats = queue.stats();
        assert_eq!(stats.delivered, 1);
        assert_eq!(stats.retried, 2);
        assert_eq!(*sink.delivered.lock(), vec![7]);
        shutdown.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_fails_once() {
        let sink = Arc::new(FlakySink {
            failures: Mutex::new(5),
            retryable: false,
            delivered: Mutex::new(Vec::new()),
        });
        let (queue, shutdown) = start(sink);

        queue.enqueue(OutboundJob::Print(ticket(1)));
        settle(&queue, 1).await;

        let stats = queue.stats();
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.retried, 0);
        shutdown.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_is_counted() {
        let sink = Arc::new(FlakySink {
            failures: Mutex::new(10),
            retryable: true,
            delivered: Mutex::new(Vec::new()),
        });
        let (queue, shutdown) = start(sink);

        queue.enqueue(OutboundJob::Print(ticket(1)));
        queue.enqueue(OutboundJob::Print(ticket(2)));
        settle(&queue, 2).await;

        let stats = queue.stats();
        assert_eq!(stats.enqueued, 2);
        assert_eq!(stats.failed, 2);
        assert_eq!(stats.retried, 4);
        shutdown.cancel();
    }
}
