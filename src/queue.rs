//! Bounded delivery queue and worker pool

use crate::bus::AuditSink;
use crate::client::WebhookClient;
use crate::delivery::{Delivery, FailureKind};
use crate::dlq::DeadLetterQueue;
use crate::error::WebhookError;
use crate::event::Event;
use crate::registry::WebhookRegistry;
use crate::storage::Storage;
use crate::webhook::Webhook;
use chrono::Utc;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// One unit of webhook delivery work
///
/// Exists only inside the queue/worker boundary; its outcome becomes a
/// [`Delivery`] record.
pub struct DeliveryTask {
    /// Webhook snapshot taken at enqueue time
    pub webhook: Webhook,

    /// Event to deliver
    pub event: Event,

    /// Attempt number, 1-based
    pub attempt: u32,

    /// Resolved with the attempt's outcome when attached
    pub result_tx: Option<oneshot::Sender<Delivery>>,
}

impl DeliveryTask {
    /// Create a first-attempt task
    pub fn new(webhook: Webhook, event: Event) -> Self {
        Self {
            webhook,
            event,
            attempt: 1,
            result_tx: None,
        }
    }

    /// Attach a result channel resolved with this attempt's outcome
    pub fn with_result_channel(mut self) -> (Self, oneshot::Receiver<Delivery>) {
        let (tx, rx) = oneshot::channel();
        self.result_tx = Some(tx);
        (self, rx)
    }
}

/// Policy applied when the queue is at capacity
#[derive(Debug, Clone, Copy)]
pub enum OverflowPolicy {
    /// Wait up to the timeout for space, then fail with `QueueFull`
    Block { timeout: Duration },

    /// Fail immediately with `QueueFull`
    Reject,
}

/// Delivery pool configuration
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Number of concurrent delivery workers
    pub workers: usize,

    /// Task queue capacity
    pub capacity: usize,

    /// Policy applied when the queue is full
    pub overflow: OverflowPolicy,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            capacity: 1000,
            overflow: OverflowPolicy::Block {
                timeout: Duration::from_secs(5),
            },
        }
    }
}

/// State shared between the pool handle, its workers, and retry timers
struct PoolShared {
    tx: Mutex<Option<mpsc::Sender<DeliveryTask>>>,
    accepting: AtomicBool,
    overflow: OverflowPolicy,
    shutdown_tx: watch::Sender<bool>,
    client: WebhookClient,
    storage: Arc<dyn Storage>,
    registry: Arc<WebhookRegistry>,
    dlq: Arc<DeadLetterQueue>,
    audit: Option<Arc<dyn AuditSink>>,
}

/// Fixed-size worker pool draining a bounded FIFO task queue
///
/// Workers perform the HTTP attempt, persist a [`Delivery`] per attempt,
/// and either schedule a backoff retry or hand the delivery to the dead
/// letter queue. Across retries of one logical delivery, attempt N+1 is
/// never enqueued before attempt N's outcome is recorded.
pub struct DeliveryPool {
    shared: Arc<PoolShared>,
    queue_rx: Arc<Mutex<mpsc::Receiver<DeliveryTask>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl DeliveryPool {
    /// Start the pool with `config.workers` workers
    ///
    /// Must be called within a tokio runtime.
    pub fn start(
        config: PoolConfig,
        client: WebhookClient,
        storage: Arc<dyn Storage>,
        registry: Arc<WebhookRegistry>,
        dlq: Arc<DeadLetterQueue>,
        audit: Option<Arc<dyn AuditSink>>,
    ) -> Self {
        let (tx, rx) = mpsc::channel(config.capacity.max(1));
        let (shutdown_tx, _) = watch::channel(false);

        let shared = Arc::new(PoolShared {
            tx: Mutex::new(Some(tx)),
            accepting: AtomicBool::new(true),
            overflow: config.overflow,
            shutdown_tx,
            client,
            storage,
            registry,
            dlq,
            audit,
        });

        let queue_rx = Arc::new(Mutex::new(rx));
        let mut workers = Vec::with_capacity(config.workers);
        for id in 0..config.workers {
            let shared = Arc::clone(&shared);
            let rx = Arc::clone(&queue_rx);
            let shutdown_rx = shared.shutdown_tx.subscribe();
            workers.push(tokio::spawn(run_worker(id, shared, rx, shutdown_rx)));
        }

        info!(workers = config.workers, capacity = config.capacity, "delivery pool started");

        Self {
            shared,
            queue_rx,
            workers: Mutex::new(workers),
        }
    }

    /// Enqueue a delivery task, honoring the overflow policy
    pub async fn enqueue(&self, task: DeliveryTask) -> crate::Result<()> {
        self.shared.enqueue(task).await
    }

    /// Whether the pool still accepts new work
    pub fn is_accepting(&self) -> bool {
        self.shared.accepting.load(Ordering::SeqCst)
    }

    /// Stop accepting work, drop queued-but-not-started tasks, and wait
    /// for in-flight attempts to complete or time out
    pub async fn shutdown(&self) {
        self.shared.accepting.store(false, Ordering::SeqCst);
        self.shared.tx.lock().await.take();
        let _ = self.shared.shutdown_tx.send(true);
        self.join_workers().await;

        // Discard queued-but-not-started tasks; dropping them also closes
        // any attached result channels.
        let mut rx = self.queue_rx.lock().await;
        rx.close();
        while rx.try_recv().is_ok() {}

        info!("delivery pool stopped");
    }

    /// Stop accepting work and process the remaining queue before stopping
    pub async fn shutdown_drain(&self) {
        self.shared.accepting.store(false, Ordering::SeqCst);
        self.shared.tx.lock().await.take();
        self.join_workers().await;
        info!("delivery pool drained and stopped");
    }

    async fn join_workers(&self) {
        let handles: Vec<_> = self.workers.lock().await.drain(..).collect();
        futures::future::join_all(handles).await;
    }
}

impl PoolShared {
    /// Enqueue through the configured overflow policy
    async fn enqueue(&self, task: DeliveryTask) -> crate::Result<()> {
        if !self.accepting.load(Ordering::SeqCst) {
            return Err(WebhookError::ShuttingDown);
        }

        let tx = self
            .tx
            .lock()
            .await
            .as_ref()
            .cloned()
            .ok_or(WebhookError::ShuttingDown)?;

        match self.overflow {
            OverflowPolicy::Reject => tx.try_send(task).map_err(|err| match err {
                mpsc::error::TrySendError::Full(_) => WebhookError::QueueFull,
                mpsc::error::TrySendError::Closed(_) => WebhookError::ShuttingDown,
            }),
            OverflowPolicy::Block { timeout } => {
                tx.send_timeout(task, timeout).await.map_err(|err| match err {
                    mpsc::error::SendTimeoutError::Timeout(_) => WebhookError::QueueFull,
                    mpsc::error::SendTimeoutError::Closed(_) => WebhookError::ShuttingDown,
                })
            }
        }
    }

    /// Enqueue an internally scheduled retry
    ///
    /// Bypasses the overflow policy: the bounded channel still applies
    /// backpressure, but a scheduled retry is never dropped because the
    /// intake policy is `Reject`.
    async fn enqueue_retry(&self, task: DeliveryTask) -> crate::Result<()> {
        if !self.accepting.load(Ordering::SeqCst) {
            return Err(WebhookError::ShuttingDown);
        }

        let tx = self
            .tx
            .lock()
            .await
            .as_ref()
            .cloned()
            .ok_or(WebhookError::ShuttingDown)?;

        tx.send(task).await.map_err(|_| WebhookError::ShuttingDown)
    }

    /// Process one task: attempt, record, then retry or dead-letter
    async fn process(self: &Arc<Self>, task: DeliveryTask) {
        let DeliveryTask {
            webhook,
            event,
            attempt,
            result_tx,
        } = task;

        let outcome = match self.client.attempt(&webhook, &event, attempt).await {
            Ok(outcome) => outcome,
            Err(err) => {
                // A usage error surfacing here means the stored webhook's
                // URL no longer parses; record it as a terminal failure.
                warn!(webhook = %webhook.id, error = %err, "delivery attempt rejected");
                let mut delivery = Delivery::new(&webhook.id, &event.id, &webhook.url, attempt);
                delivery.mark_failed(err.to_string());
                let _ = self.registry.record_failure(&webhook.id);
                self.record(&delivery).await;
                self.notify_audit(&delivery).await;
                if let Some(tx) = result_tx {
                    let _ = tx.send(delivery);
                }
                return;
            }
        };

        let mut delivery = outcome.delivery;
        match outcome.failure {
            None => {
                let _ = self.registry.record_success(&webhook.id);
                self.record(&delivery).await;
                self.notify_audit(&delivery).await;
            }
            Some(kind) if kind.is_retryable() && webhook.retry.should_retry(attempt) => {
                let delay = kind
                    .retry_after()
                    .unwrap_or_else(|| webhook.retry.next_delay(attempt));
                delivery.schedule_retry(
                    Utc::now() + chrono::Duration::from_std(delay).unwrap_or_default(),
                );
                let _ = self.registry.record_failure(&webhook.id);
                // The outcome is recorded before the next attempt can be
                // enqueued, keeping per-delivery attempts strictly ordered.
                self.record(&delivery).await;
                info!(
                    webhook = %webhook.id,
                    event = %event.id,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "delivery failed, retry scheduled"
                );
                self.spawn_retry(webhook, event, attempt + 1, delay);
            }
            Some(kind) => {
                let _ = self.registry.record_failure(&webhook.id);
                self.record(&delivery).await;
                if matches!(kind, FailureKind::Serialization(_)) {
                    // Re-submission would re-serialize the same immutable
                    // event, so these skip the dead letter queue.
                    error!(
                        webhook = %webhook.id,
                        event = %event.id,
                        "event cannot be serialized, delivery abandoned"
                    );
                } else {
                    warn!(
                        webhook = %webhook.id,
                        event = %event.id,
                        attempt,
                        "delivery dead-lettered"
                    );
                    self.dlq.add(delivery.clone());
                }
                self.notify_audit(&delivery).await;
            }
        }

        if let Some(tx) = result_tx {
            let _ = tx.send(delivery);
        }
    }

    /// Re-enqueue attempt `attempt` no earlier than now + `delay`
    fn spawn_retry(self: &Arc<Self>, webhook: Webhook, event: Event, attempt: u32, delay: Duration) {
        let shared = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let task = DeliveryTask {
                webhook,
                event,
                attempt,
                result_tx: None,
            };
            if let Err(err) = shared.enqueue_retry(task).await {
                // The persisted next_retry_at records the schedule for an
                // embedder resuming from storage after shutdown.
                warn!(error = %err, "scheduled retry dropped during shutdown");
            }
        });
    }

    async fn record(&self, delivery: &Delivery) {
        if let Err(err) = self.storage.put_delivery(delivery).await {
            error!(delivery = %delivery.id, error = %err, "failed to persist delivery record");
        }
    }

    async fn notify_audit(&self, delivery: &Delivery) {
        if let Some(audit) = &self.audit {
            if let Err(err) = audit.record(delivery).await {
                warn!(delivery = %delivery.id, error = %err, "audit sink rejected delivery record");
            }
        }
    }
}

async fn run_worker(
    id: usize,
    shared: Arc<PoolShared>,
    rx: Arc<Mutex<mpsc::Receiver<DeliveryTask>>>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    debug!(worker = id, "delivery worker started");

    loop {
        // The receiver lock is released before the task is processed so
        // other workers can pull work concurrently.
        let task = {
            let mut rx = rx.lock().await;
            tokio::select! {
                biased;
                _ = shutdown_rx.changed() => None,
                task = rx.recv() => task,
            }
        };

        let Some(task) = task else { break };

        // Queued tasks are dropped, not attempted, once shutdown begins.
        if *shutdown_rx.borrow() {
            break;
        }

        shared.process(task).await;
    }

    debug!(worker = id, "delivery worker stopped");
}
