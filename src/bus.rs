//! Event bus façade: publish, fan-out, and the management surface

use crate::client::WebhookClient;
use crate::config::BusConfig;
use crate::delivery::Delivery;
use crate::dlq::{DeadLetterQueue, DlqOrder};
use crate::error::WebhookError;
use crate::event::{Event, types};
use crate::queue::{DeliveryPool, DeliveryTask};
use crate::registry::WebhookRegistry;
use crate::router::{DispatchError, EventRouter, HandlerError};
use crate::storage::{MemoryStorage, Storage};
use crate::webhook::Webhook;
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, warn};

/// Admission control consulted before publish accepts an event
///
/// A rejection is a fast failure with no side effects.
#[async_trait]
pub trait AdmissionControl: Send + Sync {
    /// Decide whether the event may enter the system
    async fn allow(&self, event: &Event) -> bool;
}

/// Audit sink error
#[derive(Debug, thiserror::Error)]
#[error("Audit sink error: {0}")]
pub struct AuditError(pub String);

/// Compliance hook notified of every terminal delivery outcome
///
/// A failing sink is logged and never fails the delivery itself.
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Record a terminal delivery outcome
    async fn record(&self, delivery: &Delivery) -> Result<(), AuditError>;
}

/// Event bus errors
#[derive(Debug, thiserror::Error)]
pub enum EventBusError {
    /// The event was rejected by admission control
    #[error("Event rejected by admission control")]
    Rejected,

    /// One or more in-process handlers failed
    #[error("One or more handlers failed")]
    HandlersFailed(Vec<HandlerError>),

    /// Webhook-side failure (storage, queue backpressure, ...)
    #[error(transparent)]
    Webhook(#[from] WebhookError),
}

/// The façade tying together router, registry, delivery pool, and DLQ
///
/// `publish` dispatches an event to in-process handlers and enqueues one
/// delivery task per interested webhook; delivery itself is fully
/// decoupled from handler execution through the bounded queue.
pub struct EventBus {
    router: Arc<EventRouter>,
    registry: Arc<WebhookRegistry>,
    pool: Arc<DeliveryPool>,
    storage: Arc<dyn Storage>,
    dlq: Arc<DeadLetterQueue>,
    admission: Option<Arc<dyn AdmissionControl>>,
}

impl EventBus {
    /// Create a builder
    pub fn builder() -> EventBusBuilder {
        EventBusBuilder::new()
    }

    /// Create a bus with default configuration and in-memory storage
    ///
    /// Must be called within a tokio runtime.
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Publish an event
    ///
    /// Runs admission control, persists the event, dispatches it to
    /// in-process handlers, and enqueues a delivery task for every active
    /// webhook whose subscription and filters match. Handler failures are
    /// aggregated and surfaced after webhook fan-out has completed.
    ///
    /// Returns the number of delivery tasks enqueued.
    pub async fn publish(&self, event: Event) -> Result<usize, EventBusError> {
        if let Some(admission) = &self.admission {
            if !admission.allow(&event).await {
                warn!(event = %event.id, "event rejected by admission control");
                return Err(EventBusError::Rejected);
            }
        }

        self.storage.put_event(&event).await?;

        let dispatched = self.router.dispatch(&event).await;

        let mut enqueued = 0;
        for webhook in self.registry.matching(&event) {
            self.pool
                .enqueue(DeliveryTask::new(webhook, event.clone()))
                .await
                .map_err(EventBusError::Webhook)?;
            enqueued += 1;
        }
        debug!(event = %event.id, event_type = %event.event_type, enqueued, "event published");

        match dispatched {
            Ok(()) => Ok(enqueued),
            Err(DispatchError::HandlersFailed(errors)) => {
                Err(EventBusError::HandlersFailed(errors))
            }
        }
    }

    /// The in-process router, for handler registration
    pub fn router(&self) -> &EventRouter {
        &self.router
    }

    /// The webhook registry
    pub fn registry(&self) -> &WebhookRegistry {
        &self.registry
    }

    /// The storage collaborator
    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    // --- management surface ---

    /// Register a new webhook
    pub async fn create_webhook(&self, webhook: Webhook) -> crate::Result<String> {
        self.registry.create(webhook).await
    }

    /// Update a webhook
    pub async fn update_webhook(&self, webhook: Webhook) -> crate::Result<()> {
        self.registry.update(webhook).await
    }

    /// Get a webhook by ID
    pub fn get_webhook(&self, id: &str) -> Option<Webhook> {
        self.registry.get(id)
    }

    /// List all webhooks
    pub fn list_webhooks(&self) -> Vec<Webhook> {
        self.registry.list()
    }

    /// Delete a webhook; in-flight deliveries complete
    pub async fn delete_webhook(&self, id: &str) -> crate::Result<Webhook> {
        self.registry.delete(id).await
    }

    /// Delivery history for a webhook, every attempt, oldest first
    pub async fn delivery_history(&self, webhook_id: &str) -> crate::Result<Vec<Delivery>> {
        self.storage.deliveries_for_webhook(webhook_id).await
    }

    /// Trigger a manual test delivery with a synthetic event
    pub async fn test_webhook(&self, webhook_id: &str) -> crate::Result<Delivery> {
        let webhook = self
            .registry
            .get(webhook_id)
            .ok_or_else(|| WebhookError::WebhookNotFound(webhook_id.to_string()))?;

        let event = Event::new(types::WEBHOOK_TEST)
            .with_resource("webhook")
            .with_action("test")
            .with_data("webhook_id", json!(webhook_id));
        self.storage.put_event(&event).await?;

        let (task, outcome) = DeliveryTask::new(webhook, event).with_result_channel();
        self.pool.enqueue(task).await?;

        outcome
            .await
            .map_err(|_| WebhookError::OutcomeChannelClosed)
    }

    /// List dead-lettered deliveries
    pub fn dead_letters(&self, limit: usize) -> Vec<Delivery> {
        self.dlq.get(limit)
    }

    /// Re-submit a dead-lettered delivery as a fresh attempt sequence
    ///
    /// The attempt counter restarts at 1 and new delivery records are
    /// written; the original failure history remains queryable. The entry
    /// leaves the DLQ once re-submitted.
    pub async fn retry_dead_letter(&self, delivery_id: &str) -> crate::Result<()> {
        let entry = self
            .dlq
            .find(delivery_id)
            .ok_or_else(|| WebhookError::DeliveryNotFound(delivery_id.to_string()))?;

        let webhook = self
            .registry
            .get(&entry.webhook_id)
            .ok_or_else(|| WebhookError::WebhookNotFound(entry.webhook_id.clone()))?;
        let event = self
            .storage
            .event(&entry.event_id)
            .await?
            .ok_or_else(|| WebhookError::EventNotFound(entry.event_id.clone()))?;

        self.pool.enqueue(DeliveryTask::new(webhook, event)).await?;
        self.dlq.delete(delivery_id)?;
        debug!(delivery = %delivery_id, "dead letter re-submitted");
        Ok(())
    }

    /// Purge a dead-lettered delivery
    pub fn delete_dead_letter(&self, delivery_id: &str) -> crate::Result<Delivery> {
        self.dlq.delete(delivery_id)
    }

    /// Stop accepting work and drop queued-but-not-started tasks
    pub async fn shutdown(&self) {
        self.pool.shutdown().await;
    }

    /// Stop accepting work and process the remaining queue first
    pub async fn shutdown_drain(&self) {
        self.pool.shutdown_drain().await;
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for [`EventBus`]
#[derive(Default)]
pub struct EventBusBuilder {
    config: BusConfig,
    storage: Option<Arc<dyn Storage>>,
    admission: Option<Arc<dyn AdmissionControl>>,
    audit: Option<Arc<dyn AuditSink>>,
    dlq_order: DlqOrder,
}

impl EventBusBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the bus configuration
    pub fn config(mut self, config: BusConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the storage collaborator (defaults to [`MemoryStorage`])
    pub fn storage(mut self, storage: Arc<dyn Storage>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Set the admission control collaborator
    pub fn admission(mut self, admission: Arc<dyn AdmissionControl>) -> Self {
        self.admission = Some(admission);
        self
    }

    /// Set the audit sink notified of terminal delivery outcomes
    pub fn audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Set the dead letter listing order
    pub fn dlq_order(mut self, order: DlqOrder) -> Self {
        self.dlq_order = order;
        self
    }

    /// Build the bus and start its delivery workers
    ///
    /// Must be called within a tokio runtime.
    pub fn build(self) -> EventBus {
        let storage = self
            .storage
            .unwrap_or_else(|| Arc::new(MemoryStorage::new()));
        let registry = Arc::new(WebhookRegistry::new(Arc::clone(&storage)));
        let dlq = Arc::new(DeadLetterQueue::with_order(self.dlq_order));
        let client = WebhookClient::new(self.config.client.clone());

        let pool = Arc::new(DeliveryPool::start(
            self.config.pool,
            client,
            Arc::clone(&storage),
            Arc::clone(&registry),
            Arc::clone(&dlq),
            self.audit,
        ));

        EventBus {
            router: Arc::new(EventRouter::new()),
            registry,
            pool,
            storage,
            dlq,
            admission: self.admission,
        }
    }
}
