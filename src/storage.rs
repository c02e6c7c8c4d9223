//! Storage collaborator interface and in-memory reference implementation

use crate::delivery::Delivery;
use crate::event::Event;
use crate::webhook::Webhook;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

/// Persistence collaborator for events, webhooks, and delivery records
///
/// The core treats this as an opaque key-addressed store. Implementations
/// back it with whatever the embedding application uses; [`MemoryStorage`]
/// is the reference implementation used in tests and simple embeddings.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Persist an event
    async fn put_event(&self, event: &Event) -> crate::Result<()>;

    /// Retrieve an event by ID
    async fn event(&self, id: &str) -> crate::Result<Option<Event>>;

    /// Persist a webhook configuration
    async fn put_webhook(&self, webhook: &Webhook) -> crate::Result<()>;

    /// Retrieve a webhook by ID
    async fn webhook(&self, id: &str) -> crate::Result<Option<Webhook>>;

    /// Remove a webhook
    async fn delete_webhook(&self, id: &str) -> crate::Result<()>;

    /// Persist a delivery record
    async fn put_delivery(&self, delivery: &Delivery) -> crate::Result<()>;

    /// Retrieve a delivery record by ID
    async fn delivery(&self, id: &str) -> crate::Result<Option<Delivery>>;

    /// Delivery history for a webhook, oldest first
    async fn deliveries_for_webhook(&self, webhook_id: &str) -> crate::Result<Vec<Delivery>>;
}

/// In-memory storage
#[derive(Debug, Default)]
pub struct MemoryStorage {
    events: RwLock<HashMap<String, Event>>,
    webhooks: RwLock<HashMap<String, Webhook>>,
    deliveries: RwLock<Vec<Delivery>>,
}

impl MemoryStorage {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn put_event(&self, event: &Event) -> crate::Result<()> {
        self.events
            .write()
            .unwrap()
            .insert(event.id.clone(), event.clone());
        Ok(())
    }

    async fn event(&self, id: &str) -> crate::Result<Option<Event>> {
        Ok(self.events.read().unwrap().get(id).cloned())
    }

    async fn put_webhook(&self, webhook: &Webhook) -> crate::Result<()> {
        self.webhooks
            .write()
            .unwrap()
            .insert(webhook.id.clone(), webhook.clone());
        Ok(())
    }

    async fn webhook(&self, id: &str) -> crate::Result<Option<Webhook>> {
        Ok(self.webhooks.read().unwrap().get(id).cloned())
    }

    async fn delete_webhook(&self, id: &str) -> crate::Result<()> {
        self.webhooks.write().unwrap().remove(id);
        Ok(())
    }

    async fn put_delivery(&self, delivery: &Delivery) -> crate::Result<()> {
        self.deliveries.write().unwrap().push(delivery.clone());
        Ok(())
    }

    async fn delivery(&self, id: &str) -> crate::Result<Option<Delivery>> {
        Ok(self
            .deliveries
            .read()
            .unwrap()
            .iter()
            .find(|d| d.id == id)
            .cloned())
    }

    async fn deliveries_for_webhook(&self, webhook_id: &str) -> crate::Result<Vec<Delivery>> {
        Ok(self
            .deliveries
            .read()
            .unwrap()
            .iter()
            .filter(|d| d.webhook_id == webhook_id)
            .cloned()
            .collect())
    }
}
