//! Webhook registry and management mutations

use crate::error::WebhookError;
use crate::event::Event;
use crate::filter;
use crate::storage::Storage;
use crate::webhook::Webhook;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::debug;
use url::Url;

/// Registry of webhook configurations
///
/// The in-memory map is authoritative for delivery decisions; management
/// mutations write through to the [`Storage`] collaborator before the map
/// is updated, so a storage failure leaves no partial state.
pub struct WebhookRegistry {
    webhooks: RwLock<HashMap<String, Webhook>>,
    storage: Arc<dyn Storage>,
}

impl WebhookRegistry {
    /// Create an empty registry backed by the given storage
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            webhooks: RwLock::new(HashMap::new()),
            storage,
        }
    }

    /// Register a new webhook after validating its URL and retry config
    pub async fn create(&self, webhook: Webhook) -> crate::Result<String> {
        Url::parse(&webhook.url)?;
        webhook.retry.validate()?;

        self.storage.put_webhook(&webhook).await?;
        let id = webhook.id.clone();
        self.webhooks.write().unwrap().insert(id.clone(), webhook);
        debug!(webhook = %id, "webhook registered");
        Ok(id)
    }

    /// Update an existing webhook
    pub async fn update(&self, webhook: Webhook) -> crate::Result<()> {
        Url::parse(&webhook.url)?;
        webhook.retry.validate()?;

        if !self.exists(&webhook.id) {
            return Err(WebhookError::WebhookNotFound(webhook.id.clone()));
        }

        self.storage.put_webhook(&webhook).await?;
        self.webhooks
            .write()
            .unwrap()
            .insert(webhook.id.clone(), webhook);
        Ok(())
    }

    /// Remove a webhook
    ///
    /// In-flight deliveries carry their own snapshot and complete.
    pub async fn delete(&self, id: &str) -> crate::Result<Webhook> {
        self.storage.delete_webhook(id).await?;
        self.webhooks
            .write()
            .unwrap()
            .remove(id)
            .ok_or_else(|| WebhookError::WebhookNotFound(id.to_string()))
    }

    /// Get a webhook by ID
    pub fn get(&self, id: &str) -> Option<Webhook> {
        self.webhooks.read().unwrap().get(id).cloned()
    }

    /// List all webhooks
    pub fn list(&self) -> Vec<Webhook> {
        self.webhooks.read().unwrap().values().cloned().collect()
    }

    /// Check if a webhook exists
    pub fn exists(&self, id: &str) -> bool {
        self.webhooks.read().unwrap().contains_key(id)
    }

    /// Number of registered webhooks
    pub fn count(&self) -> usize {
        self.webhooks.read().unwrap().len()
    }

    /// Active webhooks interested in an event: subscribed to its type and
    /// with every filter matching
    pub fn matching(&self, event: &Event) -> Vec<Webhook> {
        let webhooks = self.webhooks.read().unwrap();
        webhooks
            .values()
            .filter(|w| {
                w.active
                    && w.is_subscribed_to(&event.event_type)
                    && filter::matches_all(event, &w.filters)
            })
            .cloned()
            .collect()
    }

    /// Mutate a webhook in place via callback
    pub fn with_webhook<F, R>(&self, id: &str, f: F) -> crate::Result<R>
    where
        F: FnOnce(&mut Webhook) -> R,
    {
        let mut webhooks = self.webhooks.write().unwrap();
        match webhooks.get_mut(id) {
            Some(webhook) => Ok(f(webhook)),
            None => Err(WebhookError::WebhookNotFound(id.to_string())),
        }
    }

    /// Record a successful delivery for a webhook
    pub fn record_success(&self, id: &str) -> crate::Result<()> {
        self.with_webhook(id, |w| w.record_success())
    }

    /// Record a failed delivery for a webhook
    pub fn record_failure(&self, id: &str) -> crate::Result<()> {
        self.with_webhook(id, |w| w.record_failure())
    }

    /// Stop a webhook from receiving new deliveries
    pub fn deactivate(&self, id: &str) -> crate::Result<()> {
        self.with_webhook(id, |w| w.deactivate())
    }

    /// Resume deliveries for a webhook
    pub fn activate(&self, id: &str) -> crate::Result<()> {
        self.with_webhook(id, |w| w.activate())
    }

    /// Webhooks whose consecutive failure count meets the threshold
    pub fn failing(&self, threshold: u32) -> Vec<Webhook> {
        let webhooks = self.webhooks.read().unwrap();
        webhooks
            .values()
            .filter(|w| w.failure_count >= threshold)
            .cloned()
            .collect()
    }
}
