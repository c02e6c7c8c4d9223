//! Dead letter queue for deliveries that exhausted their retries

use crate::delivery::Delivery;
use crate::error::WebhookError;
use std::collections::VecDeque;
use std::sync::RwLock;

/// Ordering applied when listing dead letters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DlqOrder {
    /// Oldest entries first
    #[default]
    OldestFirst,

    /// Most recent entries first
    NewestFirst,
}

/// Holding area for terminally failed deliveries
///
/// Entries are never retried automatically; re-submission requires an
/// explicit trigger through the event bus management surface.
#[derive(Debug, Default)]
pub struct DeadLetterQueue {
    entries: RwLock<VecDeque<Delivery>>,
    order: DlqOrder,
}

impl DeadLetterQueue {
    /// Create an empty queue listing oldest entries first
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty queue with the given listing order
    pub fn with_order(order: DlqOrder) -> Self {
        Self {
            entries: RwLock::new(VecDeque::new()),
            order,
        }
    }

    /// Store a terminally failed delivery
    pub fn add(&self, delivery: Delivery) {
        let mut entries = self.entries.write().unwrap();
        entries.push_back(delivery);
    }

    /// Return up to `limit` entries in the configured order
    pub fn get(&self, limit: usize) -> Vec<Delivery> {
        let entries = self.entries.read().unwrap();
        match self.order {
            DlqOrder::OldestFirst => entries.iter().take(limit).cloned().collect(),
            DlqOrder::NewestFirst => entries.iter().rev().take(limit).cloned().collect(),
        }
    }

    /// Find an entry by delivery ID
    pub fn find(&self, delivery_id: &str) -> Option<Delivery> {
        let entries = self.entries.read().unwrap();
        entries.iter().find(|d| d.id == delivery_id).cloned()
    }

    /// Remove an entry by delivery ID
    pub fn delete(&self, delivery_id: &str) -> crate::Result<Delivery> {
        let mut entries = self.entries.write().unwrap();
        match entries.iter().position(|d| d.id == delivery_id) {
            Some(index) => Ok(entries.remove(index).expect("position was just found")),
            None => Err(WebhookError::DeliveryNotFound(delivery_id.to_string())),
        }
    }

    /// Number of stored entries
    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    /// Whether the queue is empty
    pub fn is_empty(&self) -> bool {
        self.entries.read().unwrap().is_empty()
    }

    /// Remove all entries
    pub fn clear(&self) {
        self.entries.write().unwrap().clear();
    }
}
