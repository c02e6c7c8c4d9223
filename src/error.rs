//! Error types for event and webhook operations

use thiserror::Error;

/// Errors that can occur during event publishing and webhook delivery
#[derive(Error, Debug)]
pub enum WebhookError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Invalid webhook URL
    #[error("Invalid webhook URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Invalid retry configuration
    #[error("Invalid retry configuration: {0}")]
    InvalidRetryConfig(String),

    /// Payload serialization failed
    #[error("Payload error: {0}")]
    Payload(String),

    /// Webhook not found
    #[error("Webhook not found: {0}")]
    WebhookNotFound(String),

    /// Event not found
    #[error("Event not found: {0}")]
    EventNotFound(String),

    /// Delivery not found
    #[error("Delivery not found: {0}")]
    DeliveryNotFound(String),

    /// Delivery queue is at capacity
    #[error("Delivery queue is full")]
    QueueFull,

    /// The delivery pool has stopped accepting work
    #[error("Delivery pool is shutting down")]
    ShuttingDown,

    /// The result channel was dropped before an outcome was produced
    #[error("Delivery outcome channel closed")]
    OutcomeChannelClosed,

    /// Storage collaborator failed
    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<serde_json::Error> for WebhookError {
    fn from(err: serde_json::Error) -> Self {
        WebhookError::Payload(err.to_string())
    }
}
