//! Delivery attempt records and failure classification

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use uuid::Uuid;

/// Status of a webhook delivery attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    /// Delivery is queued
    Pending,

    /// Delivery is in progress
    InProgress,

    /// Delivery succeeded
    Succeeded,

    /// Delivery failed but a retry is scheduled
    Failed,

    /// Delivery permanently failed (no more retries)
    PermanentlyFailed,
}

impl DeliveryStatus {
    /// Check if the delivery is complete (success or permanent failure)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::PermanentlyFailed)
    }

    /// Check if the delivery succeeded
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }
}

/// Record of one attempt to deliver one event to one webhook
///
/// Every attempt produces a new record with a fresh ID; `attempts` carries
/// the cumulative attempt number across retries of the same logical
/// delivery. At most one of `delivered_at` and `next_retry_at` is set —
/// a failed record with neither is terminal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Delivery {
    /// Unique ID of this attempt
    pub id: String,

    /// Webhook the attempt targeted
    pub webhook_id: String,

    /// Event that was delivered
    pub event_id: String,

    /// URL as attempted
    pub url: String,

    /// Headers as actually sent, kept for audit
    pub headers: HashMap<String, String>,

    /// JSON envelope as actually sent
    pub payload: String,

    /// HTTP status code, if a response was received
    pub status_code: Option<u16>,

    /// Whether the endpoint accepted the delivery
    pub success: bool,

    /// Error description on failure
    pub error: Option<String>,

    /// Response body excerpt, truncated
    pub response: Option<String>,

    /// Cumulative attempt number for the logical delivery
    pub attempts: u32,

    /// Set only on success
    pub delivered_at: Option<DateTime<Utc>>,

    /// Set only when a retry is scheduled
    pub next_retry_at: Option<DateTime<Utc>>,

    /// Current status
    pub status: DeliveryStatus,

    /// Created timestamp
    pub created_at: DateTime<Utc>,
}

impl Delivery {
    /// Create a new record for the given attempt number
    pub fn new(
        webhook_id: impl Into<String>,
        event_id: impl Into<String>,
        url: impl Into<String>,
        attempt: u32,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            webhook_id: webhook_id.into(),
            event_id: event_id.into(),
            url: url.into(),
            headers: HashMap::new(),
            payload: String::new(),
            status_code: None,
            success: false,
            error: None,
            response: None,
            attempts: attempt,
            delivered_at: None,
            next_retry_at: None,
            status: DeliveryStatus::Pending,
            created_at: Utc::now(),
        }
    }

    /// Record a successful delivery
    pub fn mark_succeeded(&mut self, status_code: u16, response: Option<String>) {
        self.status = DeliveryStatus::Succeeded;
        self.success = true;
        self.status_code = Some(status_code);
        self.response = response.map(|body| truncate(&body, 1024));
        self.error = None;
        self.delivered_at = Some(Utc::now());
        self.next_retry_at = None;
    }

    /// Record a failed delivery without an HTTP response
    pub fn mark_failed(&mut self, error: String) {
        self.status = DeliveryStatus::PermanentlyFailed;
        self.success = false;
        self.error = Some(error);
        self.delivered_at = None;
        self.next_retry_at = None;
    }

    /// Record a failed delivery with an HTTP status
    pub fn mark_failed_with_status(&mut self, status_code: u16, response: Option<String>) {
        self.mark_failed(format!("HTTP {status_code}"));
        self.status_code = Some(status_code);
        self.response = response.map(|body| truncate(&body, 1024));
    }

    /// Flip a failed record to retryable with the scheduled retry time
    pub fn schedule_retry(&mut self, at: DateTime<Utc>) {
        self.status = DeliveryStatus::Failed;
        self.next_retry_at = Some(at);
    }
}

/// Classification of a failed attempt, deciding retry vs dead-letter
#[derive(Debug, Clone, PartialEq)]
pub enum FailureKind {
    /// Connection, DNS, or timeout failure before a response was read
    Transport(String),

    /// The endpoint answered 5xx, or 429 with an optional Retry-After
    Server {
        status: u16,
        retry_after: Option<Duration>,
    },

    /// The endpoint rejected the request deterministically (4xx, not 429)
    Client { status: u16 },

    /// The event could not be serialized; retrying cannot change this
    Serialization(String),
}

impl FailureKind {
    /// Classify an unsuccessful HTTP status code
    pub fn from_status(status: u16, retry_after: Option<Duration>) -> Self {
        if status == 429 || (500..600).contains(&status) {
            Self::Server {
                status,
                retry_after,
            }
        } else {
            Self::Client { status }
        }
    }

    /// Whether a retry can plausibly succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Server { .. })
    }

    /// Server-requested retry delay, honored over the computed backoff
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Server { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

/// Truncate a string to a maximum length
fn truncate(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        s.to_string()
    } else {
        format!("{}...", &s[..max_len - 3])
    }
}
