//! Webhook endpoint configuration

use crate::filter::Filter;
use crate::retry::RetryConfig;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// A registered webhook endpoint
///
/// Owned and mutated by administrators through the registry; the delivery
/// pipeline reads snapshots. Deactivated or deleted webhooks stop receiving
/// new deliveries but do not cancel in-flight ones.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Webhook {
    /// Unique webhook ID
    pub id: String,

    /// Human-readable name
    pub name: String,

    /// Target URL for delivery
    pub url: String,

    /// Event types this webhook is subscribed to
    pub events: HashSet<String>,

    /// Static extra headers sent with every delivery
    #[serde(default)]
    pub headers: HashMap<String, String>,

    /// Signing secret; an empty secret means deliveries go unsigned
    #[serde(skip_serializing, default)]
    pub secret: String,

    /// Whether this webhook receives new deliveries
    pub active: bool,

    /// Retry configuration for failed deliveries
    pub retry: RetryConfig,

    /// Predicates an event must satisfy, all of them (AND semantics)
    #[serde(default)]
    pub filters: Vec<Filter>,

    /// Created timestamp
    pub created_at: DateTime<Utc>,

    /// Updated timestamp
    pub updated_at: DateTime<Utc>,

    /// Timestamp of the last successful delivery
    pub last_triggered: Option<DateTime<Utc>>,

    /// Consecutive failed deliveries since the last success
    pub failure_count: u32,
}

impl Webhook {
    /// Create a new webhook with the given URL and a generated secret
    pub fn new(url: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            name: String::new(),
            url: url.into(),
            events: HashSet::new(),
            headers: HashMap::new(),
            secret: generate_secret(),
            active: true,
            retry: RetryConfig::default(),
            filters: Vec::new(),
            created_at: now,
            updated_at: now,
            last_triggered: None,
            failure_count: 0,
        }
    }

    /// Create a builder for custom configuration
    pub fn builder(url: impl Into<String>) -> WebhookBuilder {
        WebhookBuilder::new(url)
    }

    /// Subscribe to an event type
    pub fn subscribe(&mut self, event_type: impl Into<String>) {
        self.events.insert(event_type.into());
        self.updated_at = Utc::now();
    }

    /// Remove an event type subscription
    pub fn unsubscribe(&mut self, event_type: &str) {
        self.events.remove(event_type);
        self.updated_at = Utc::now();
    }

    /// Check whether this webhook is subscribed to an event type
    ///
    /// Besides exact matches, `user.*` matches every `user.`-prefixed type
    /// and `*` matches everything.
    pub fn is_subscribed_to(&self, event_type: &str) -> bool {
        if self.events.contains(event_type) {
            return true;
        }

        for subscribed in &self.events {
            if let Some(prefix) = subscribed.strip_suffix(".*") {
                if event_type.starts_with(prefix) {
                    return true;
                }
            } else if subscribed == "*" {
                return true;
            }
        }

        false
    }

    /// Record a successful delivery
    pub fn record_success(&mut self) {
        self.last_triggered = Some(Utc::now());
        self.failure_count = 0;
        self.updated_at = Utc::now();
    }

    /// Record a failed delivery
    pub fn record_failure(&mut self) {
        self.failure_count += 1;
        self.updated_at = Utc::now();
    }

    /// Stop receiving new deliveries
    pub fn deactivate(&mut self) {
        self.active = false;
        self.updated_at = Utc::now();
    }

    /// Resume receiving deliveries
    pub fn activate(&mut self) {
        self.active = true;
        self.failure_count = 0;
        self.updated_at = Utc::now();
    }

    /// Regenerate the signing secret
    pub fn rotate_secret(&mut self) -> String {
        self.secret = generate_secret();
        self.updated_at = Utc::now();
        self.secret.clone()
    }
}

/// Builder for [`Webhook`]
#[derive(Debug, Clone)]
pub struct WebhookBuilder {
    webhook: Webhook,
}

impl WebhookBuilder {
    /// Create a new builder
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            webhook: Webhook::new(url),
        }
    }

    /// Set a custom ID
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.webhook.id = id.into();
        self
    }

    /// Set the name
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.webhook.name = name.into();
        self
    }

    /// Set the signing secret; pass an empty string for unsigned delivery
    pub fn secret(mut self, secret: impl Into<String>) -> Self {
        self.webhook.secret = secret.into();
        self
    }

    /// Subscribe to event types
    pub fn events(mut self, events: Vec<&str>) -> Self {
        self.webhook.events = events.into_iter().map(String::from).collect();
        self
    }

    /// Subscribe to all event types
    pub fn all_events(mut self) -> Self {
        self.webhook.events.insert("*".to_string());
        self
    }

    /// Add a static header
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.webhook.headers.insert(key.into(), value.into());
        self
    }

    /// Set the retry configuration
    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.webhook.retry = retry;
        self
    }

    /// Add a filter predicate
    pub fn filter(mut self, filter: Filter) -> Self {
        self.webhook.filters.push(filter);
        self
    }

    /// Set the active flag
    pub fn active(mut self, active: bool) -> Self {
        self.webhook.active = active;
        self
    }

    /// Build the webhook
    pub fn build(self) -> Webhook {
        self.webhook
    }
}

/// Generate a random signing secret
fn generate_secret() -> String {
    use std::time::SystemTime;

    let uuid = Uuid::new_v4();
    let timestamp = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();

    format!("whsec_{}_{:x}", uuid.simple(), timestamp % 0xFFFFFFFF)
}
