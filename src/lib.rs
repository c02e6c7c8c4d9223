//! Reliable event distribution and signed webhook delivery
//!
//! This crate distributes internally generated domain events to in-process
//! subscribers and to externally registered HTTP webhook endpoints, with
//! authenticated, retried delivery despite transient network or endpoint
//! failures.
//!
//! # Features
//!
//! - **Event Router**: dispatch published events to handlers registered by
//!   event type, aggregating handler failures
//! - **Webhook Fan-out**: subscription matching (exact types, wildcards)
//!   plus field/operator/value filters with AND semantics
//! - **Signed Delivery**: HMAC-SHA256 `X-Webhook-Signature` headers with
//!   constant-time verification
//! - **Worker Pool**: a fixed set of workers draining a bounded task queue,
//!   with an explicit blocking or rejecting overflow policy
//! - **Retries**: exponential backoff capped at a maximum delay, honoring
//!   `Retry-After`, with a dead letter queue past the retry budget
//! - **Delivery Tracking**: a persisted record per attempt, queryable per
//!   webhook through the storage collaborator
//!
//! # Example
//!
//! ```rust,no_run
//! use hookwire::{Event, EventBus, Webhook, types};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let bus = EventBus::new();
//!
//!     bus.create_webhook(
//!         Webhook::builder("https://example.com/hooks/security")
//!             .events(vec!["user.login", "security.*"])
//!             .secret("whsec_example")
//!             .build(),
//!     )
//!     .await?;
//!
//!     let event = Event::new(types::USER_LOGIN)
//!         .with_user_id("user-123")
//!         .with_result("success");
//!     bus.publish(event).await?;
//!
//!     bus.shutdown_drain().await;
//!     Ok(())
//! }
//! ```

mod bus;
mod client;
mod config;
mod delivery;
mod dlq;
mod error;
mod event;
mod filter;
mod queue;
mod registry;
mod retry;
mod router;
mod signature;
mod storage;
mod webhook;

pub use bus::{AdmissionControl, AuditError, AuditSink, EventBus, EventBusBuilder, EventBusError};
pub use client::{AttemptOutcome, WebhookClient};
pub use config::{BusConfig, BusConfigBuilder, ClientConfig};
pub use delivery::{Delivery, DeliveryStatus, FailureKind};
pub use dlq::{DeadLetterQueue, DlqOrder};
pub use error::WebhookError;
pub use event::{Event, Priority, types};
pub use filter::{Filter, FilterOp, matches_all};
pub use queue::{DeliveryPool, DeliveryTask, OverflowPolicy, PoolConfig};
pub use registry::WebhookRegistry;
pub use retry::RetryConfig;
pub use router::{DispatchError, EventHandler, EventRouter, HandlerError};
pub use signature::{Signer, headers};
pub use storage::{MemoryStorage, Storage};
pub use webhook::{Webhook, WebhookBuilder};

/// Result type for webhook operations
pub type Result<T> = std::result::Result<T, WebhookError>;
