//! Configuration for the event bus and delivery pool

use crate::queue::{OverflowPolicy, PoolConfig};
use std::time::Duration;

/// Configuration for the outgoing HTTP client
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// User-Agent header for outgoing requests
    pub user_agent: String,

    /// Whether to verify SSL certificates
    pub verify_ssl: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            user_agent: format!("Hookwire/{}", env!("CARGO_PKG_VERSION")),
            verify_ssl: true,
        }
    }
}

/// Configuration for the event bus
#[derive(Debug, Clone, Default)]
pub struct BusConfig {
    /// Delivery pool settings
    pub pool: PoolConfig,

    /// HTTP client settings
    pub client: ClientConfig,
}

impl BusConfig {
    /// Create a configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a builder for custom configuration
    pub fn builder() -> BusConfigBuilder {
        BusConfigBuilder::new()
    }
}

/// Builder for [`BusConfig`]
#[derive(Debug, Clone, Default)]
pub struct BusConfigBuilder {
    config: BusConfig,
}

impl BusConfigBuilder {
    /// Create a new builder with default settings
    pub fn new() -> Self {
        Self {
            config: BusConfig::default(),
        }
    }

    /// Set the number of delivery workers
    pub fn workers(mut self, workers: usize) -> Self {
        self.config.pool.workers = workers;
        self
    }

    /// Set the delivery queue capacity
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.pool.capacity = capacity;
        self
    }

    /// Set the queue overflow policy
    pub fn overflow(mut self, overflow: OverflowPolicy) -> Self {
        self.config.pool.overflow = overflow;
        self
    }

    /// Fail fast with a backpressure error when the queue is full
    pub fn reject_on_overflow(mut self) -> Self {
        self.config.pool.overflow = OverflowPolicy::Reject;
        self
    }

    /// Block up to `timeout` for queue space before failing
    pub fn block_on_overflow(mut self, timeout: Duration) -> Self {
        self.config.pool.overflow = OverflowPolicy::Block { timeout };
        self
    }

    /// Set the User-Agent header
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.client.user_agent = user_agent.into();
        self
    }

    /// Set SSL verification
    pub fn verify_ssl(mut self, verify: bool) -> Self {
        self.config.client.verify_ssl = verify;
        self
    }

    /// Build the configuration
    pub fn build(self) -> BusConfig {
        self.config
    }
}
