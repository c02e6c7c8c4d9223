//! In-process event routing

use crate::event::Event;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::{debug, error};

/// Handler invoked for events of a registered type
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Handle the event
    async fn handle(&self, event: &Event) -> Result<(), HandlerError>;
}

/// Event handler error
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error("Handler failed: {0}")]
    Failed(String),

    #[error("Event processing error: {0}")]
    Processing(String),
}

/// Dispatch error aggregating every handler failure
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("One or more handlers failed")]
    HandlersFailed(Vec<HandlerError>),
}

/// Routes published events to handlers registered by event type
///
/// Many dispatches may run concurrently; registration takes the write
/// lock exclusively. A failing handler never prevents the remaining
/// handlers from running.
#[derive(Default)]
pub struct EventRouter {
    routes: RwLock<HashMap<String, Vec<Arc<dyn EventHandler>>>>,
}

impl EventRouter {
    /// Create a new router
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for an event type, appended in registration order
    pub fn register(&self, event_type: impl Into<String>, handler: Arc<dyn EventHandler>) {
        let event_type = event_type.into();
        let mut routes = self.routes.write().unwrap();
        routes.entry(event_type.clone()).or_default().push(handler);
        debug!(event_type = %event_type, "handler registered");
    }

    /// Number of handlers registered for an event type
    pub fn handler_count(&self, event_type: &str) -> usize {
        let routes = self.routes.read().unwrap();
        routes.get(event_type).map(Vec::len).unwrap_or(0)
    }

    /// Dispatch an event to every handler registered for its type
    ///
    /// Handlers run sequentially in registration order; all errors are
    /// collected and returned as one aggregate.
    pub async fn dispatch(&self, event: &Event) -> Result<(), DispatchError> {
        // Snapshot under the read lock so dispatch never holds it across
        // an await point.
        let handlers = {
            let routes = self.routes.read().unwrap();
            routes.get(&event.event_type).cloned().unwrap_or_default()
        };

        let mut errors = Vec::new();
        for handler in &handlers {
            if let Err(err) = handler.handle(event).await {
                error!(event = %event.id, event_type = %event.event_type, error = %err, "event handler failed");
                errors.push(err);
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(DispatchError::HandlersFailed(errors))
        }
    }
}
