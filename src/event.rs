//! Event entity and the platform event type catalog

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Well-known event types emitted by the platform
pub mod types {
    // Authentication events
    pub const USER_LOGIN: &str = "user.login";
    pub const USER_LOGOUT: &str = "user.logout";
    pub const USER_LOGIN_FAILED: &str = "user.login.failed";
    pub const TOKEN_CREATED: &str = "token.created";
    pub const TOKEN_REFRESHED: &str = "token.refreshed";
    pub const TOKEN_REVOKED: &str = "token.revoked";
    pub const TOKEN_EXPIRED: &str = "token.expired";

    // MFA events
    pub const MFA_ENABLED: &str = "mfa.enabled";
    pub const MFA_DISABLED: &str = "mfa.disabled";
    pub const MFA_VERIFIED: &str = "mfa.verified";
    pub const MFA_FAILED: &str = "mfa.failed";
    pub const MFA_DEVICE_ADDED: &str = "mfa.device.added";
    pub const MFA_DEVICE_REMOVED: &str = "mfa.device.removed";

    // User management events
    pub const USER_CREATED: &str = "user.created";
    pub const USER_UPDATED: &str = "user.updated";
    pub const USER_DELETED: &str = "user.deleted";
    pub const USER_PASSWORD_CHANGED: &str = "user.password.changed";
    pub const USER_EMAIL_VERIFIED: &str = "user.email.verified";

    // Permission events
    pub const ROLE_CREATED: &str = "role.created";
    pub const ROLE_UPDATED: &str = "role.updated";
    pub const ROLE_DELETED: &str = "role.deleted";
    pub const PERMISSION_GRANTED: &str = "permission.granted";
    pub const PERMISSION_REVOKED: &str = "permission.revoked";

    // Security events
    pub const SECURITY_ALERT: &str = "security.alert";
    pub const SUSPICIOUS_ACTIVITY: &str = "security.suspicious";
    pub const BRUTE_FORCE_DETECTED: &str = "security.bruteforce";
    pub const RATE_LIMIT_EXCEEDED: &str = "security.ratelimit";
    pub const IP_BLOCKED: &str = "security.ip.blocked";

    // System events
    pub const SYSTEM_STARTED: &str = "system.started";
    pub const SYSTEM_STOPPED: &str = "system.stopped";
    pub const CONFIG_CHANGED: &str = "system.config.changed";
    pub const KEY_ROTATED: &str = "system.key.rotated";
    pub const BACKUP_COMPLETED: &str = "system.backup.completed";

    // SSO events
    pub const SSO_LOGIN: &str = "sso.login";
    pub const SSO_LOGOUT: &str = "sso.logout";
    pub const SSO_PROVIDER_ADDED: &str = "sso.provider.added";
    pub const SSO_PROVIDER_REMOVED: &str = "sso.provider.removed";

    /// Synthetic type used for manual webhook test deliveries
    pub const WEBHOOK_TEST: &str = "webhook.test";
}

/// Event priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    Critical,
}

/// An immutable record of something that happened on the platform
///
/// Events are created by a publisher, fanned out to in-process handlers and
/// matching webhooks, and never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Unique event ID
    pub id: String,

    /// Event type (e.g., "user.login", "token.revoked")
    #[serde(rename = "type")]
    pub event_type: String,

    /// Event priority
    pub priority: Priority,

    /// Timestamp when the event occurred
    pub timestamp: DateTime<Utc>,

    /// User the event relates to, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    /// Session the event originated from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,

    /// Source IP address
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,

    /// Source user agent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,

    /// Resource the event acted on
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,

    /// Action that was performed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,

    /// Outcome of the action (e.g., "success", "failure")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,

    /// Free-form event data
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub data: Map<String, Value>,

    /// Free-form metadata
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

impl Event {
    /// Create a new event of the given type
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            event_type: event_type.into(),
            priority: Priority::Normal,
            timestamp: Utc::now(),
            user_id: None,
            session_id: None,
            ip: None,
            user_agent: None,
            resource: None,
            action: None,
            result: None,
            data: Map::new(),
            metadata: Map::new(),
        }
    }

    /// Set a custom ID
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Set the priority
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Set the user ID
    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Set the session ID
    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Set the source IP
    pub fn with_ip(mut self, ip: impl Into<String>) -> Self {
        self.ip = Some(ip.into());
        self
    }

    /// Set the source user agent
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Set the resource
    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    /// Set the action
    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    /// Set the result
    pub fn with_result(mut self, result: impl Into<String>) -> Self {
        self.result = Some(result.into());
        self
    }

    /// Add a data entry
    pub fn with_data(mut self, key: impl Into<String>, value: Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }

    /// Add a metadata entry
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Serialize to the JSON delivery envelope
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Look up a field by dotted path
    ///
    /// Top-level fields are addressed by name; paths starting with `data.`
    /// or `metadata.` descend into the corresponding map. Unknown paths
    /// return `None`.
    pub fn field(&self, path: &str) -> Option<Value> {
        let mut segments = path.split('.');
        let head = segments.next()?;

        let value = match head {
            "id" => Value::String(self.id.clone()),
            "type" => Value::String(self.event_type.clone()),
            "priority" => serde_json::to_value(self.priority).ok()?,
            "timestamp" => Value::String(self.timestamp.to_rfc3339()),
            "user_id" => Value::String(self.user_id.clone()?),
            "session_id" => Value::String(self.session_id.clone()?),
            "ip" => Value::String(self.ip.clone()?),
            "user_agent" => Value::String(self.user_agent.clone()?),
            "resource" => Value::String(self.resource.clone()?),
            "action" => Value::String(self.action.clone()?),
            "result" => Value::String(self.result.clone()?),
            "data" => Value::Object(self.data.clone()),
            "metadata" => Value::Object(self.metadata.clone()),
            _ => return None,
        };

        segments.try_fold(value, |current, segment| {
            current.as_object().and_then(|map| map.get(segment)).cloned()
        })
    }
}
