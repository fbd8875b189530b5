use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Wire shape handed to broadcast collaborators
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    #[serde(rename = "type")]
    pub event_type: String,
    pub payload: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Failed to publish {event_type}: {message}")]
    Publish { event_type: String, message: String },
}

/// Delivery of events to the outside world (websocket, webhook, log)
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn publish(&self, envelope: EventEnvelope) -> Result<(), NotifyError>;
}
