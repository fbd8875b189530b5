//! Log Notifier
//!
//! Writes every event envelope to the tracing output. Stage-level events go
//! to `debug` so an `info` log shows one line per interesting token.

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::ports::{EventEnvelope, Notifier, NotifyError};

#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

impl LogNotifier {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn publish(&self, envelope: EventEnvelope) -> Result<(), NotifyError> {
        let payload = serde_json::to_string(&envelope.payload).map_err(|e| NotifyError::Publish {
            event_type: envelope.event_type.clone(),
            message: e.to_string(),
        })?;

        match envelope.event_type.as_str() {
            "stage:start" | "stage:complete" | "token:complete" | "token:discovered" => {
                debug!(target: "scout::events", "[{}] {}", envelope.event_type, payload)
            }
            "alert:raised" | "token:blacklisted" => {
                warn!(target: "scout::events", "[{}] {}", envelope.event_type, payload)
            }
            _ => info!(target: "scout::events", "[{}] {}", envelope.event_type, payload),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    #[tokio::test]
    async fn test_publish_accepts_any_event() {
        let notifier = LogNotifier::new();
        for event_type in ["run:start", "stage:complete", "alert:raised"] {
            let envelope = EventEnvelope {
                event_type: event_type.to_string(),
                payload: json!({"address": "abc"}),
                timestamp: Utc::now(),
            };
            assert!(notifier.publish(envelope).await.is_ok());
        }
    }
}
