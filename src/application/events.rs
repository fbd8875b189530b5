//! Aggregator Event Bus
//!
//! A bounded `tokio::sync::broadcast` channel carrying every lifecycle event.
//! Subscribers that fall behind lose the oldest events (they see `Lagged`);
//! emitting never blocks the pipeline.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::{AggregationRun, Alert, ProviderId};
use crate::ports::{EventEnvelope, Notifier};

/// Default channel capacity
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// Everything the aggregator and pipeline announce
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum AggregatorEvent {
    RunStart {
        run_id: Uuid,
    },
    RunComplete(AggregationRun),
    TokenDiscovered {
        run_id: Uuid,
        discovered: usize,
        queued: usize,
    },
    TokenPassed {
        address: String,
        score: u8,
    },
    TokenStored {
        address: String,
    },
    TokenBlacklisted {
        address: String,
        reason: String,
    },
    StageStart {
        address: String,
        provider: ProviderId,
    },
    StageComplete {
        address: String,
        provider: ProviderId,
        success: bool,
        filtered: bool,
        latency_ms: u64,
    },
    TokenComplete {
        address: String,
        score: u8,
        passed: bool,
        cached: bool,
    },
    ConfigUpdated {
        changes: Vec<String>,
    },
    StatsReset {
        reset_at: DateTime<Utc>,
    },
    AlertRaised(Alert),
}

impl AggregatorEvent {
    /// Wire name of the event
    pub fn kind(&self) -> &'static str {
        match self {
            AggregatorEvent::RunStart { .. } => "run:start",
            AggregatorEvent::RunComplete(_) => "run:complete",
            AggregatorEvent::TokenDiscovered { .. } => "token:discovered",
            AggregatorEvent::TokenPassed { .. } => "token:passed",
            AggregatorEvent::TokenStored { .. } => "token:stored",
            AggregatorEvent::TokenBlacklisted { .. } => "token:blacklisted",
            AggregatorEvent::StageStart { .. } => "stage:start",
            AggregatorEvent::StageComplete { .. } => "stage:complete",
            AggregatorEvent::TokenComplete { .. } => "token:complete",
            AggregatorEvent::ConfigUpdated { .. } => "config:updated",
            AggregatorEvent::StatsReset { .. } => "stats:reset",
            AggregatorEvent::AlertRaised(_) => "alert:raised",
        }
    }

    /// Token the event is about, if any
    pub fn address(&self) -> Option<&str> {
        match self {
            AggregatorEvent::TokenPassed { address, .. }
            | AggregatorEvent::TokenStored { address }
            | AggregatorEvent::TokenBlacklisted { address, .. }
            | AggregatorEvent::StageStart { address, .. }
            | AggregatorEvent::StageComplete { address, .. }
            | AggregatorEvent::TokenComplete { address, .. } => Some(address),
            AggregatorEvent::AlertRaised(alert) => Some(&alert.token_address),
            _ => None,
        }
    }

    pub fn to_envelope(&self) -> EventEnvelope {
        let payload = serde_json::to_value(self).unwrap_or(serde_json::Value::Null);
        EventEnvelope {
            event_type: self.kind().to_string(),
            payload,
            timestamp: Utc::now(),
        }
    }
}

/// Cloneable handle to the broadcast channel
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<AggregatorEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Send to every current subscriber. Having none is not an error.
    pub fn emit(&self, event: AggregatorEvent) {
        if self.sender.send(event).is_err() {
            debug!("Event dropped, no subscribers");
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AggregatorEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Bridge the channel to a `Notifier` until every sender is dropped
    pub fn spawn_forwarder(&self, notifier: Arc<dyn Notifier>) -> JoinHandle<()> {
        let mut receiver = self.subscribe();
        tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(event) => {
                        if let Err(e) = notifier.publish(event.to_envelope()).await {
                            warn!("Notifier rejected event: {}", e);
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Event forwarder lagged, {} events skipped", skipped);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            debug!("Event forwarder stopped");
        })
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}
