//! Blacklist
//!
//! Addresses that are never analyzed or persisted again. Entries only
//! leave through explicit removal.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::analysis::CombinedAnalysis;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlacklistEntry {
    pub reason: String,
    pub added_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct Blacklist {
    entries: HashMap<String, BlacklistEntry>,
}

impl Blacklist {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace. Returns true when the address was not listed before.
    pub fn add(&mut self, address: impl Into<String>, reason: impl Into<String>) -> bool {
        self.entries
            .insert(
                address.into(),
                BlacklistEntry {
                    reason: reason.into(),
                    added_at: Utc::now(),
                },
            )
            .is_none()
    }

    pub fn remove(&mut self, address: &str) -> bool {
        self.entries.remove(address).is_some()
    }

    pub fn contains(&self, address: &str) -> bool {
        self.entries.contains_key(address)
    }

    pub fn get(&self, address: &str) -> Option<&BlacklistEntry> {
        self.entries.get(address)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// When a failed analysis earns a blacklist entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlacklistPolicy {
    /// Blacklist confirmed honeypots
    #[serde(default = "default_honeypot")]
    pub honeypot: bool,
    /// Blacklist when the creator has at least this many rugs (None disables)
    #[serde(default = "default_creator_rug_threshold")]
    pub creator_rug_threshold: Option<u32>,
}

fn default_honeypot() -> bool {
    true
}

fn default_creator_rug_threshold() -> Option<u32> {
    Some(3)
}

impl Default for BlacklistPolicy {
    fn default() -> Self {
        Self {
            honeypot: default_honeypot(),
            creator_rug_threshold: default_creator_rug_threshold(),
        }
    }
}

impl BlacklistPolicy {
    /// Reason to blacklist `analysis`, if the policy calls for it
    pub fn verdict(&self, analysis: &CombinedAnalysis) -> Option<String> {
        if self.honeypot {
            if let Some(security) = analysis.security.data() {
                if security.is_honeypot {
                    return Some("Confirmed honeypot".to_string());
                }
            }
        }

        if let Some(threshold) = self.creator_rug_threshold {
            if let Some(holders) = analysis.holders.data() {
                if holders.creator_rugs >= threshold {
                    return Some(format!(
                        "Creator has {} previous rugs",
                        holders.creator_rugs
                    ));
                }
            }
        }

        None
    }
}
