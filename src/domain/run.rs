//! Aggregation Runs
//!
//! One discover -> analyze -> persist cycle and its bounded history.
//! A run moves `Pending -> Running -> Completed | Failed` and is frozen
//! once it reaches a terminal state.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregationRun {
    pub id: Uuid,
    pub status: RunStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    /// Raw discovery feed count, before capping and dedup
    pub tokens_discovered: usize,
    pub tokens_processed: usize,
    pub tokens_passed: usize,
    pub tokens_stored: usize,
    /// Set when the run deadline dropped unfinished analyses
    pub partial_timeout: bool,
    pub errors: Vec<String>,
}

impl AggregationRun {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            status: RunStatus::Pending,
            start_time: Utc::now(),
            end_time: None,
            tokens_discovered: 0,
            tokens_processed: 0,
            tokens_passed: 0,
            tokens_stored: 0,
            partial_timeout: false,
            errors: Vec::new(),
        }
    }

    /// Pending -> Running. No-op in any other state.
    pub fn start(&mut self) {
        if self.status == RunStatus::Pending {
            self.status = RunStatus::Running;
            self.start_time = Utc::now();
        }
    }

    pub fn record_error(&mut self, error: impl Into<String>) {
        if !self.status.is_terminal() {
            self.errors.push(error.into());
        }
    }

    /// Finalize the run exactly once. Returns false if already finalized.
    pub fn finish(&mut self, status: RunStatus) -> bool {
        if self.status.is_terminal() || !status.is_terminal() {
            return false;
        }
        self.status = status;
        self.end_time = Some(Utc::now());
        true
    }

    pub fn duration_ms(&self) -> Option<i64> {
        self.end_time
            .map(|end| (end - self.start_time).num_milliseconds())
    }
}

impl Default for AggregationRun {
    fn default() -> Self {
        Self::new()
    }
}

/// Ring buffer of finished runs, oldest evicted first
#[derive(Debug, Clone)]
pub struct RunHistory {
    runs: VecDeque<AggregationRun>,
    capacity: usize,
}

impl RunHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            runs: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, run: AggregationRun) {
        if self.runs.len() == self.capacity {
            self.runs.pop_front();
        }
        self.runs.push_back(run);
    }

    /// Most recent `n` runs, newest first
    pub fn recent(&self, n: usize) -> Vec<AggregationRun> {
        self.runs.iter().rev().take(n).cloned().collect()
    }

    pub fn last(&self) -> Option<&AggregationRun> {
        self.runs.back()
    }

    pub fn len(&self) -> usize {
        self.runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }
}
