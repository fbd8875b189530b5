//! Aggregator Statistics
//!
//! Running totals since start (or the last reset), a histogram of filter
//! failure reasons and the most recent run.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::{AggregationRun, CombinedAnalysis, RunStatus};

/// Snapshot returned by the query surface
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregatorStats {
    pub total_runs: u64,
    pub failed_runs: u64,
    pub tokens_discovered: u64,
    pub tokens_processed: u64,
    pub tokens_passed: u64,
    pub tokens_failed: u64,
    pub tokens_stored: u64,
    pub tokens_blacklisted: u64,
    pub alerts_raised: u64,
    /// Failure reason (without its numbers) -> count
    pub failure_reasons: BTreeMap<String, u64>,
    pub avg_passed_score: f64,
    pub last_run: Option<AggregationRun>,
    pub since: DateTime<Utc>,
}

#[derive(Debug)]
pub struct StatsTracker {
    stats: AggregatorStats,
    passed_score_sum: u64,
}

impl Default for StatsTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl StatsTracker {
    pub fn new() -> Self {
        Self {
            stats: AggregatorStats {
                total_runs: 0,
                failed_runs: 0,
                tokens_discovered: 0,
                tokens_processed: 0,
                tokens_passed: 0,
                tokens_failed: 0,
                tokens_stored: 0,
                tokens_blacklisted: 0,
                alerts_raised: 0,
                failure_reasons: BTreeMap::new(),
                avg_passed_score: 0.0,
                last_run: None,
                since: Utc::now(),
            },
            passed_score_sum: 0,
        }
    }

    /// Count one completed analysis
    pub fn record_analysis(&mut self, analysis: &CombinedAnalysis) {
        self.stats.tokens_processed += 1;
        if analysis.passed {
            self.stats.tokens_passed += 1;
            self.passed_score_sum += u64::from(analysis.overall_score);
            self.stats.avg_passed_score =
                self.passed_score_sum as f64 / self.stats.tokens_passed as f64;
        } else {
            self.stats.tokens_failed += 1;
            for reason in &analysis.failed_filters {
                *self
                    .stats
                    .failure_reasons
                    .entry(reason_key(reason))
                    .or_insert(0) += 1;
            }
        }
    }

    pub fn record_stored(&mut self) {
        self.stats.tokens_stored += 1;
    }

    pub fn record_blacklisted(&mut self) {
        self.stats.tokens_blacklisted += 1;
    }

    pub fn record_alerts(&mut self, count: usize) {
        self.stats.alerts_raised += count as u64;
    }

    /// Fold a finalized run into the totals
    pub fn record_run(&mut self, run: &AggregationRun) {
        self.stats.total_runs += 1;
        if run.status == RunStatus::Failed {
            self.stats.failed_runs += 1;
        }
        self.stats.tokens_discovered += run.tokens_discovered as u64;
        self.stats.last_run = Some(run.clone());
    }

    pub fn snapshot(&self) -> AggregatorStats {
        self.stats.clone()
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

/// Histogram key: the reason up to its first `:`, so values don't split buckets
fn reason_key(reason: &str) -> String {
    reason
        .split(':')
        .next()
        .unwrap_or(reason)
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AbsentKind, Stage};
    use approx::assert_relative_eq;

    fn analysis(score: u8, failed: &[&str]) -> CombinedAnalysis {
        CombinedAnalysis {
            address: "a".to_string(),
            market: Stage::absent(AbsentKind::Timeout, "t"),
            security: Stage::absent(AbsentKind::Timeout, "t"),
            routing: Stage::absent(AbsentKind::Timeout, "t"),
            holders: Stage::absent(AbsentKind::Timeout, "t"),
            overall_score: score,
            passed: failed.is_empty(),
            failed_filters: failed.iter().map(|s| s.to_string()).collect(),
            recommendations: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_reason_key_drops_values() {
        assert_eq!(reason_key("Liquidity too low: $3000 < $5000"), "Liquidity too low");
        assert_eq!(reason_key("Honeypot detected"), "Honeypot detected");
    }

    #[test]
    fn test_pass_fail_accounting() {
        let mut tracker = StatsTracker::new();
        tracker.record_analysis(&analysis(80, &[]));
        tracker.record_analysis(&analysis(60, &[]));
        tracker.record_analysis(&analysis(20, &["Liquidity too low: $3000 < $5000"]));
        tracker.record_analysis(&analysis(10, &["Liquidity too low: $10 < $5000", "Honeypot detected"]));

        let stats = tracker.snapshot();
        assert_eq!(stats.tokens_processed, 4);
        assert_eq!(stats.tokens_passed, 2);
        assert_eq!(stats.tokens_failed, 2);
        assert_relative_eq!(stats.avg_passed_score, 70.0);
        assert_eq!(stats.failure_reasons.get("Liquidity too low"), Some(&2));
        assert_eq!(stats.failure_reasons.get("Honeypot detected"), Some(&1));
    }

    #[test]
    fn test_record_run_and_reset() {
        let mut tracker = StatsTracker::new();
        let mut run = AggregationRun::new();
        run.start();
        run.tokens_discovered = 200;
        run.finish(RunStatus::Failed);
        tracker.record_run(&run);
        tracker.record_stored();
        tracker.record_blacklisted();

        let stats = tracker.snapshot();
        assert_eq!(stats.total_runs, 1);
        assert_eq!(stats.failed_runs, 1);
        assert_eq!(stats.tokens_discovered, 200);
        assert_eq!(stats.last_run.as_ref().map(|r| r.id), Some(run.id));

        tracker.reset();
        let stats = tracker.snapshot();
        assert_eq!(stats.total_runs, 0);
        assert_eq!(stats.tokens_stored, 0);
        assert!(stats.last_run.is_none());
    }
}
