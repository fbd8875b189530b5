//! JSONL Analysis Store
//!
//! Append-only file, one `CombinedAnalysis` per line, with an in-memory
//! index rebuilt on open so `latest_analysis` and `history` never touch disk.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::domain::CombinedAnalysis;
use crate::ports::{AnalysisStore, StoreError};

/// Analyses kept in memory per address
pub const DEFAULT_HISTORY_PER_TOKEN: usize = 50;

pub struct JsonlAnalysisStore {
    path: PathBuf,
    history_per_token: usize,
    index: RwLock<HashMap<String, VecDeque<CombinedAnalysis>>>,
    /// Serializes appends so lines never interleave
    write_lock: Mutex<()>,
}

impl JsonlAnalysisStore {
    /// Open (or create) the store at `path`, replaying existing lines into the index
    pub async fn open(path: impl AsRef<Path>, history_per_token: usize) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let store = Self {
            path,
            history_per_token: history_per_token.max(1),
            index: RwLock::new(HashMap::new()),
            write_lock: Mutex::new(()),
        };
        store.replay().await?;
        Ok(store)
    }

    async fn replay(&self) -> Result<(), StoreError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };

        let mut loaded = 0usize;
        for (line_no, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<CombinedAnalysis>(line) {
                Ok(analysis) => {
                    self.index_analysis(analysis);
                    loaded += 1;
                }
                Err(e) => warn!(
                    "Skipping malformed line {} in {}: {}",
                    line_no + 1,
                    self.path.display(),
                    e
                ),
            }
        }

        if loaded > 0 {
            info!("Loaded {} stored analyses from {}", loaded, self.path.display());
        }
        Ok(())
    }

    fn index_analysis(&self, analysis: CombinedAnalysis) {
        let mut index = self.index.write();
        let entries = index.entry(analysis.address.clone()).or_default();
        if entries.len() == self.history_per_token {
            entries.pop_front();
        }
        entries.push_back(analysis);
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of distinct addresses stored
    pub fn token_count(&self) -> usize {
        self.index.read().len()
    }
}

#[async_trait]
impl AnalysisStore for JsonlAnalysisStore {
    async fn store_analysis(&self, analysis: &CombinedAnalysis) -> Result<(), StoreError> {
        let mut line = serde_json::to_string(analysis)?;
        line.push('\n');

        {
            let _guard = self.write_lock.lock().await;
            let mut file = tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)
                .await?;
            file.write_all(line.as_bytes()).await?;
            file.flush().await?;
        }

        self.index_analysis(analysis.clone());
        Ok(())
    }

    async fn latest_analysis(&self, address: &str) -> Result<Option<CombinedAnalysis>, StoreError> {
        Ok(self
            .index
            .read()
            .get(address)
            .and_then(|entries| entries.back().cloned()))
    }

    async fn history(&self, address: &str, limit: usize) -> Result<Vec<CombinedAnalysis>, StoreError> {
        Ok(self
            .index
            .read()
            .get(address)
            .map(|entries| entries.iter().rev().take(limit).cloned().collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AbsentKind, Stage};
    use chrono::Utc;
    use tempfile::TempDir;

    fn analysis(address: &str, score: u8) -> CombinedAnalysis {
        CombinedAnalysis {
            address: address.to_string(),
            market: Stage::absent(AbsentKind::Timeout, "t"),
            security: Stage::absent(AbsentKind::Timeout, "t"),
            routing: Stage::absent(AbsentKind::Timeout, "t"),
            holders: Stage::absent(AbsentKind::Timeout, "t"),
            overall_score: score,
            passed: true,
            failed_filters: Vec::new(),
            recommendations: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_store_and_query() {
        let dir = TempDir::new().unwrap();
        let store = JsonlAnalysisStore::open(dir.path().join("analyses.jsonl"), 10)
            .await
            .unwrap();

        store.store_analysis(&analysis("a", 10)).await.unwrap();
        store.store_analysis(&analysis("a", 20)).await.unwrap();
        store.store_analysis(&analysis("b", 30)).await.unwrap();

        let latest = store.latest_analysis("a").await.unwrap().unwrap();
        assert_eq!(latest.overall_score, 20);

        let history = store.history("a", 10).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].overall_score, 20);
        assert_eq!(history[1].overall_score, 10);

        assert!(store.latest_analysis("missing").await.unwrap().is_none());
        assert_eq!(store.token_count(), 2);
    }

    #[tokio::test]
    async fn test_reopen_replays_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("analyses.jsonl");

        {
            let store = JsonlAnalysisStore::open(&path, 10).await.unwrap();
            store.store_analysis(&analysis("a", 42)).await.unwrap();
        }

        // a torn write must not poison the store
        let mut content = std::fs::read_to_string(&path).unwrap();
        content.push_str("{\"address\": \"broken\n");
        std::fs::write(&path, content).unwrap();

        let store = JsonlAnalysisStore::open(&path, 10).await.unwrap();
        let latest = store.latest_analysis("a").await.unwrap().unwrap();
        assert_eq!(latest.overall_score, 42);
        assert_eq!(store.token_count(), 1);
    }

    #[tokio::test]
    async fn test_history_is_bounded_per_token() {
        let dir = TempDir::new().unwrap();
        let store = JsonlAnalysisStore::open(dir.path().join("a.jsonl"), 2)
            .await
            .unwrap();
        for score in 0..5 {
            store.store_analysis(&analysis("a", score)).await.unwrap();
        }
        let history = store.history("a", 10).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].overall_score, 4);
    }
}
