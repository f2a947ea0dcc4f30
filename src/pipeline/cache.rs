// src/pipeline/cache.rs

//! Read-through snapshot of the last aggregate fetch.
//!
//! Lets a front-end answer queries straight from upstream without hitting
//! every source on each request.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::error::Result;
use crate::models::RiverRecord;
use crate::services::RecordSource;

/// Records from one fetch and when they arrived.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub records: Arc<Vec<RiverRecord>>,
    pub fetched_at: DateTime<Utc>,
}

impl Snapshot {
    pub fn new(records: Vec<RiverRecord>) -> Self {
        Self {
            records: Arc::new(records),
            fetched_at: Utc::now(),
        }
    }

    /// Sorted, deduplicated river names.
    pub fn rivers(&self) -> Vec<String> {
        let mut rivers: Vec<String> = self.records.iter().map(|r| r.river.clone()).collect();
        rivers.sort();
        rivers.dedup();
        rivers
    }

    /// Records of one river, matched case-insensitively.
    pub fn river(&self, name: &str) -> Vec<RiverRecord> {
        let wanted = name.trim().to_lowercase();
        self.records
            .iter()
            .filter(|r| r.river.to_lowercase() == wanted)
            .cloned()
            .collect()
    }

    fn is_fresh(&self, max_age: Duration) -> bool {
        let age = Utc::now().signed_duration_since(self.fetched_at);
        age.to_std().map(|age| age < max_age).unwrap_or(true)
    }
}

/// Cache in front of a [`RecordSource`].
pub struct SnapshotCache {
    source: Arc<dyn RecordSource>,
    state: RwLock<Option<Snapshot>>,
}

impl SnapshotCache {
    pub fn new(source: Arc<dyn RecordSource>) -> Self {
        Self {
            source,
            state: RwLock::new(None),
        }
    }

    /// Current snapshot if younger than `max_age`, otherwise a fresh one.
    ///
    /// The source is fetched without holding the lock; concurrent misses
    /// may each fetch, and the last one to finish wins. A failed fetch
    /// leaves the previous snapshot in place.
    pub async fn get_or_refresh(&self, max_age: Duration) -> Result<Snapshot> {
        if let Some(snapshot) = self.state.read().await.as_ref() {
            if snapshot.is_fresh(max_age) {
                log::debug!("Serving cached snapshot from {}", snapshot.fetched_at);
                return Ok(snapshot.clone());
            }
        }

        log::info!("Snapshot stale or missing, fetching from {}", self.source.name());
        let snapshot = Snapshot::new(self.source.fetch().await?);
        *self.state.write().await = Some(snapshot.clone());
        Ok(snapshot)
    }

    /// Drop the cached snapshot.
    pub async fn invalidate(&self) {
        *self.state.write().await = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use crate::error::AppError;

    #[derive(Default)]
    struct CountingSource {
        calls: AtomicUsize,
        fail_after: Option<usize>,
    }

    #[async_trait]
    impl RecordSource for CountingSource {
        fn name(&self) -> &str {
            "counting"
        }

        async fn fetch(&self) -> Result<Vec<RiverRecord>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_after.is_some_and(|n| call >= n) {
                return Err(AppError::parse("upstream changed"));
            }
            let ts = Utc::now().fixed_offset();
            Ok(vec![
                RiverRecord::new("САВА", "ШАБАЦ", "190", ts),
                RiverRecord::new("Дунав", "БЕЗДАН", "312", ts),
                RiverRecord::new("Дунав", "АПАТИН", "250", ts),
            ])
        }
    }

    #[tokio::test]
    async fn test_reuses_snapshot_within_max_age() {
        let source = Arc::new(CountingSource::default());
        let cache = SnapshotCache::new(source.clone());

        let first = cache.get_or_refresh(Duration::from_secs(3600)).await.unwrap();
        let second = cache.get_or_refresh(Duration::from_secs(3600)).await.unwrap();

        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert_eq!(first.fetched_at, second.fetched_at);
    }

    #[tokio::test]
    async fn test_refetches_when_stale() {
        let source = Arc::new(CountingSource::default());
        let cache = SnapshotCache::new(source.clone());

        cache.get_or_refresh(Duration::from_secs(3600)).await.unwrap();
        cache.get_or_refresh(Duration::ZERO).await.unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);

        cache.invalidate().await;
        cache.get_or_refresh(Duration::from_secs(3600)).await.unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_failed_fetch_keeps_previous_snapshot() {
        let source = Arc::new(CountingSource {
            fail_after: Some(1),
            ..Default::default()
        });
        let cache = SnapshotCache::new(source.clone());

        cache.get_or_refresh(Duration::from_secs(3600)).await.unwrap();
        assert!(cache.get_or_refresh(Duration::ZERO).await.is_err());

        let snapshot = cache.get_or_refresh(Duration::from_secs(3600)).await.unwrap();
        assert_eq!(snapshot.records.len(), 3);
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_snapshot_queries() {
        let cache = SnapshotCache::new(Arc::new(CountingSource::default()));
        let snapshot = cache.get_or_refresh(Duration::from_secs(60)).await.unwrap();

        assert_eq!(snapshot.rivers(), vec!["Дунав", "САВА"]);
        assert_eq!(snapshot.river("дунав").len(), 2);
        assert_eq!(snapshot.river(" ДУНАВ ").len(), 2);
        assert!(snapshot.river("Тиса").is_empty());
    }
}
