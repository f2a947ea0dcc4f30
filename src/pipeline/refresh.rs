// src/pipeline/refresh.rs

//! Refresh orchestration: fetch every source, store one combined batch.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Mutex;

use crate::error::Result;
use crate::services::SourceSet;
use crate::storage::RiverRepository;

/// Summary of one completed refresh.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshReport {
    /// Records produced by the primary source
    pub primary_count: usize,
    /// `(source, record count)` for every source that answered
    pub source_counts: Vec<(String, usize)>,
    /// `(source, error)` for every secondary source that failed
    pub failures: Vec<(String, String)>,
    /// Records written to storage
    pub saved: usize,
}

/// Result of a refresh request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    Completed(RefreshReport),
    /// Another refresh was already running
    Skipped,
}

/// Runs refreshes one at a time against a repository.
pub struct Refresher {
    sources: SourceSet,
    repository: Arc<dyn RiverRepository>,
    running: Mutex<()>,
}

impl Refresher {
    pub fn new(sources: SourceSet, repository: Arc<dyn RiverRepository>) -> Self {
        Self {
            sources,
            repository,
            running: Mutex::new(()),
        }
    }

    /// Fetch all sources and persist the combined batch.
    ///
    /// Returns [`RefreshOutcome::Skipped`] without doing any work when a
    /// refresh is already in flight. Nothing is saved if the primary source
    /// fails.
    pub async fn refresh(&self) -> Result<RefreshOutcome> {
        let Ok(_guard) = self.running.try_lock() else {
            log::info!("Refresh already in progress, skipping");
            return Ok(RefreshOutcome::Skipped);
        };

        let started = Instant::now();
        log::info!("Refreshing river data from {} sources", 1 + self.sources.secondary.len());

        let batch = self.sources.fetch_all().await?;
        let primary_count = batch
            .counts
            .first()
            .map(|(_, count)| *count)
            .unwrap_or_default();

        let saved = self.repository.save_all(&batch.records).await?;

        log::info!(
            "Refresh complete: saved {} records ({} failed sources) in {:.2}s",
            saved,
            batch.failures.len(),
            started.elapsed().as_secs_f64()
        );

        Ok(RefreshOutcome::Completed(RefreshReport {
            primary_count,
            source_counts: batch.counts,
            failures: batch.failures,
            saved,
        }))
    }
}
