//! Source adapters for the scraper.
//!
//! Each upstream site has its own adapter implementing [`RecordSource`]:
//! - Primary bulletin table (`BulletinScraper`)
//! - Single-station time series (`StationSeriesScraper`)
//! - Regional bulletin behind a listing page (`RegionalBulletinScraper`)
//!
//! Adapters share no mutable state and may be fetched concurrently.

mod bulletin;
mod regional;
mod station_series;
pub mod timestamp;

use std::sync::Arc;

use async_trait::async_trait;
use futures::future;

use crate::error::Result;
use crate::models::{Config, RiverRecord};

pub use bulletin::BulletinScraper;
pub use regional::RegionalBulletinScraper;
pub use station_series::StationSeriesScraper;

/// A source of normalized river records.
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Short name used in logs and refresh reports.
    fn name(&self) -> &str;

    /// Fetch and parse the source once.
    async fn fetch(&self) -> Result<Vec<RiverRecord>>;
}

/// Sources built from configuration, split by failure policy.
pub struct SourceSet {
    /// Mandatory source: its failure aborts a refresh
    pub primary: Arc<dyn RecordSource>,
    /// Best-effort sources
    pub secondary: Vec<Arc<dyn RecordSource>>,
}

impl SourceSet {
    /// Build every configured adapter around one shared HTTP client.
    pub fn from_config(config: &Config, client: &reqwest::Client) -> Result<Self> {
        let primary: Arc<dyn RecordSource> = Arc::new(BulletinScraper::new(
            client.clone(),
            config.sources.bulletin.clone(),
        ));

        let mut secondary: Vec<Arc<dyn RecordSource>> = config
            .sources
            .stations
            .iter()
            .map(|station| {
                Arc::new(StationSeriesScraper::new(client.clone(), station.clone()))
                    as Arc<dyn RecordSource>
            })
            .collect();

        if config.sources.regional.enabled {
            secondary.push(Arc::new(RegionalBulletinScraper::new(
                client.clone(),
                config.sources.regional.clone(),
            )?));
        }

        Ok(Self { primary, secondary })
    }

    /// Every source, primary first.
    pub fn all(&self) -> Vec<Arc<dyn RecordSource>> {
        std::iter::once(Arc::clone(&self.primary))
            .chain(self.secondary.iter().cloned())
            .collect()
    }

    /// Fetch every source concurrently.
    ///
    /// A primary failure fails the whole batch. Secondary failures are
    /// logged and reported alongside the records that did arrive.
    pub async fn fetch_all(&self) -> Result<SourceBatch> {
        let sources = self.all();
        let results = future::join_all(sources.iter().map(|source| source.fetch())).await;

        let mut batch = SourceBatch::default();
        for (index, (source, result)) in sources.iter().zip(results).enumerate() {
            match result {
                Ok(records) => {
                    log::info!("{}: {} records", source.name(), records.len());
                    batch.counts.push((source.name().to_string(), records.len()));
                    batch.records.extend(records);
                }
                Err(e) if index == 0 => {
                    log::error!("Primary source {} failed: {e}", source.name());
                    return Err(e);
                }
                Err(e) => {
                    log::warn!("Skipping source {}: {e}", source.name());
                    batch.failures.push((source.name().to_string(), e.to_string()));
                }
            }
        }
        Ok(batch)
    }
}

/// Records gathered from one pass over a [`SourceSet`].
#[derive(Debug, Default)]
pub struct SourceBatch {
    /// Primary records first, then each secondary in order
    pub records: Vec<RiverRecord>,
    /// `(source, record count)` for every source that answered
    pub counts: Vec<(String, usize)>,
    /// `(source, error)` for every secondary source that failed
    pub failures: Vec<(String, String)>,
}

#[async_trait]
impl RecordSource for SourceSet {
    fn name(&self) -> &str {
        "all"
    }

    async fn fetch(&self) -> Result<Vec<RiverRecord>> {
        Ok(self.fetch_all().await?.records)
    }
}

/// Optional field text with the `-` "no data" placeholder removed.
pub(crate) fn optional_field(text: String) -> String {
    if text == "-" {
        String::new()
    } else {
        text
    }
}

/// Keep records with a usable key, logging the rest.
pub(crate) fn retain_valid(source: &str, records: Vec<RiverRecord>) -> Vec<RiverRecord> {
    records
        .into_iter()
        .filter(|record| match record.validate() {
            Ok(()) => true,
            Err(e) => {
                log::debug!("{source}: dropping row: {e}");
                false
            }
        })
        .collect()
}
