//! Persistence of river records.
//!
//! Records are keyed by `(river, station, timestamp)`; saving the same
//! reading twice updates it in place. Queries always answer with the
//! latest reading per station.

pub mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};

use crate::error::Result;
use crate::models::RiverRecord;

pub use sqlite::SqliteRepository;

/// Trait for river record storage backends.
#[async_trait]
pub trait RiverRepository: Send + Sync {
    /// Upsert a batch atomically. Returns the number of records written.
    async fn save_all(&self, records: &[RiverRecord]) -> Result<usize>;

    /// Latest reading per station of `river`, ordered by station.
    async fn get_by_river_name(&self, river: &str) -> Result<Vec<RiverRecord>>;

    /// Distinct river names among the latest readings, alphabetical.
    async fn get_unique_rivers(&self) -> Result<Vec<String>>;

    /// Newest stored timestamp, or `None` when nothing is stored.
    async fn get_last_update_time(&self) -> Result<Option<DateTime<FixedOffset>>>;
}
