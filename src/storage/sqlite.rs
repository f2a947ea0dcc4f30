// src/storage/sqlite.rs

//! SQLite repository backed by an `sqlx` pool.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};
use sqlx::Row;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow};

use crate::error::{AppError, Result};
use crate::models::{RiverRecord, Tendency};
use crate::storage::RiverRepository;

/// Format every timestamp is written in.
const STORED_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

const CREATE_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS river_data (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        river TEXT NOT NULL,
        station TEXT NOT NULL,
        water_level TEXT NOT NULL DEFAULT '',
        water_change TEXT NOT NULL DEFAULT '',
        discharge TEXT NOT NULL DEFAULT '',
        water_temp TEXT NOT NULL DEFAULT '',
        tendency TEXT NOT NULL DEFAULT '',
        timestamp TEXT NOT NULL,
        UNIQUE(river, station, timestamp)
    )
"#;

const UPSERT: &str = r#"
    INSERT INTO river_data
        (river, station, water_level, water_change, discharge, water_temp, tendency, timestamp)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?)
    ON CONFLICT(river, station, timestamp) DO UPDATE SET
        water_level = excluded.water_level,
        water_change = excluded.water_change,
        discharge = excluded.discharge,
        water_temp = excluded.water_temp,
        tendency = excluded.tendency
"#;

const SELECT_LATEST_BY_RIVER: &str = r#"
    SELECT d.id, d.river, d.station, d.water_level, d.water_change,
           d.discharge, d.water_temp, d.tendency, d.timestamp
    FROM river_data d
    JOIN (
        SELECT river, station, MAX(timestamp) AS latest
        FROM river_data
        WHERE river = ?
        GROUP BY river, station
    ) l ON d.river = l.river AND d.station = l.station AND d.timestamp = l.latest
    ORDER BY d.station
"#;

const SELECT_UNIQUE_RIVERS: &str = r#"
    SELECT DISTINCT d.river
    FROM river_data d
    JOIN (
        SELECT river, station, MAX(timestamp) AS latest
        FROM river_data
        GROUP BY river, station
    ) l ON d.river = l.river AND d.station = l.station AND d.timestamp = l.latest
    ORDER BY d.river
"#;

/// River records stored in a single SQLite database.
pub struct SqliteRepository {
    pool: SqlitePool,
}

impl SqliteRepository {
    /// Open or create the database at `path`, creating parent directories.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let repo = Self { pool };
        repo.migrate().await?;
        log::info!("Opened river database at {}", path.display());
        Ok(repo)
    }

    /// Open a private in-memory database.
    pub async fn open_memory() -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(":memory:")
            .create_if_missing(true);

        // Every connection would get its own empty database
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let repo = Self { pool };
        repo.migrate().await?;
        Ok(repo)
    }

    /// Wait for in-flight queries and close every connection.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(CREATE_TABLE).execute(&self.pool).await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_river ON river_data(river)")
            .execute(&self.pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_timestamp ON river_data(timestamp)")
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    #[cfg(test)]
    async fn insert_raw_timestamp(&self, river: &str, station: &str, timestamp: &str) -> Result<()> {
        sqlx::query("INSERT INTO river_data (river, station, timestamp) VALUES (?, ?, ?)")
            .bind(river)
            .bind(station)
            .bind(timestamp)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl RiverRepository for SqliteRepository {
    async fn save_all(&self, records: &[RiverRecord]) -> Result<usize> {
        for record in records {
            record.validate()?;
        }

        // Dropping the transaction on error rolls the whole batch back
        let mut tx = self.pool.begin().await?;
        for record in records {
            sqlx::query(UPSERT)
                .bind(&record.river)
                .bind(&record.station)
                .bind(&record.water_level)
                .bind(&record.water_change)
                .bind(&record.discharge)
                .bind(&record.water_temp)
                .bind(record.tendency_str())
                .bind(format_stored_timestamp(&record.timestamp))
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        log::info!("Saved {} river records", records.len());
        Ok(records.len())
    }

    async fn get_by_river_name(&self, river: &str) -> Result<Vec<RiverRecord>> {
        let rows = sqlx::query(SELECT_LATEST_BY_RIVER)
            .bind(river)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(record_from_row).collect()
    }

    async fn get_unique_rivers(&self) -> Result<Vec<String>> {
        let rivers: Vec<(String,)> = sqlx::query_as(SELECT_UNIQUE_RIVERS)
            .fetch_all(&self.pool)
            .await?;
        Ok(rivers.into_iter().map(|(river,)| river).collect())
    }

    async fn get_last_update_time(&self) -> Result<Option<DateTime<FixedOffset>>> {
        let (latest,): (Option<String>,) = sqlx::query_as("SELECT MAX(timestamp) FROM river_data")
            .fetch_one(&self.pool)
            .await?;

        match latest.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(text) => parse_stored_timestamp(text).map(Some),
        }
    }
}

fn record_from_row(row: &SqliteRow) -> Result<RiverRecord> {
    let timestamp: String = row.try_get("timestamp")?;
    let tendency: String = row.try_get("tendency")?;
    Ok(RiverRecord {
        id: Some(row.try_get("id")?),
        river: row.try_get("river")?,
        station: row.try_get("station")?,
        water_level: row.try_get("water_level")?,
        water_change: row.try_get("water_change")?,
        discharge: row.try_get("discharge")?,
        water_temp: row.try_get("water_temp")?,
        tendency: Tendency::from_stored(&tendency),
        timestamp: parse_stored_timestamp(&timestamp)?,
    })
}

/// Normalize to UTC so text order matches time order.
pub fn format_stored_timestamp(timestamp: &DateTime<FixedOffset>) -> String {
    timestamp.with_timezone(&Utc).format(STORED_FORMAT).to_string()
}

/// Parse a stored timestamp in any format this table has held.
///
/// Offset-less text is taken as UTC.
pub fn parse_stored_timestamp(text: &str) -> Result<DateTime<FixedOffset>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
        return Ok(ts);
    }
    if let Ok(ts) = DateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Ok(ts);
    }
    for format in ["%Y-%m-%d %H:%M:%S%.fZ", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Ok(naive.and_utc().fixed_offset());
        }
    }
    Err(AppError::integrity(format!("unrecognized stored timestamp '{text}'")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32) -> DateTime<FixedOffset> {
        FixedOffset::east_opt(2 * 3600)
            .unwrap()
            .with_ymd_and_hms(2025, 4, 18, hour, 0, 0)
            .unwrap()
    }

    fn record(river: &str, station: &str, level: &str, hour: u32) -> RiverRecord {
        RiverRecord::new(river, station, level, at(hour))
    }

    #[tokio::test]
    async fn test_save_is_idempotent() {
        let repo = SqliteRepository::open_memory().await.unwrap();
        let batch = vec![
            record("ДУНАВ", "БЕЗДАН", "312", 8),
            record("ДУНАВ", "НОВИ САД", "280", 8),
        ];

        repo.save_all(&batch).await.unwrap();
        repo.save_all(&batch).await.unwrap();

        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM river_data")
            .fetch_one(&repo.pool)
            .await
            .unwrap();
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn test_upsert_updates_mutable_fields() {
        let repo = SqliteRepository::open_memory().await.unwrap();
        repo.save_all(&[record("ДУНАВ", "БЕЗДАН", "312", 8)]).await.unwrap();

        let mut updated = record("ДУНАВ", "БЕЗДАН", "315", 8);
        updated.tendency = Some(Tendency::Rising);
        updated.water_temp = "12.1".into();
        repo.save_all(&[updated]).await.unwrap();

        let rows = repo.get_by_river_name("ДУНАВ").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].water_level, "315");
        assert_eq!(rows[0].water_temp, "12.1");
        assert_eq!(rows[0].tendency, Some(Tendency::Rising));
    }

    #[tokio::test]
    async fn test_latest_reading_wins() {
        let repo = SqliteRepository::open_memory().await.unwrap();
        repo.save_all(&[
            record("ДУНАВ", "БЕЗДАН", "300", 6),
            record("ДУНАВ", "БЕЗДАН", "312", 8),
            record("ДУНАВ", "АПАТИН", "250", 7),
            record("САВА", "ШАБАЦ", "190", 8),
        ])
        .await
        .unwrap();

        let rows = repo.get_by_river_name("ДУНАВ").await.unwrap();
        let summary: Vec<(&str, &str)> = rows
            .iter()
            .map(|r| (r.station.as_str(), r.water_level.as_str()))
            .collect();
        assert_eq!(summary, vec![("АПАТИН", "250"), ("БЕЗДАН", "312")]);
        assert!(rows.iter().all(|r| r.id.is_some()));
    }

    #[tokio::test]
    async fn test_timestamp_round_trip() {
        let repo = SqliteRepository::open_memory().await.unwrap();
        repo.save_all(&[record("ДУНАВ", "БЕЗДАН", "312", 8)]).await.unwrap();

        let rows = repo.get_by_river_name("ДУНАВ").await.unwrap();
        assert_eq!(rows[0].timestamp, at(8));
        assert_eq!(repo.get_last_update_time().await.unwrap(), Some(at(8)));
    }

    #[tokio::test]
    async fn test_unique_rivers() {
        let repo = SqliteRepository::open_memory().await.unwrap();
        assert!(repo.get_unique_rivers().await.unwrap().is_empty());

        repo.save_all(&[
            record("САВА", "ШАБАЦ", "190", 8),
            record("ДУНАВ", "БЕЗДАН", "312", 8),
            record("ДУНАВ", "АПАТИН", "250", 8),
        ])
        .await
        .unwrap();

        assert_eq!(repo.get_unique_rivers().await.unwrap(), vec!["ДУНАВ", "САВА"]);
    }

    #[tokio::test]
    async fn test_unique_rivers_ignore_superseded_rows() {
        let repo = SqliteRepository::open_memory().await.unwrap();
        repo.save_all(&[
            record("ДУНАВ", "БЕЗДАН", "305", 6),
            record("ДУНАВ", "БЕЗДАН", "312", 8),
            record("ДУНАВ", "АПАТИН", "250", 8),
            record("САВА", "ШАБАЦ", "190", 7),
        ])
        .await
        .unwrap();

        let rivers = repo.get_unique_rivers().await.unwrap();
        assert_eq!(rivers, vec!["ДУНАВ", "САВА"]);
        assert_eq!(rivers.iter().filter(|r| r.as_str() == "ДУНАВ").count(), 1);
    }

    #[tokio::test]
    async fn test_invalid_record_rolls_back_batch() {
        let repo = SqliteRepository::open_memory().await.unwrap();
        let batch = vec![record("ДУНАВ", "БЕЗДАН", "312", 8), record("", "АПАТИН", "250", 8)];

        let err = repo.save_all(&batch).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(repo.get_unique_rivers().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_last_update_empty_table() {
        let repo = SqliteRepository::open_memory().await.unwrap();
        assert_eq!(repo.get_last_update_time().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_last_update_legacy_formats() {
        let cases = [
            ("2025-04-18 08:00:00+02:00", "2025-04-18T06:00:00+00:00"),
            ("2025-04-18 06:00:00.123Z", "2025-04-18T06:00:00.123+00:00"),
            ("2025-04-18 06:00:00", "2025-04-18T06:00:00+00:00"),
        ];
        for (stored, expected) in cases {
            let repo = SqliteRepository::open_memory().await.unwrap();
            repo.insert_raw_timestamp("ДУНАВ", "БЕЗДАН", stored).await.unwrap();

            let ts = repo.get_last_update_time().await.unwrap().unwrap();
            assert_eq!(ts.with_timezone(&Utc).to_rfc3339(), expected, "stored as {stored}");
        }
    }

    #[tokio::test]
    async fn test_last_update_unparseable_is_integrity_error() {
        let repo = SqliteRepository::open_memory().await.unwrap();
        repo.insert_raw_timestamp("ДУНАВ", "БЕЗДАН", "yesterday").await.unwrap();

        let err = repo.get_last_update_time().await.unwrap_err();
        assert!(matches!(err, AppError::Integrity(_)));
    }

    #[tokio::test]
    async fn test_open_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("riverdata.db");

        let repo = SqliteRepository::open(&path).await.unwrap();
        repo.save_all(&[record("ДУНАВ", "БЕЗДАН", "312", 8)]).await.unwrap();
        repo.close().await;

        assert!(path.exists());
        let reopened = SqliteRepository::open(&path).await.unwrap();
        assert_eq!(reopened.get_unique_rivers().await.unwrap(), vec!["ДУНАВ"]);
    }
}
