//! Application configuration structures.

use std::fs;
use std::path::{Path, PathBuf};

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP client behavior shared by every source
    #[serde(default)]
    pub http: HttpConfig,

    /// SQLite storage location
    #[serde(default)]
    pub storage: StorageConfig,

    /// Scheduling and caching intervals
    #[serde(default)]
    pub refresh: RefreshConfig,

    /// Log filter used when `RUST_LOG` is unset
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Upstream source definitions
    #[serde(default)]
    pub sources: SourcesConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.http.user_agent.trim().is_empty() {
            return Err(AppError::validation("http.user_agent is empty"));
        }
        if self.http.timeout_secs == 0 {
            return Err(AppError::validation("http.timeout_secs must be > 0"));
        }
        if self.refresh.interval_secs == 0 {
            return Err(AppError::validation("refresh.interval_secs must be > 0"));
        }
        if self.storage.database_path.as_os_str().is_empty() {
            return Err(AppError::validation("storage.database_path is empty"));
        }

        let bulletin = &self.sources.bulletin;
        url::Url::parse(&bulletin.url)?;
        if bulletin.min_columns < 10 {
            return Err(AppError::validation(
                "sources.bulletin.min_columns must be >= 10",
            ));
        }
        if bulletin.timestamp_label.trim().is_empty() || bulletin.time_label.trim().is_empty() {
            return Err(AppError::validation(
                "sources.bulletin timestamp labels must not be empty",
            ));
        }
        if bulletin.timestamp_selectors.is_empty() {
            return Err(AppError::validation(
                "sources.bulletin.timestamp_selectors is empty",
            ));
        }

        for station in &self.sources.stations {
            url::Url::parse(&station.url)?;
            if station.river.trim().is_empty() || station.station.trim().is_empty() {
                return Err(AppError::validation(format!(
                    "station series {} needs both river and station names",
                    station.url
                )));
            }
        }

        let regional = &self.sources.regional;
        if regional.enabled {
            url::Url::parse(&regional.listing_url)?;
            regex::Regex::new(&regional.link_pattern).map_err(|e| {
                AppError::validation(format!("sources.regional.link_pattern: {e}"))
            })?;
            if regional.header_label.trim().is_empty() {
                return Err(AppError::validation("sources.regional.header_label is empty"));
            }
        }
        Ok(())
    }
}

/// HTTP client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Per-request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
        }
    }
}

/// SQLite storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Database file; the parent directory is created on open
    #[serde(default = "defaults::database_path")]
    pub database_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: defaults::database_path(),
        }
    }
}

/// Refresh scheduling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshConfig {
    /// Seconds between scheduled refreshes
    #[serde(default = "defaults::interval")]
    pub interval_secs: u64,

    /// Maximum age of a cached snapshot before refetching
    #[serde(default = "defaults::cache_max_age")]
    pub cache_max_age_secs: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval_secs: defaults::interval(),
            cache_max_age_secs: defaults::cache_max_age(),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "defaults::log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::log_level(),
        }
    }
}

/// All upstream sources.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcesConfig {
    /// Primary bulletin (mandatory)
    #[serde(default)]
    pub bulletin: BulletinSourceConfig,

    /// Single-station time series (best effort)
    #[serde(default = "defaults::stations")]
    pub stations: Vec<StationSeriesConfig>,

    /// Regional bulletin behind a listing page (best effort)
    #[serde(default)]
    pub regional: RegionalSourceConfig,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            bulletin: BulletinSourceConfig::default(),
            stations: defaults::stations(),
            regional: RegionalSourceConfig::default(),
        }
    }
}

/// Primary bulletin table source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulletinSourceConfig {
    #[serde(default = "defaults::bulletin_url")]
    pub url: String,

    /// Timezone the bulletin timestamp is written in
    #[serde(default = "defaults::bulletin_timezone")]
    pub timezone: Tz,

    /// Rows with fewer cells are not data rows
    #[serde(default = "defaults::min_columns")]
    pub min_columns: usize,

    /// Text that precedes the bulletin date
    #[serde(default = "defaults::timestamp_label")]
    pub timestamp_label: String,

    /// Text that precedes the bulletin time
    #[serde(default = "defaults::time_label")]
    pub time_label: String,

    /// Containers searched for the timestamp, most specific first
    #[serde(default = "defaults::timestamp_selectors")]
    pub timestamp_selectors: Vec<String>,
}

impl Default for BulletinSourceConfig {
    fn default() -> Self {
        Self {
            url: defaults::bulletin_url(),
            timezone: defaults::bulletin_timezone(),
            min_columns: defaults::min_columns(),
            timestamp_label: defaults::timestamp_label(),
            time_label: defaults::time_label(),
            timestamp_selectors: defaults::timestamp_selectors(),
        }
    }
}

/// One station's historical level table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationSeriesConfig {
    pub river: String,
    pub station: String,
    pub url: String,

    /// Timezone of the naive datetimes in the table
    #[serde(default = "defaults::station_timezone")]
    pub timezone: Tz,

    /// First-cell labels that mark header rows
    #[serde(default = "defaults::station_header_labels")]
    pub header_labels: Vec<String>,
}

/// Regional bulletin discovered through a listing page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionalSourceConfig {
    #[serde(default = "defaults::enabled")]
    pub enabled: bool,

    #[serde(default = "defaults::regional_listing_url")]
    pub listing_url: String,

    /// Regex matched against anchor text on the listing page
    #[serde(default = "defaults::regional_link_pattern")]
    pub link_pattern: String,

    /// First cell of the table header row
    #[serde(default = "defaults::regional_header_label")]
    pub header_label: String,

    /// First-cell keywords that mark footnote rows
    #[serde(default = "defaults::regional_footnotes")]
    pub footnote_keywords: Vec<String>,

    #[serde(default = "defaults::regional_timezone")]
    pub timezone: Tz,
}

impl Default for RegionalSourceConfig {
    fn default() -> Self {
        Self {
            enabled: defaults::enabled(),
            listing_url: defaults::regional_listing_url(),
            link_pattern: defaults::regional_link_pattern(),
            header_label: defaults::regional_header_label(),
            footnote_keywords: defaults::regional_footnotes(),
            timezone: defaults::regional_timezone(),
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    use chrono_tz::Tz;

    use super::StationSeriesConfig;

    // HTTP defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; vodostaj/0.1)".into()
    }
    pub fn timeout() -> u64 {
        30
    }

    // Storage defaults
    pub fn database_path() -> PathBuf {
        PathBuf::from("data").join("riverdata.db")
    }

    // Refresh defaults
    pub fn interval() -> u64 {
        3600
    }
    pub fn cache_max_age() -> u64 {
        3600
    }

    pub fn log_level() -> String {
        "info".into()
    }

    pub fn enabled() -> bool {
        true
    }

    // Primary bulletin defaults
    pub fn bulletin_url() -> String {
        "https://www.hidmet.gov.rs/ciril/osmotreni/stanje_voda.php".into()
    }
    pub fn bulletin_timezone() -> Tz {
        chrono_tz::Europe::Belgrade
    }
    pub fn min_columns() -> usize {
        10
    }
    pub fn timestamp_label() -> String {
        "Хидролошки подаци:".into()
    }
    pub fn time_label() -> String {
        "време:".into()
    }
    pub fn timestamp_selectors() -> Vec<String> {
        vec![
            "div.col-md-12".into(),
            "h4".into(),
            "div.container".into(),
            "div".into(),
        ]
    }

    // Station series defaults
    pub fn station_timezone() -> Tz {
        chrono_tz::UTC
    }
    pub fn station_header_labels() -> Vec<String> {
        vec!["Датум и време".into()]
    }
    pub fn stations() -> Vec<StationSeriesConfig> {
        vec![StationSeriesConfig {
            river: "ГРАДАЦ".into(),
            station: "ДЕГУРИЋ".into(),
            url: "https://www.hidmet.gov.rs/ciril/osmotreni/nrt_tabela_grafik.php?hm_id=45902&period=7"
                .into(),
            timezone: station_timezone(),
            header_labels: station_header_labels(),
        }]
    }

    // Regional bulletin defaults
    pub fn regional_listing_url() -> String {
        "https://novi.rhmzrs.com/page/bilten-izvjestaj-o-vodostanju".into()
    }
    pub fn regional_link_pattern() -> String {
        r"(?i)^\s*Редован\s+хидролошки\s+билтен".into()
    }
    pub fn regional_header_label() -> String {
        "РИЈЕКА".into()
    }
    pub fn regional_footnotes() -> Vec<String> {
        vec!["Напомена".into(), "Легенда".into()]
    }
    pub fn regional_timezone() -> Tz {
        chrono_tz::Europe::Sarajevo
    }
}
