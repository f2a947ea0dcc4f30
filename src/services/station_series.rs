// src/services/station_series.rs

//! Single-station time series scraper.
//!
//! Used for stations missing from the main bulletin. The page lists
//! `datetime | level` pairs; each row becomes its own reading.

use async_trait::async_trait;
use reqwest::Client;
use scraper::{ElementRef, Html};

use crate::error::Result;
use crate::models::{RiverRecord, StationSeriesConfig};
use crate::services::RecordSource;
use crate::services::timestamp;
use crate::utils::{element_text, http, parse_selector};

const DATETIME_FORMAT: &str = "%d.%m.%Y %H:%M";

/// Scraper for one station's recent level history.
pub struct StationSeriesScraper {
    client: Client,
    config: StationSeriesConfig,
    name: String,
}

impl StationSeriesScraper {
    pub fn new(client: Client, config: StationSeriesConfig) -> Self {
        let name = format!("series:{}/{}", config.river, config.station);
        Self {
            client,
            config,
            name,
        }
    }

    /// Parse a time-series page into readings, oldest first.
    pub fn parse(&self, html: &str) -> Result<Vec<RiverRecord>> {
        let document = Html::parse_document(html);
        let row_sel = parse_selector("table tr")?;
        let cell_sel = parse_selector("td")?;

        let mut processed = 0;
        let mut skipped = 0;
        let mut records = Vec::new();

        for row in document.select(&row_sel) {
            let cells: Vec<ElementRef> = row.select(&cell_sel).collect();
            if cells.len() != 2 {
                continue;
            }
            processed += 1;

            let datetime = element_text(&cells[0]);
            let level = element_text(&cells[1]);

            if !self.looks_like_datetime(&datetime) {
                skipped += 1;
                continue;
            }

            let tz = self.config.timezone;
            let timestamp = match timestamp::parse_local(&datetime, DATETIME_FORMAT, tz) {
                Ok(ts) => ts,
                Err(e) => {
                    log::warn!("{}: skipping row with invalid timestamp: {e}", self.name);
                    skipped += 1;
                    continue;
                }
            };

            let level: i64 = match level.parse() {
                Ok(level) => level,
                Err(_) => {
                    log::warn!("{}: skipping row with non-integer water level '{level}'", self.name);
                    skipped += 1;
                    continue;
                }
            };

            records.push(RiverRecord::new(
                &self.config.river,
                &self.config.station,
                level.to_string(),
                timestamp,
            ));
        }

        records.sort_by_key(|record| record.timestamp);

        log::info!(
            "{}: processed {} rows, found {} valid entries, skipped {}",
            self.name,
            processed,
            records.len(),
            skipped
        );
        Ok(records)
    }

    /// Loose `DD.MM.YYYY HH:MM` check that also rejects header rows.
    fn looks_like_datetime(&self, text: &str) -> bool {
        !text.is_empty()
            && !self.config.header_labels.iter().any(|label| label == text)
            && text.contains('.')
            && text.contains(':')
    }
}

#[async_trait]
impl RecordSource for StationSeriesScraper {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self) -> Result<Vec<RiverRecord>> {
        log::info!("Fetching {} from {}", self.name, self.config.url);
        let html = http::fetch_text(&self.client, &self.config.url).await?;
        self.parse(&html)
    }
}
