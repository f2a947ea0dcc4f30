// src/services/bulletin.rs

//! Primary bulletin scraper.
//!
//! The page holds one wide table, one station per row, and a single
//! bulletin timestamp somewhere in the surrounding text.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use reqwest::Client;
use scraper::{ElementRef, Html};

use crate::error::Result;
use crate::models::{BulletinSourceConfig, RiverRecord, Tendency};
use crate::services::timestamp::{self, BulletinPhrase};
use crate::services::{RecordSource, optional_field, retain_valid};
use crate::utils::{element_text, http, parse_selector};

const COL_RIVER: usize = 0;
const COL_STATION: usize = 2;
const COL_LEVEL: usize = 5;
const COL_CHANGE: usize = 6;
const COL_DISCHARGE: usize = 7;
const COL_TEMP: usize = 8;
const COL_TENDENCY: usize = 9;

/// Scraper for the national water-level bulletin.
pub struct BulletinScraper {
    client: Client,
    config: BulletinSourceConfig,
}

impl BulletinScraper {
    pub fn new(client: Client, config: BulletinSourceConfig) -> Self {
        Self { client, config }
    }

    /// Parse a bulletin page.
    pub fn parse(&self, html: &str) -> Result<Vec<RiverRecord>> {
        let document = Html::parse_document(html);
        let timestamp = self.bulletin_timestamp(&document);

        let row_sel = parse_selector("table tbody tr")?;
        let cell_sel = parse_selector("td")?;
        let anchor_sel = parse_selector("a")?;
        let img_sel = parse_selector("img")?;

        let mut row_count = 0;
        let mut records = Vec::new();
        for row in document.select(&row_sel) {
            row_count += 1;
            let cells: Vec<ElementRef> = row.select(&cell_sel).collect();
            if cells.len() < self.config.min_columns {
                log::debug!("Skipping row {row_count} with {} cells", cells.len());
                continue;
            }

            let station = cells[COL_STATION]
                .select(&anchor_sel)
                .next()
                .map(|a| element_text(&a))
                .unwrap_or_default();

            let tendency = cells[COL_TENDENCY]
                .select(&img_sel)
                .next()
                .and_then(|img| {
                    let img = img.value();
                    ["alt", "title", "src"]
                        .iter()
                        .filter_map(|attr| img.attr(attr))
                        .find_map(Tendency::from_marker)
                });

            records.push(RiverRecord {
                id: None,
                river: element_text(&cells[COL_RIVER]),
                station,
                water_level: element_text(&cells[COL_LEVEL]),
                water_change: optional_field(element_text(&cells[COL_CHANGE])),
                discharge: optional_field(element_text(&cells[COL_DISCHARGE])),
                water_temp: optional_field(element_text(&cells[COL_TEMP])),
                tendency,
                timestamp,
            });
        }

        let records = retain_valid(self.name(), records);
        log::info!(
            "Parsed {} rows, extracted {} valid data entries",
            row_count,
            records.len()
        );
        Ok(records)
    }

    /// Bulletin timestamp, or the processing time if it cannot be read.
    fn bulletin_timestamp(&self, document: &Html) -> DateTime<FixedOffset> {
        let phrase = BulletinPhrase::new(&self.config.timestamp_label, &self.config.time_label);
        match timestamp::extract_bulletin_timestamp(
            document,
            &self.config.timestamp_selectors,
            &phrase,
            self.config.timezone,
        ) {
            Ok(ts) => {
                log::info!("Bulletin timestamp: {}", ts.to_rfc3339());
                ts
            }
            Err(e) => {
                let now = timestamp::now_in(self.config.timezone);
                log::warn!(
                    "Bulletin timestamp unavailable ({e}); using processing time {}",
                    now.to_rfc3339()
                );
                now
            }
        }
    }
}

#[async_trait]
impl RecordSource for BulletinScraper {
    fn name(&self) -> &str {
        "bulletin"
    }

    async fn fetch(&self) -> Result<Vec<RiverRecord>> {
        log::info!("Fetching primary bulletin from {}", self.config.url);
        let html = http::fetch_text(&self.client, &self.config.url).await?;
        self.parse(&html)
    }
}
