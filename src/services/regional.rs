// src/services/regional.rs

//! Regional bulletin scraper.
//!
//! The bulletin URL changes with every issue, so the listing page is read
//! first and the newest "Редован хидролошки билтен" link is followed.
//! River names span several rows in the bulletin table and are carried
//! forward until the next named river.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use regex::Regex;
use reqwest::Client;
use scraper::{ElementRef, Html};
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{RegionalSourceConfig, RiverRecord, Tendency};
use crate::services::timestamp;
use crate::services::{RecordSource, optional_field, retain_valid};
use crate::utils::{element_text, http, parse_selector, resolve_url};

const MIN_CELLS: usize = 4;

const COL_RIVER: usize = 0;
const COL_STATION: usize = 1;
const COL_LEVEL: usize = 3;
const COL_CHANGE: usize = 4;
const COL_TEMP: usize = 5;
const COL_DISCHARGE: usize = 6;
const COL_TENDENCY: usize = 7;

/// Scraper for the regional hydrological bulletin.
pub struct RegionalBulletinScraper {
    client: Client,
    config: RegionalSourceConfig,
    listing_url: Url,
    link_pattern: Regex,
}

impl RegionalBulletinScraper {
    pub fn new(client: Client, config: RegionalSourceConfig) -> Result<Self> {
        let listing_url = Url::parse(&config.listing_url)?;
        let link_pattern = Regex::new(&config.link_pattern)
            .map_err(|e| AppError::config(format!("invalid regional link pattern: {e}")))?;
        Ok(Self {
            client,
            config,
            listing_url,
            link_pattern,
        })
    }

    /// Absolute URL of the first bulletin link on the listing page.
    pub fn discover_link(&self, listing_html: &str) -> Result<String> {
        let document = Html::parse_document(listing_html);
        let anchor_sel = parse_selector("a[href]")?;

        document
            .select(&anchor_sel)
            .find(|a| self.link_pattern.is_match(&element_text(a)))
            .and_then(|a| a.value().attr("href"))
            .map(|href| resolve_url(&self.listing_url, href.trim()))
            .ok_or_else(|| {
                AppError::discovery(format!(
                    "no link matching '{}' on {}",
                    self.config.link_pattern, self.listing_url
                ))
            })
    }

    /// Parse a bulletin page.
    pub fn parse(&self, html: &str) -> Result<Vec<RiverRecord>> {
        let document = Html::parse_document(html);
        let timestamp = self.bulletin_timestamp(&document);

        let row_sel = parse_selector("table tr")?;
        let cell_sel = parse_selector("td")?;

        let mut header_len: Option<usize> = None;
        let mut current_river = String::new();
        let mut records = Vec::new();

        for row in document.select(&row_sel) {
            let cells: Vec<ElementRef> = row.select(&cell_sel).collect();
            if cells.len() < MIN_CELLS {
                continue;
            }

            let Some(expected) = header_len else {
                if element_text(&cells[COL_RIVER]) == self.config.header_label {
                    header_len = Some(cells.len());
                }
                continue;
            };

            if self.is_footnote(&element_text(&cells[COL_RIVER])) {
                continue;
            }

            // A rowspan continuation row has no river cell at all
            let shift = usize::from(cells.len() + 1 == expected);
            let cell = |col: usize| -> String {
                col.checked_sub(shift)
                    .and_then(|i| cells.get(i))
                    .map(element_text)
                    .unwrap_or_default()
            };

            let first = if shift == 1 { String::new() } else { cell(COL_RIVER) };

            let station = cell(COL_STATION);
            if first.is_empty() && station.is_empty() {
                continue;
            }
            if !first.is_empty() {
                current_river = first;
            } else if current_river.is_empty() {
                log::debug!("Skipping station '{station}' before any river name");
                continue;
            }

            let level = match cell(COL_LEVEL).as_str() {
                "" | "-" => "0".to_string(),
                level => level.to_string(),
            };

            records.push(RiverRecord {
                id: None,
                river: current_river.clone(),
                station,
                water_level: level,
                water_change: optional_field(cell(COL_CHANGE)),
                discharge: optional_field(cell(COL_DISCHARGE)),
                water_temp: optional_field(cell(COL_TEMP)),
                tendency: Tendency::from_marker(&cell(COL_TENDENCY)),
                timestamp,
            });
        }

        if header_len.is_none() {
            log::warn!(
                "Regional bulletin has no '{}' header row",
                self.config.header_label
            );
        }

        let records = retain_valid(self.name(), records);
        log::info!("Regional bulletin: extracted {} river data entries", records.len());
        Ok(records)
    }

    fn is_footnote(&self, first_cell: &str) -> bool {
        self.config
            .footnote_keywords
            .iter()
            .any(|keyword| first_cell.contains(keyword.as_str()))
    }

    fn bulletin_timestamp(&self, document: &Html) -> DateTime<FixedOffset> {
        match timestamp::extract_regional_timestamp(document, self.config.timezone) {
            Ok(ts) => {
                log::info!("Regional bulletin timestamp: {}", ts.to_rfc3339());
                ts
            }
            Err(e) => {
                let now = timestamp::now_in(self.config.timezone);
                log::warn!(
                    "Regional timestamp unavailable ({e}); using processing time {}",
                    now.to_rfc3339()
                );
                now
            }
        }
    }
}

#[async_trait]
impl RecordSource for RegionalBulletinScraper {
    fn name(&self) -> &str {
        "regional"
    }

    async fn fetch(&self) -> Result<Vec<RiverRecord>> {
        log::info!("Fetching regional bulletin listing from {}", self.listing_url);
        let listing = http::fetch_text(&self.client, self.listing_url.as_str()).await?;
        let link = self.discover_link(&listing)?;
        log::info!("Found bulletin link: {link}");

        let html = http::fetch_text(&self.client, &link).await?;
        self.parse(&html)
    }
}
