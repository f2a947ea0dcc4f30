//! Locating and parsing localized bulletin timestamps.
//!
//! Sources publish civil times without an offset; every parser here takes
//! the source's home timezone and returns a zoned instant. Failures are
//! reported as [`AppError::Timestamp`] and never replaced by the current
//! time; falling back is the caller's decision (see [`now_in`]).

use std::sync::LazyLock;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use regex::Regex;
use scraper::Html;

use crate::error::{AppError, Result};
use crate::utils::{element_text, parse_selector};

/// `НА ДАН 20.04.2025. ГОДИНЕ, У 7:00 ЧАСОВА`
static REGIONAL_PHRASE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"НА\s+ДАН\s+(\d{1,2})\.(\d{1,2})\.(\d{4})\.?\s*ГОДИНЕ,?\s*У\s*(\d{1,2}):(\d{2})")
        .expect("regional timestamp regex is valid")
});

/// Labels of a `"<label> [DAY] DD.MM.YYYY. <time label> H:MM (...)"` phrase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulletinPhrase {
    pub label: String,
    pub time_label: String,
}

impl BulletinPhrase {
    pub fn new(label: impl Into<String>, time_label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            time_label: time_label.into(),
        }
    }
}

/// Current processing time in the given timezone.
pub fn now_in(tz: Tz) -> DateTime<FixedOffset> {
    Utc::now().with_timezone(&tz).fixed_offset()
}

/// Attach a home timezone to a civil date and time.
///
/// Ambiguous times (DST fall-back) resolve to the earlier instant; times
/// inside a DST gap do not exist and are rejected.
pub fn localize(naive: NaiveDateTime, tz: Tz) -> Result<DateTime<FixedOffset>> {
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.fixed_offset())
        .ok_or_else(|| AppError::timestamp(format!("{naive} does not exist in {tz}")))
}

/// Find the text of the first element containing `needle`.
///
/// Selectors are tried in order; the first selector with any hit wins.
pub fn find_labeled_text(document: &Html, selectors: &[String], needle: &str) -> Result<Option<String>> {
    for selector in selectors {
        let sel = parse_selector(selector)?;
        let hit = document
            .select(&sel)
            .map(|el| element_text(&el))
            .find(|text| text.contains(needle));
        if let Some(text) = hit {
            log::debug!("Found timestamp text using selector '{selector}': {text}");
            return Ok(Some(text));
        }
    }
    Ok(None)
}

/// Locate and parse the bulletin timestamp in a document.
pub fn extract_bulletin_timestamp(
    document: &Html,
    selectors: &[String],
    phrase: &BulletinPhrase,
    tz: Tz,
) -> Result<DateTime<FixedOffset>> {
    let text = find_labeled_text(document, selectors, &phrase.label)?
        .ok_or_else(|| AppError::timestamp(format!("label '{}' not found", phrase.label)))?;
    parse_bulletin_phrase(&text, phrase, tz)
}

/// Parse `"<label> [DAY] DD.MM.YYYY. <time label> H:MM (...)"`.
pub fn parse_bulletin_phrase(text: &str, phrase: &BulletinPhrase, tz: Tz) -> Result<DateTime<FixedOffset>> {
    let start = text
        .find(&phrase.label)
        .ok_or_else(|| AppError::timestamp(format!("label '{}' not in '{text}'", phrase.label)))?;
    let rest = &text[start + phrase.label.len()..];

    let (date_phrase, time_phrase) = rest.split_once(&phrase.time_label).ok_or_else(|| {
        AppError::timestamp(format!("time label '{}' not in '{text}'", phrase.time_label))
    })?;

    // A weekday name may precede the date
    let date_token = date_phrase
        .split_whitespace()
        .find(|token| token.contains('.'))
        .ok_or_else(|| AppError::timestamp(format!("no date in '{date_phrase}'")))?;
    let date = parse_dotted_date(date_token)?;

    let time_phrase = time_phrase.split('(').next().unwrap_or_default();
    let time_token = time_phrase
        .split_whitespace()
        .next()
        .ok_or_else(|| AppError::timestamp(format!("no time in '{text}'")))?;
    let time = parse_clock(time_token)?;

    localize(date.and_time(time), tz)
}

/// Locate and parse `НА ДАН DD.MM.YYYY. ГОДИНЕ, У H:MM` in any table cell.
pub fn extract_regional_timestamp(document: &Html, tz: Tz) -> Result<DateTime<FixedOffset>> {
    let cell_sel = parse_selector("td")?;
    let text = document
        .select(&cell_sel)
        .map(|el| element_text(&el))
        .find(|text| text.contains("НА ДАН") && text.contains("ГОДИНЕ"))
        .ok_or_else(|| AppError::timestamp("regional bulletin phrase not found"))?;
    parse_regional_phrase(&text, tz)
}

/// Parse `НА ДАН DD.MM.YYYY. ГОДИНЕ, У H:MM`.
pub fn parse_regional_phrase(text: &str, tz: Tz) -> Result<DateTime<FixedOffset>> {
    let caps = REGIONAL_PHRASE
        .captures(text)
        .ok_or_else(|| AppError::timestamp(format!("unrecognized regional phrase '{text}'")))?;

    let num = |i: usize| -> Result<u32> {
        caps[i]
            .parse()
            .map_err(|_| AppError::timestamp(format!("bad number '{}' in '{text}'", &caps[i])))
    };
    let year: i32 = caps[3]
        .parse()
        .map_err(|_| AppError::timestamp(format!("bad year in '{text}'")))?;

    let date = NaiveDate::from_ymd_opt(year, num(2)?, num(1)?)
        .ok_or_else(|| AppError::timestamp(format!("invalid date in '{text}'")))?;
    let time = NaiveTime::from_hms_opt(num(4)?, num(5)?, 0)
        .ok_or_else(|| AppError::timestamp(format!("invalid time in '{text}'")))?;

    localize(date.and_time(time), tz)
}

/// Parse a naive `format` datetime and localize it.
pub fn parse_local(text: &str, format: &str, tz: Tz) -> Result<DateTime<FixedOffset>> {
    let naive = NaiveDateTime::parse_from_str(text.trim(), format)
        .map_err(|e| AppError::timestamp(format!("'{text}' does not match '{format}': {e}")))?;
    localize(naive, tz)
}

/// `DD.MM.YYYY` with an optional trailing dot.
fn parse_dotted_date(token: &str) -> Result<NaiveDate> {
    let parts: Vec<&str> = token.split('.').filter(|p| !p.is_empty()).collect();
    let [day, month, year] = parts.as_slice() else {
        return Err(AppError::timestamp(format!("'{token}' is not DD.MM.YYYY.")));
    };

    let bad = || AppError::timestamp(format!("'{token}' is not DD.MM.YYYY."));
    let day: u32 = day.parse().map_err(|_| bad())?;
    let month: u32 = month.parse().map_err(|_| bad())?;
    let year: i32 = year.parse().map_err(|_| bad())?;

    NaiveDate::from_ymd_opt(year, month, day)
        .ok_or_else(|| AppError::timestamp(format!("'{token}' is not a calendar date")))
}

/// `H:MM` or `HH:MM`.
fn parse_clock(token: &str) -> Result<NaiveTime> {
    let bad = || AppError::timestamp(format!("'{token}' is not H:MM"));
    let (hour, minute) = token.split_once(':').ok_or_else(bad)?;
    let hour: u32 = hour.parse().map_err(|_| bad())?;
    let minute: u32 = minute.parse().map_err(|_| bad())?;
    NaiveTime::from_hms_opt(hour, minute, 0).ok_or_else(bad)
}
