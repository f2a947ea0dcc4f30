//! River reading data structure.

use std::fmt;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Qualitative direction of the recent water-level change.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Tendency {
    Rising,
    Falling,
    Stable,
}

impl Tendency {
    /// Stored representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Tendency::Rising => "rising",
            Tendency::Falling => "falling",
            Tendency::Stable => "stable",
        }
    }

    /// Parse the stored representation. Empty or unknown text yields `None`.
    pub fn from_stored(s: &str) -> Option<Self> {
        match s {
            "rising" => Some(Tendency::Rising),
            "falling" => Some(Tendency::Falling),
            "stable" => Some(Tendency::Stable),
            _ => None,
        }
    }

    /// Normalize a source-specific marker: a glyph, an image `alt`/`title`
    /// text or an image file name.
    pub fn from_marker(marker: &str) -> Option<Self> {
        let marker = marker.trim();
        match marker {
            "" => return None,
            "▲" | "↑" | "+" => return Some(Tendency::Rising),
            "▼" | "↓" => return Some(Tendency::Falling),
            "●" | "■" | "=" | "→" => return Some(Tendency::Stable),
            _ => {}
        }

        let lower = marker.to_lowercase();
        // "пад" is a substring of "опад", both mean falling
        const FALLING: [&str; 6] = ["опад", "пад", "opad", "pad", "fall", "down"];
        const RISING: [&str; 6] = ["раст", "пораст", "rast", "porast", "ris", "up"];
        const STABLE: [&str; 6] = ["стаг", "мир", "stag", "mir", "stab", "stalan"];

        if FALLING.iter().any(|k| lower.contains(k)) {
            Some(Tendency::Falling)
        } else if RISING.iter().any(|k| lower.contains(k)) {
            Some(Tendency::Rising)
        } else if STABLE.iter().any(|k| lower.contains(k)) {
            Some(Tendency::Stable)
        } else {
            None
        }
    }
}

impl fmt::Display for Tendency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single station reading, normalized across sources.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RiverRecord {
    /// Surrogate key, assigned by storage only
    #[serde(default)]
    pub id: Option<i64>,

    /// River name as published (often Cyrillic)
    pub river: String,

    /// Monitoring station name
    pub station: String,

    /// Water level, kept as published
    pub water_level: String,

    /// Signed change since the previous reading (empty if not published)
    #[serde(default)]
    pub water_change: String,

    /// Discharge in m³/s (empty if not published)
    #[serde(default)]
    pub discharge: String,

    /// Water temperature in °C (empty if not published)
    #[serde(default)]
    pub water_temp: String,

    /// Level tendency, if the source reports one
    #[serde(default)]
    pub tendency: Option<Tendency>,

    /// Instant the reading was taken, in the source's home timezone
    pub timestamp: DateTime<FixedOffset>,
}

impl RiverRecord {
    /// Create a record carrying only the key fields and the level.
    pub fn new(
        river: impl Into<String>,
        station: impl Into<String>,
        water_level: impl Into<String>,
        timestamp: DateTime<FixedOffset>,
    ) -> Self {
        Self {
            id: None,
            river: river.into(),
            station: station.into(),
            water_level: water_level.into(),
            water_change: String::new(),
            discharge: String::new(),
            water_temp: String::new(),
            tendency: None,
            timestamp,
        }
    }

    /// Stored tendency text (`""` when unknown).
    pub fn tendency_str(&self) -> &'static str {
        self.tendency.map_or("", |t| t.as_str())
    }

    /// Check that the dedup key is usable.
    pub fn validate(&self) -> Result<()> {
        if self.river.trim().is_empty() {
            return Err(AppError::validation(format!(
                "record for station '{}' has no river name",
                self.station
            )));
        }
        if self.station.trim().is_empty() {
            return Err(AppError::validation(format!(
                "record for river '{}' has no station name",
                self.river
            )));
        }
        Ok(())
    }

    /// Human-readable multi-line summary of one station.
    pub fn describe(&self) -> String {
        let mut out = format!("📍 Station: {}\n💧 Water Level: {} cm\n", self.station, self.water_level);
        if !self.water_change.is_empty() {
            out.push_str(&format!("📊 Change: {} cm\n", self.water_change));
        }
        if !self.discharge.is_empty() {
            out.push_str(&format!("🌊 Discharge: {} m³/s\n", self.discharge));
        }
        if !self.water_temp.is_empty() {
            out.push_str(&format!("🌡️ Water Temperature: {} °C\n", self.water_temp));
        }
        if let Some(tendency) = self.tendency {
            out.push_str(&format!("📈 Tendency: {tendency}\n"));
        }
        out.push_str(&format!(
            "🕒 Last update: {}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S %:z")
        ));
        out
    }
}
