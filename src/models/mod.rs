// src/models/mod.rs

//! Domain models for the scraper.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
mod record;

// Re-export all public types
pub use config::{
    BulletinSourceConfig, Config, HttpConfig, LoggingConfig, RefreshConfig,
    RegionalSourceConfig, SourcesConfig, StationSeriesConfig, StorageConfig,
};
pub use record::{RiverRecord, Tendency};
