// src/lib.rs

//! Vodostaj: river water-level scraper and store.
//!
//! Scrapes hydrological bulletins from several upstream sites, normalizes
//! them into [`models::RiverRecord`]s and keeps the latest reading per
//! station in SQLite.

pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;
