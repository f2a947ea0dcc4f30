// src/error.rs

//! Unified error handling for the scraper and its storage.

use std::fmt;

use thiserror::Error;

/// Result type alias for vodostaj operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP transport failed (connect, timeout, body read)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Source answered with a non-success status
    #[error("Fetch error for {url}: status {status}")]
    Fetch { url: String, status: u16 },

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// CSS selector parsing failed
    #[error("Invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    /// Page structure could not be parsed
    #[error("Parse error: {0}")]
    Parse(String),

    /// Bulletin link could not be found on a listing page
    #[error("Discovery error: {0}")]
    Discovery(String),

    /// Localized timestamp text was missing or unparseable
    #[error("Timestamp error: {0}")]
    Timestamp(String),

    /// Storage open, query or transaction failure
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Stored data could not be interpreted
    #[error("Integrity error: {0}")]
    Integrity(String),

    /// Natural-language interpreter failed or answered garbage
    #[error("Interpreter error: {0}")]
    Interpreter(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),
}

impl AppError {
    /// Create a selector parsing error.
    pub fn selector(selector: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Selector {
            selector: selector.into(),
            message: message.to_string(),
        }
    }

    /// Create a page parsing error.
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse(message.into())
    }

    /// Create a discovery error.
    pub fn discovery(message: impl Into<String>) -> Self {
        Self::Discovery(message.into())
    }

    /// Create a timestamp parsing error.
    pub fn timestamp(message: impl Into<String>) -> Self {
        Self::Timestamp(message.into())
    }

    /// Create an integrity error.
    pub fn integrity(message: impl Into<String>) -> Self {
        Self::Integrity(message.into())
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create an interpreter error.
    pub fn interpreter(message: impl Into<String>) -> Self {
        Self::Interpreter(message.into())
    }
}
