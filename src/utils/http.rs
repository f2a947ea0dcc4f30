// src/utils/http.rs

//! HTTP client utilities.

use std::time::Duration;

use crate::error::{AppError, Result};
use crate::models::HttpConfig;

/// Create a configured asynchronous HTTP client.
pub fn create_async_client(config: &HttpConfig) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(&config.user_agent)
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;
    Ok(client)
}

/// Fetch a page body as text.
///
/// Non-success statuses are errors; the body is not parsed here so callers
/// can keep the (non-`Send`) HTML document out of their futures.
pub async fn fetch_text(client: &reqwest::Client, url: &str) -> Result<String> {
    log::debug!("GET {url}");
    let response = client.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(AppError::Fetch {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }
    let text = response.text().await?;
    log::debug!("Received {} bytes from {url} ({status})", text.len());
    Ok(text)
}
