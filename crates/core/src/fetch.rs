//! Single-page HTTP capture.
//!
//! Used as the degraded path of the extraction driver when the mirroring
//! tool is missing or fails, and for reading saved pages back from disk.

use std::fs;
use std::path::Path;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use url::Url;

use crate::{Result, SpliceError};

/// Browser-like User-Agent sent by the fallback fetch and by `wget`.
pub const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Accept header sent alongside the browser User-Agent.
pub const BROWSER_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8";

/// HTTP client configuration for fetching web pages.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Request timeout in seconds.
    pub timeout: u64,
    /// User-Agent string.
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self { timeout: 30, user_agent: BROWSER_USER_AGENT.to_string() }
    }
}

/// Parses and validates a site URL.
///
/// Only `http` and `https` URLs with a host are accepted.
pub fn parse_site_url(url: &str) -> Result<Url> {
    let parsed = Url::parse(url).map_err(|e| SpliceError::InvalidUrl(format!("{url}: {e}")))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(SpliceError::InvalidUrl(format!(
            "{url}: URL must use http:// or https://"
        )));
    }
    if parsed.host_str().is_none() {
        return Err(SpliceError::InvalidUrl(format!("{url}: URL has no host")));
    }

    Ok(parsed)
}

/// Fetches HTML content from a URL.
///
/// Sends a browser-like GET and returns the body as text. Failures are
/// categorized: 403 becomes [`SpliceError::Blocked`], 404
/// [`SpliceError::NotFound`], other error statuses
/// [`SpliceError::HttpStatus`], and transport problems
/// [`SpliceError::ConnectionFailed`] or [`SpliceError::Timeout`].
pub async fn fetch_url(url: &str, config: &FetchConfig) -> Result<String> {
    let parsed_url = parse_site_url(url)?;

    let client = Client::builder()
        .timeout(Duration::from_secs(config.timeout))
        .build()
        .map_err(SpliceError::HttpError)?;

    let response = client
        .get(parsed_url)
        .header("User-Agent", &config.user_agent)
        .header("Accept", BROWSER_ACCEPT)
        .header("Accept-Language", "en-US,en;q=0.5")
        .header("Upgrade-Insecure-Requests", "1")
        .send()
        .await
        .map_err(|e| classify_transport_error(e, config.timeout))?;

    match response.status() {
        StatusCode::FORBIDDEN => {
            return Err(SpliceError::Blocked { detail: format!("GET {url} returned 403") });
        }
        StatusCode::NOT_FOUND => {
            return Err(SpliceError::NotFound { detail: format!("GET {url} returned 404") });
        }
        status if !status.is_success() => {
            return Err(SpliceError::HttpStatus { status: status.as_u16() });
        }
        _ => {}
    }

    let content = response.text().await.map_err(|e| classify_transport_error(e, config.timeout))?;

    Ok(content)
}

fn classify_transport_error(err: reqwest::Error, timeout: u64) -> SpliceError {
    if err.is_timeout() {
        SpliceError::Timeout { timeout }
    } else if err.is_connect() || err.is_request() {
        SpliceError::ConnectionFailed { detail: err.to_string() }
    } else {
        SpliceError::HttpError(err)
    }
}

/// Reads HTML content from a local file.
///
/// Callers should validate and sanitize the path when accepting user input.
pub fn fetch_file(path: &Path) -> Result<String> {
    if !path.exists() {
        return Err(SpliceError::FileNotFound(path.to_path_buf()));
    }

    let bytes = fs::read(path)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
