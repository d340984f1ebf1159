//! Error types for splice operations.
//!
//! This module defines the main error type [`SpliceError`] which covers
//! every failure of the workflow: mirroring a site, matching a screenshot,
//! extracting a section and assembling a page.
//!
//! Extraction-class errors carry a remediation [`hint`](SpliceError::hint)
//! suitable for showing to an end user.
//!
//! # Example
//!
//! ```rust
//! use splice_core::{SpliceError, Result};
//!
//! fn require_sections(names: &[String]) -> Result<()> {
//!     if names.is_empty() {
//!         return Err(SpliceError::NoSections);
//!     }
//!     Ok(())
//! }
//! ```

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for splice operations.
#[derive(Error, Debug)]
pub enum SpliceError {
    /// HTTP client errors that do not fall into a more specific category.
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// The mirroring utility is not installed or not executable.
    #[error("Mirroring tool `{tool}` is not available")]
    ToolUnavailable { tool: String },

    /// The remote site refused the request (403-class).
    #[error("Website blocked the request (403 Forbidden): {detail}")]
    Blocked { detail: String },

    /// The remote page does not exist (404-class).
    #[error("Website not found (404): {detail}")]
    NotFound { detail: String },

    /// DNS, connect or transport failures.
    #[error("Connection failed: {detail}")]
    ConnectionFailed { detail: String },

    /// Request timeout.
    #[error("Request timed out after {timeout} seconds")]
    Timeout { timeout: u64 },

    /// Non-success HTTP status other than 403 and 404.
    #[error("HTTP error {status}")]
    HttpStatus { status: u16 },

    /// The mirroring utility exited unsuccessfully for an unclassified reason.
    #[error("Mirroring failed with exit code {code:?}: {stderr}")]
    MirrorFailed { code: Option<i32>, stderr: String },

    /// Invalid URL provided.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// HTML parsing or CSS selector errors.
    #[error("Failed to parse HTML: {0}")]
    HtmlParseError(String),

    /// A selector parsed fine but matched nothing in the page.
    #[error("No element matches selector `{selector}`")]
    SelectorNotFound { selector: String },

    /// A snapshot directory holds no HTML page.
    #[error("No HTML files found in {0}")]
    NoHtmlFiles(PathBuf),

    /// Assembly referenced a section that is not on disk.
    #[error("Unknown section: {name}")]
    UnknownSection { name: String },

    /// Section and page names must be safe path components.
    #[error("Invalid section name `{0}` (use letters, digits, '-' and '_', at most 64 characters)")]
    InvalidSectionName(String),

    /// Assembly was requested with an empty section list.
    #[error("No sections provided")]
    NoSections,

    /// The AI vision service could not be reached or returned an error status.
    #[error("Vision service unavailable: {0}")]
    VisionUnavailable(String),

    /// The AI vision service answered with something that could not be interpreted.
    #[error("Vision service returned an unusable response: {0}")]
    VisionResponse(String),

    /// An uploaded screenshot is empty, undecodable or of an unsupported type.
    #[error("Malformed upload: {0}")]
    MalformedUpload(String),

    /// File not found.
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// Wraps standard I/O errors for file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Manifest (de)serialization errors.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SpliceError {
    /// Stable snake_case identifier of the error kind.
    ///
    /// Used by the REST layer so clients can branch without parsing messages.
    pub fn kind(&self) -> &'static str {
        match self {
            SpliceError::HttpError(_) => "http_error",
            SpliceError::ToolUnavailable { .. } => "tool_unavailable",
            SpliceError::Blocked { .. } => "blocked",
            SpliceError::NotFound { .. } => "not_found",
            SpliceError::ConnectionFailed { .. } => "connection_failed",
            SpliceError::Timeout { .. } => "timeout",
            SpliceError::HttpStatus { .. } => "http_status",
            SpliceError::MirrorFailed { .. } => "mirror_failed",
            SpliceError::InvalidUrl(_) => "invalid_url",
            SpliceError::HtmlParseError(_) => "html_parse_error",
            SpliceError::SelectorNotFound { .. } => "selector_not_found",
            SpliceError::NoHtmlFiles(_) => "no_html_files",
            SpliceError::UnknownSection { .. } => "unknown_section",
            SpliceError::InvalidSectionName(_) => "invalid_section_name",
            SpliceError::NoSections => "no_sections",
            SpliceError::VisionUnavailable(_) => "vision_unavailable",
            SpliceError::VisionResponse(_) => "vision_response",
            SpliceError::MalformedUpload(_) => "malformed_upload",
            SpliceError::FileNotFound(_) => "file_not_found",
            SpliceError::Io(_) => "io",
            SpliceError::Json(_) => "json",
        }
    }

    /// Human-readable remediation hint for extraction failures.
    ///
    /// Returns `None` for errors where the message already says everything.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            SpliceError::ToolUnavailable { .. } => Some(
                "Install wget (macOS: `brew install wget`, Debian/Ubuntu: `apt install wget`, \
                 Windows: `choco install wget`) or point the mirror configuration at its path.",
            ),
            SpliceError::Blocked { .. } => Some(
                "The site has anti-bot protection. Try a different website, another page on the same host, \
                 or contact the site administrator.",
            ),
            SpliceError::NotFound { .. } => Some("Check the URL for typos and make sure the page exists."),
            SpliceError::ConnectionFailed { .. } | SpliceError::Timeout { .. } => Some(
                "The website may be down or refusing connections. Check your network and try again later.",
            ),
            SpliceError::InvalidUrl(_) => Some("Use a full URL including the scheme, e.g. https://example.com."),
            SpliceError::UnknownSection { .. } => Some("Extract the section first or check the section name."),
            _ => None,
        }
    }
}

/// Result type alias for SpliceError.
pub type Result<T> = std::result::Result<T, SpliceError>;
