//! JSON error responses.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use splice_core::SpliceError;
use thiserror::Error;

/// Error returned by every API handler.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Core(#[from] SpliceError),

    /// Missing fields, or a path outside the workspace
    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    NotFound(String),

    #[error("No confident match: best score {best_score:.2} is below the floor {floor:.2}")]
    NoMatch { best_score: f64, floor: f64 },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Core(err) => core_status(err),
            ApiError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) | ApiError::NoMatch { .. } => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Core(err) => err.kind(),
            ApiError::InvalidInput(_) => "invalid_input",
            ApiError::NotFound(_) => "not_found",
            ApiError::NoMatch { .. } => "no_match",
            ApiError::Internal(_) => "internal",
        }
    }

    pub fn hint(&self) -> Option<&'static str> {
        match self {
            ApiError::Core(err) => err.hint(),
            ApiError::NoMatch { .. } => Some("Add a text hint from the screenshot or pick the selector by hand."),
            _ => None,
        }
    }
}

fn core_status(err: &SpliceError) -> StatusCode {
    match err {
        SpliceError::InvalidUrl(_)
        | SpliceError::InvalidSectionName(_)
        | SpliceError::NoSections
        | SpliceError::MalformedUpload(_)
        | SpliceError::HtmlParseError(_) => StatusCode::BAD_REQUEST,
        SpliceError::UnknownSection { .. }
        | SpliceError::SelectorNotFound { .. }
        | SpliceError::NoHtmlFiles(_)
        | SpliceError::FileNotFound(_) => StatusCode::NOT_FOUND,
        SpliceError::Blocked { .. }
        | SpliceError::NotFound { .. }
        | SpliceError::ConnectionFailed { .. }
        | SpliceError::HttpStatus { .. }
        | SpliceError::MirrorFailed { .. }
        | SpliceError::HttpError(_)
        | SpliceError::VisionUnavailable(_)
        | SpliceError::VisionResponse(_) => StatusCode::BAD_GATEWAY,
        SpliceError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        SpliceError::ToolUnavailable { .. } => StatusCode::FAILED_DEPENDENCY,
        SpliceError::Io(_) | SpliceError::Json(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(kind = self.kind(), error = %self, "request failed");
        } else {
            tracing::warn!(kind = self.kind(), error = %self, "request rejected");
        }

        let body = json!({
            "success": false,
            "error": self.to_string(),
            "kind": self.kind(),
            "hint": self.hint(),
        });
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;
