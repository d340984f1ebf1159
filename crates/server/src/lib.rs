//! HTTP front end for splice.
//!
//! Every route maps onto one `splice_core` operation over a shared
//! workspace; see [`create_app`] for the route table.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::routing::{get, post};
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

pub mod config;
pub mod error;
pub mod handlers;
pub mod state;

pub use config::ServerConfig;
pub use error::{ApiError, ApiResult};
pub use state::AppState;

/// Limits applied by [`create_app_with`].
#[derive(Debug, Clone, Copy)]
pub struct Limits {
    pub request_timeout: Duration,
    pub max_upload_bytes: usize,
}

impl From<&ServerConfig> for Limits {
    fn from(config: &ServerConfig) -> Self {
        Self {
            request_timeout: Duration::from_secs(config.request_timeout),
            max_upload_bytes: config.max_upload_bytes(),
        }
    }
}

impl Default for Limits {
    fn default() -> Self {
        Self::from(&ServerConfig::default())
    }
}

/// Router with default limits.
pub fn create_app(state: AppState) -> Router {
    create_app_with(state, Limits::default())
}

pub fn create_app_with(state: AppState, limits: Limits) -> Router {
    let output = ServeDir::new(state.workspace.output_path());

    Router::new()
        .route("/", get(handlers::index))
        .route("/health", get(handlers::health))
        .route("/api/extract-website", post(handlers::extract_website))
        .route("/api/upload-screenshot", post(handlers::upload_screenshot))
        .route("/api/analyze-section", post(handlers::analyze_section))
        .route("/api/extract-section", post(handlers::extract_section))
        .route("/api/assemble-site", post(handlers::assemble_site))
        .route("/api/list-extracted-sites", get(handlers::list_extracted_sites))
        .route("/api/list-screenshots", get(handlers::list_uploaded))
        .route("/api/list-sections", get(handlers::list_sections))
        .route("/api/get-section-suggestions", post(handlers::section_suggestions))
        .nest_service("/output", output)
        .layer(DefaultBodyLimit::max(limits.max_upload_bytes))
        .layer(TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, limits.request_timeout))
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}
