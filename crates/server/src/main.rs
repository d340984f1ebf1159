use anyhow::{Context, Result};
use splice_server::{AppState, Limits, ServerConfig, create_app_with};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,splice_core=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env().context("Failed to load configuration")?;
    let state = AppState::from_config(&config)
        .with_context(|| format!("Failed to prepare workspace {}", config.workspace.display()))?;

    if state.vision.api_key.is_none() {
        tracing::warn!("GEMINI_API_KEY not set, screenshot matching uses the local heuristic only");
    }
    tracing::info!(workspace = %config.workspace.display(), "workspace ready");

    let app = create_app_with(state, Limits::from(&config));
    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    tracing::info!("Listening on http://{}", addr);
    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
