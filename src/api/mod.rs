// Web front end: form pages over the shared detector.

pub mod handlers;
pub mod pages;

use anyhow::Context;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::path::PathBuf;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::services::config_store::ServerConfig;
use crate::services::detection::Detector;

/// Shared application state passed to all handlers
#[derive(Clone)]
pub struct AppState {
    pub detector: Detector,
    pub upload_dir: PathBuf,
}

impl AppState {
    pub fn new(detector: Detector, upload_dir: PathBuf) -> Self {
        Self {
            detector,
            upload_dir,
        }
    }
}

pub fn build_router(state: AppState, max_upload_bytes: usize) -> Router {
    let uploads = ServeDir::new(&state.upload_dir);

    Router::new()
        .route("/", get(handlers::index))
        .route("/health", get(handlers::health))
        .route("/analyze_text", post(handlers::analyze_text))
        .route("/analyze_image", post(handlers::analyze_image))
        .route("/analyze_video", post(handlers::analyze_video))
        .nest_service("/uploads", uploads)
        .with_state(state)
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
}

/// Bind and serve until the process is stopped.
pub async fn serve(config: &ServerConfig, detector: Detector) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(&config.upload_dir)
        .await
        .with_context(|| format!("Failed to create upload dir {}", config.upload_dir.display()))?;

    let state = AppState::new(detector, config.upload_dir.clone());
    let app = build_router(state, config.max_upload_bytes);

    let listener = tokio::net::TcpListener::bind(&config.bind)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind))?;
    info!("[SERVER] listening on http://{}", config.bind);

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
