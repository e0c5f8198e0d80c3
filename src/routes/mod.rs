pub mod health;
pub mod pages;
pub mod studio;

use crate::middleware;
use crate::state::AppState;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::compression::CompressionLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

pub fn build_router(state: AppState) -> Router {
    let static_dir = state.config.static_dir.clone();
    let body_limit = state.config.max_upload_bytes;

    Router::new()
        // Pages
        .route("/", get(pages::home))
        .route("/logs", get(pages::logs))
        // Operations
        .route("/process", post(studio::process))
        .route("/analyze-medical", post(studio::analyze_medical))
        .route("/generate", post(studio::generate))
        // Health
        .route("/health", get(health::health_check))
        // Uploaded and processed images
        .nest_service("/static", ServeDir::new(static_dir))
        // Middleware layers (applied bottom-up)
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(CompressionLayer::new())
        .layer(axum::middleware::from_fn(
            middleware::security_headers::security_headers,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
