//! HTTP server for the travel-advisor frontend
//!
//! Exposes the chat proxy and itinerary endpoints:
//! - GET  /api/status          - Health check
//! - POST /api/chat/init       - Create a chat session
//! - POST /api/chat/send       - SSE streaming chat
//! - GET  /api/journey/summary - Structured itinerary summary

pub mod error;
mod handlers;
pub mod types;

use anyhow::Result;
use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::provider::Provider;
use crate::session::SessionStore;

pub use types::API_VERSION;

// ============================================================================
// Server State
// ============================================================================

#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionStore>,
    pub provider: Arc<dyn Provider>,
    pub journey_path: PathBuf,
    pub api_key: String,
    pub session_ttl: Duration,
}

// ============================================================================
// Routes
// ============================================================================

/// Create the router with all endpoints
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    // API version header on all responses
    let version_header = SetResponseHeaderLayer::if_not_present(
        header::HeaderName::from_static("x-api-version"),
        HeaderValue::from_static(API_VERSION),
    );

    Router::new()
        .route("/api/status", get(handlers::status_handler))
        .route("/api/chat/init", post(handlers::chat_init_handler))
        .route("/api/chat/send", post(handlers::chat_send_handler))
        .route("/api/journey/summary", get(handlers::journey_summary_handler))
        .layer(version_header)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run the HTTP server
pub async fn run(bind_address: &str, state: AppState) -> Result<()> {
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(bind_address).await?;
    info!("Server listening on http://{}", bind_address);

    axum::serve(listener, app).await?;

    Ok(())
}
