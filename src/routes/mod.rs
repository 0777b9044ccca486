//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! One Axum router binds the websocket endpoint and serves the static client
//! bundle at `/`. There is no other externally meaningful surface beyond the
//! listen port and the bundle directory.

pub mod ws;

use std::path::PathBuf;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::get;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Resolve the directory holding the static client bundle.
fn client_dir() -> PathBuf {
    std::env::var("CLIENT_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("client"))
}

/// Build the application router: websocket endpoint, health check, and the
/// client bundle as static files.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let client_service = ServeDir::new(client_dir()).append_index_html_on_directories(true);

    Router::new()
        .route("/ws", get(ws::handle_ws))
        .route("/healthz", get(healthz))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
        .fallback_service(client_service)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}
