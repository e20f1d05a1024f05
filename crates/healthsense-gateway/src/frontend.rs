//! Static frontend served from a directory on disk

use std::path::Path;

use axum::Json;
use axum::Router;
use axum::response::IntoResponse;
use axum::routing::get;
use serde_json::json;
use tower_http::services::{ServeDir, ServeFile};
use tracing::{info, warn};

use crate::server::GatewayState;

/// Version reported by the welcome document
pub const API_VERSION: &str = "1.0.0";

/// Mount `/`, `/static/*` and every other unmatched path onto the static dir.
///
/// Without an `index.html`, `/` answers with a JSON welcome document instead.
pub fn mount(router: Router<GatewayState>, static_dir: Option<&Path>) -> Router<GatewayState> {
    let Some(dir) = static_dir.filter(|d| d.is_dir()) else {
        if let Some(dir) = static_dir {
            warn!("Static directory not found at {}", dir.display());
        }
        return router.route("/", get(welcome_handler));
    };

    info!("Serving frontend from {}", dir.display());
    let index = dir.join("index.html");
    let router = if index.is_file() {
        router.route_service("/", ServeFile::new(index))
    } else {
        router.route("/", get(welcome_handler))
    };

    router
        .nest_service("/static", ServeDir::new(dir))
        .fallback_service(ServeDir::new(dir))
}

async fn welcome_handler() -> impl IntoResponse {
    Json(json!({
        "message": "Welcome to HealthSense AI",
        "version": API_VERSION,
        "description": "AI-Driven Multi-Agent Healthcare System",
        "frontend": "Static files not found - please ensure frontend is in 'static' directory",
    }))
}
