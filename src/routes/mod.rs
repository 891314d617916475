//! HTTP surface exposing the login gate and the live dashboard to the browser host.

pub mod auth;
pub mod dashboard;
pub mod health;

use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::AppState;

/// Build the full router with CORS for the configured frontend origin.
pub fn router(state: AppState) -> Router {
    let cors = match state.config.frontend_url.parse::<HeaderValue>() {
        Ok(origin) => CorsLayer::new()
            .allow_origin(origin)
            .allow_methods(tower_http::cors::Any)
            .allow_headers(tower_http::cors::Any),
        Err(e) => {
            tracing::warn!(error = %e, url = %state.config.frontend_url, "Invalid FRONTEND_URL, CORS disabled");
            CorsLayer::new()
        }
    };

    let auth_routes = Router::new()
        .route("/auth/login", post(auth::login))
        .route("/auth/status", get(auth::status));

    let dashboard_routes = Router::new()
        .route("/dashboard", get(dashboard::show))
        .route("/dashboard/refresh", post(dashboard::refresh));

    Router::new()
        .route("/health/live", get(health::live))
        .route("/health/ready", get(health::ready))
        .nest("/api/v1", auth_routes)
        .nest("/api/v1", dashboard_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
