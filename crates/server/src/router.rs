//! HTTP router construction.
//!
//! Assembles the Axum routes, middleware, and OpenAPI docs into a single `Router`.

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tracing::warn;
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

use crate::api;
use crate::state::AppState;

/// Build the complete application router with all routes and middleware.
pub fn build_router(state: Arc<AppState>) -> Router {
    let upload_limit = state.config.server.max_upload_bytes();
    let cors = cors_layer(&state.config.server.cors_origin);

    Router::new()
        .route("/", get(api::index))
        .route(
            "/upload",
            post(api::upload).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/download/{kind}", get(api::download))
        .route("/process", post(api::process))
        .route("/health", get(api::health))
        .route("/stats", get(api::stats))
        .layer(cors)
        .with_state(state)
        .merge(Scalar::with_url("/docs", api::doc::ApiDoc::openapi()))
}

/// `*` allows any origin; anything else is taken as one exact origin.
fn cors_layer(origin: &str) -> CorsLayer {
    if origin.trim() == "*" {
        return CorsLayer::permissive();
    }
    match origin.trim().parse::<HeaderValue>() {
        Ok(value) => CorsLayer::new()
            .allow_origin(value)
            .allow_methods(Any)
            .allow_headers(Any),
        Err(e) => {
            warn!(origin = %origin, error = %e, "invalid CORS_ORIGIN, cross-origin requests disabled");
            CorsLayer::new()
        }
    }
}
