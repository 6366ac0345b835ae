//! HTTP endpoint modules.
//!
//! Each sub-module owns one route group. The shared error body and the
//! `SheetflowError` to status mapping live here.

pub mod doc;
mod download;
mod health;
mod index;
mod process;
mod upload;

use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use tracing::error;

use sheetflow_core::SheetflowError;

// ── Shared types ─────────────────────────────────────────────────

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

pub(crate) type ApiError = (StatusCode, Json<ErrorResponse>);
pub(crate) type ApiResult<T> = Result<T, ApiError>;

pub(crate) fn bad_request(msg: impl Into<String>) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse { error: msg.into() }),
    )
}

pub(crate) fn not_found(msg: impl Into<String>) -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse { error: msg.into() }),
    )
}

pub(crate) fn internal_error(e: impl std::fmt::Display) -> ApiError {
    error!(error = %e, "request failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: e.to_string(),
        }),
    )
}

/// Map a domain error onto its HTTP status.
pub(crate) fn error_response(err: SheetflowError) -> ApiError {
    match err {
        SheetflowError::InputMissing
        | SheetflowError::Fetch(_)
        | SheetflowError::Transform(_)
        | SheetflowError::InvalidArtifact(_) => bad_request(err.to_string()),
        SheetflowError::NotFound(_) => not_found(err.to_string()),
        SheetflowError::Io(_) => internal_error(err),
    }
}

// ── Re-exports ───────────────────────────────────────────────────

pub use download::download;
pub use health::{health, stats};
pub use index::index;
pub use process::process;
pub use upload::upload;
