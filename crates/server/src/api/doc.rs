//! OpenAPI documentation aggregator.
//!
//! Collects the `#[utoipa::path]` handlers and `ToSchema` types into one
//! OpenAPI document, served via Scalar UI at `/docs`.

use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "sheetflow API",
        version = "0.1.0",
        description = "Change-gated CSV ingestion: upload or link a sheet, download the derived tables.",
    ),
    tags(
        (name = "Ingest", description = "Upload form, manual ingestion, downloads, and record processing"),
        (name = "Health", description = "Liveness and ingestion counters"),
    ),
    paths(
        // Ingest
        crate::api::index::index,
        crate::api::upload::upload,
        crate::api::download::download,
        crate::api::process::process,
        // Health
        crate::api::health::health,
        crate::api::health::stats,
    ),
    components(schemas(
        crate::api::ErrorResponse,
        crate::api::upload::UploadResponse,
        crate::api::process::ProcessRequest,
        crate::api::process::ProcessResponse,
        crate::api::health::HealthResponse,
        crate::api::health::StatsResponse,
    ))
)]
pub struct ApiDoc;
