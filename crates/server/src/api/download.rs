//! `GET /download/{kind}`: serve a derived table as an attachment.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::header;
use axum::response::IntoResponse;

use sheetflow_ingest::ArtifactKind;

use super::{error_response, internal_error, not_found, ApiResult, ErrorResponse};
use crate::state::AppState;

#[utoipa::path(
    get,
    path = "/download/{kind}",
    tag = "Ingest",
    params(("kind" = String, Path, description = "`processed` or `selected`")),
    responses(
        (status = 200, description = "CSV attachment", content_type = "text/csv", body = String),
        (status = 400, description = "Invalid file type", body = ErrorResponse),
        (status = 404, description = "File not found", body = ErrorResponse)
    )
)]
pub async fn download(
    State(state): State<Arc<AppState>>,
    Path(kind): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let kind: ArtifactKind = kind.parse().map_err(error_response)?;
    let path = state.ingestor.store().artifact_path(kind);

    let body = match tokio::fs::read(&path).await {
        Ok(body) => body,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(not_found("File not found"));
        }
        Err(e) => return Err(internal_error(e)),
    };

    let disposition = format!("attachment; filename=\"{}\"", kind.file_name());
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    ))
}
