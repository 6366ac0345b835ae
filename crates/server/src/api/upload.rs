//! `POST /upload`: manual file upload or link submission.

use std::sync::Arc;

use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::{Multipart, Query, State};
use axum::Json;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use sheetflow_core::SheetflowError;
use sheetflow_ingest::IngestReport;

use super::{error_response, ApiError, ApiResult, ErrorResponse};
use crate::state::AppState;

/// Form fields accepted as a source link.
const URL_FIELDS: &[&str] = &["url", "sheet_url", "google_sheet_url"];

#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
pub struct UploadQuery {
    /// Source link, used when the form carries neither a file nor a link.
    pub url: Option<String>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct UploadResponse {
    pub processed_file: String,
    pub selected_file: String,
    /// Ingestions per second since startup, two decimals.
    pub tps: String,
}

impl From<IngestReport> for UploadResponse {
    fn from(report: IngestReport) -> Self {
        Self {
            processed_file: report.artifacts.processed.display().to_string(),
            selected_file: report.artifacts.selected.display().to_string(),
            tps: format!("{:.2}", report.tps),
        }
    }
}

enum Submission {
    File { filename: String, bytes: Bytes },
    Link(String),
}

#[utoipa::path(
    post,
    path = "/upload",
    tag = "Ingest",
    params(UploadQuery),
    request_body(content_type = "multipart/form-data", description = "`file` part or `url` field"),
    responses(
        (status = 200, description = "Tables regenerated", body = UploadResponse),
        (status = 400, description = "Missing input, fetch failure, or unreadable CSV", body = ErrorResponse),
        (status = 413, description = "Upload exceeds MAX_UPLOAD_MB", body = ErrorResponse)
    )
)]
pub async fn upload(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UploadQuery>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Json<UploadResponse>> {
    let mut submission = None;
    if let Ok(multipart) = multipart {
        submission = read_form(multipart).await?;
    }
    if submission.is_none() {
        submission = query
            .url
            .filter(|u| !u.trim().is_empty())
            .map(|u| Submission::Link(u.trim().to_string()));
    }

    let ingestor = &state.ingestor;
    let report = match submission {
        Some(Submission::File { filename, bytes }) => ingestor.submit_upload(&filename, bytes).await,
        Some(Submission::Link(url)) => ingestor.submit_url(&url).await,
        None => Err(SheetflowError::InputMissing),
    }
    .map_err(error_response)?;

    Ok(Json(report.into()))
}

/// Pull the submission out of the form. A non-empty file part wins over any link field.
async fn read_form(mut multipart: Multipart) -> ApiResult<Option<Submission>> {
    let mut file = None;
    let mut link = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        if name == "file" {
            let filename = field.file_name().unwrap_or_default().to_string();
            let bytes = field.bytes().await.map_err(multipart_error)?;
            // An untouched file input still submits an empty part.
            if filename.is_empty() && bytes.is_empty() {
                continue;
            }
            if file.is_none() {
                file = Some(Submission::File { filename, bytes });
            }
        } else if URL_FIELDS.contains(&name.as_str()) {
            let value = field.text().await.map_err(multipart_error)?;
            let value = value.trim();
            if link.is_none() && !value.is_empty() {
                link = Some(Submission::Link(value.to_string()));
            }
        }
    }

    Ok(file.or(link))
}

/// Keeps axum's status so an oversized body still reports 413.
fn multipart_error(e: MultipartError) -> ApiError {
    (
        e.status(),
        Json(ErrorResponse {
            error: e.body_text(),
        }),
    )
}
