//! `GET /`: the upload form.

use axum::response::Html;

#[utoipa::path(
    get,
    path = "/",
    tag = "Ingest",
    responses((status = 200, description = "Upload form", content_type = "text/html", body = String))
)]
pub async fn index() -> Html<&'static str> {
    Html(include_str!("../../assets/index.html"))
}
