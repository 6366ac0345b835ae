//! `POST /process`: uppercase the string values of a single JSON record.

use axum::extract::rejection::JsonRejection;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use sheetflow_ingest::uppercase_record;

use super::{bad_request, ApiResult, ErrorResponse};

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct ProcessRequest {
    #[serde(default)]
    #[schema(value_type = Object)]
    pub data: Option<Value>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ProcessResponse {
    #[schema(value_type = Object)]
    pub processed_data: Map<String, Value>,
}

#[utoipa::path(
    post,
    path = "/process",
    tag = "Ingest",
    request_body = ProcessRequest,
    responses(
        (status = 200, description = "Record with string values uppercased", body = ProcessResponse),
        (status = 400, description = "No data provided", body = ErrorResponse)
    )
)]
pub async fn process(
    payload: Result<Json<ProcessRequest>, JsonRejection>,
) -> ApiResult<Json<ProcessResponse>> {
    // An unreadable body carries no record either.
    let data = payload.ok().and_then(|Json(req)| req.data);
    let data = match data {
        Some(Value::Object(map)) if !map.is_empty() => map,
        Some(value) if !is_empty_value(&value) => {
            return Err(bad_request("data must be a JSON object"));
        }
        _ => return Err(bad_request("No data provided")),
    };

    Ok(Json(ProcessResponse {
        processed_data: uppercase_record(&data),
    }))
}

/// `null`, `false`, zero, and empty strings, arrays or objects.
fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
    }
}
