use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::dto::ErrorResponse;

/// Maps the Admission Façade's synchronous errors (§4.5) onto HTTP status
/// codes: 400 for an unknown class, 503 when capacity is exhausted, 404
/// for an unrecognized task id on a status read.
pub enum ApiError {
    InvalidClass(String),
    NoCapacity,
    NotFound(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::InvalidClass(class) => (
                StatusCode::BAD_REQUEST,
                format!("model class `{class}` is not in the accepted whitelist"),
            ),
            ApiError::NoCapacity => (
                StatusCode::SERVICE_UNAVAILABLE,
                "node has no free capacity".to_string(),
            ),
            ApiError::NotFound(task_id) => {
                (StatusCode::NOT_FOUND, format!("no task with id `{task_id}`"))
            }
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}
