//! Maps `QueueyError` to the HTTP status and JSON envelope every error
//! response shares: `{status:"error", error_msg:{<ErrorName>: <message>}}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use queuey_core::QueueyError;
use serde_json::{json, Map, Value};

pub struct AppError(pub QueueyError);

impl From<QueueyError> for AppError {
    fn from(e: QueueyError) -> Self {
        Self(e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if matches!(status, StatusCode::INTERNAL_SERVER_ERROR) {
            tracing::warn!(error = %self.0, "storage unavailable");
        }

        let mut error_msg = Map::new();
        error_msg.insert(self.0.kind_name().to_string(), Value::String(self.0.client_message()));
        let body = json!({"status": "error", "error_msg": error_msg});

        (status, Json(body)).into_response()
    }
}
