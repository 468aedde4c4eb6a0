use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use valet_shared::ShiftId;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Shift not found: {0}")]
    ShiftNotFound(ShiftId),

    #[error("No shift found for code {0}")]
    CodeNotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Shift storage error: {0}")]
    Storage(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ServerError::ShiftNotFound(_) | ServerError::CodeNotFound(_) => {
                (StatusCode::NOT_FOUND, self.to_string())
            }
            ServerError::BadRequest(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            ServerError::Storage(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Shift storage error".to_string())
            }
            ServerError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };

        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }

        let body = serde_json::json!({
            "error": message,
        });

        (status, axum::Json(body)).into_response()
    }
}
