//! Maps the error taxonomy to HTTP. This is the only place status
//! codes are decided — services below never see HTTP.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use refuge_types::error::{RefugeError, RefugeResult};
use serde_json::json;
use tracing::error;

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn bad_request(message: &str) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.to_string(),
        }
    }

    pub fn internal() -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: "internal error".to_string(),
        }
    }
}

impl From<RefugeError> for ApiError {
    fn from(err: RefugeError) -> Self {
        let status = match &err {
            RefugeError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            RefugeError::Invalid => StatusCode::BAD_REQUEST,
            RefugeError::Unauthorized => StatusCode::UNAUTHORIZED,
            RefugeError::Forbidden => StatusCode::FORBIDDEN,
            RefugeError::NotFound { .. } => StatusCode::NOT_FOUND,
            RefugeError::Conflict(_) => StatusCode::CONFLICT,
            RefugeError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        // Internal detail stays in the log, not the response body.
        let message = match &err {
            RefugeError::Internal(detail) => {
                error!(%detail, "internal error");
                "internal error".to_string()
            }
            other => other.to_string(),
        };
        Self { status, message }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

/// Run blocking store/service work off the async runtime.
pub(crate) async fn run_blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> RefugeResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::internal()
        })?
        .map_err(ApiError::from)
}
