use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use dockyard_store::StoreError;
use serde_json::json;

pub type ApiResult<T> = Result<T, ApiError>;

/// Error envelope returned by every handler: `{error, message?, field?}`.
#[derive(Debug)]
pub enum ApiError {
    BadRequest {
        message: String,
        field: Option<String>,
    },
    Unauthorized(String),
    NotFound(String),
    Conflict(String),
    Internal(String),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest {
            message: message.into(),
            field: None,
        }
    }

    /// Validation failure attributed to a single request field
    pub fn invalid_field(field: &str, message: impl Into<String>) -> Self {
        ApiError::BadRequest {
            message: message.into(),
            field: Some(field.to_string()),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            ApiError::BadRequest { message, field } => match field {
                Some(field) => json!({ "error": "Validation failed", "message": message, "field": field }),
                None => json!({ "error": "Bad request", "message": message }),
            },
            ApiError::Unauthorized(reason) => json!({ "error": "Unauthorized", "message": reason }),
            ApiError::NotFound(message) => json!({ "error": "Not found", "message": message }),
            ApiError::Conflict(message) => json!({ "error": "Conflict", "message": message }),
            ApiError::Internal(message) => {
                tracing::error!(error = %message, "Request failed");
                json!({ "error": "Internal server error", "message": message })
            }
        };

        (status, Json(body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(_) => ApiError::NotFound(err.to_string()),
            StoreError::Conflict(_) => ApiError::Conflict(err.to_string()),
            StoreError::InvalidInput(msg) => ApiError::bad_request(msg),
            _ => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Internal(err.to_string())
    }
}

/// Failures from the runtime, registry and delivery seams.
impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Internal(err.to_string())
    }
}
