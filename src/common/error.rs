// Error handling types for the edge routes

use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use std::fmt;
use tracing::error;

use super::validation::ValidationResult;
use crate::session::gateway::ApiClientError;

/// API error types
#[derive(Debug)]
pub enum ApiError {
    Unauthorized(String),
    BadRequest(String),
    ValidationError(String),
    InternalServer(String),
    /// Non-2xx reply from the backend, mirrored to the caller
    Upstream {
        status: u16,
        message: String,
        code: Option<String>,
    },
}

impl ApiError {
    /// The body every route returns when no credential could be located
    pub fn unauthorized() -> Self {
        ApiError::Unauthorized("Unauthorized".to_string())
    }

    pub fn internal() -> Self {
        ApiError::InternalServer("Internal server error".to_string())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest(_) | ApiError::ValidationError(_) => StatusCode::BAD_REQUEST,
            ApiError::InternalServer(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Upstream { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            ApiError::BadRequest(msg) => write!(f, "Bad Request: {}", msg),
            ApiError::ValidationError(msg) => write!(f, "Validation Error: {}", msg),
            ApiError::InternalServer(msg) => write!(f, "Internal Server Error: {}", msg),
            ApiError::Upstream {
                status, message, ..
            } => write!(f, "Upstream Error ({}): {}", status, message),
        }
    }
}

impl std::error::Error for ApiError {}

/// JSON error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        let (error_message, code) = match self {
            ApiError::Unauthorized(msg)
            | ApiError::BadRequest(msg)
            | ApiError::ValidationError(msg)
            | ApiError::InternalServer(msg) => (msg, None),
            ApiError::Upstream { message, code, .. } => (message, code),
        };

        let error_response = ErrorResponse {
            error: error_message,
            code,
        };

        (status, Json(error_response)).into_response()
    }
}

/// Transport and decode failures are unhandled from the caller's point of
/// view; everything else mirrors the backend.
impl From<ApiClientError> for ApiError {
    fn from(err: ApiClientError) -> Self {
        if err.is_transport() {
            error!(
                status = err.status,
                code = ?err.code,
                context = ?err.context,
                error = %err,
                "Backend call failed before a usable response arrived"
            );
            return ApiError::internal();
        }

        ApiError::Upstream {
            status: err.status,
            message: err.message,
            code: err.code,
        }
    }
}

/// Helper function to convert ValidationResult to ApiError
impl From<ValidationResult> for ApiError {
    fn from(result: ValidationResult) -> Self {
        if result.is_valid {
            ApiError::internal()
        } else {
            let error_messages: Vec<String> = result
                .errors
                .iter()
                .map(|e| e.message.clone())
                .collect();
            ApiError::ValidationError(error_messages.join(", "))
        }
    }
}
