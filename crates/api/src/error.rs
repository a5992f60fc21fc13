//! HTTP Error Mapping

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::orchestrator::{AuthScope, PipelineError};

const LOGIN_FAILED: &str = "Incorrect username or password";
const TOKEN_INVALID: &str = "Could not validate credentials";
const INTERNAL: &str = "Internal Server Error";

/// Errors returned by handlers
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Unauthorized")]
    Unauthorized(AuthScope),
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("Internal Server Error")]
    Internal,
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Unauthorized(scope) => ApiError::Unauthorized(scope),
            PipelineError::Internal => ApiError::Internal,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Unauthorized(scope) => {
                let detail = match scope {
                    AuthScope::Login => LOGIN_FAILED,
                    AuthScope::Token => TOKEN_INVALID,
                };
                (
                    StatusCode::UNAUTHORIZED,
                    [(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"))],
                    Json(json!({ "detail": detail })),
                )
                    .into_response()
            }
            ApiError::Validation(detail) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({ "detail": detail })),
            )
                .into_response(),
            ApiError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "detail": INTERNAL })),
            )
                .into_response(),
        }
    }
}
