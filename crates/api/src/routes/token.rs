//! Token Route

use axum::{
    extract::{rejection::FormRejection, State},
    Form, Json,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::error::ApiError;
use crate::AppState;

/// OAuth2 password-grant form
#[derive(Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

/// Response for a successful login
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
}

fn form_rejection_kind(rejection: &FormRejection) -> &'static str {
    match rejection {
        FormRejection::InvalidFormContentType(_) => "invalid_content_type",
        FormRejection::FailedToDeserializeForm(_)
        | FormRejection::FailedToDeserializeFormBody(_) => "invalid_data",
        FormRejection::BytesRejection(_) => "unreadable_body",
        _ => "other",
    }
}

/// Exchange username/password for a bearer token
pub async fn login(
    State(state): State<AppState>,
    form: Result<Form<LoginForm>, FormRejection>,
) -> Result<Json<TokenResponse>, ApiError> {
    let Form(form) = form.map_err(|rejection| {
        debug!(kind = form_rejection_kind(&rejection), "Rejected login form");
        ApiError::Validation(rejection.body_text())
    })?;

    // bcrypt is CPU-bound
    let orchestrator = state.orchestrator.clone();
    let outcome = tokio::task::spawn_blocking(move || {
        orchestrator.login(&form.username, &form.password)
    })
    .await
    .map_err(|e| {
        error!("Login task failed: {}", e);
        ApiError::Internal
    })?;

    let token = outcome?;
    Ok(Json(TokenResponse {
        access_token: token.into_string(),
        token_type: "bearer",
    }))
}
