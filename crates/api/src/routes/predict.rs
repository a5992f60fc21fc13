//! Prediction Route

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderMap},
    Json,
};
use feature_engine::TelemetryInput;
use inference_engine::Verdict;
use serde::Serialize;
use tracing::debug;

use crate::error::ApiError;
use crate::AppState;

/// Response for the predict endpoint
#[derive(Debug, Serialize)]
pub struct PredictionResponse {
    pub prediction: Verdict,
}

/// Extract the credentials of an `Authorization: Bearer <token>` header
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();

    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// Rejection category for logs; the message itself can echo submitted values
pub fn json_rejection_kind(rejection: &JsonRejection) -> &'static str {
    match rejection {
        JsonRejection::JsonDataError(_) => "invalid_data",
        JsonRejection::JsonSyntaxError(_) => "invalid_syntax",
        JsonRejection::MissingJsonContentType(_) => "missing_content_type",
        JsonRejection::BytesRejection(_) => "unreadable_body",
        _ => "other",
    }
}

/// Predict equipment failure from telemetry.
///
/// The token is checked before the body, so an unauthenticated caller gets
/// 401 whatever it sent.
pub async fn predict(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<TelemetryInput>, JsonRejection>,
) -> Result<Json<PredictionResponse>, ApiError> {
    let principal = state.orchestrator.authorize(bearer_token(&headers))?;

    let Json(telemetry) = payload.map_err(|rejection| {
        debug!(
            user = %principal.username,
            kind = json_rejection_kind(&rejection),
            "Rejected telemetry body"
        );
        ApiError::Validation(rejection.body_text())
    })?;

    let prediction = state.orchestrator.predict(&principal, &telemetry)?;
    Ok(Json(PredictionResponse { prediction }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::extract::FromRequest;
    use axum::http::{HeaderValue, Request};

    async fn reject(content_type: Option<&str>, body: &'static str) -> JsonRejection {
        let mut builder = Request::builder().method("POST").uri("/predict");
        if let Some(value) = content_type {
            builder = builder.header(header::CONTENT_TYPE, value);
        }
        let request = builder.body(Body::from(body)).unwrap();
        match Json::<TelemetryInput>::from_request(request, &()).await {
            Err(rejection) => rejection,
            Ok(_) => panic!("body should have been rejected"),
        }
    }

    fn headers(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token(&headers("Bearer abc.def.ghi")), Some("abc.def.ghi"));
        assert_eq!(bearer_token(&headers("bearer abc")), Some("abc"));
        assert_eq!(bearer_token(&headers("Basic dXNlcjpwYXNz")), None);
        assert_eq!(bearer_token(&headers("Bearer ")), None);
        assert_eq!(bearer_token(&headers("Bearer")), None);
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }

    #[tokio::test]
    async fn test_rejection_kind_omits_submitted_values() {
        let negative_hours = r#"{"temperature":85.0,"vibration":0.6,"pressure":35.0,"operational_hours":-31337}"#;
        let rejection = reject(Some("application/json"), negative_hours).await;
        let kind = json_rejection_kind(&rejection);
        assert_eq!(kind, "invalid_data");
        assert!(!kind.contains("31337"));

        let truncated = reject(Some("application/json"), "{\"temperature\":").await;
        assert_eq!(json_rejection_kind(&truncated), "invalid_syntax");

        let plain = reject(None, "{}").await;
        assert_eq!(json_rejection_kind(&plain), "missing_content_type");
    }
}
