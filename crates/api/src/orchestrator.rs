//! Request Orchestrator
//!
//! Binds the credential store, token service, feature pipeline and scorer
//! into the login and predict flows. Every failure leaves this module as a
//! [`PipelineError`]; the HTTP layer only chooses status codes.

use chrono::Duration;
use credential_store::CredentialStore;
use feature_engine::TelemetryInput;
use inference_engine::{Scorer, Verdict};
use metrics::{counter, histogram};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use token_service::{SessionToken, TokenService};
use tracing::{error, info, warn};

/// Which check produced an authentication failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthScope {
    /// Username/password login
    Login,
    /// Bearer token on a protected route
    Token,
}

/// Outcome of a failed pipeline step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PipelineError {
    #[error("Authentication failed")]
    Unauthorized(AuthScope),
    #[error("Internal failure")]
    Internal,
}

/// Identity of an authorized caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub username: String,
    pub full_name: String,
}

/// Per-request control flow over immutable shared context
pub struct Orchestrator {
    credentials: Arc<dyn CredentialStore>,
    tokens: TokenService,
    scorer: Arc<dyn Scorer>,
    token_ttl: Duration,
}

impl Orchestrator {
    pub fn new(
        credentials: Arc<dyn CredentialStore>,
        tokens: TokenService,
        scorer: Arc<dyn Scorer>,
        token_ttl: Duration,
    ) -> Self {
        Self {
            credentials,
            tokens,
            scorer,
            token_ttl,
        }
    }

    /// Verify username/password and issue a session token.
    ///
    /// Blocks on bcrypt; call from a blocking context.
    pub fn login(&self, username: &str, password: &str) -> Result<SessionToken, PipelineError> {
        let Some(record) = self.credentials.authenticate(username, password) else {
            warn!("Login rejected");
            counter!("pm_login_total", "outcome" => "rejected").increment(1);
            return Err(PipelineError::Unauthorized(AuthScope::Login));
        };

        let token = self
            .tokens
            .issue(&record.username, self.token_ttl)
            .map_err(|e| {
                error!(user = %record.username, "Token issuance failed: {}", e);
                counter!("pm_login_total", "outcome" => "error").increment(1);
                PipelineError::Internal
            })?;

        info!(user = %record.username, "Login succeeded");
        counter!("pm_login_total", "outcome" => "success").increment(1);
        Ok(token)
    }

    /// Validate a bearer token and resolve its subject
    pub fn authorize(&self, bearer: Option<&str>) -> Result<Principal, PipelineError> {
        let rejected = PipelineError::Unauthorized(AuthScope::Token);

        let token = bearer.ok_or(rejected)?;
        let username = self.tokens.validate(token).map_err(|_| rejected)?;
        let record = self.credentials.lookup(&username).ok_or_else(|| {
            warn!(user = %username, "Token subject no longer registered");
            rejected
        })?;

        Ok(Principal {
            username: record.username,
            full_name: record.full_name,
        })
    }

    /// Derive features and score them for an authorized caller
    pub fn predict(
        &self,
        principal: &Principal,
        telemetry: &TelemetryInput,
    ) -> Result<Verdict, PipelineError> {
        info!(user = %principal.username, "Prediction requested");
        let start = Instant::now();

        let result = feature_engine::derive(telemetry)
            .map_err(|e| e.to_string())
            .and_then(|features| self.scorer.score(&features).map_err(|e| e.to_string()));

        match result {
            Ok(verdict) => {
                histogram!("pm_inference_seconds").record(start.elapsed().as_secs_f64());
                counter!("pm_predictions_total", "outcome" => verdict.as_str()).increment(1);
                info!(user = %principal.username, prediction = verdict.as_str(), "Prediction completed");
                Ok(verdict)
            }
            Err(reason) => {
                counter!("pm_predictions_total", "outcome" => "error").increment(1);
                error!(user = %principal.username, "Prediction failed: {}", reason);
                Err(PipelineError::Internal)
            }
        }
    }
}
