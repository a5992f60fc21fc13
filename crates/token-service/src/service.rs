//! Token Issuance and Validation

use chrono::Duration;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::clock::{Clock, SystemClock};
use crate::{Rejected, TokenError};

/// Fixed signing algorithm
pub const ALGORITHM: Algorithm = Algorithm::HS256;

/// Registered claims carried by a session token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Username the token was issued to
    pub sub: String,
    /// Expiry as Unix seconds
    pub exp: i64,
}

/// An encoded session token
#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken {
    token: String,
    expires_at: i64,
}

impl SessionToken {
    /// Encoded compact JWS
    pub fn as_str(&self) -> &str {
        &self.token
    }

    /// Expiry as Unix seconds
    pub fn expires_at(&self) -> i64 {
        self.expires_at
    }

    pub fn into_string(self) -> String {
        self.token
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionToken")
            .field("token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Issues and validates session tokens with a process-wide secret
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    clock: Arc<dyn Clock>,
}

impl TokenService {
    /// Create a service using the wall clock
    pub fn new(secret: &[u8]) -> Result<Self, TokenError> {
        Self::with_clock(secret, Arc::new(SystemClock))
    }

    /// Create a service reading time from `clock`
    pub fn with_clock(secret: &[u8], clock: Arc<dyn Clock>) -> Result<Self, TokenError> {
        if secret.is_empty() {
            return Err(TokenError::EmptySecret);
        }

        // Expiry is checked against `clock` below, not by jsonwebtoken
        let mut validation = Validation::new(ALGORITHM);
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            clock,
        })
    }

    /// Issue a token for `subject` expiring `ttl` from now
    pub fn issue(&self, subject: &str, ttl: Duration) -> Result<SessionToken, TokenError> {
        if subject.is_empty() {
            return Err(TokenError::EmptySubject);
        }

        let claims = Claims {
            sub: subject.to_string(),
            exp: self.clock.now() + ttl.num_seconds(),
        };
        let token = encode(&Header::new(ALGORITHM), &claims, &self.encoding_key)?;

        debug!(user = %subject, exp = claims.exp, "Issued session token");
        Ok(SessionToken {
            token,
            expires_at: claims.exp,
        })
    }

    /// Validate a presented token, returning its subject
    pub fn validate(&self, token: &str) -> Result<String, Rejected> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(|e| {
            debug!("Token rejected: {}", e);
            Rejected
        })?;
        let claims = data.claims;

        if claims.sub.is_empty() {
            debug!("Token rejected: empty subject");
            return Err(Rejected);
        }

        let now = self.clock.now();
        if now >= claims.exp {
            debug!(user = %claims.sub, exp = claims.exp, now, "Token rejected: expired");
            return Err(Rejected);
        }

        Ok(claims.sub)
    }

    /// Decode without checking expiry, for diagnostics
    pub fn peek_claims(&self, token: &str) -> Result<Claims, Rejected> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|_| Rejected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use serde_json::json;

    const SECRET: &[u8] = b"unit-test-signing-secret";
    const T0: i64 = 1_700_000_000;

    fn service_at(now: i64) -> (TokenService, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(now));
        let service = TokenService::with_clock(SECRET, clock.clone()).unwrap();
        (service, clock)
    }

    #[test]
    fn test_issue_then_validate() {
        let (service, _) = service_at(T0);
        let token = service.issue("user@example.com", Duration::minutes(30)).unwrap();

        assert_eq!(token.expires_at(), T0 + 1800);
        assert_eq!(service.validate(token.as_str()).unwrap(), "user@example.com");

        let claims = service.peek_claims(token.as_str()).unwrap();
        assert_eq!(claims.sub, "user@example.com");
        assert_eq!(claims.exp, T0 + 1800);
    }

    #[test]
    fn test_expiry_boundary() {
        let (service, clock) = service_at(T0);
        let token = service.issue("user@example.com", Duration::seconds(1800)).unwrap();

        clock.set(T0 + 1799);
        assert!(service.validate(token.as_str()).is_ok());

        clock.set(T0 + 1800);
        assert_eq!(service.validate(token.as_str()), Err(Rejected));

        clock.set(T0 + 1801);
        assert_eq!(service.validate(token.as_str()), Err(Rejected));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let (service, clock) = service_at(T0);
        let other = TokenService::with_clock(b"another-secret", clock).unwrap();
        let token = other.issue("user@example.com", Duration::minutes(30)).unwrap();

        assert_eq!(service.validate(token.as_str()), Err(Rejected));
    }

    #[test]
    fn test_tampered_token_rejected() {
        let (service, _) = service_at(T0);
        let token = service.issue("user@example.com", Duration::minutes(30)).unwrap();

        let encoded = token.into_string();
        let (signed, signature) = encoded.rsplit_once('.').unwrap();
        let first = signature.chars().next().unwrap();
        let replacement = if first == 'A' { 'B' } else { 'A' };
        let tampered = format!("{}.{}{}", signed, replacement, &signature[1..]);

        assert_eq!(service.validate(&tampered), Err(Rejected));
        assert_eq!(service.validate("not.a.token"), Err(Rejected));
        assert_eq!(service.validate(""), Err(Rejected));
    }

    #[test]
    fn test_missing_or_empty_subject_rejected() {
        let (service, _) = service_at(T0);
        let key = EncodingKey::from_secret(SECRET);

        let no_sub = encode(&Header::new(ALGORITHM), &json!({ "exp": T0 + 60 }), &key).unwrap();
        assert_eq!(service.validate(&no_sub), Err(Rejected));

        let empty_sub = encode(
            &Header::new(ALGORITHM),
            &json!({ "sub": "", "exp": T0 + 60 }),
            &key,
        )
        .unwrap();
        assert_eq!(service.validate(&empty_sub), Err(Rejected));

        let no_exp = encode(&Header::new(ALGORITHM), &json!({ "sub": "u" }), &key).unwrap();
        assert_eq!(service.validate(&no_exp), Err(Rejected));
    }

    #[test]
    fn test_other_algorithm_rejected() {
        let (service, _) = service_at(T0);
        let claims = Claims {
            sub: "user@example.com".to_string(),
            exp: T0 + 60,
        };
        let token = encode(
            &Header::new(Algorithm::HS512),
            &claims,
            &EncodingKey::from_secret(SECRET),
        )
        .unwrap();

        assert_eq!(service.validate(&token), Err(Rejected));
    }

    #[test]
    fn test_empty_secret_and_subject_refused() {
        assert!(matches!(TokenService::new(b""), Err(TokenError::EmptySecret)));

        let (service, _) = service_at(T0);
        assert!(matches!(
            service.issue("", Duration::minutes(1)),
            Err(TokenError::EmptySubject)
        ));
    }

    #[test]
    fn test_debug_redacts_token() {
        let (service, _) = service_at(T0);
        let token = service.issue("user@example.com", Duration::minutes(1)).unwrap();
        assert!(!format!("{:?}", token).contains(token.as_str()));
    }
}
