//! Session Token Service
//!
//! Issues and validates stateless HS256 session tokens. A token is valid
//! while its signature verifies and the current time is before its `exp`
//! claim; there is no server-side session table and no refresh.

mod clock;
mod service;

pub use clock::{Clock, ManualClock, SystemClock};
pub use service::{Claims, SessionToken, TokenService, ALGORITHM};

use thiserror::Error;

/// Errors while issuing tokens
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Signing secret must not be empty")]
    EmptySecret,
    #[error("Token subject must not be empty")]
    EmptySubject,
    #[error("Token encoding failed: {0}")]
    Encoding(#[from] jsonwebtoken::errors::Error),
}

/// A presented token was not accepted.
///
/// Bad signatures, malformed payloads, expired tokens and missing subjects
/// all map to this single value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Could not validate credentials")]
pub struct Rejected;
