//! Login Rate Limiting using GCRA
//!
//! Guards the `/token` endpoint against password guessing with a per-IP
//! limiter from tower_governor. Requires the service to be served with
//! `into_make_service_with_connect_info::<SocketAddr>()`.

use governor::middleware::StateInformationMiddleware;
use serde::Deserialize;
use std::sync::Arc;
use tower_governor::governor::GovernorConfigBuilder;
use tower_governor::key_extractor::PeerIpKeyExtractor;

/// Governor config keyed by peer IP, emitting X-RateLimit-* headers
pub type LoginGovernorConfig =
    tower_governor::governor::GovernorConfig<PeerIpKeyExtractor, StateInformationMiddleware>;

/// Rate limiting configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Whether `/token` is rate limited at all
    pub enabled: bool,
    /// Seconds between replenished requests
    pub per_second: u64,
    /// Max requests that can be made immediately
    pub burst_size: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            per_second: 2,
            burst_size: 5,
        }
    }
}

impl RateLimitConfig {
    /// Configuration with limiting turned off
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }
}

/// Build the governor config shared by every `/token` request.
///
/// Returns `None` when the period or burst size is zero.
pub fn create_governor_config(config: &RateLimitConfig) -> Option<Arc<LoginGovernorConfig>> {
    GovernorConfigBuilder::default()
        .per_second(config.per_second)
        .burst_size(config.burst_size)
        .use_headers()
        .finish()
        .map(Arc::new)
}
