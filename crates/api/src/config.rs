//! Service Configuration
//!
//! Layered with the `config` crate: built-in defaults, then
//! `config/default.toml` (optional), then the file named by `PM_CONFIG`
//! (optional), then `PM__SECTION__KEY` environment variables.

use anyhow::{bail, Context, Result};
use ::config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use std::env;

use crate::rate_limit::RateLimitConfig;
use credential_store::DEFAULT_COST;
use inference_engine::{DEFAULT_MODEL_PATH, DEFAULT_SCALER_PATH};

/// Placeholder secret that must never reach production
const INSECURE_PLACEHOLDER_SECRET: &str = "your_secret_key";

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub model: ModelConfig,
    pub cors: CorsConfig,
    pub rate_limit: RateLimitConfig,
    pub logging: LoggingConfig,
}

/// HTTP listener configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

impl ServerConfig {
    /// `host:port` for binding
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Authentication configuration
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HS256 signing secret; required
    pub secret_key: Option<String>,
    /// Session token lifetime
    pub token_ttl_minutes: u32,
    /// bcrypt work factor for seeded passwords
    pub bcrypt_cost: u32,
    /// Registered users; the demo account is seeded when empty
    pub users: Vec<UserConfig>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            secret_key: None,
            token_ttl_minutes: 30,
            bcrypt_cost: DEFAULT_COST,
            users: Vec::new(),
        }
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("secret_key", &self.secret_key.as_ref().map(|_| "<redacted>"))
            .field("token_ttl_minutes", &self.token_ttl_minutes)
            .field("bcrypt_cost", &self.bcrypt_cost)
            .field("users", &self.users.len())
            .finish()
    }
}

impl AuthConfig {
    /// The signing secret, refusing missing, empty or placeholder values
    pub fn signing_secret(&self) -> Result<&str> {
        match self.secret_key.as_deref().map(str::trim) {
            None | Some("") => bail!(
                "No signing secret configured; set PM__AUTH__SECRET_KEY or SECRET_KEY"
            ),
            Some(INSECURE_PLACEHOLDER_SECRET) => {
                bail!("Refusing to start with the placeholder signing secret")
            }
            Some(secret) => Ok(secret),
        }
    }

    /// Token lifetime as a duration
    pub fn token_ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(i64::from(self.token_ttl_minutes))
    }
}

/// A pre-hashed user entry
#[derive(Debug, Clone, Deserialize)]
pub struct UserConfig {
    pub username: String,
    pub full_name: String,
    /// bcrypt hash, e.g. `$2b$12$...`
    pub password_hash: String,
}

/// Model artifact locations
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub scaler_path: String,
    pub model_path: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            scaler_path: DEFAULT_SCALER_PATH.to_string(),
            model_path: DEFAULT_MODEL_PATH.to_string(),
        }
    }
}

/// Cross-origin configuration for the dashboard frontend
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["http://localhost:3000".to_string()],
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter used when RUST_LOG is unset
    pub level: String,
    pub format: LogFormat,
    /// Also append events to this file, e.g. `logs/api.log`
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info,tower_http=info".to_string(),
            format: LogFormat::Pretty,
            file: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from files and the environment
    pub fn load() -> Result<Self> {
        let mut builder =
            Config::builder().add_source(File::with_name("config/default").required(false));

        if let Ok(path) = env::var("PM_CONFIG") {
            builder = builder.add_source(File::with_name(&path));
        }

        let config = builder
            .add_source(
                Environment::with_prefix("PM")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("cors.allowed_origins")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let mut app: AppConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        if app.auth.secret_key.is_none() {
            app.auth.secret_key = env::var("SECRET_KEY").ok();
        }

        app.validate()?;
        Ok(app)
    }

    /// Parse a TOML document on top of the defaults
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let app: AppConfig = Config::builder()
            .add_source(File::from_str(content, FileFormat::Toml))
            .build()
            .context("Failed to build configuration")?
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        app.validate()?;
        Ok(app)
    }

    /// Reject configurations the service cannot start with
    pub fn validate(&self) -> Result<()> {
        self.auth.signing_secret()?;

        if self.auth.token_ttl_minutes == 0 {
            bail!("auth.token_ttl_minutes must be positive");
        }
        if !(4..=31).contains(&self.auth.bcrypt_cost) {
            bail!(
                "auth.bcrypt_cost must be between 4 and 31, got {}",
                self.auth.bcrypt_cost
            );
        }
        if self.rate_limit.enabled && (self.rate_limit.per_second == 0 || self.rate_limit.burst_size == 0)
        {
            bail!("rate_limit.per_second and rate_limit.burst_size must be positive");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.server.addr(), "0.0.0.0:8000");
        assert_eq!(config.auth.token_ttl_minutes, 30);
        assert_eq!(config.auth.token_ttl(), chrono::Duration::minutes(30));
        assert_eq!(config.auth.bcrypt_cost, DEFAULT_COST);
        assert_eq!(config.model.scaler_path, "model/scaler.json");
        assert_eq!(config.model.model_path, "model/model.json");
        assert_eq!(config.cors.allowed_origins, vec!["http://localhost:3000"]);
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert!(config.logging.file.is_none());
    }

    #[test]
    fn test_missing_secret_is_fatal() {
        assert!(AppConfig::default().validate().is_err());
        assert!(AppConfig::from_toml_str("[server]\nport = 9000\n").is_err());
        assert!(AppConfig::from_toml_str("[auth]\nsecret_key = \"  \"\n").is_err());
    }

    #[test]
    fn test_placeholder_secret_is_fatal() {
        let result = AppConfig::from_toml_str("[auth]\nsecret_key = \"your_secret_key\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_from_toml() {
        let config = AppConfig::from_toml_str(
            r#"
            [server]
            port = 9100

            [auth]
            secret_key = "a-real-secret"
            token_ttl_minutes = 5
            bcrypt_cost = 4

            [[auth.users]]
            username = "ops@example.com"
            full_name = "Ops"
            password_hash = "$2b$04$abcdefghijklmnopqrstuu"

            [rate_limit]
            enabled = false

            [logging]
            format = "json"
            file = "logs/api.log"
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 9100);
        assert_eq!(config.auth.signing_secret().unwrap(), "a-real-secret");
        assert_eq!(config.auth.token_ttl_minutes, 5);
        assert_eq!(config.auth.users.len(), 1);
        assert_eq!(config.auth.users[0].username, "ops@example.com");
        assert!(!config.rate_limit.enabled);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.logging.file.as_deref(), Some("logs/api.log"));
        // Untouched sections keep their defaults
        assert_eq!(config.model.model_path, "model/model.json");
    }

    #[test]
    fn test_invalid_values_rejected() {
        let zero_ttl = "[auth]\nsecret_key = \"s\"\ntoken_ttl_minutes = 0\n";
        assert!(AppConfig::from_toml_str(zero_ttl).is_err());

        let low_cost = "[auth]\nsecret_key = \"s\"\nbcrypt_cost = 2\n";
        assert!(AppConfig::from_toml_str(low_cost).is_err());
    }

    #[test]
    fn test_debug_redacts_secret() {
        let config = AppConfig::from_toml_str("[auth]\nsecret_key = \"hunter2-secret\"\n").unwrap();
        assert!(!format!("{:?}", config).contains("hunter2-secret"));
    }
}
