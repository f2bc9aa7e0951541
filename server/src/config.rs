//! Configuration management for the Gatekeeper server.
//!
//! Loads configuration from environment variables with sensible defaults.
//! Secrets have no default: a missing signing key or Google credential is a
//! configuration error.

use chrono::Duration;
use gatekeeper_auth::{
    AuthConfig, AuthError, GoogleConfig, OAuthStateConfig, RateLimitConfig, Result,
    SessionConfig, TokenConfig,
};
use std::env;

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to bind to
    pub port: u16,
    /// Redis URL. When unset, OAuth state and sessions live in memory.
    pub redis_url: Option<String>,
    /// `PostgreSQL` URL. When unset, accounts live in memory.
    pub database_url: Option<String>,
    /// Time between expiry sweeps
    pub sweep_interval: std::time::Duration,
    /// Graceful shutdown timeout
    pub shutdown_timeout: std::time::Duration,
    /// Read the client IP from `X-Forwarded-For` / `X-Real-IP`. Only safe
    /// behind a reverse proxy that overwrites those headers.
    pub trust_forwarded: bool,
    /// Authentication core configuration
    pub auth: AuthConfig,
}

impl ServerConfig {
    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Configuration`] if a required secret is missing
    /// or the resulting configuration is invalid.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Configuration`] if a required secret is missing
    /// or the resulting configuration is invalid.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.is_empty())
                .ok_or_else(|| AuthError::Configuration(format!("{key} must be set")))
        };
        let parsed = |key: &str, default: u64| {
            lookup(key)
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(default)
        };
        let seconds = |secs: u64| Duration::seconds(i64::try_from(secs).unwrap_or(i64::MAX));

        let public_url = lookup("GATEKEEPER_PUBLIC_URL")
            .unwrap_or_else(|| "http://localhost:8080".to_string());
        let public_url = public_url.trim_end_matches('/').to_string();

        let default_redirect = lookup("GATEKEEPER_DEFAULT_REDIRECT")
            .unwrap_or_else(|| format!("{public_url}/"));
        let mut oauth = OAuthStateConfig::new(default_redirect);
        if let Some(extra) = lookup("GATEKEEPER_ALLOWED_REDIRECTS") {
            for uri in extra.split(',').map(str::trim).filter(|s| !s.is_empty()) {
                oauth = oauth.allow_redirect(uri);
            }
        }

        let session = SessionConfig::new()
            .with_session_lifetime(seconds(
                parsed("GATEKEEPER_SESSION_LIFETIME_HOURS", 24).saturating_mul(3600),
            ))
            .with_extended_session_lifetime(seconds(
                parsed("GATEKEEPER_REMEMBER_ME_DAYS", 7).saturating_mul(86_400),
            ))
            .with_refresh_skew(seconds(parsed("GATEKEEPER_REFRESH_SKEW_SECS", 300)))
            .with_provider_timeout(std::time::Duration::from_millis(parsed(
                "GATEKEEPER_PROVIDER_TIMEOUT_MS",
                5000,
            )));

        let rate_limit = RateLimitConfig::new(
            u32::try_from(parsed("GATEKEEPER_RATE_LIMIT_CAPACITY", 10)).unwrap_or(u32::MAX),
            std::time::Duration::from_secs(parsed("GATEKEEPER_RATE_LIMIT_WINDOW_SECS", 60)),
        );

        let token = TokenConfig::new(required("GATEKEEPER_SIGNING_KEY")?.into_bytes());

        let mut google = GoogleConfig::new(
            required("GOOGLE_CLIENT_ID")?,
            required("GOOGLE_CLIENT_SECRET")?,
            lookup("GOOGLE_REDIRECT_URI")
                .unwrap_or_else(|| format!("{public_url}/auth/google/callback")),
        );
        if let Some(base) = lookup("GOOGLE_BASE_URL") {
            google = google.with_base_url(&base);
        }

        let auth = AuthConfig {
            oauth,
            session,
            rate_limit,
            token,
            google,
        };
        auth.validate()?;

        Ok(Self {
            host: lookup("GATEKEEPER_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: lookup("GATEKEEPER_PORT")
                .and_then(|s| s.parse().ok())
                .unwrap_or(8080),
            redis_url: lookup("GATEKEEPER_REDIS_URL").filter(|s| !s.is_empty()),
            database_url: lookup("DATABASE_URL").filter(|s| !s.is_empty()),
            sweep_interval: std::time::Duration::from_secs(parsed(
                "GATEKEEPER_SWEEP_INTERVAL_SECS",
                60,
            )),
            shutdown_timeout: std::time::Duration::from_secs(parsed(
                "GATEKEEPER_SHUTDOWN_TIMEOUT_SECS",
                30,
            )),
            trust_forwarded: lookup("GATEKEEPER_TRUST_FORWARDED")
                .is_some_and(|v| matches!(v.trim(), "1" | "true" | "yes")),
            auth,
        })
    }

    /// Address to bind.
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
