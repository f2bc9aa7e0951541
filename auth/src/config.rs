//! Authentication configuration.
//!
//! Every tunable (allow-listed redirects, lifetimes, rate limits, signing key,
//! provider credentials) is supplied by the application at startup. Nothing
//! here reads the environment; see the server binary for that.

use crate::error::{AuthError, Result};
use chrono::Duration;

/// Maximum OAuth state lifetime.
pub const MAX_STATE_TTL: Duration = Duration::minutes(5);

/// Clock-skew tolerance allowed on top of [`MAX_STATE_TTL`].
pub const STATE_TTL_SKEW: Duration = Duration::minutes(1);

/// Minimum signing key length in bytes (HS256 key strength).
pub const MIN_SIGNING_KEY_LEN: usize = 32;

/// OAuth state / redirect configuration.
#[derive(Debug, Clone)]
pub struct OAuthStateConfig {
    /// Permitted post-login redirect targets (origin + path prefixes).
    ///
    /// A redirect URI is accepted when it starts with one of these and the
    /// match ends on a path boundary.
    pub allowed_redirect_uris: Vec<String>,

    /// Redirect used when the client does not ask for one.
    pub default_redirect_uri: String,

    /// State time-to-live.
    ///
    /// Default: 5 minutes
    pub state_ttl: Duration,
}

impl OAuthStateConfig {
    /// Create new state configuration.
    ///
    /// # Arguments
    ///
    /// * `default_redirect_uri` - Where to land after login when no redirect is requested.
    ///   It is added to the allow-list.
    #[must_use]
    pub fn new(default_redirect_uri: String) -> Self {
        Self {
            allowed_redirect_uris: vec![default_redirect_uri.clone()],
            default_redirect_uri,
            state_ttl: MAX_STATE_TTL,
        }
    }

    /// Allow an additional redirect prefix.
    #[must_use]
    pub fn allow_redirect(mut self, uri: impl Into<String>) -> Self {
        self.allowed_redirect_uris.push(uri.into());
        self
    }

    /// Set state time-to-live.
    #[must_use]
    pub const fn with_state_ttl(mut self, ttl: Duration) -> Self {
        self.state_ttl = ttl;
        self
    }

    /// Validate configuration.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Configuration`] if the TTL is not positive or
    /// exceeds 5 minutes plus skew, or the allow-list is empty.
    pub fn validate(&self) -> Result<()> {
        if self.state_ttl <= Duration::zero() || self.state_ttl > MAX_STATE_TTL + STATE_TTL_SKEW {
            return Err(AuthError::Configuration(format!(
                "state TTL must be within (0, 6m], got {}s",
                self.state_ttl.num_seconds()
            )));
        }
        if self.allowed_redirect_uris.is_empty() {
            return Err(AuthError::Configuration(
                "at least one redirect URI must be allow-listed".into(),
            ));
        }
        Ok(())
    }
}

impl Default for OAuthStateConfig {
    fn default() -> Self {
        Self::new("http://localhost:3000/".to_string())
    }
}

/// Session lifetime and refresh policy.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Lifetime of an interactive session.
    ///
    /// Default: 24 hours
    pub session_lifetime: Duration,

    /// Lifetime of a remember-me or freshly signed-up session.
    ///
    /// Default: 7 days
    pub extended_session_lifetime: Duration,

    /// How long before provider token expiry a refresh is recommended.
    ///
    /// Default: 5 minutes
    pub refresh_skew: Duration,

    /// Deadline applied to every identity-provider call.
    ///
    /// Default: 5 seconds
    pub provider_timeout: std::time::Duration,
}

impl SessionConfig {
    /// Create session configuration with defaults.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            session_lifetime: Duration::hours(24),
            extended_session_lifetime: Duration::days(7),
            refresh_skew: Duration::minutes(5),
            provider_timeout: std::time::Duration::from_secs(5),
        }
    }

    /// Set interactive session lifetime.
    #[must_use]
    pub const fn with_session_lifetime(mut self, lifetime: Duration) -> Self {
        self.session_lifetime = lifetime;
        self
    }

    /// Set extended (remember-me / signup) session lifetime.
    #[must_use]
    pub const fn with_extended_session_lifetime(mut self, lifetime: Duration) -> Self {
        self.extended_session_lifetime = lifetime;
        self
    }

    /// Set refresh lead time.
    #[must_use]
    pub const fn with_refresh_skew(mut self, skew: Duration) -> Self {
        self.refresh_skew = skew;
        self
    }

    /// Set provider call deadline.
    #[must_use]
    pub const fn with_provider_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.provider_timeout = timeout;
        self
    }

    /// Validate configuration.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Configuration`] if a lifetime is not positive,
    /// the refresh skew is negative, or the provider timeout is zero.
    pub fn validate(&self) -> Result<()> {
        if self.session_lifetime <= Duration::zero()
            || self.extended_session_lifetime <= Duration::zero()
        {
            return Err(AuthError::Configuration(
                "session lifetimes must be positive".into(),
            ));
        }
        if self.refresh_skew < Duration::zero() {
            return Err(AuthError::Configuration(
                "refresh skew must not be negative".into(),
            ));
        }
        if self.provider_timeout.is_zero() {
            return Err(AuthError::Configuration(
                "provider timeout must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Token-bucket rate limiting configuration.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Burst capacity per key.
    ///
    /// Default: 10
    pub capacity: u32,

    /// Time to refill a bucket from empty to full.
    ///
    /// Default: 60 seconds
    pub window: std::time::Duration,

    /// Upper bound on tracked keys.
    ///
    /// Default: 100 000
    pub max_tracked_keys: usize,
}

impl RateLimitConfig {
    /// Create rate limit configuration.
    #[must_use]
    pub const fn new(capacity: u32, window: std::time::Duration) -> Self {
        Self {
            capacity,
            window,
            max_tracked_keys: 100_000,
        }
    }

    /// Set tracked key ceiling.
    #[must_use]
    pub const fn with_max_tracked_keys(mut self, max: usize) -> Self {
        self.max_tracked_keys = max;
        self
    }

    /// Validate configuration.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Configuration`] if any value is zero.
    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 || self.window.is_zero() || self.max_tracked_keys == 0 {
            return Err(AuthError::Configuration(
                "rate limit capacity, window and key ceiling must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::new(10, std::time::Duration::from_secs(60))
    }
}

/// Session token signing configuration.
#[derive(Clone)]
pub struct TokenConfig {
    /// HMAC signing key. Loaded once at startup; swap it by restarting with a new value.
    pub signing_key: Vec<u8>,

    /// Value of the `iss` claim.
    pub issuer: String,
}

impl TokenConfig {
    /// Create token configuration.
    #[must_use]
    pub fn new(signing_key: impl Into<Vec<u8>>) -> Self {
        Self {
            signing_key: signing_key.into(),
            issuer: "gatekeeper".to_string(),
        }
    }

    /// Set issuer claim.
    #[must_use]
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = issuer.into();
        self
    }

    /// Validate configuration.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Configuration`] if the key is shorter than
    /// [`MIN_SIGNING_KEY_LEN`] bytes.
    pub fn validate(&self) -> Result<()> {
        if self.signing_key.len() < MIN_SIGNING_KEY_LEN {
            return Err(AuthError::Configuration(format!(
                "signing key must be at least {MIN_SIGNING_KEY_LEN} bytes"
            )));
        }
        Ok(())
    }
}

impl std::fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenConfig")
            .field("signing_key", &"<redacted>")
            .field("issuer", &self.issuer)
            .finish()
    }
}

/// Google OAuth 2.0 client configuration.
#[derive(Clone)]
pub struct GoogleConfig {
    /// OAuth 2.0 client ID from Google Cloud Console.
    pub client_id: String,

    /// OAuth 2.0 client secret (keep confidential).
    pub client_secret: String,

    /// Callback URL registered with Google (our `/auth/google/callback`).
    pub redirect_uri: String,

    /// Authorization endpoint.
    pub auth_url: String,

    /// Token endpoint (code exchange and refresh).
    pub token_url: String,

    /// UserInfo endpoint.
    pub userinfo_url: String,

    /// Revocation endpoint.
    pub revoke_url: String,

    /// Scopes to request.
    ///
    /// Default: `openid email profile`
    pub scopes: Vec<String>,
}

impl GoogleConfig {
    /// Create Google configuration pointing at the production endpoints.
    #[must_use]
    pub fn new(client_id: String, client_secret: String, redirect_uri: String) -> Self {
        Self {
            client_id,
            client_secret,
            redirect_uri,
            auth_url: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
            token_url: "https://oauth2.googleapis.com/token".to_string(),
            userinfo_url: "https://openidconnect.googleapis.com/v1/userinfo".to_string(),
            revoke_url: "https://oauth2.googleapis.com/revoke".to_string(),
            scopes: vec![
                "openid".to_string(),
                "email".to_string(),
                "profile".to_string(),
            ],
        }
    }

    /// Point every endpoint at `base` (`{base}/auth`, `/token`, `/userinfo`, `/revoke`).
    #[must_use]
    pub fn with_base_url(mut self, base: &str) -> Self {
        let base = base.trim_end_matches('/');
        self.auth_url = format!("{base}/auth");
        self.token_url = format!("{base}/token");
        self.userinfo_url = format!("{base}/userinfo");
        self.revoke_url = format!("{base}/revoke");
        self
    }

    /// Set custom scopes.
    #[must_use]
    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    /// Validate configuration.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Configuration`] if credentials are blank or the
    /// callback URL does not parse.
    pub fn validate(&self) -> Result<()> {
        if self.client_id.trim().is_empty() || self.client_secret.trim().is_empty() {
            return Err(AuthError::Configuration(
                "Google client id and secret are required".into(),
            ));
        }
        url::Url::parse(&self.redirect_uri).map_err(|e| {
            AuthError::Configuration(format!("invalid Google redirect URI: {e}"))
        })?;
        Ok(())
    }
}

impl std::fmt::Debug for GoogleConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("redirect_uri", &self.redirect_uri)
            .field("scopes", &self.scopes)
            .finish_non_exhaustive()
    }
}

/// Aggregate configuration for the authentication core.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// OAuth state / redirect policy.
    pub oauth: OAuthStateConfig,
    /// Session lifetimes and refresh policy.
    pub session: SessionConfig,
    /// Rate limiting.
    pub rate_limit: RateLimitConfig,
    /// Token signing.
    pub token: TokenConfig,
    /// Google provider.
    pub google: GoogleConfig,
}

impl AuthConfig {
    /// Validate every section.
    ///
    /// # Errors
    ///
    /// Returns the first [`AuthError::Configuration`] found.
    pub fn validate(&self) -> Result<()> {
        self.oauth.validate()?;
        self.session.validate()?;
        self.rate_limit.validate()?;
        self.token.validate()?;
        self.google.validate()
    }
}
