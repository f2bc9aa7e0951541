//! Identity provider trait.

use crate::error::Result;
use chrono::{DateTime, Utc};

/// External OAuth 2.0 identity provider.
///
/// Network-bound methods may block for a while; the service wraps each call
/// in a deadline and maps a timeout to the method's failure variant.
pub trait IdentityProvider: Send + Sync {
    /// Build the authorization URL. Pure: no I/O, no side effects.
    ///
    /// # Arguments
    ///
    /// - `state`: CSRF state token
    /// - `pkce_challenge`: S256 challenge derived from the verifier
    ///
    /// # Errors
    ///
    /// Returns error if URL construction fails.
    fn authorization_url(&self, state: &str, pkce_challenge: &str) -> Result<String>;

    /// Exchange an authorization code for tokens and identity claims.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::TokenExchangeFailed` on any transport error,
    /// non-2xx status or malformed payload.
    fn exchange_code(
        &self,
        code: &str,
        pkce_verifier: &str,
    ) -> impl std::future::Future<Output = Result<ProviderTokens>> + Send;

    /// Obtain a fresh access token.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::RefreshFailed` on any failure.
    fn refresh_access_token(
        &self,
        refresh_token: &str,
    ) -> impl std::future::Future<Output = Result<RefreshedAccessToken>> + Send;

    /// Revoke an access or refresh token at the provider.
    ///
    /// # Errors
    ///
    /// Returns error if the provider call fails. Callers treat this as
    /// advisory and only log it.
    fn revoke_token(&self, token: &str) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// Identity claims about the authenticated user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityClaims {
    /// Stable subject identifier (`sub`).
    pub subject: String,
    /// Email address.
    pub email: String,
    /// Whether the provider verified the email.
    pub email_verified: bool,
    /// Display name.
    pub name: Option<String>,
}

/// Result of a successful code exchange.
#[derive(Clone, PartialEq, Eq)]
pub struct ProviderTokens {
    /// Access token.
    pub access_token: String,
    /// Refresh token (only when offline access was granted).
    pub refresh_token: Option<String>,
    /// Access token expiry.
    pub expires_at: DateTime<Utc>,
    /// Who logged in.
    pub claims: IdentityClaims,
}

impl std::fmt::Debug for ProviderTokens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderTokens")
            .field("access_token", &"<redacted>")
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("expires_at", &self.expires_at)
            .field("claims", &self.claims)
            .finish()
    }
}

/// Result of a successful refresh.
#[derive(Clone, PartialEq, Eq)]
pub struct RefreshedAccessToken {
    /// New access token.
    pub access_token: String,
    /// Rotated refresh token, if the provider issued a new one.
    pub refresh_token: Option<String>,
    /// New access token expiry.
    pub expires_at: DateTime<Utc>,
}

impl std::fmt::Debug for RefreshedAccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshedAccessToken")
            .field("access_token", &"<redacted>")
            .field("rotated_refresh_token", &self.refresh_token.is_some())
            .field("expires_at", &self.expires_at)
            .finish()
    }
}
