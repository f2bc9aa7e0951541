//! Error types for authentication and session operations.

use std::time::Duration;
use thiserror::Error;

/// Result type alias for authentication operations.
pub type Result<T> = std::result::Result<T, AuthError>;

/// Generic message returned for every authentication failure.
pub const AUTHENTICATION_FAILED: &str = "Authentication failed";

/// Generic message returned for every invalid, missing, or expired session.
pub const SESSION_INVALID: &str = "Session invalid";

/// Comprehensive error taxonomy for the authentication core.
///
/// The `Display` text of each variant is meant for server-side logs. Anything
/// shown to a client must go through [`AuthError::public_message`], which
/// collapses root causes into a handful of generic strings.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    // ═══════════════════════════════════════════════════════════
    // OAuth Handshake Errors
    // ═══════════════════════════════════════════════════════════

    /// Redirect URI is not on the allow-list.
    #[error("Redirect URI is not allow-listed")]
    InvalidRedirectUri,

    /// A required request parameter is missing or empty.
    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    /// State token is unknown or was already consumed.
    #[error("OAuth state not found")]
    StateNotFound,

    /// State token existed but its TTL elapsed.
    #[error("OAuth state expired")]
    StateExpired,

    /// The `oauth_state` cookie does not match the `state` query parameter.
    #[error("OAuth state cookie mismatch")]
    StateMismatch,

    /// The user denied consent, or the provider returned an error.
    #[error("Provider returned an error: {0}")]
    ProviderDenied(String),

    /// Code-for-token exchange failed (network, non-2xx, timeout, bad payload).
    #[error("Token exchange failed: {0}")]
    TokenExchangeFailed(String),

    /// Provider reports the email as unverified.
    #[error("Email address is not verified")]
    EmailNotVerified,

    // ═══════════════════════════════════════════════════════════
    // Token & Refresh Errors
    // ═══════════════════════════════════════════════════════════

    /// Provider refresh failed. The local session stays valid.
    #[error("Access token refresh failed: {0}")]
    RefreshFailed(String),

    /// Refresh requested for a session that was not created through OAuth.
    #[error("Refresh is only available for OAuth sessions")]
    RefreshNotApplicable,

    /// Signed session token has a bad signature or malformed payload.
    #[error("Invalid session token")]
    InvalidToken,

    /// Signed session token is past its expiry claim.
    #[error("Session token expired")]
    TokenExpired,

    // ═══════════════════════════════════════════════════════════
    // Session Errors
    // ═══════════════════════════════════════════════════════════

    /// Session not found.
    #[error("Session not found")]
    SessionNotFound,

    /// Session has expired.
    #[error("Session has expired")]
    SessionExpired,

    /// Session record violates an invariant (OAuth session without access token).
    #[error("Session record is invalid")]
    InvalidSession,

    /// Generated session ID collided with an existing one.
    #[error("Session ID already exists")]
    DuplicateSession,

    // ═══════════════════════════════════════════════════════════
    // Accounts
    // ═══════════════════════════════════════════════════════════

    /// An account is already linked to this provider subject.
    #[error("Account already exists for this identity")]
    AccountAlreadyExists,

    // ═══════════════════════════════════════════════════════════
    // Rate Limiting
    // ═══════════════════════════════════════════════════════════

    /// Too many attempts from one client key.
    #[error("Too many attempts, please retry after {retry_after:?}")]
    TooManyAttempts {
        /// Duration to wait before retrying
        retry_after: Duration,
    },

    // ═══════════════════════════════════════════════════════════
    // System Errors
    // ═══════════════════════════════════════════════════════════

    /// Backing store failed (Redis, Postgres, poisoned lock).
    #[error("Storage error: {0}")]
    Storage(String),

    /// Record could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration is missing or out of range.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Internal error (should not be exposed to users).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// Returns `true` if this error is due to malformed client input (HTTP 400).
    ///
    /// # Examples
    ///
    /// ```
    /// # use gatekeeper_auth::AuthError;
    /// assert!(AuthError::InvalidRedirectUri.is_client_error());
    /// assert!(AuthError::MalformedRequest("missing state".into()).is_client_error());
    /// assert!(!AuthError::StateNotFound.is_client_error());
    /// ```
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidRedirectUri | Self::MalformedRequest(_) | Self::RefreshNotApplicable
        )
    }

    /// Returns `true` if this error must surface as a generic authentication
    /// failure (HTTP 401).
    ///
    /// # Examples
    ///
    /// ```
    /// # use gatekeeper_auth::AuthError;
    /// assert!(AuthError::StateExpired.is_authentication_failure());
    /// assert!(AuthError::TokenExchangeFailed("timeout".into()).is_authentication_failure());
    /// assert!(!AuthError::Storage("down".into()).is_authentication_failure());
    /// ```
    #[must_use]
    pub const fn is_authentication_failure(&self) -> bool {
        matches!(
            self,
            Self::StateNotFound
                | Self::StateExpired
                | Self::StateMismatch
                | Self::ProviderDenied(_)
                | Self::TokenExchangeFailed(_)
                | Self::EmailNotVerified
                | Self::RefreshFailed(_)
                | Self::InvalidToken
                | Self::TokenExpired
                | Self::SessionNotFound
                | Self::SessionExpired
                | Self::InvalidSession
        )
    }

    /// Returns `true` if the failure concerns the session token or record
    /// rather than the OAuth handshake.
    #[must_use]
    pub const fn is_session_failure(&self) -> bool {
        matches!(
            self,
            Self::InvalidToken
                | Self::TokenExpired
                | Self::SessionNotFound
                | Self::SessionExpired
                | Self::InvalidSession
        )
    }

    /// Returns `true` if this error indicates a possible attack.
    ///
    /// # Examples
    ///
    /// ```
    /// # use gatekeeper_auth::AuthError;
    /// assert!(AuthError::StateMismatch.is_security_issue());
    /// assert!(!AuthError::SessionExpired.is_security_issue());
    /// ```
    #[must_use]
    pub const fn is_security_issue(&self) -> bool {
        matches!(
            self,
            Self::StateMismatch
                | Self::InvalidToken
                | Self::InvalidRedirectUri
                | Self::TooManyAttempts { .. }
        )
    }

    /// The only text that may be shown to an end user for this error.
    ///
    /// Root causes are collapsed so that a caller cannot tell "never existed"
    /// from "already used" from "expired".
    #[must_use]
    pub const fn public_message(&self) -> &'static str {
        if self.is_session_failure() {
            SESSION_INVALID
        } else if self.is_authentication_failure() {
            AUTHENTICATION_FAILED
        } else if self.is_client_error() {
            "Invalid request"
        } else if matches!(self, Self::TooManyAttempts { .. }) {
            "Too many requests"
        } else {
            "Internal error"
        }
    }
}
