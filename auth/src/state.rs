//! Domain types for the authentication core.
//!
//! Records here are plain data. Persistence lives behind the store traits in
//! [`crate::providers`], orchestration in [`crate::service`].

use crate::config::{MAX_STATE_TTL, STATE_TTL_SKEW};
use crate::error::{AuthError, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr};

// ═══════════════════════════════════════════════════════════════════════
// ID Types
// ═══════════════════════════════════════════════════════════════════════

/// Unique identifier for a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub uuid::Uuid);

impl UserId {
    /// Generate a new random `UserId`.
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

/// Unique identifier for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub uuid::Uuid);

impl SessionId {
    /// Generate a new random `SessionId` (UUID v4, 122 random bits from the OS RNG).
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

// ═══════════════════════════════════════════════════════════════════════
// OAuth State
// ═══════════════════════════════════════════════════════════════════════

/// What the user asked for when the OAuth flow started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OAuthIntent {
    /// Log in; an unknown identity gets an account on first use.
    SignIn,
    /// Create an account; an already-linked identity is sent to login instead.
    SignUp,
}

/// An in-flight authorization attempt.
///
/// Created at OAuth start, consumed exactly once at callback.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthStateRecord {
    /// Opaque CSRF token (43 chars of URL-safe base64).
    pub state_token: String,

    /// PKCE code verifier. Never leaves the server.
    pub pkce_verifier: String,

    /// Allow-listed post-login redirect.
    pub redirect_uri: String,

    /// Sign-in or sign-up.
    pub intent: OAuthIntent,

    /// Whether the resulting session should get the extended lifetime.
    pub remember_me: bool,

    /// Issue time.
    pub created_at: DateTime<Utc>,

    /// Expiry time.
    pub expires_at: DateTime<Utc>,
}

impl OAuthStateRecord {
    /// A record is expired iff `now > expires_at`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// `false` when the stored lifetime is longer than 5 minutes plus skew.
    ///
    /// Such a record was not written by this crate and is treated as expired.
    #[must_use]
    pub fn has_valid_lifetime(&self) -> bool {
        let lifetime = self.expires_at - self.created_at;
        lifetime > Duration::zero() && lifetime <= MAX_STATE_TTL + STATE_TTL_SKEW
    }
}

impl fmt::Debug for OAuthStateRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthStateRecord")
            .field("state_token", &"<redacted>")
            .field("pkce_verifier", &"<redacted>")
            .field("redirect_uri", &self.redirect_uri)
            .field("intent", &self.intent)
            .field("remember_me", &self.remember_me)
            .field("created_at", &self.created_at)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Sessions
// ═══════════════════════════════════════════════════════════════════════

/// Audit metadata captured from the request that created a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientMetadata {
    /// `User-Agent` header.
    pub user_agent: String,
    /// Client address.
    pub ip_address: IpAddr,
}

impl Default for ClientMetadata {
    fn default() -> Self {
        Self {
            user_agent: "Unknown".to_string(),
            ip_address: IpAddr::V4(Ipv4Addr::LOCALHOST),
        }
    }
}

/// One authenticated browser or API client.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticationSession {
    /// Primary key.
    pub session_id: SessionId,

    /// Owner.
    pub user_id: UserId,

    /// Signed token last handed to the client. Kept for audit, never re-verified.
    pub session_token: String,

    /// Created through the OAuth flow.
    pub is_oauth: bool,

    /// Provider access token. Empty for non-OAuth sessions.
    pub access_token: String,

    /// Provider refresh token, when the provider issued one.
    pub refresh_token: Option<String>,

    /// Provider access-token expiry. Only meaningful when `is_oauth`.
    pub token_expires_at: Option<DateTime<Utc>>,

    /// Absolute lifetime cap, fixed at creation.
    pub session_expires_at: DateTime<Utc>,

    /// Creation time.
    pub created_at: DateTime<Utc>,

    /// Last successful validation. Never moves backwards.
    pub last_activity_at: DateTime<Utc>,

    /// Audit metadata.
    pub user_agent: String,

    /// Audit metadata.
    pub ip_address: IpAddr,
}

impl AuthenticationSession {
    /// A session is expired iff `now > session_expires_at`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.session_expires_at
    }

    /// `true` when the provider access token is within `skew` of expiring.
    ///
    /// Always `false` for non-OAuth sessions and sessions without a known
    /// token expiry.
    #[must_use]
    pub fn needs_refresh_at(&self, now: DateTime<Utc>, skew: Duration) -> bool {
        self.is_oauth
            && self
                .token_expires_at
                .is_some_and(|expires_at| now > expires_at - skew)
    }

    /// `true` when `token` is this session's access or refresh token.
    #[must_use]
    pub fn holds_provider_token(&self, token: &str) -> bool {
        (!self.access_token.is_empty() && self.access_token == token)
            || self.refresh_token.as_deref() == Some(token)
    }

    /// Check the record invariants.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidSession`] if the session would expire
    /// before it was created, or is an OAuth session without an access token.
    pub fn validate(&self) -> Result<()> {
        if self.session_expires_at <= self.created_at {
            return Err(AuthError::InvalidSession);
        }
        if self.is_oauth && self.access_token.is_empty() {
            return Err(AuthError::InvalidSession);
        }
        Ok(())
    }
}

impl fmt::Debug for AuthenticationSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthenticationSession")
            .field("session_id", &self.session_id)
            .field("user_id", &self.user_id)
            .field("session_token", &"<redacted>")
            .field("is_oauth", &self.is_oauth)
            .field("access_token", &"<redacted>")
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("token_expires_at", &self.token_expires_at)
            .field("session_expires_at", &self.session_expires_at)
            .field("created_at", &self.created_at)
            .field("last_activity_at", &self.last_activity_at)
            .field("user_agent", &self.user_agent)
            .field("ip_address", &self.ip_address)
            .finish()
    }
}

/// Non-secret view of a session, for account screens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    /// Session id.
    pub session_id: SessionId,
    /// Created through OAuth.
    pub is_oauth: bool,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last activity.
    pub last_activity_at: DateTime<Utc>,
    /// Absolute expiry.
    pub session_expires_at: DateTime<Utc>,
    /// Audit metadata.
    pub user_agent: String,
    /// Audit metadata.
    pub ip_address: IpAddr,
}

impl From<&AuthenticationSession> for SessionSummary {
    fn from(session: &AuthenticationSession) -> Self {
        Self {
            session_id: session.session_id,
            is_oauth: session.is_oauth,
            created_at: session.created_at,
            last_activity_at: session.last_activity_at,
            session_expires_at: session.session_expires_at,
            user_agent: session.user_agent.clone(),
            ip_address: session.ip_address,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Accounts
// ═══════════════════════════════════════════════════════════════════════

/// A local account linked to a provider identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Local user id.
    pub user_id: UserId,
    /// Provider's stable subject identifier (`sub`).
    pub provider_subject: String,
    /// Verified email at link time.
    pub email: String,
    /// Display name, if the provider shared one.
    pub name: Option<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// Input for creating an account from provider claims.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOAuthAccount {
    /// Provider's stable subject identifier.
    pub provider_subject: String,
    /// Verified email.
    pub email: String,
    /// Display name.
    pub name: Option<String>,
    /// Creation time, read from the service clock.
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn session(now: DateTime<Utc>) -> AuthenticationSession {
        AuthenticationSession {
            session_id: SessionId::new(),
            user_id: UserId::new(),
            session_token: "signed".into(),
            is_oauth: true,
            access_token: "ya29.access".into(),
            refresh_token: Some("1//refresh".into()),
            token_expires_at: Some(now + Duration::hours(1)),
            session_expires_at: now + Duration::days(7),
            created_at: now,
            last_activity_at: now,
            user_agent: "test".into(),
            ip_address: IpAddr::V4(Ipv4Addr::LOCALHOST),
        }
    }

    #[test]
    fn test_session_expiry_boundary() {
        let now = Utc::now();
        let s = session(now);
        let exp = s.session_expires_at;

        assert!(!s.is_expired_at(exp - Duration::nanoseconds(1)));
        assert!(!s.is_expired_at(exp));
        assert!(s.is_expired_at(exp + Duration::nanoseconds(1)));
    }

    #[test]
    fn test_needs_refresh_uses_skew() {
        let now = Utc::now();
        let s = session(now);
        let token_exp = s.token_expires_at.unwrap();
        let skew = Duration::minutes(5);

        assert!(!s.needs_refresh_at(now, skew));
        assert!(!s.needs_refresh_at(token_exp - skew, skew));
        assert!(s.needs_refresh_at(token_exp - Duration::minutes(1), skew));
    }

    #[test]
    fn test_non_oauth_never_needs_refresh() {
        let now = Utc::now();
        let mut s = session(now);
        s.is_oauth = false;
        assert!(!s.needs_refresh_at(now + Duration::days(1), Duration::minutes(5)));
    }

    #[test]
    fn test_oauth_session_without_access_token_is_invalid() {
        let now = Utc::now();
        let mut s = session(now);
        assert!(s.validate().is_ok());
        s.access_token.clear();
        assert_eq!(s.validate(), Err(AuthError::InvalidSession));
    }

    #[test]
    fn test_holds_provider_token() {
        let s = session(Utc::now());
        assert!(s.holds_provider_token("ya29.access"));
        assert!(s.holds_provider_token("1//refresh"));
        assert!(!s.holds_provider_token(""));
        assert!(!s.holds_provider_token("other"));
    }

    #[test]
    fn test_debug_redacts_tokens() {
        let rendered = format!("{:?}", session(Utc::now()));
        assert!(!rendered.contains("ya29"));
        assert!(!rendered.contains("1//refresh"));
    }

    #[test]
    fn test_state_lifetime_check() {
        let now = Utc::now();
        let mut record = OAuthStateRecord {
            state_token: "s".into(),
            pkce_verifier: "v".into(),
            redirect_uri: "https://app.example.com/cb".into(),
            intent: OAuthIntent::SignIn,
            remember_me: false,
            created_at: now,
            expires_at: now + Duration::minutes(5),
        };
        assert!(record.has_valid_lifetime());
        record.expires_at = now + Duration::minutes(30);
        assert!(!record.has_valid_lifetime());
    }
}
