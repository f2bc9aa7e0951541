//! Signed session tokens.
//!
//! A session token is a compact HS256 JWT naming the session, its owner and
//! whether it came from OAuth. Verification is pure CPU work with no store
//! access; whether the session still exists is checked afterwards against the
//! session store.
//!
//! Expiry is checked here against the injected [`Clock`], not by
//! `jsonwebtoken`'s own wall-clock check.

use crate::clock::Clock;
use crate::config::TokenConfig;
use crate::error::{AuthError, Result};
use crate::oauth_state::random_token;
use crate::state::{SessionId, UserId};
use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// JWT claims carried by a session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct SessionClaims {
    /// Session id.
    sid: Uuid,
    /// User id.
    sub: Uuid,
    /// Created through OAuth.
    oauth: bool,
    /// Issuer.
    iss: String,
    /// Issued at (seconds).
    iat: i64,
    /// Expiry (seconds, rounded up from the session's expiry).
    exp: i64,
    /// Per-token nonce so a re-issued token never equals its predecessor.
    jti: String,
}

/// Claims recovered from a verified token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerifiedToken {
    /// Session id.
    pub session_id: SessionId,
    /// User id.
    pub user_id: UserId,
    /// Created through OAuth.
    pub is_oauth: bool,
    /// Expiry claim.
    pub expires_at: DateTime<Utc>,
}

/// Issues and verifies session tokens.
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    issuer: String,
    clock: Arc<dyn Clock>,
}

impl TokenService {
    /// Create a token service.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Configuration`] if the signing key is too short.
    pub fn new(config: &TokenConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate()?;

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.set_issuer(&[config.issuer.as_str()]);

        Ok(Self {
            encoding_key: EncodingKey::from_secret(&config.signing_key),
            decoding_key: DecodingKey::from_secret(&config.signing_key),
            validation,
            issuer: config.issuer.clone(),
            clock,
        })
    }

    /// Issue a token for a session.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Internal`] if encoding fails.
    pub fn issue(
        &self,
        session_id: SessionId,
        user_id: UserId,
        is_oauth: bool,
        expires_at: DateTime<Utc>,
    ) -> Result<String> {
        let mut exp = expires_at.timestamp();
        if expires_at.timestamp_subsec_nanos() > 0 {
            exp += 1;
        }

        let claims = SessionClaims {
            sid: session_id.0,
            sub: user_id.0,
            oauth: is_oauth,
            iss: self.issuer.clone(),
            iat: self.clock.now().timestamp(),
            exp,
            jti: random_token(12),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::Internal(format!("Failed to sign session token: {e}")))
    }

    /// Verify a token.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Bad signature, wrong issuer or malformed payload → [`AuthError::InvalidToken`]
    /// - `now` is past the expiry claim → [`AuthError::TokenExpired`]
    pub fn verify(&self, token: &str) -> Result<VerifiedToken> {
        let data = decode::<SessionClaims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| {
                tracing::debug!(error_kind = ?e.kind(), "Session token rejected");
                AuthError::InvalidToken
            })?;
        let claims = data.claims;

        let expires_at =
            DateTime::from_timestamp(claims.exp, 0).ok_or(AuthError::InvalidToken)?;
        if self.clock.now() > expires_at {
            return Err(AuthError::TokenExpired);
        }

        Ok(VerifiedToken {
            session_id: SessionId(claims.sid),
            user_id: UserId(claims.sub),
            is_oauth: claims.oauth,
            expires_at,
        })
    }
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("issuer", &self.issuer)
            .field("keys", &"<redacted>")
            .finish_non_exhaustive()
    }
}
