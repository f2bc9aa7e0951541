//! OAuth state + PKCE handshake.
//!
//! [`OAuthStateStore`] issues a CSRF state token and PKCE verifier bound to an
//! allow-listed redirect URI, and consumes them exactly once at callback.
//!
//! # Security
//!
//! - **Single-use**: consumption is an atomic take on the repository; two
//!   racing callbacks with the same token cannot both succeed
//! - **No oracle**: "never issued" and "already consumed" are the same outcome
//! - **Open-redirect safe**: redirect targets must match an allow-listed
//!   origin and path prefix ending on a segment boundary
//! - **Verifier stays server-side**: only the S256 challenge reaches the browser

use crate::clock::Clock;
use crate::config::OAuthStateConfig;
use crate::error::{AuthError, Result};
use crate::providers::StateRepository;
use crate::state::{OAuthIntent, OAuthStateRecord};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use constant_time_eq::constant_time_eq;
use oauth2::{PkceCodeChallenge, PkceCodeVerifier};
use rand::RngCore;
use std::sync::Arc;
use url::Url;

/// Bytes of entropy in a state token (43 base64 chars).
const STATE_TOKEN_BYTES: usize = 32;

/// Generate a URL-safe random token from the OS CSPRNG.
pub(crate) fn random_token(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    rand::rngs::OsRng.fill_bytes(&mut buf);
    URL_SAFE_NO_PAD.encode(buf)
}

/// S256 PKCE challenge for a verifier.
#[must_use]
pub fn pkce_challenge_for(verifier: &str) -> String {
    let verifier = PkceCodeVerifier::new(verifier.to_string());
    PkceCodeChallenge::from_code_verifier_sha256(&verifier)
        .as_str()
        .to_string()
}

/// Result of [`OAuthStateStore::issue`].
#[derive(Clone)]
pub struct IssuedState {
    /// State token for the authorization URL and the `oauth_state` cookie.
    pub state_token: String,
    /// PKCE verifier. Server-side only.
    pub pkce_verifier: String,
    /// S256 challenge for the authorization URL.
    pub pkce_challenge: String,
    /// Validated redirect target.
    pub redirect_uri: String,
    /// When the state stops being accepted.
    pub expires_at: DateTime<Utc>,
}

impl std::fmt::Debug for IssuedState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssuedState")
            .field("state_token", &"<redacted>")
            .field("pkce_verifier", &"<redacted>")
            .field("pkce_challenge", &self.pkce_challenge)
            .field("redirect_uri", &self.redirect_uri)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Outcome of consuming a state token.
///
/// Not-found and expired are expected on the callback path, so they are
/// values rather than errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsumeOutcome {
    /// First and only successful consumption.
    Consumed(OAuthStateRecord),
    /// Never issued, or already consumed.
    NotFound,
    /// Existed but past its TTL. It has been deleted.
    Expired,
}

impl ConsumeOutcome {
    /// Map to the error contract: `StateNotFound` / `StateExpired`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::StateNotFound`] or [`AuthError::StateExpired`].
    pub fn into_result(self) -> Result<OAuthStateRecord> {
        match self {
            Self::Consumed(record) => Ok(record),
            Self::NotFound => Err(AuthError::StateNotFound),
            Self::Expired => Err(AuthError::StateExpired),
        }
    }
}

/// Issues and consumes OAuth state records.
pub struct OAuthStateStore<R> {
    repository: R,
    config: OAuthStateConfig,
    allowed: Vec<Url>,
    clock: Arc<dyn Clock>,
}

impl<R: StateRepository> OAuthStateStore<R> {
    /// Create a state store.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Configuration`] if the configuration is invalid
    /// or an allow-listed URI does not parse.
    pub fn new(repository: R, config: OAuthStateConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate()?;

        let allowed = config
            .allowed_redirect_uris
            .iter()
            .map(|uri| {
                Url::parse(uri).map_err(|e| {
                    AuthError::Configuration(format!("allow-listed redirect {uri:?}: {e}"))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            repository,
            config,
            allowed,
            clock,
        })
    }

    /// Access the underlying repository.
    pub const fn repository(&self) -> &R {
        &self.repository
    }

    /// Check a redirect target against the allow-list.
    ///
    /// Returns the normalized URI.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidRedirectUri`] if the URI does not parse,
    /// carries credentials, or matches no allow-listed prefix.
    pub fn validate_redirect_uri(&self, redirect_uri: &str) -> Result<String> {
        let candidate = Url::parse(redirect_uri).map_err(|_| AuthError::InvalidRedirectUri)?;

        if !candidate.username().is_empty() || candidate.password().is_some() {
            return Err(AuthError::InvalidRedirectUri);
        }

        if self.allowed.iter().any(|allowed| is_prefix_match(allowed, &candidate)) {
            Ok(candidate.to_string())
        } else {
            Err(AuthError::InvalidRedirectUri)
        }
    }

    /// Issue a state record.
    ///
    /// `redirect_uri` defaults to the configured default redirect.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Redirect is not allow-listed → [`AuthError::InvalidRedirectUri`]
    /// - Repository fails
    pub async fn issue(
        &self,
        redirect_uri: Option<&str>,
        intent: OAuthIntent,
        remember_me: bool,
    ) -> Result<IssuedState> {
        let redirect_uri = self.validate_redirect_uri(
            redirect_uri.unwrap_or(self.config.default_redirect_uri.as_str()),
        )?;

        let (challenge, verifier) = PkceCodeChallenge::new_random_sha256();
        let now = self.clock.now();
        let record = OAuthStateRecord {
            state_token: random_token(STATE_TOKEN_BYTES),
            pkce_verifier: verifier.secret().clone(),
            redirect_uri,
            intent,
            remember_me,
            created_at: now,
            expires_at: now + self.config.state_ttl,
        };

        self.repository.insert(&record).await?;

        tracing::info!(
            intent = ?intent,
            redirect_uri = %record.redirect_uri,
            ttl_seconds = self.config.state_ttl.num_seconds(),
            "Issued OAuth state"
        );

        Ok(IssuedState {
            state_token: record.state_token,
            pkce_verifier: record.pkce_verifier,
            pkce_challenge: challenge.as_str().to_string(),
            redirect_uri: record.redirect_uri,
            expires_at: record.expires_at,
        })
    }

    /// Atomically consume a state token.
    ///
    /// The record is deleted whatever the outcome.
    ///
    /// # Errors
    ///
    /// Returns error only if the repository fails.
    pub async fn consume(&self, state_token: &str) -> Result<ConsumeOutcome> {
        if state_token.is_empty() {
            return Ok(ConsumeOutcome::NotFound);
        }

        let Some(record) = self.repository.take(state_token).await? else {
            tracing::warn!("OAuth state not found (unknown or already consumed)");
            return Ok(ConsumeOutcome::NotFound);
        };

        if !constant_time_eq(record.state_token.as_bytes(), state_token.as_bytes()) {
            tracing::error!("Repository returned a state record for a different token");
            return Ok(ConsumeOutcome::NotFound);
        }

        let now = self.clock.now();
        if record.is_expired_at(now) || !record.has_valid_lifetime() {
            tracing::info!(
                expires_at = %record.expires_at,
                now = %now,
                "OAuth state expired"
            );
            return Ok(ConsumeOutcome::Expired);
        }

        tracing::info!(intent = ?record.intent, "Consumed OAuth state");
        Ok(ConsumeOutcome::Consumed(record))
    }

    /// Consume a state token, mapping not-found/expired to errors.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::StateNotFound`], [`AuthError::StateExpired`], or
    /// a repository error.
    pub async fn consume_and_validate(&self, state_token: &str) -> Result<OAuthStateRecord> {
        self.consume(state_token).await?.into_result()
    }

    /// Remove expired records.
    ///
    /// # Errors
    ///
    /// Returns error if the repository fails.
    pub async fn sweep_expired(&self) -> Result<usize> {
        let removed = self.repository.delete_expired(self.clock.now()).await?;
        if removed > 0 {
            tracing::debug!(removed, "Swept expired OAuth states");
        }
        Ok(removed)
    }
}

/// Same origin, and the candidate path extends the allowed path at a segment
/// boundary.
fn is_prefix_match(allowed: &Url, candidate: &Url) -> bool {
    if allowed.scheme() != candidate.scheme()
        || allowed.host_str() != candidate.host_str()
        || allowed.port_or_known_default() != candidate.port_or_known_default()
    {
        return false;
    }

    let allowed_path = allowed.path();
    let candidate_path = candidate.path();

    if allowed_path.ends_with('/') {
        return candidate_path.starts_with(allowed_path);
    }

    candidate_path
        .strip_prefix(allowed_path)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}
