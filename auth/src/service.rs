//! Authentication service.
//!
//! Orchestrates the OAuth handshake, session validation, refresh, logout and
//! provider-initiated revocation on top of the collaborator traits.
//!
//! # Session lifecycle
//!
//! ```text
//! NONE ──start_oauth──▶ PENDING (state record)
//!                          │ handle_callback
//!                          ▼
//!                       ACTIVE ◀──refresh_session── REFRESH_NEEDED
//!                          │
//!              ┌───────────┼──────────────┐
//!              ▼           ▼              ▼
//!           EXPIRED     logged out     REVOKED (webhook)
//! ```
//!
//! `REFRESH_NEEDED` is not stored anywhere: [`ValidatedSession::needs_refresh`]
//! reports it and the caller decides whether to act.
//!
//! # Provider calls
//!
//! Every call to the identity provider runs under the configured deadline. A
//! timed-out exchange is a failed exchange; a failed refresh leaves the
//! session valid until its own expiry; a failed revocation is only logged.

use crate::clock::Clock;
use crate::config::{AuthConfig, SessionConfig};
use crate::error::{AuthError, Result};
use crate::oauth_state::OAuthStateStore;
use crate::providers::{AccountRepository, IdentityProvider, SessionStore, StateRepository};
use crate::rate_limiter::TokenBucketLimiter;
use crate::state::{
    Account, AuthenticationSession, ClientMetadata, NewOAuthAccount, OAuthIntent, SessionId,
    SessionSummary, UserId,
};
use crate::token::TokenService;
use chrono::{DateTime, Utc};
use constant_time_eq::constant_time_eq;
use std::future::Future;
use std::sync::Arc;

/// Attempts at creating a session before giving up on id collisions.
const SESSION_CREATE_ATTEMPTS: usize = 3;

// ═══════════════════════════════════════════════════════════════════════
// Inputs and outcomes
// ═══════════════════════════════════════════════════════════════════════

/// Result of starting an OAuth flow.
#[derive(Clone)]
pub struct OAuthStart {
    /// Where to send the browser.
    pub authorization_url: String,
    /// State token, to be mirrored in the `oauth_state` cookie.
    pub state_token: String,
    /// When the state record expires.
    pub state_expires_at: DateTime<Utc>,
}

impl std::fmt::Debug for OAuthStart {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthStart")
            .field("state_token", &"<redacted>")
            .field("state_expires_at", &self.state_expires_at)
            .finish_non_exhaustive()
    }
}

/// Query parameters and cookie presented at the OAuth callback.
#[derive(Clone, Default)]
pub struct CallbackParams {
    /// Authorization code.
    pub code: Option<String>,
    /// State token from the query string.
    pub state: Option<String>,
    /// Provider error (e.g. `access_denied`).
    pub error: Option<String>,
    /// State token from the `oauth_state` cookie.
    ///
    /// `None` skips the cookie comparison. Browser-facing callers pass
    /// `Some`, with an empty string when the cookie is missing.
    pub cookie_state: Option<String>,
}

impl std::fmt::Debug for CallbackParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackParams")
            .field("has_code", &self.code.is_some())
            .field("has_state", &self.state.is_some())
            .field("error", &self.error)
            .field("has_cookie_state", &self.cookie_state.is_some())
            .finish()
    }
}

/// A freshly created session.
#[derive(Clone, PartialEq, Eq)]
pub struct EstablishedSession {
    /// Session id.
    pub session_id: SessionId,
    /// Owner.
    pub user_id: UserId,
    /// Signed token for the `session_token` cookie.
    pub session_token: String,
    /// Absolute session expiry.
    pub expires_at: DateTime<Utc>,
    /// Allow-listed post-login redirect.
    pub redirect_uri: String,
    /// The callback created the account.
    pub is_new_account: bool,
}

impl std::fmt::Debug for EstablishedSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EstablishedSession")
            .field("session_id", &self.session_id)
            .field("user_id", &self.user_id)
            .field("session_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .field("redirect_uri", &self.redirect_uri)
            .field("is_new_account", &self.is_new_account)
            .finish()
    }
}

/// Outcome of a successful callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackOutcome {
    /// A session was created.
    Authenticated(EstablishedSession),
    /// Sign-up for an identity that already has an account. The user should
    /// log in instead; no session was created.
    AccountExists {
        /// Allow-listed redirect from the state record.
        redirect_uri: String,
    },
}

/// A session that passed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidatedSession {
    /// Session id.
    pub session_id: SessionId,
    /// Owner.
    pub user_id: UserId,
    /// Created through OAuth.
    pub is_oauth: bool,
    /// Absolute session expiry.
    pub session_expires_at: DateTime<Utc>,
    /// Provider access-token expiry.
    pub token_expires_at: Option<DateTime<Utc>>,
    /// The provider access token is within the refresh skew of expiring.
    pub needs_refresh: bool,
}

/// Result of a successful refresh.
#[derive(Clone, PartialEq, Eq)]
pub struct RefreshedSession {
    /// Re-issued session token.
    pub session_token: String,
    /// New provider access-token expiry.
    pub token_expires_at: DateTime<Utc>,
    /// Unchanged absolute session expiry.
    pub session_expires_at: DateTime<Utc>,
}

impl std::fmt::Debug for RefreshedSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshedSession")
            .field("session_token", &"<redacted>")
            .field("token_expires_at", &self.token_expires_at)
            .field("session_expires_at", &self.session_expires_at)
            .finish()
    }
}

/// What a revocation webhook did. Never reported to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevocationOutcome {
    /// The token belonged to this session, which is now deleted.
    Revoked(SessionId),
    /// No session holds the token.
    Unknown,
}

/// Counts from one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Expired OAuth states removed.
    pub states: usize,
    /// Expired sessions removed.
    pub sessions: usize,
    /// Idle rate-limit buckets evicted.
    pub rate_limit_keys: usize,
}

// ═══════════════════════════════════════════════════════════════════════
// Service
// ═══════════════════════════════════════════════════════════════════════

/// Authentication service.
///
/// Session truth lives in the stores; the only in-process state is the
/// rate limiter. Share it behind an `Arc`.
pub struct AuthenticationService<R, S, A, P> {
    states: OAuthStateStore<R>,
    sessions: S,
    accounts: A,
    provider: P,
    tokens: TokenService,
    rate_limiter: TokenBucketLimiter,
    config: SessionConfig,
    clock: Arc<dyn Clock>,
}

impl<R, S, A, P> AuthenticationService<R, S, A, P>
where
    R: StateRepository,
    S: SessionStore,
    A: AccountRepository,
    P: IdentityProvider,
{
    /// Wire the service.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Configuration`] if any part of `config` is invalid.
    pub fn new(
        config: &AuthConfig,
        state_repository: R,
        sessions: S,
        accounts: A,
        provider: P,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.session.validate()?;

        Ok(Self {
            states: OAuthStateStore::new(state_repository, config.oauth.clone(), clock.clone())?,
            sessions,
            accounts,
            provider,
            tokens: TokenService::new(&config.token, clock.clone())?,
            rate_limiter: TokenBucketLimiter::new(&config.rate_limit, clock.clone())?,
            config: config.session.clone(),
            clock,
        })
    }

    /// OAuth state store.
    pub const fn states(&self) -> &OAuthStateStore<R> {
        &self.states
    }

    /// Session store.
    pub const fn sessions(&self) -> &S {
        &self.sessions
    }

    /// Account repository.
    pub const fn accounts(&self) -> &A {
        &self.accounts
    }

    /// Token service.
    pub const fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    /// Session policy.
    pub const fn session_config(&self) -> &SessionConfig {
        &self.config
    }

    /// Current time on the service clock.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    // ───────────────────────────────────────────────────────────────────
    // OAuth
    // ───────────────────────────────────────────────────────────────────

    /// Start an OAuth flow.
    ///
    /// # Arguments
    ///
    /// - `client_key`: rate-limit key (client IP)
    /// - `redirect_uri`: post-login target, defaults to the configured default
    /// - `intent`: sign-in or sign-up
    /// - `remember_me`: request the extended session lifetime
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Rate limit exceeded → [`AuthError::TooManyAttempts`]
    /// - Redirect not allow-listed → [`AuthError::InvalidRedirectUri`]
    /// - Storage fails
    pub async fn start_oauth(
        &self,
        client_key: &str,
        redirect_uri: Option<&str>,
        intent: OAuthIntent,
        remember_me: bool,
    ) -> Result<OAuthStart> {
        self.rate_limiter.check(client_key)?;

        let issued = self.states.issue(redirect_uri, intent, remember_me).await?;
        let authorization_url = self
            .provider
            .authorization_url(&issued.state_token, &issued.pkce_challenge)?;

        Ok(OAuthStart {
            authorization_url,
            state_token: issued.state_token,
            state_expires_at: issued.expires_at,
        })
    }

    /// Complete an OAuth flow.
    ///
    /// The state record is consumed before anything else is checked, so a
    /// failed callback still burns its state.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Provider reported an error → [`AuthError::ProviderDenied`]
    /// - `state` missing, or `code` missing after the state was burned →
    ///   [`AuthError::MalformedRequest`]
    /// - State unknown, consumed or expired → [`AuthError::StateNotFound`] /
    ///   [`AuthError::StateExpired`]
    /// - Cookie does not mirror the state → [`AuthError::StateMismatch`]
    /// - Exchange fails or times out → [`AuthError::TokenExchangeFailed`]
    /// - Email not verified → [`AuthError::EmailNotVerified`]
    /// - Storage fails
    pub async fn handle_callback(
        &self,
        params: CallbackParams,
        client: ClientMetadata,
    ) -> Result<CallbackOutcome> {
        let state = params.state.unwrap_or_default();

        if let Some(error) = params.error {
            if !state.is_empty() {
                // Cleanup only; the outcome does not matter.
                if let Err(e) = self.states.consume(&state).await {
                    tracing::warn!(error = %e, "Failed to discard state after provider error");
                }
            }
            tracing::info!(provider_error = %error, "OAuth flow denied at provider");
            return Err(AuthError::ProviderDenied(error));
        }

        if state.is_empty() {
            tracing::info!("OAuth callback without state");
            return Err(AuthError::MalformedRequest("missing state".into()));
        }

        let record = self.states.consume_and_validate(&state).await?;

        if let Some(cookie_state) = params.cookie_state {
            if !constant_time_eq(cookie_state.as_bytes(), state.as_bytes()) {
                tracing::warn!("OAuth state cookie does not match callback state");
                return Err(AuthError::StateMismatch);
            }
        }

        let code = params
            .code
            .filter(|c| !c.is_empty())
            .ok_or_else(|| AuthError::MalformedRequest("missing authorization code".into()))?;

        let tokens = self
            .with_deadline(
                self.provider.exchange_code(&code, &record.pkce_verifier),
                || AuthError::TokenExchangeFailed("provider timed out".into()),
            )
            .await
            .inspect_err(|e| tracing::warn!(error = %e, "Authorization code exchange failed"))?;

        if !tokens.claims.email_verified {
            tracing::warn!("Rejected OAuth identity with unverified email");
            return Err(AuthError::EmailNotVerified);
        }

        let Some((account, is_new_account)) =
            self.resolve_account(record.intent, &tokens.claims).await?
        else {
            return Ok(CallbackOutcome::AccountExists {
                redirect_uri: record.redirect_uri,
            });
        };

        let extended = record.remember_me || (is_new_account && record.intent == OAuthIntent::SignUp);
        let lifetime = if extended {
            self.config.extended_session_lifetime
        } else {
            self.config.session_lifetime
        };

        let now = self.clock.now();
        let template = AuthenticationSession {
            session_id: SessionId::new(),
            user_id: account.user_id,
            session_token: String::new(),
            is_oauth: true,
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            token_expires_at: Some(tokens.expires_at),
            session_expires_at: now + lifetime,
            created_at: now,
            last_activity_at: now,
            user_agent: client.user_agent,
            ip_address: client.ip_address,
        };
        let session = self.create_session(template).await?;

        tracing::info!(
            session_id = %session.session_id.0,
            user_id = %session.user_id.0,
            is_new_account,
            extended,
            "OAuth sign-in complete"
        );

        Ok(CallbackOutcome::Authenticated(EstablishedSession {
            session_id: session.session_id,
            user_id: session.user_id,
            session_token: session.session_token,
            expires_at: session.session_expires_at,
            redirect_uri: record.redirect_uri,
            is_new_account,
        }))
    }

    /// Find or create the account for verified claims.
    ///
    /// `None` means "send the user to login": a sign-up for an identity that
    /// is already linked, including one linked by a concurrent sign-up that
    /// won the unique constraint.
    async fn resolve_account(
        &self,
        intent: OAuthIntent,
        claims: &crate::providers::IdentityClaims,
    ) -> Result<Option<(Account, bool)>> {
        if let Some(existing) = self.accounts.find_by_provider_subject(&claims.subject).await? {
            return Ok(match intent {
                OAuthIntent::SignIn => Some((existing, false)),
                OAuthIntent::SignUp => {
                    tracing::info!(user_id = %existing.user_id.0, "Sign-up for existing account");
                    None
                }
            });
        }

        let new_account = NewOAuthAccount {
            provider_subject: claims.subject.clone(),
            email: claims.email.clone(),
            name: claims.name.clone(),
            created_at: self.clock.now(),
        };

        match self.accounts.create_oauth_account(&new_account).await {
            Ok(created) => Ok(Some((created, true))),
            Err(AuthError::AccountAlreadyExists) => match intent {
                OAuthIntent::SignUp => {
                    tracing::info!("Concurrent sign-up lost account creation race");
                    Ok(None)
                }
                OAuthIntent::SignIn => self
                    .accounts
                    .find_by_provider_subject(&claims.subject)
                    .await?
                    .map(|account| Some((account, false)))
                    .ok_or_else(|| {
                        AuthError::Storage("account vanished after unique violation".into())
                    }),
            },
            Err(e) => Err(e),
        }
    }

    /// Sign a token for `template` and insert it, regenerating the id on collision.
    async fn create_session(
        &self,
        mut template: AuthenticationSession,
    ) -> Result<AuthenticationSession> {
        for attempt in 1..=SESSION_CREATE_ATTEMPTS {
            template.session_token = self.tokens.issue(
                template.session_id,
                template.user_id,
                template.is_oauth,
                template.session_expires_at,
            )?;
            template.validate()?;

            match self.sessions.create(&template).await {
                Ok(()) => return Ok(template),
                Err(AuthError::DuplicateSession) => {
                    tracing::warn!(attempt, "Session id collision, regenerating");
                    template.session_id = SessionId::new();
                }
                Err(e) => return Err(e),
            }
        }
        Err(AuthError::Internal("could not allocate a unique session id".into()))
    }

    // ───────────────────────────────────────────────────────────────────
    // Sessions
    // ───────────────────────────────────────────────────────────────────

    /// Validate a session token.
    ///
    /// An expired session is deleted on sight. The activity touch is
    /// best-effort.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Token malformed or forged → [`AuthError::InvalidToken`]
    /// - Token expired → [`AuthError::TokenExpired`]
    /// - Session gone → [`AuthError::SessionNotFound`]
    /// - Session expired → [`AuthError::SessionExpired`]
    /// - Storage fails
    pub async fn validate_session(&self, session_token: &str) -> Result<ValidatedSession> {
        let verified = self.tokens.verify(session_token)?;
        let session = self.sessions.find_by_id(verified.session_id).await?;

        if session.user_id != verified.user_id || session.is_oauth != verified.is_oauth {
            tracing::error!(
                session_id = %session.session_id.0,
                "Session token claims disagree with the stored session"
            );
            return Err(AuthError::InvalidToken);
        }

        let now = self.clock.now();
        if session.is_expired_at(now) {
            self.sessions.delete(session.session_id).await?;
            tracing::info!(session_id = %session.session_id.0, "Deleted expired session");
            return Err(AuthError::SessionExpired);
        }

        if let Err(e) = self.sessions.update_activity(session.session_id, now).await {
            tracing::warn!(
                session_id = %session.session_id.0,
                error = %e,
                "Failed to record session activity"
            );
        }

        Ok(ValidatedSession {
            session_id: session.session_id,
            user_id: session.user_id,
            is_oauth: session.is_oauth,
            session_expires_at: session.session_expires_at,
            token_expires_at: session.token_expires_at,
            needs_refresh: session.needs_refresh_at(now, self.config.refresh_skew),
        })
    }

    /// Refresh the provider access token of an OAuth session and re-issue
    /// the session token. The session expiry does not move.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Session gone → [`AuthError::SessionNotFound`]
    /// - Session expired → [`AuthError::SessionExpired`]
    /// - Not an OAuth session → [`AuthError::RefreshNotApplicable`]
    /// - No refresh token, or the provider fails → [`AuthError::RefreshFailed`];
    ///   the session stays valid
    /// - Storage fails
    pub async fn refresh_session(&self, session_id: SessionId) -> Result<RefreshedSession> {
        let session = self.sessions.find_by_id(session_id).await?;

        let now = self.clock.now();
        if session.is_expired_at(now) {
            self.sessions.delete(session_id).await?;
            return Err(AuthError::SessionExpired);
        }
        if !session.is_oauth {
            return Err(AuthError::RefreshNotApplicable);
        }
        let refresh_token = session
            .refresh_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AuthError::RefreshFailed("session has no refresh token".into()))?;

        let refreshed = self
            .with_deadline(self.provider.refresh_access_token(refresh_token), || {
                AuthError::RefreshFailed("provider timed out".into())
            })
            .await
            .inspect_err(|e| {
                tracing::warn!(
                    session_id = %session_id.0,
                    error = %e,
                    "Provider refresh failed; session remains valid"
                );
            })?;

        let session_token = self.tokens.issue(
            session.session_id,
            session.user_id,
            session.is_oauth,
            session.session_expires_at,
        )?;

        let updated = self
            .sessions
            .extend_and_rotate(
                session_id,
                &refreshed.access_token,
                refreshed.refresh_token.as_deref(),
                refreshed.expires_at,
                &session_token,
                self.clock.now(),
            )
            .await?;

        tracing::info!(
            session_id = %session_id.0,
            token_expires_at = %refreshed.expires_at,
            "Refreshed session"
        );

        Ok(RefreshedSession {
            session_token,
            token_expires_at: refreshed.expires_at,
            session_expires_at: updated.session_expires_at,
        })
    }

    /// End a session. Idempotent.
    ///
    /// The provider grant is revoked afterwards, best-effort.
    ///
    /// # Errors
    ///
    /// Returns error only if storage fails.
    pub async fn logout(&self, session_id: SessionId) -> Result<()> {
        let session = match self.sessions.find_by_id(session_id).await {
            Ok(session) => Some(session),
            Err(AuthError::SessionNotFound) => None,
            Err(e) => return Err(e),
        };

        self.sessions.delete(session_id).await?;
        tracing::info!(session_id = %session_id.0, existed = session.is_some(), "Logged out");

        if let Some(session) = session {
            self.revoke_best_effort(&session).await;
        }
        Ok(())
    }

    /// End every session of a user.
    ///
    /// # Returns
    ///
    /// Number of sessions deleted.
    ///
    /// # Errors
    ///
    /// Returns error only if storage fails.
    pub async fn logout_everywhere(&self, user_id: UserId) -> Result<usize> {
        let sessions = self.sessions.find_by_user_id(user_id).await?;
        let deleted = self.sessions.delete_by_user_id(user_id).await?;
        tracing::info!(user_id = %user_id.0, deleted, "Logged out everywhere");

        for session in &sessions {
            self.revoke_best_effort(session).await;
        }
        Ok(deleted)
    }

    /// Live sessions of a user, oldest first.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    pub async fn list_sessions(&self, user_id: UserId) -> Result<Vec<SessionSummary>> {
        let now = self.clock.now();
        Ok(self
            .sessions
            .find_by_user_id(user_id)
            .await?
            .iter()
            .filter(|s| !s.is_expired_at(now))
            .map(SessionSummary::from)
            .collect())
    }

    /// Handle a provider-initiated revocation.
    ///
    /// Never fails from the caller's point of view; the outcome is for logs
    /// and tests only.
    pub async fn handle_revocation_webhook(&self, token: &str) -> RevocationOutcome {
        let session = match self.sessions.find_by_provider_token(token).await {
            Ok(session) => session,
            Err(AuthError::SessionNotFound) => {
                tracing::debug!("Revocation for unknown token");
                return RevocationOutcome::Unknown;
            }
            Err(e) => {
                tracing::error!(error = %e, "Revocation lookup failed");
                return RevocationOutcome::Unknown;
            }
        };

        if let Err(e) = self.sessions.delete(session.session_id).await {
            tracing::error!(
                session_id = %session.session_id.0,
                error = %e,
                "Failed to delete revoked session"
            );
            return RevocationOutcome::Unknown;
        }

        tracing::info!(
            session_id = %session.session_id.0,
            user_id = %session.user_id.0,
            "Session revoked by provider"
        );
        RevocationOutcome::Revoked(session.session_id)
    }

    /// Remove expired state records and sessions, and evict idle rate-limit
    /// buckets.
    ///
    /// # Errors
    ///
    /// Returns the first storage error; later steps still run.
    pub async fn sweep_expired(&self) -> Result<SweepReport> {
        let states = self.states.sweep_expired().await;
        let sessions = self.sessions.delete_expired(self.clock.now()).await;
        let rate_limit_keys = self.rate_limiter.evict_idle();

        let report = SweepReport {
            states: states.as_ref().copied().unwrap_or(0),
            sessions: sessions.as_ref().copied().unwrap_or(0),
            rate_limit_keys,
        };
        tracing::debug!(
            states = report.states,
            sessions = report.sessions,
            rate_limit_keys = report.rate_limit_keys,
            "Sweep complete"
        );

        states?;
        sessions?;
        Ok(report)
    }

    // ───────────────────────────────────────────────────────────────────
    // Helpers
    // ───────────────────────────────────────────────────────────────────

    async fn with_deadline<T>(
        &self,
        call: impl Future<Output = Result<T>>,
        on_timeout: impl FnOnce() -> AuthError,
    ) -> Result<T> {
        tokio::time::timeout(self.config.provider_timeout, call)
            .await
            .map_err(|_| on_timeout())?
    }

    /// Revoke the grant behind a deleted session. The refresh token revokes
    /// the whole grant, so it is preferred.
    async fn revoke_best_effort(&self, session: &AuthenticationSession) {
        if !session.is_oauth {
            return;
        }
        let token = session
            .refresh_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .unwrap_or(session.access_token.as_str());
        if token.is_empty() {
            return;
        }

        let result = self
            .with_deadline(self.provider.revoke_token(token), || {
                AuthError::Internal("provider timed out".into())
            })
            .await;
        if let Err(e) = result {
            tracing::warn!(
                session_id = %session.session_id.0,
                error = %e,
                "Provider token revocation failed"
            );
        }
    }
}

impl<R, S, A, P> std::fmt::Debug for AuthenticationService<R, S, A, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthenticationService")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
