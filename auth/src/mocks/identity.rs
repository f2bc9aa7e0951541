//! Mock identity provider for testing.

use crate::clock::Clock;
use crate::error::{AuthError, Result};
use crate::providers::{IdentityClaims, IdentityProvider, ProviderTokens, RefreshedAccessToken};
use chrono::Duration;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// A recorded `exchange_code` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeCall {
    /// Authorization code.
    pub code: String,
    /// PKCE verifier sent along.
    pub pkce_verifier: String,
}

#[derive(Debug)]
struct Inner {
    identities: HashMap<String, IdentityClaims>,
    exchange_fails: bool,
    refresh_fails: bool,
    revoke_fails: bool,
    delay: Option<std::time::Duration>,
    token_lifetime: Duration,
    issued: u64,
    exchange_calls: Vec<ExchangeCall>,
    refresh_calls: Vec<String>,
    revoked: Vec<String>,
}

/// Mock identity provider.
///
/// Clones share state, so a test can keep a handle after moving one into the
/// service and reconfigure or inspect it mid-test.
///
/// Codes map to identities via [`MockIdentityProvider::with_identity`]; an
/// unknown code behaves like a code the provider rejects.
#[derive(Clone)]
pub struct MockIdentityProvider {
    inner: Arc<Mutex<Inner>>,
    clock: Arc<dyn Clock>,
}

impl MockIdentityProvider {
    /// Create a provider issuing one-hour access tokens relative to `clock`.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                identities: HashMap::new(),
                exchange_fails: false,
                refresh_fails: false,
                revoke_fails: false,
                delay: None,
                token_lifetime: Duration::hours(1),
                issued: 0,
                exchange_calls: Vec::new(),
                refresh_calls: Vec::new(),
                revoked: Vec::new(),
            })),
            clock,
        }
    }

    /// Verified claims for tests.
    #[must_use]
    pub fn verified(subject: &str, email: &str) -> IdentityClaims {
        IdentityClaims {
            subject: subject.to_string(),
            email: email.to_string(),
            email_verified: true,
            name: None,
        }
    }

    /// Map an authorization code to an identity.
    #[must_use]
    pub fn with_identity(self, code: &str, claims: IdentityClaims) -> Self {
        self.lock().identities.insert(code.to_string(), claims);
        self
    }

    /// Set access token lifetime.
    #[must_use]
    pub fn with_token_lifetime(self, lifetime: Duration) -> Self {
        self.lock().token_lifetime = lifetime;
        self
    }

    /// Make every exchange fail.
    pub fn set_exchange_fails(&self, fails: bool) {
        self.lock().exchange_fails = fails;
    }

    /// Make every refresh fail.
    pub fn set_refresh_fails(&self, fails: bool) {
        self.lock().refresh_fails = fails;
    }

    /// Make every revocation fail.
    pub fn set_revoke_fails(&self, fails: bool) {
        self.lock().revoke_fails = fails;
    }

    /// Sleep this long inside every network method.
    pub fn set_delay(&self, delay: Option<std::time::Duration>) {
        self.lock().delay = delay;
    }

    /// Recorded exchanges.
    #[must_use]
    pub fn exchange_calls(&self) -> Vec<ExchangeCall> {
        self.lock().exchange_calls.clone()
    }

    /// Refresh tokens presented for refresh.
    #[must_use]
    pub fn refresh_calls(&self) -> Vec<String> {
        self.lock().refresh_calls.clone()
    }

    /// Tokens revoked.
    #[must_use]
    pub fn revoked_tokens(&self) -> Vec<String> {
        self.lock().revoked.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn pause(&self) {
        let delay = self.lock().delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

impl std::fmt::Debug for MockIdentityProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockIdentityProvider").finish_non_exhaustive()
    }
}

impl IdentityProvider for MockIdentityProvider {
    fn authorization_url(&self, state: &str, pkce_challenge: &str) -> Result<String> {
        let query = serde_urlencoded::to_string([
            ("state", state),
            ("code_challenge", pkce_challenge),
            ("code_challenge_method", "S256"),
        ])
        .map_err(|e| AuthError::Internal(e.to_string()))?;
        Ok(format!("https://idp.test/authorize?{query}"))
    }

    async fn exchange_code(&self, code: &str, pkce_verifier: &str) -> Result<ProviderTokens> {
        self.pause().await;

        let now = self.clock.now();
        let mut inner = self.lock();
        inner.exchange_calls.push(ExchangeCall {
            code: code.to_string(),
            pkce_verifier: pkce_verifier.to_string(),
        });

        if inner.exchange_fails {
            return Err(AuthError::TokenExchangeFailed("mock exchange failure".into()));
        }
        let claims = inner
            .identities
            .get(code)
            .cloned()
            .ok_or_else(|| AuthError::TokenExchangeFailed("unknown code".into()))?;

        inner.issued += 1;
        let n = inner.issued;
        Ok(ProviderTokens {
            access_token: format!("mock-access-{n}"),
            refresh_token: Some(format!("mock-refresh-{n}")),
            expires_at: now + inner.token_lifetime,
            claims,
        })
    }

    async fn refresh_access_token(&self, refresh_token: &str) -> Result<RefreshedAccessToken> {
        self.pause().await;

        let now = self.clock.now();
        let mut inner = self.lock();
        inner.refresh_calls.push(refresh_token.to_string());

        if inner.refresh_fails {
            return Err(AuthError::RefreshFailed("mock refresh failure".into()));
        }

        inner.issued += 1;
        let n = inner.issued;
        Ok(RefreshedAccessToken {
            access_token: format!("mock-access-{n}"),
            refresh_token: None,
            expires_at: now + inner.token_lifetime,
        })
    }

    async fn revoke_token(&self, token: &str) -> Result<()> {
        self.pause().await;

        let mut inner = self.lock();
        if inner.revoke_fails {
            return Err(AuthError::Internal("mock revocation failure".into()));
        }
        inner.revoked.push(token.to_string());
        Ok(())
    }
}
