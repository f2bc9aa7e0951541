//! # Gatekeeper Authentication
//!
//! OAuth 2.0 + session authentication core: the part of an application that
//! establishes, validates, refreshes and revokes who the user is.
//!
//! ## Features
//!
//! - **OAuth handshake**: single-use state tokens with PKCE (S256), bound to
//!   an allow-listed redirect and mirrored in an `oauth_state` cookie
//! - **Signed sessions**: HMAC-SHA256 session tokens backed by a session
//!   record, with an absolute lifetime that refresh never extends
//! - **Refresh policy**: provider access tokens flagged for refresh a skew
//!   before expiry, refreshed under a deadline, rotated atomically
//! - **Revocation**: logout, logout-everywhere and provider webhooks
//! - **Rate limiting**: per-client token buckets on flow initiation
//! - **Testable**: injected [`Clock`], in-memory stores and mock providers
//!
//! ## Architecture
//!
//! ```text
//! HTTP handlers (feature "axum")
//!         │
//!         ▼
//! AuthenticationService ── TokenService, TokenBucketLimiter, OAuthStateStore
//!         │
//!         ├── StateRepository    memory │ Redis
//!         ├── SessionStore       memory │ Redis
//!         ├── AccountRepository  memory │ PostgreSQL (feature "postgres")
//!         └── IdentityProvider   Google │ mock (feature "test-utils")
//! ```
//!
//! ## Example: OAuth login
//!
//! ```rust,ignore
//! use gatekeeper_auth::*;
//!
//! let service = AuthenticationService::new(
//!     &config,
//!     MemoryStateRepository::new(),
//!     MemorySessionStore::new(),
//!     MemoryAccountRepository::new(),
//!     GoogleIdentityProvider::new(config.google.clone()),
//!     Arc::new(SystemClock),
//! )?;
//!
//! // 1. Send the browser to Google
//! let start = service.start_oauth("203.0.113.7", None, OAuthIntent::SignIn, false).await?;
//!
//! // 2. Google redirects back with ?code&state
//! let outcome = service.handle_callback(params, client).await?;
//!
//! // 3. Later requests present the session token
//! let session = service.validate_session(&token).await?;
//! if session.needs_refresh {
//!     service.refresh_session(session.session_id).await?;
//! }
//! ```

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]

// Public modules
pub mod clock;
pub mod config;
pub mod error;
pub mod oauth_state;
pub mod providers;
pub mod rate_limiter;
pub mod service;
pub mod state;
pub mod stores;
pub mod sweeper;
pub mod token;

// Test utilities (mocks)
#[cfg(any(test, feature = "test-utils"))]
pub mod mocks;

// HTTP layer
#[cfg(feature = "axum")]
pub mod handlers;
#[cfg(feature = "axum")]
pub mod router;

// Re-export main types for convenience
pub use clock::{Clock, SystemClock};
pub use config::{
    AuthConfig, GoogleConfig, OAuthStateConfig, RateLimitConfig, SessionConfig, TokenConfig,
};
pub use error::{AuthError, Result};
pub use oauth_state::{ConsumeOutcome, IssuedState, OAuthStateStore};
pub use providers::{
    AccountRepository, GoogleIdentityProvider, IdentityClaims, IdentityProvider, ProviderTokens,
    RefreshedAccessToken, SessionStore, StateRepository,
};
pub use rate_limiter::TokenBucketLimiter;
pub use service::{
    AuthenticationService, CallbackOutcome, CallbackParams, EstablishedSession, OAuthStart,
    RefreshedSession, RevocationOutcome, SweepReport, ValidatedSession,
};
pub use state::{
    Account, AuthenticationSession, ClientMetadata, NewOAuthAccount, OAuthIntent,
    OAuthStateRecord, SessionId, SessionSummary, UserId,
};
pub use stores::{
    MemoryAccountRepository, MemorySessionStore, MemoryStateRepository, RedisSessionStore,
    RedisStateRepository,
};
pub use sweeper::{DEFAULT_SWEEP_INTERVAL, Sweeper};
pub use token::{TokenService, VerifiedToken};

#[cfg(feature = "axum")]
pub use handlers::context::{SessionContext, require_session};
#[cfg(feature = "axum")]
pub use router::auth_router;
