//! Authentication router composition.
//!
//! Composes all authentication handlers into a single Axum router.

use crate::handlers::{oauth, revocation, session};
use crate::providers::{AccountRepository, IdentityProvider, SessionStore, StateRepository};
use crate::service::AuthenticationService;
use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;

/// Create the authentication router.
///
/// # Routes
///
/// ## OAuth
/// - `GET /auth/google/login` - Start sign-in, redirect to Google
/// - `GET /auth/google/signup` - Start sign-up, redirect to Google
/// - `GET /auth/google/callback` - Complete the flow, set the session cookie
///
/// ## Session
/// - `GET /auth/session/validate` - Check the current session
/// - `POST /auth/session/refresh` - Refresh the provider token
/// - `POST /auth/logout` - End the current session
/// - `POST /auth/logout-all` - End every session of the user
/// - `GET /auth/sessions` - List the user's sessions
///
/// ## Provider
/// - `POST /auth/revoke-webhook` - Provider-initiated revocation
///
/// Paths are absolute; merge the router at the root.
///
/// # Example
///
/// ```rust,ignore
/// let service = Arc::new(AuthenticationService::new(
///     &config, states, sessions, accounts, google, Arc::new(SystemClock),
/// )?);
///
/// let app = Router::new()
///     .merge(auth_router(service))
///     .layer(TraceLayer::new_for_http());
/// ```
pub fn auth_router<R, S, A, P>(service: Arc<AuthenticationService<R, S, A, P>>) -> Router
where
    R: StateRepository + 'static,
    S: SessionStore + 'static,
    A: AccountRepository + 'static,
    P: IdentityProvider + 'static,
{
    Router::new()
        // OAuth routes
        .route("/auth/google/login", get(oauth::google_login::<R, S, A, P>))
        .route("/auth/google/signup", get(oauth::google_signup::<R, S, A, P>))
        .route("/auth/google/callback", get(oauth::google_callback::<R, S, A, P>))
        // Session routes
        .route("/auth/session/validate", get(session::validate::<R, S, A, P>))
        .route("/auth/session/refresh", post(session::refresh::<R, S, A, P>))
        .route("/auth/logout", post(session::logout::<R, S, A, P>))
        .route("/auth/logout-all", post(session::logout_all::<R, S, A, P>))
        .route("/auth/sessions", get(session::list::<R, S, A, P>))
        // Provider routes
        .route("/auth/revoke-webhook", post(revocation::revoke_webhook::<R, S, A, P>))
        .with_state(service)
}
