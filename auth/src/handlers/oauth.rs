//! Google OAuth handlers.
//!
//! # Flow
//!
//! ```text
//! Browser                     Gatekeeper                      Google
//!    │ GET /auth/google/login     │                              │
//!    │───────────────────────────▶│ issue state + PKCE           │
//!    │◀── 302 + oauth_state ──────│                              │
//!    │──────────────────────────────── consent ─────────────────▶│
//!    │◀─────────────────────────────── 302 ?code&state ──────────│
//!    │ GET /auth/google/callback  │                              │
//!    │───────────────────────────▶│ consume state, exchange ────▶│
//!    │◀── 302 + session_token ────│                              │
//! ```

use super::{
    LOGIN_PATH, OAUTH_STATE_COOKIE, auth_error, clear_state_cookie, found, session_cookie,
    state_cookie,
};
use crate::providers::{AccountRepository, IdentityProvider, SessionStore, StateRepository};
use crate::service::{AuthenticationService, CallbackOutcome, CallbackParams};
use crate::state::{ClientMetadata, OAuthIntent};
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use axum_extra::extract::cookie::CookieJar;
use gatekeeper_web::{AppError, ClientIp, CorrelationId, UserAgent};
use serde::Deserialize;
use std::sync::Arc;

/// Query accepted by the login and sign-up endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StartQuery {
    /// Post-login redirect; must be allow-listed.
    pub redirect_uri: Option<String>,
    /// Ask for the extended session lifetime.
    #[serde(default)]
    pub remember_me: bool,
}

/// Query the provider sends back to the callback.
#[derive(Clone, Default, Deserialize)]
pub struct CallbackQuery {
    /// Authorization code.
    pub code: Option<String>,
    /// State token.
    pub state: Option<String>,
    /// Provider error such as `access_denied`.
    pub error: Option<String>,
}

/// Start a sign-in flow.
///
/// # Endpoint
///
/// ```text
/// GET /auth/google/login?redirect_uri=...&remember_me=true
/// ```
///
/// # Response
///
/// `302` to Google with the `oauth_state` cookie set.
///
/// # Errors
///
/// 400 for a redirect outside the allow-list, 429 when rate limited.
pub async fn google_login<R, S, A, P>(
    State(service): State<Arc<AuthenticationService<R, S, A, P>>>,
    Query(query): Query<StartQuery>,
    client_ip: ClientIp,
    jar: CookieJar,
) -> Result<(CookieJar, Response), AppError>
where
    R: StateRepository + 'static,
    S: SessionStore + 'static,
    A: AccountRepository + 'static,
    P: IdentityProvider + 'static,
{
    start(&service, query, client_ip, jar, OAuthIntent::SignIn).await
}

/// Start a sign-up flow.
///
/// Same as [`google_login`], but an identity that already has an account is
/// sent back to the login endpoint instead of being signed in.
///
/// # Errors
///
/// 400 for a redirect outside the allow-list, 429 when rate limited.
pub async fn google_signup<R, S, A, P>(
    State(service): State<Arc<AuthenticationService<R, S, A, P>>>,
    Query(query): Query<StartQuery>,
    client_ip: ClientIp,
    jar: CookieJar,
) -> Result<(CookieJar, Response), AppError>
where
    R: StateRepository + 'static,
    S: SessionStore + 'static,
    A: AccountRepository + 'static,
    P: IdentityProvider + 'static,
{
    start(&service, query, client_ip, jar, OAuthIntent::SignUp).await
}

async fn start<R, S, A, P>(
    service: &AuthenticationService<R, S, A, P>,
    query: StartQuery,
    client_ip: ClientIp,
    jar: CookieJar,
    intent: OAuthIntent,
) -> Result<(CookieJar, Response), AppError>
where
    R: StateRepository,
    S: SessionStore,
    A: AccountRepository,
    P: IdentityProvider,
{
    let started = service
        .start_oauth(
            &client_ip.0.to_string(),
            query.redirect_uri.as_deref(),
            intent,
            query.remember_me,
        )
        .await
        .map_err(|e| auth_error(&e))?;

    let remaining = started.state_expires_at - service.now();
    let jar = jar.add(state_cookie(started.state_token, remaining));
    Ok((jar, found(started.authorization_url)))
}

/// Complete the OAuth flow.
///
/// # Endpoint
///
/// ```text
/// GET /auth/google/callback?code=...&state=...
/// GET /auth/google/callback?error=access_denied&state=...
/// ```
///
/// # Response
///
/// - success: `302` to the stored redirect with the `session_token` cookie
/// - sign-up for an existing account: `302` to the login endpoint
/// - missing `state`, or missing `code`: 400 "Invalid request"
/// - any other failure: 401 "Authentication failed"
///
/// The `oauth_state` cookie is cleared in every case.
pub async fn google_callback<R, S, A, P>(
    State(service): State<Arc<AuthenticationService<R, S, A, P>>>,
    Query(query): Query<CallbackQuery>,
    correlation_id: CorrelationId,
    client_ip: ClientIp,
    user_agent: UserAgent,
    jar: CookieJar,
) -> (CookieJar, Response)
where
    R: StateRepository + 'static,
    S: SessionStore + 'static,
    A: AccountRepository + 'static,
    P: IdentityProvider + 'static,
{
    // A missing cookie must still be compared, so it becomes "".
    let cookie_state = jar
        .get(OAUTH_STATE_COOKIE)
        .map(|cookie| cookie.value().to_owned())
        .unwrap_or_default();
    let jar = jar.add(clear_state_cookie());

    let params = CallbackParams {
        code: query.code,
        state: query.state,
        error: query.error,
        cookie_state: Some(cookie_state),
    };
    let client = ClientMetadata {
        user_agent: user_agent.0,
        ip_address: client_ip.0,
    };

    match service.handle_callback(params, client).await {
        Ok(CallbackOutcome::Authenticated(session)) => {
            tracing::info!(
                correlation_id = %correlation_id.0,
                session_id = %session.session_id.0,
                is_new_account = session.is_new_account,
                "OAuth callback established session"
            );
            let remaining = session.expires_at - service.now();
            let jar = jar.add(session_cookie(session.session_token, remaining));
            (jar, found(session.redirect_uri))
        }
        Ok(CallbackOutcome::AccountExists { redirect_uri }) => {
            tracing::info!(
                correlation_id = %correlation_id.0,
                "Sign-up for existing account, sending to login"
            );
            (jar, found(login_location(&redirect_uri)))
        }
        Err(e) => {
            tracing::info!(correlation_id = %correlation_id.0, "OAuth callback failed");
            (jar, auth_error(&e).into_response())
        }
    }
}

/// Login endpoint carrying the original redirect along.
fn login_location(redirect_uri: &str) -> String {
    let query = serde_urlencoded::to_string([("redirect_uri", redirect_uri)]).unwrap_or_default();
    if query.is_empty() {
        LOGIN_PATH.to_string()
    } else {
        format!("{LOGIN_PATH}?{query}")
    }
}
