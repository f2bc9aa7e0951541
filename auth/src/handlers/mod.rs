//! HTTP handlers for authentication endpoints.
//!
//! Handlers are thin: pull cookies, query and headers out of the request,
//! call [`AuthenticationService`](crate::service::AuthenticationService), and
//! turn the outcome into redirects, cookies and JSON. Every [`AuthError`] goes
//! through [`auth_error`], which logs the root cause and answers with one of
//! the generic public messages.

pub mod context;
pub mod oauth;
pub mod revocation;
pub mod session;

use crate::error::{AuthError, SESSION_INVALID};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum_extra::extract::cookie::{Cookie, SameSite};
use gatekeeper_web::AppError;

/// Cookie mirroring the state token during the OAuth handshake.
pub const OAUTH_STATE_COOKIE: &str = "oauth_state";

/// Cookie carrying the signed session token.
pub const SESSION_COOKIE: &str = "session_token";

/// Response header telling the client the provider token is about to expire.
pub const REFRESH_NEEDED_HEADER: &str = "x-session-refresh-needed";

/// Where the browser is sent when a sign-up finds an existing account.
pub const LOGIN_PATH: &str = "/auth/google/login";

/// The state cookie is only needed by the callback.
const OAUTH_STATE_COOKIE_PATH: &str = "/auth";

/// Map an [`AuthError`] to its HTTP response.
///
/// | Error class | Status |
/// |---|---|
/// | rate limited | 429 + `Retry-After` |
/// | malformed client input | 400 |
/// | session / authentication failure | 401 |
/// | everything else | 500 |
pub fn auth_error(error: &AuthError) -> AppError {
    if let AuthError::TooManyAttempts { retry_after } = error {
        tracing::warn!(retry_after_ms = retry_after.as_millis(), "Request rate limited");
        return AppError::too_many_requests(error.public_message(), *retry_after);
    }

    if error.is_security_issue() {
        tracing::warn!(error = %error, "Rejected suspicious request");
    }

    if error.is_client_error() {
        tracing::info!(error = %error, "Rejected invalid request");
        AppError::bad_request(error.public_message())
    } else if error.is_authentication_failure() {
        tracing::info!(error = %error, "Authentication rejected");
        AppError::unauthorized(error.public_message())
    } else {
        tracing::error!(error = %error, "Authentication request failed");
        AppError::internal(error.public_message())
    }
}

/// 401 for a request that carried no session credential at all.
pub(crate) fn missing_session() -> AppError {
    AppError::unauthorized(SESSION_INVALID)
}

/// `302 Found` to `location`.
pub(crate) fn found(location: String) -> Response {
    (
        axum::http::StatusCode::FOUND,
        [(header::LOCATION, location)],
    )
        .into_response()
}

fn max_age(remaining: chrono::Duration) -> time::Duration {
    time::Duration::seconds(remaining.num_seconds().max(0))
}

/// `oauth_state` cookie for a freshly issued state token.
///
/// `SameSite=Lax` because the callback arrives as a top-level navigation
/// from the provider's domain.
pub(crate) fn state_cookie(state_token: String, remaining: chrono::Duration) -> Cookie<'static> {
    Cookie::build((OAUTH_STATE_COOKIE, state_token))
        .path(OAUTH_STATE_COOKIE_PATH)
        .http_only(true)
        .secure(true)
        .same_site(SameSite::Lax)
        .max_age(max_age(remaining))
        .build()
}

/// `session_token` cookie living as long as the session.
pub(crate) fn session_cookie(session_token: String, remaining: chrono::Duration) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, session_token))
        .path("/")
        .http_only(true)
        .secure(true)
        .same_site(SameSite::Strict)
        .max_age(max_age(remaining))
        .build()
}

/// Expired replacement that makes the browser drop the state cookie.
pub(crate) fn clear_state_cookie() -> Cookie<'static> {
    Cookie::build((OAUTH_STATE_COOKIE, ""))
        .path(OAUTH_STATE_COOKIE_PATH)
        .http_only(true)
        .secure(true)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::ZERO)
        .build()
}

/// Expired replacement that makes the browser drop the session cookie.
pub(crate) fn clear_session_cookie() -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, ""))
        .path("/")
        .http_only(true)
        .secure(true)
        .same_site(SameSite::Strict)
        .max_age(time::Duration::ZERO)
        .build()
}
