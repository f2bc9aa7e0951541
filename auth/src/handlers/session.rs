//! Session management handlers.
//!
//! Handles session validation, refresh, logout and listing. Every endpoint
//! accepts the `session_token` cookie or an `Authorization: Bearer` header.

use super::context::{authenticate, presented_token, refresh_hint};
use super::{REFRESH_NEEDED_HEADER, auth_error, clear_session_cookie, session_cookie};
use crate::providers::{AccountRepository, IdentityProvider, SessionStore, StateRepository};
use crate::service::AuthenticationService;
use crate::state::{SessionId, SessionSummary, UserId};
use axum::Json;
use axum::extract::State;
use axum::http::{HeaderName, HeaderValue};
use axum_extra::extract::cookie::CookieJar;
use chrono::{DateTime, Utc};
use gatekeeper_web::{AppError, BearerToken};
use serde::Serialize;
use std::sync::Arc;

/// Response of the validate endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct SessionInfoResponse {
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
    /// The client should call the refresh endpoint.
    pub needs_refresh: bool,
}

/// Response of the refresh endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct RefreshResponse {
    /// New provider access-token expiry.
    pub token_expires_at: DateTime<Utc>,
    /// Absolute session expiry, unchanged by refresh.
    pub session_expires_at: DateTime<Utc>,
}

/// Response after logout.
#[derive(Debug, Clone, Serialize)]
pub struct LogoutResponse {
    /// Success message.
    pub message: String,
}

/// Response after logging out everywhere.
#[derive(Debug, Clone, Serialize)]
pub struct LogoutAllResponse {
    /// Number of sessions ended.
    pub sessions_ended: usize,
}

/// Response of the session listing endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct SessionListResponse {
    /// The session making this request.
    pub current_session_id: SessionId,
    /// Live sessions, oldest first.
    pub sessions: Vec<SessionSummary>,
}

/// Check the current session.
///
/// # Endpoint
///
/// ```text
/// GET /auth/session/validate
/// Cookie: session_token=...        (or Authorization: Bearer ...)
/// ```
///
/// # Response
///
/// `200` with [`SessionInfoResponse`] and `X-Session-Refresh-Needed: true|false`.
///
/// # Errors
///
/// 401 "Session invalid" for a missing, forged or expired session.
pub async fn validate<R, S, A, P>(
    State(service): State<Arc<AuthenticationService<R, S, A, P>>>,
    jar: CookieJar,
    bearer: Option<BearerToken>,
) -> Result<([(HeaderName, HeaderValue); 1], Json<SessionInfoResponse>), AppError>
where
    R: StateRepository + 'static,
    S: SessionStore + 'static,
    A: AccountRepository + 'static,
    P: IdentityProvider + 'static,
{
    let session = authenticate(&service, &jar, bearer).await?;

    Ok((
        [(
            HeaderName::from_static(REFRESH_NEEDED_HEADER),
            refresh_hint(session.needs_refresh),
        )],
        Json(SessionInfoResponse {
            session_id: session.session_id,
            user_id: session.user_id,
            is_oauth: session.is_oauth,
            session_expires_at: session.session_expires_at,
            token_expires_at: session.token_expires_at,
            needs_refresh: session.needs_refresh,
        }),
    ))
}

/// Refresh the provider access token behind the current session.
///
/// # Endpoint
///
/// ```text
/// POST /auth/session/refresh
/// ```
///
/// The session cookie is re-issued; the session's absolute expiry does not
/// move.
///
/// # Errors
///
/// - 401 for an invalid session or a failed provider refresh
/// - 400 for a session that was not created through OAuth
pub async fn refresh<R, S, A, P>(
    State(service): State<Arc<AuthenticationService<R, S, A, P>>>,
    jar: CookieJar,
    bearer: Option<BearerToken>,
) -> Result<(CookieJar, Json<RefreshResponse>), AppError>
where
    R: StateRepository + 'static,
    S: SessionStore + 'static,
    A: AccountRepository + 'static,
    P: IdentityProvider + 'static,
{
    let session = authenticate(&service, &jar, bearer).await?;
    let refreshed = service
        .refresh_session(session.session_id)
        .await
        .map_err(|e| auth_error(&e))?;

    let remaining = refreshed.session_expires_at - service.now();
    let jar = jar.add(session_cookie(refreshed.session_token, remaining));

    Ok((
        jar,
        Json(RefreshResponse {
            token_expires_at: refreshed.token_expires_at,
            session_expires_at: refreshed.session_expires_at,
        }),
    ))
}

/// End the current session.
///
/// # Endpoint
///
/// ```text
/// POST /auth/logout
/// ```
///
/// Idempotent: a missing, unknown or already-ended session still answers
/// `200` and clears the cookie.
///
/// # Errors
///
/// 500 only if storage fails.
pub async fn logout<R, S, A, P>(
    State(service): State<Arc<AuthenticationService<R, S, A, P>>>,
    jar: CookieJar,
    bearer: Option<BearerToken>,
) -> Result<(CookieJar, Json<LogoutResponse>), AppError>
where
    R: StateRepository + 'static,
    S: SessionStore + 'static,
    A: AccountRepository + 'static,
    P: IdentityProvider + 'static,
{
    let verified =
        presented_token(&jar, bearer).and_then(|token| service.tokens().verify(&token).ok());

    if let Some(verified) = verified {
        service
            .logout(verified.session_id)
            .await
            .map_err(|e| auth_error(&e))?;
    }

    Ok((
        jar.add(clear_session_cookie()),
        Json(LogoutResponse {
            message: "Logged out".to_string(),
        }),
    ))
}

/// End every session of the current user.
///
/// # Endpoint
///
/// ```text
/// POST /auth/logout-all
/// ```
///
/// # Errors
///
/// 401 without a valid session.
pub async fn logout_all<R, S, A, P>(
    State(service): State<Arc<AuthenticationService<R, S, A, P>>>,
    jar: CookieJar,
    bearer: Option<BearerToken>,
) -> Result<(CookieJar, Json<LogoutAllResponse>), AppError>
where
    R: StateRepository + 'static,
    S: SessionStore + 'static,
    A: AccountRepository + 'static,
    P: IdentityProvider + 'static,
{
    let session = authenticate(&service, &jar, bearer).await?;
    let sessions_ended = service
        .logout_everywhere(session.user_id)
        .await
        .map_err(|e| auth_error(&e))?;

    Ok((
        jar.add(clear_session_cookie()),
        Json(LogoutAllResponse { sessions_ended }),
    ))
}

/// List the current user's live sessions.
///
/// # Endpoint
///
/// ```text
/// GET /auth/sessions
/// ```
///
/// # Errors
///
/// 401 without a valid session.
pub async fn list<R, S, A, P>(
    State(service): State<Arc<AuthenticationService<R, S, A, P>>>,
    jar: CookieJar,
    bearer: Option<BearerToken>,
) -> Result<Json<SessionListResponse>, AppError>
where
    R: StateRepository + 'static,
    S: SessionStore + 'static,
    A: AccountRepository + 'static,
    P: IdentityProvider + 'static,
{
    let session = authenticate(&service, &jar, bearer).await?;
    let sessions = service
        .list_sessions(session.user_id)
        .await
        .map_err(|e| auth_error(&e))?;

    Ok(Json(SessionListResponse {
        current_session_id: session.session_id,
        sessions,
    }))
}
