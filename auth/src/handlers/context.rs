//! Authenticated-session context for application routes.
//!
//! [`require_session`] validates the presented session token once per
//! request and stores a [`SessionContext`] in the request extensions.
//! Handlers further down take `SessionContext` as an extractor.
//!
//! ```rust,ignore
//! let app = Router::new()
//!     .route("/tasks", get(list_tasks))
//!     .route_layer(axum::middleware::from_fn_with_state(
//!         service.clone(),
//!         require_session::<R, S, A, P>,
//!     ));
//!
//! async fn list_tasks(session: SessionContext) -> Json<Vec<Task>> {
//!     load_tasks(session.user_id).await
//! }
//! ```

use super::{REFRESH_NEEDED_HEADER, SESSION_COOKIE, auth_error, missing_session};
use crate::providers::{AccountRepository, IdentityProvider, SessionStore, StateRepository};
use crate::service::{AuthenticationService, ValidatedSession};
use crate::state::{SessionId, UserId};
use axum::async_trait;
use axum::extract::{FromRequestParts, Request, State};
use axum::http::{HeaderValue, request::Parts};
use axum::middleware::Next;
use axum::response::Response;
use axum_extra::extract::cookie::CookieJar;
use gatekeeper_web::{AppError, BearerToken};
use std::sync::Arc;

/// The authenticated caller of the current request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionContext {
    /// Session id.
    pub session_id: SessionId,
    /// Owner of the session.
    pub user_id: UserId,
    /// The session was created through OAuth.
    pub is_oauth: bool,
    /// The provider access token is about to expire.
    pub needs_refresh: bool,
}

impl From<&ValidatedSession> for SessionContext {
    fn from(session: &ValidatedSession) -> Self {
        Self {
            session_id: session.session_id,
            user_id: session.user_id,
            is_oauth: session.is_oauth,
            needs_refresh: session.needs_refresh,
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for SessionContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Self>()
            .copied()
            .ok_or_else(missing_session)
    }
}

/// Session token from the `session_token` cookie, falling back to the
/// `Authorization: Bearer` header.
pub(crate) fn presented_token(jar: &CookieJar, bearer: Option<BearerToken>) -> Option<String> {
    jar.get(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_owned())
        .filter(|token| !token.is_empty())
        .or_else(|| bearer.map(|b| b.0))
}

/// Validate the presented token or answer 401.
pub(crate) async fn authenticate<R, S, A, P>(
    service: &AuthenticationService<R, S, A, P>,
    jar: &CookieJar,
    bearer: Option<BearerToken>,
) -> Result<ValidatedSession, AppError>
where
    R: StateRepository,
    S: SessionStore,
    A: AccountRepository,
    P: IdentityProvider,
{
    let token = presented_token(jar, bearer).ok_or_else(missing_session)?;
    service
        .validate_session(&token)
        .await
        .map_err(|e| auth_error(&e))
}

/// Header value for [`REFRESH_NEEDED_HEADER`].
pub(crate) fn refresh_hint(needs_refresh: bool) -> HeaderValue {
    HeaderValue::from_static(if needs_refresh { "true" } else { "false" })
}

/// Middleware rejecting requests without a valid session.
///
/// On success the request gets a [`SessionContext`] extension and the
/// response carries the refresh-needed hint header.
///
/// # Errors
///
/// Returns 401 if the token is missing, forged, expired, or its session is
/// gone.
pub async fn require_session<R, S, A, P>(
    State(service): State<Arc<AuthenticationService<R, S, A, P>>>,
    jar: CookieJar,
    bearer: Option<BearerToken>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError>
where
    R: StateRepository + 'static,
    S: SessionStore + 'static,
    A: AccountRepository + 'static,
    P: IdentityProvider + 'static,
{
    let session = authenticate(&service, &jar, bearer).await?;
    let context = SessionContext::from(&session);
    request.extensions_mut().insert(context);

    let mut response = next.run(request).await;
    response
        .headers_mut()
        .insert(REFRESH_NEEDED_HEADER, refresh_hint(context.needs_refresh));
    Ok(response)
}
