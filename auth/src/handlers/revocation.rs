//! Provider-initiated revocation webhook.

use crate::providers::{AccountRepository, IdentityProvider, SessionStore, StateRepository};
use crate::service::AuthenticationService;
use axum::Form;
use axum::extract::State;
use axum::http::StatusCode;
use gatekeeper_web::AppError;
use serde::Deserialize;
use std::sync::Arc;

/// Form body posted by the provider.
#[derive(Clone, Default, Deserialize)]
pub struct RevocationForm {
    /// The revoked access or refresh token.
    pub token: Option<String>,
}

/// Handle a revocation notice.
///
/// # Endpoint
///
/// ```text
/// POST /auth/revoke-webhook
/// Content-Type: application/x-www-form-urlencoded
///
/// token=...
/// ```
///
/// Answers `200` whether or not a session held the token, so the endpoint
/// cannot be used to probe for live tokens.
///
/// # Errors
///
/// 400 when the `token` field is missing or empty.
pub async fn revoke_webhook<R, S, A, P>(
    State(service): State<Arc<AuthenticationService<R, S, A, P>>>,
    form: Option<Form<RevocationForm>>,
) -> Result<StatusCode, AppError>
where
    R: StateRepository + 'static,
    S: SessionStore + 'static,
    A: AccountRepository + 'static,
    P: IdentityProvider + 'static,
{
    let token = form
        .and_then(|Form(form)| form.token)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AppError::bad_request("Missing token"))?;

    let outcome = service.handle_revocation_webhook(&token).await;
    tracing::debug!(?outcome, "Revocation webhook handled");
    Ok(StatusCode::OK)
}
