//! Session lifecycle tests: refresh policy, logout, revocation and sweeping.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use chrono::Duration;
use gatekeeper_auth::mocks::{ManualClock, MockIdentityProvider};
use gatekeeper_auth::{
    AuthConfig, AuthError, AuthenticationService, AuthenticationSession, CallbackOutcome,
    CallbackParams, ClientMetadata, Clock, EstablishedSession, GoogleConfig,
    MemoryAccountRepository, MemorySessionStore, MemoryStateRepository, OAuthIntent,
    OAuthStateConfig, RateLimitConfig, RevocationOutcome, SessionConfig, SessionId, SessionStore,
    TokenConfig,
};
use std::sync::Arc;

type TestService = AuthenticationService<
    MemoryStateRepository,
    MemorySessionStore,
    MemoryAccountRepository,
    MockIdentityProvider,
>;

fn setup() -> (TestService, MockIdentityProvider, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::default());
    let provider = MockIdentityProvider::new(clock.clone())
        .with_identity("ada-1", MockIdentityProvider::verified("sub-ada", "ada@example.com"))
        .with_identity("ada-2", MockIdentityProvider::verified("sub-ada", "ada@example.com"))
        .with_identity("bob", MockIdentityProvider::verified("sub-bob", "bob@example.com"));
    let config = AuthConfig {
        oauth: OAuthStateConfig::new("https://app.example.com/".into()),
        session: SessionConfig::new()
            .with_refresh_skew(Duration::minutes(5))
            .with_provider_timeout(std::time::Duration::from_millis(200)),
        rate_limit: RateLimitConfig::new(20, std::time::Duration::from_secs(60)),
        token: TokenConfig::new(b"session-lifecycle-signing-key-32".to_vec()),
        google: GoogleConfig::new(
            "client".into(),
            "secret".into(),
            "https://app.example.com/auth/google/callback".into(),
        ),
    };
    let service = AuthenticationService::new(
        &config,
        MemoryStateRepository::new(),
        MemorySessionStore::new(),
        MemoryAccountRepository::new(),
        provider.clone(),
        clock.clone(),
    )
    .unwrap();
    (service, provider, clock)
}

async fn login(service: &TestService, code: &str, remember_me: bool) -> EstablishedSession {
    let start = service
        .start_oauth("ip", None, OAuthIntent::SignIn, remember_me)
        .await
        .unwrap();
    let params = CallbackParams {
        code: Some(code.into()),
        state: Some(start.state_token.clone()),
        error: None,
        cookie_state: Some(start.state_token),
    };
    match service
        .handle_callback(params, ClientMetadata::default())
        .await
        .unwrap()
    {
        CallbackOutcome::Authenticated(session) => session,
        CallbackOutcome::AccountExists { .. } => panic!("expected a session"),
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Refresh
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_needs_refresh_within_skew() {
    let (service, _, clock) = setup();
    let session = login(&service, "ada-1", false).await;

    // Access token lives one hour; skew is five minutes.
    clock.advance(Duration::minutes(54));
    let early = service.validate_session(&session.session_token).await.unwrap();
    assert!(!early.needs_refresh);

    clock.advance(Duration::minutes(2));
    let late = service.validate_session(&session.session_token).await.unwrap();
    assert!(late.needs_refresh);
}

#[tokio::test]
async fn test_refresh_rotates_provider_token_but_not_session_expiry() {
    let (service, provider, clock) = setup();
    let session = login(&service, "ada-1", false).await;
    clock.advance(Duration::minutes(56));

    let refreshed = service.refresh_session(session.session_id).await.unwrap();

    assert_eq!(provider.refresh_calls(), vec!["mock-refresh-1".to_string()]);
    assert_eq!(refreshed.session_expires_at, session.expires_at);
    assert_eq!(refreshed.token_expires_at, clock.now() + Duration::hours(1));

    let validated = service
        .validate_session(&refreshed.session_token)
        .await
        .unwrap();
    assert!(!validated.needs_refresh);
    assert_eq!(validated.session_expires_at, session.expires_at);

    // The provider returned no new refresh token, so the old one stays.
    let stored = service.sessions().find_by_id(session.session_id).await.unwrap();
    assert_eq!(stored.refresh_token.as_deref(), Some("mock-refresh-1"));
    assert_ne!(stored.access_token, "mock-access-1");
}

#[tokio::test]
async fn test_refresh_does_not_resurrect_expired_session() {
    let (service, provider, clock) = setup();
    let session = login(&service, "ada-1", false).await;

    clock.advance(Duration::hours(24) + Duration::seconds(1));
    assert_eq!(
        service.refresh_session(session.session_id).await,
        Err(AuthError::SessionExpired)
    );
    assert!(provider.refresh_calls().is_empty());
    assert_eq!(
        service.sessions().find_by_id(session.session_id).await,
        Err(AuthError::SessionNotFound)
    );
}

#[tokio::test]
async fn test_refresh_failure_keeps_session_valid() {
    let (service, provider, clock) = setup();
    let session = login(&service, "ada-1", false).await;
    clock.advance(Duration::minutes(58));
    provider.set_refresh_fails(true);

    let result = service.refresh_session(session.session_id).await;
    assert!(matches!(result, Err(AuthError::RefreshFailed(_))));

    let validated = service.validate_session(&session.session_token).await.unwrap();
    assert!(validated.needs_refresh);
}

#[tokio::test]
async fn test_refresh_timeout_keeps_session_valid() {
    let (service, provider, _) = setup();
    let session = login(&service, "ada-1", false).await;
    provider.set_delay(Some(std::time::Duration::from_secs(2)));

    let result = service.refresh_session(session.session_id).await;
    assert!(matches!(result, Err(AuthError::RefreshFailed(_))));
    assert!(service.validate_session(&session.session_token).await.is_ok());
}

#[tokio::test]
async fn test_refresh_is_oauth_only() {
    let (service, _, clock) = setup();
    let now = clock.now();
    let session_id = SessionId::new();
    let user_id = gatekeeper_auth::UserId::new();
    let token = service
        .tokens()
        .issue(session_id, user_id, false, now + Duration::hours(1))
        .unwrap();
    service
        .sessions()
        .create(&AuthenticationSession {
            session_id,
            user_id,
            session_token: token.clone(),
            is_oauth: false,
            access_token: String::new(),
            refresh_token: None,
            token_expires_at: None,
            session_expires_at: now + Duration::hours(1),
            created_at: now,
            last_activity_at: now,
            user_agent: "cli".into(),
            ip_address: "127.0.0.1".parse().unwrap(),
        })
        .await
        .unwrap();

    let validated = service.validate_session(&token).await.unwrap();
    assert!(!validated.is_oauth);
    assert!(!validated.needs_refresh);
    assert_eq!(
        service.refresh_session(session_id).await,
        Err(AuthError::RefreshNotApplicable)
    );
}

// ═══════════════════════════════════════════════════════════════════════
// Logout
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_logout_is_idempotent_and_revokes_grant() {
    let (service, provider, _) = setup();
    let session = login(&service, "ada-1", false).await;

    service.logout(session.session_id).await.unwrap();
    service.logout(session.session_id).await.unwrap();

    assert_eq!(
        service.validate_session(&session.session_token).await,
        Err(AuthError::SessionNotFound)
    );
    assert_eq!(provider.revoked_tokens(), vec!["mock-refresh-1".to_string()]);
}

#[tokio::test]
async fn test_logout_succeeds_when_provider_revocation_fails() {
    let (service, provider, _) = setup();
    let session = login(&service, "ada-1", false).await;
    provider.set_revoke_fails(true);

    service.logout(session.session_id).await.unwrap();
    assert!(service.sessions().is_empty());
}

#[tokio::test]
async fn test_logout_everywhere_ends_only_that_users_sessions() {
    let (service, _, _) = setup();
    let laptop = login(&service, "ada-1", false).await;
    let phone = login(&service, "ada-2", true).await;
    let bob = login(&service, "bob", false).await;
    assert_eq!(laptop.user_id, phone.user_id);

    let ended = service.logout_everywhere(laptop.user_id).await.unwrap();

    assert_eq!(ended, 2);
    assert!(service.list_sessions(laptop.user_id).await.unwrap().is_empty());
    assert!(service.validate_session(&phone.session_token).await.is_err());
    assert!(service.validate_session(&bob.session_token).await.is_ok());
}

#[tokio::test]
async fn test_list_sessions_hides_expired() {
    let (service, _, clock) = setup();
    let short = login(&service, "ada-1", false).await;
    let remembered = login(&service, "ada-2", true).await;

    let listed = service.list_sessions(short.user_id).await.unwrap();
    assert_eq!(listed.len(), 2);

    clock.advance(Duration::hours(25));
    let listed = service.list_sessions(short.user_id).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].session_id, remembered.session_id);
}

// ═══════════════════════════════════════════════════════════════════════
// Revocation
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_revocation_webhook_deletes_matching_session() {
    let (service, _, _) = setup();
    let session = login(&service, "ada-1", false).await;

    let outcome = service.handle_revocation_webhook("mock-access-1").await;

    assert_eq!(outcome, RevocationOutcome::Revoked(session.session_id));
    assert_eq!(
        service.validate_session(&session.session_token).await,
        Err(AuthError::SessionNotFound)
    );
}

#[tokio::test]
async fn test_revocation_webhook_matches_refresh_token() {
    let (service, _, _) = setup();
    let session = login(&service, "ada-1", false).await;

    assert_eq!(
        service.handle_revocation_webhook("mock-refresh-1").await,
        RevocationOutcome::Revoked(session.session_id)
    );
}

#[tokio::test]
async fn test_revocation_webhook_ignores_unknown_and_rotated_tokens() {
    let (service, _, _) = setup();
    let session = login(&service, "ada-1", false).await;
    service.refresh_session(session.session_id).await.unwrap();

    assert_eq!(
        service.handle_revocation_webhook("never-issued").await,
        RevocationOutcome::Unknown
    );
    assert_eq!(
        service.handle_revocation_webhook("mock-access-1").await,
        RevocationOutcome::Unknown
    );
    assert_eq!(service.sessions().len(), 1);
}

// ═══════════════════════════════════════════════════════════════════════
// Sweeping
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_sweep_removes_expired_sessions_only() {
    let (service, _, clock) = setup();
    login(&service, "ada-1", false).await;
    let remembered = login(&service, "bob", true).await;

    clock.advance(Duration::hours(25));
    let report = service.sweep_expired().await.unwrap();

    assert_eq!(report.sessions, 1);
    assert_eq!(service.sessions().len(), 1);
    assert!(
        service
            .validate_session(&remembered.session_token)
            .await
            .is_ok()
    );
}
