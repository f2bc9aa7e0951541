//! Security-focused integration tests.
//!
//! This module verifies the properties an attacker would go after:
//!
//! - Single-use state tokens under concurrent callbacks
//! - Duplicate-account races on concurrent sign-ups and first sign-ins
//! - Unverified identities
//! - Forged and expired session tokens
//! - Exact expiry boundaries
//! - Information disclosure through error messages

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use chrono::Duration;
use gatekeeper_auth::error::{AUTHENTICATION_FAILED, SESSION_INVALID};
use gatekeeper_auth::mocks::{ManualClock, MockIdentityProvider};
use gatekeeper_auth::providers::IdentityClaims;
use gatekeeper_auth::{
    Account, AccountRepository, AuthConfig, AuthError, AuthenticationService, CallbackOutcome,
    CallbackParams, ClientMetadata, GoogleConfig, MemoryAccountRepository, MemorySessionStore,
    MemoryStateRepository, NewOAuthAccount, OAuthIntent, OAuthStateConfig, RateLimitConfig,
    Result, SessionConfig, TokenConfig, TokenService,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Barrier;

type TestService = AuthenticationService<
    MemoryStateRepository,
    MemorySessionStore,
    MemoryAccountRepository,
    MockIdentityProvider,
>;

const SIGNING_KEY: &[u8] = b"security-tests-signing-key-32-by";

fn setup(provider: impl FnOnce(MockIdentityProvider) -> MockIdentityProvider) -> (
    Arc<TestService>,
    MockIdentityProvider,
    Arc<ManualClock>,
) {
    let clock = Arc::new(ManualClock::default());
    let provider = provider(MockIdentityProvider::new(clock.clone()));
    let config = AuthConfig {
        oauth: OAuthStateConfig::new("https://app.example.com/".into()),
        session: SessionConfig::new(),
        rate_limit: RateLimitConfig::new(50, std::time::Duration::from_secs(60)),
        token: TokenConfig::new(SIGNING_KEY.to_vec()),
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
    (Arc::new(service), provider, clock)
}

fn params(state: &str, code: &str) -> CallbackParams {
    CallbackParams {
        code: Some(code.into()),
        state: Some(state.into()),
        error: None,
        cookie_state: Some(state.into()),
    }
}

async fn session_token(service: &TestService, code: &str) -> String {
    let start = service
        .start_oauth("ip", None, OAuthIntent::SignIn, false)
        .await
        .unwrap();
    match service
        .handle_callback(params(&start.state_token, code), ClientMetadata::default())
        .await
        .unwrap()
    {
        CallbackOutcome::Authenticated(session) => session.session_token,
        CallbackOutcome::AccountExists { .. } => panic!("expected a session"),
    }
}

/// Two callbacks racing on one state token: exactly one may proceed to the
/// code exchange.
#[tokio::test]
async fn test_concurrent_callbacks_consume_state_once() {
    let (service, provider, _) = setup(|p| {
        p.with_identity("code", MockIdentityProvider::verified("sub-1", "ada@example.com"))
    });
    let start = service
        .start_oauth("ip", None, OAuthIntent::SignIn, false)
        .await
        .unwrap();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let service = service.clone();
            let state = start.state_token.clone();
            tokio::spawn(async move {
                service
                    .handle_callback(params(&state, "code"), ClientMetadata::default())
                    .await
            })
        })
        .collect();

    let mut successes = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => successes += 1,
            Err(e) => assert_eq!(e, AuthError::StateNotFound),
        }
    }

    assert_eq!(successes, 1);
    assert_eq!(provider.exchange_calls().len(), 1);
    assert_eq!(service.sessions().len(), 1);
}

/// Account repository whose first `racers` lookups meet at a barrier before
/// returning, so concurrent callbacks all see "no account" before any of
/// them inserts. Later lookups (the loser's re-read) pass straight through.
struct RacingAccounts {
    inner: MemoryAccountRepository,
    racers: usize,
    lookups: AtomicUsize,
    after_lookup: Barrier,
    lost_races: AtomicUsize,
}

impl RacingAccounts {
    fn new(racers: usize) -> Self {
        Self {
            inner: MemoryAccountRepository::new(),
            racers,
            lookups: AtomicUsize::new(0),
            after_lookup: Barrier::new(racers),
            lost_races: AtomicUsize::new(0),
        }
    }
}

impl AccountRepository for RacingAccounts {
    async fn find_by_provider_subject(&self, subject: &str) -> Result<Option<Account>> {
        let found = self.inner.find_by_provider_subject(subject).await;
        if self.lookups.fetch_add(1, Ordering::SeqCst) < self.racers {
            self.after_lookup.wait().await;
        }
        found
    }

    async fn create_oauth_account(&self, account: &NewOAuthAccount) -> Result<Account> {
        let created = self.inner.create_oauth_account(account).await;
        if created == Err(AuthError::AccountAlreadyExists) {
            self.lost_races.fetch_add(1, Ordering::SeqCst);
        }
        created
    }
}

type RacingService = AuthenticationService<
    MemoryStateRepository,
    MemorySessionStore,
    RacingAccounts,
    MockIdentityProvider,
>;

fn racing_setup() -> RacingService {
    let clock = Arc::new(ManualClock::default());
    let provider = MockIdentityProvider::new(clock.clone())
        .with_identity("code-a", MockIdentityProvider::verified("sub-1", "ada@example.com"))
        .with_identity("code-b", MockIdentityProvider::verified("sub-1", "ada@example.com"));
    let config = AuthConfig {
        oauth: OAuthStateConfig::new("https://app.example.com/".into()),
        session: SessionConfig::new(),
        rate_limit: RateLimitConfig::new(50, std::time::Duration::from_secs(60)),
        token: TokenConfig::new(SIGNING_KEY.to_vec()),
        google: GoogleConfig::new(
            "client".into(),
            "secret".into(),
            "https://app.example.com/auth/google/callback".into(),
        ),
    };
    AuthenticationService::new(
        &config,
        MemoryStateRepository::new(),
        MemorySessionStore::new(),
        RacingAccounts::new(2),
        provider,
        clock,
    )
    .unwrap()
}

async fn race(service: &RacingService, intent: OAuthIntent) -> [CallbackOutcome; 2] {
    let first = service.start_oauth("ip", None, intent, false).await.unwrap();
    let second = service.start_oauth("ip", None, intent, false).await.unwrap();

    let (a, b) = tokio::join!(
        service.handle_callback(params(&first.state_token, "code-a"), ClientMetadata::default()),
        service.handle_callback(params(&second.state_token, "code-b"), ClientMetadata::default()),
    );
    [a.unwrap(), b.unwrap()]
}

/// Two sign-ups for the same provider identity, both past the lookup before
/// either inserts: one account, one session, the loser is sent to login.
#[tokio::test]
async fn test_concurrent_sign_ups_create_one_account() {
    let service = racing_setup();

    let outcomes = race(&service, OAuthIntent::SignUp).await;

    let authenticated = outcomes
        .iter()
        .filter(|o| matches!(o, CallbackOutcome::Authenticated(_)))
        .count();
    let redirected = outcomes
        .iter()
        .filter(|o| matches!(o, CallbackOutcome::AccountExists { .. }))
        .count();

    assert_eq!(authenticated, 1);
    assert_eq!(redirected, 1);
    assert_eq!(service.accounts().lost_races.load(Ordering::SeqCst), 1);
    assert_eq!(service.accounts().inner.len(), 1);
    assert_eq!(service.sessions().len(), 1);
}

/// Two first-time sign-ins racing: the loser of the insert re-reads the
/// winner's account and both get a session for the same user.
#[tokio::test]
async fn test_concurrent_first_sign_ins_share_one_account() {
    let service = racing_setup();

    let outcomes = race(&service, OAuthIntent::SignIn).await;

    let sessions: Vec<_> = outcomes
        .into_iter()
        .map(|outcome| match outcome {
            CallbackOutcome::Authenticated(session) => session,
            CallbackOutcome::AccountExists { .. } => panic!("sign-in must not redirect"),
        })
        .collect();

    assert_eq!(sessions[0].user_id, sessions[1].user_id);
    assert_eq!(sessions.iter().filter(|s| s.is_new_account).count(), 1);
    assert_eq!(service.accounts().lost_races.load(Ordering::SeqCst), 1);
    assert_eq!(service.accounts().inner.len(), 1);
    assert_eq!(service.sessions().len(), 2);
}

#[tokio::test]
async fn test_unverified_email_is_rejected() {
    let (service, _, _) = setup(|p| {
        p.with_identity(
            "code",
            IdentityClaims {
                subject: "sub-2".into(),
                email: "grace@example.com".into(),
                email_verified: false,
                name: Some("Grace".into()),
            },
        )
    });
    let start = service
        .start_oauth("ip", None, OAuthIntent::SignUp, true)
        .await
        .unwrap();

    let result = service
        .handle_callback(params(&start.state_token, "code"), ClientMetadata::default())
        .await;

    assert_eq!(result, Err(AuthError::EmailNotVerified));
    assert!(service.accounts().is_empty());
    assert!(service.sessions().is_empty());
}

#[tokio::test]
async fn test_missing_state_cookie_is_a_mismatch() {
    let (service, provider, _) = setup(|p| {
        p.with_identity("code", MockIdentityProvider::verified("sub-1", "ada@example.com"))
    });
    let start = service
        .start_oauth("ip", None, OAuthIntent::SignIn, false)
        .await
        .unwrap();

    let no_cookie = CallbackParams {
        cookie_state: Some(String::new()),
        ..params(&start.state_token, "code")
    };
    let result = service.handle_callback(no_cookie, ClientMetadata::default()).await;

    assert_eq!(result, Err(AuthError::StateMismatch));
    assert!(provider.exchange_calls().is_empty());
}

#[tokio::test]
async fn test_state_expiry_boundary() {
    let (service, _, clock) = setup(|p| {
        p.with_identity("code", MockIdentityProvider::verified("sub-1", "ada@example.com"))
    });

    // Valid at exactly expires_at.
    let on_time = service
        .start_oauth("ip", None, OAuthIntent::SignIn, false)
        .await
        .unwrap();
    clock.advance(Duration::minutes(5));
    assert!(
        service
            .handle_callback(params(&on_time.state_token, "code"), ClientMetadata::default())
            .await
            .is_ok()
    );

    // Expired one second later.
    let late = service
        .start_oauth("ip", None, OAuthIntent::SignIn, false)
        .await
        .unwrap();
    clock.advance(Duration::minutes(5) + Duration::seconds(1));
    assert_eq!(
        service
            .handle_callback(params(&late.state_token, "code"), ClientMetadata::default())
            .await,
        Err(AuthError::StateExpired)
    );

    // An expired state is still burned.
    assert!(service.states().repository().is_empty());
}

#[tokio::test]
async fn test_session_expiry_boundary() {
    let (service, _, clock) = setup(|p| {
        p.with_identity("code", MockIdentityProvider::verified("sub-1", "ada@example.com"))
    });
    let token = session_token(&service, "code").await;

    clock.advance(Duration::hours(24));
    assert!(service.validate_session(&token).await.is_ok());

    clock.advance(Duration::seconds(1));
    let err = service.validate_session(&token).await.unwrap_err();
    assert!(err.is_session_failure());
    assert_eq!(err.public_message(), SESSION_INVALID);
}

#[tokio::test]
async fn test_tampered_session_token_is_rejected() {
    let (service, _, _) = setup(|p| {
        p.with_identity("code", MockIdentityProvider::verified("sub-1", "ada@example.com"))
    });
    let token = session_token(&service, "code").await;

    let mut parts: Vec<String> = token.split('.').map(str::to_string).collect();
    assert_eq!(parts.len(), 3);
    let mut signature = parts[2].clone().into_bytes();
    signature[0] = if signature[0] == b'A' { b'B' } else { b'A' };
    parts[2] = String::from_utf8(signature).unwrap();
    let tampered = parts.join(".");

    assert_eq!(
        service.validate_session(&tampered).await,
        Err(AuthError::InvalidToken)
    );
    assert_eq!(
        service.validate_session("not-a-token").await,
        Err(AuthError::InvalidToken)
    );
    assert_eq!(service.validate_session("").await, Err(AuthError::InvalidToken));
}

#[tokio::test]
async fn test_token_signed_with_other_key_is_rejected() {
    let (service, _, clock) = setup(|p| {
        p.with_identity("code", MockIdentityProvider::verified("sub-1", "ada@example.com"))
    });
    let token = session_token(&service, "code").await;
    let genuine = service.validate_session(&token).await.unwrap();

    let forger = TokenService::new(
        &TokenConfig::new(b"a-different-key-of-32-bytes-long".to_vec()),
        clock.clone(),
    )
    .unwrap();
    let forged = forger
        .issue(
            genuine.session_id,
            genuine.user_id,
            true,
            genuine.session_expires_at,
        )
        .unwrap();

    assert_eq!(
        service.validate_session(&forged).await,
        Err(AuthError::InvalidToken)
    );
}

#[tokio::test]
async fn test_token_for_deleted_session_is_rejected() {
    let (service, _, _) = setup(|p| {
        p.with_identity("code", MockIdentityProvider::verified("sub-1", "ada@example.com"))
    });
    let token = session_token(&service, "code").await;
    let session = service.validate_session(&token).await.unwrap();

    service.logout(session.session_id).await.unwrap();

    assert_eq!(
        service.validate_session(&token).await,
        Err(AuthError::SessionNotFound)
    );
}

#[tokio::test]
async fn test_state_failures_are_indistinguishable_to_clients() {
    let (service, _, clock) = setup(|p| {
        p.with_identity("code", MockIdentityProvider::verified("sub-1", "ada@example.com"))
    });

    let unknown = service
        .handle_callback(params("unknown", "code"), ClientMetadata::default())
        .await
        .unwrap_err();

    let start = service
        .start_oauth("ip", None, OAuthIntent::SignIn, false)
        .await
        .unwrap();
    clock.advance(Duration::minutes(6));
    let expired = service
        .handle_callback(params(&start.state_token, "code"), ClientMetadata::default())
        .await
        .unwrap_err();

    assert_ne!(unknown, expired);
    assert_eq!(unknown.public_message(), AUTHENTICATION_FAILED);
    assert_eq!(expired.public_message(), AUTHENTICATION_FAILED);
}

#[tokio::test]
async fn test_debug_output_redacts_secrets() {
    let (service, _, _) = setup(|p| {
        p.with_identity("code", MockIdentityProvider::verified("sub-1", "ada@example.com"))
    });
    let start = service
        .start_oauth("ip", None, OAuthIntent::SignIn, false)
        .await
        .unwrap();
    assert!(!format!("{start:?}").contains(&start.state_token));

    let outcome = service
        .handle_callback(params(&start.state_token, "code"), ClientMetadata::default())
        .await
        .unwrap();
    let CallbackOutcome::Authenticated(session) = &outcome else {
        panic!("expected a session");
    };
    assert!(!format!("{outcome:?}").contains(&session.session_token));
}
