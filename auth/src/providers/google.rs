//! Google OAuth 2.0 identity provider.

use crate::clock::{Clock, SystemClock};
use crate::config::GoogleConfig;
use crate::error::{AuthError, Result};
use crate::providers::{IdentityClaims, IdentityProvider, ProviderTokens, RefreshedAccessToken};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Duration;
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;

/// Access-token lifetime assumed when Google omits `expires_in`.
const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 3600;

/// Longest provider error body echoed into logs.
const MAX_LOGGED_BODY: usize = 256;

/// Google OAuth 2.0 provider.
///
/// # Configuration
///
/// 1. Create OAuth 2.0 credentials in Google Cloud Console
/// 2. Register `{base_url}/auth/google/callback` as an authorized redirect URI
/// 3. Pass the client id, secret and callback URL through [`GoogleConfig`]
///
/// # Example
///
/// ```no_run
/// use gatekeeper_auth::config::GoogleConfig;
/// use gatekeeper_auth::providers::GoogleIdentityProvider;
///
/// let google = GoogleIdentityProvider::new(GoogleConfig::new(
///     "client-id".to_string(),
///     "client-secret".to_string(),
///     "https://app.example.com/auth/google/callback".to_string(),
/// ));
/// ```
#[derive(Clone)]
pub struct GoogleIdentityProvider {
    config: GoogleConfig,
    http_client: Client,
    clock: Arc<dyn Clock>,
    /// Show the consent screen on every authorization so Google re-issues a
    /// refresh token.
    ///
    /// Default: false
    force_consent: bool,
}

impl GoogleIdentityProvider {
    /// Create a new Google provider.
    #[must_use]
    pub fn new(config: GoogleConfig) -> Self {
        Self {
            config,
            http_client: Client::new(),
            clock: Arc::new(SystemClock),
            force_consent: false,
        }
    }

    /// Use a specific HTTP client (timeouts, proxies).
    #[must_use]
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http_client = client;
        self
    }

    /// Use a specific clock for computing token expiry.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Force consent screen on every authorization.
    #[must_use]
    pub const fn with_force_consent(mut self, force: bool) -> Self {
        self.force_consent = force;
        self
    }

    fn expiry_from(&self, expires_in: Option<i64>) -> chrono::DateTime<chrono::Utc> {
        let secs = expires_in
            .filter(|s| *s > 0)
            .unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS);
        self.clock.now() + Duration::seconds(secs)
    }

    async fn fetch_user_info(&self, access_token: &str) -> Result<IdentityClaims> {
        let response = self
            .http_client
            .get(&self.config.userinfo_url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AuthError::TokenExchangeFailed(format!("userinfo request: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(status = %status, "Google UserInfo request rejected");
            return Err(AuthError::TokenExchangeFailed(format!(
                "userinfo returned HTTP {status}"
            )));
        }

        let user: GoogleClaims = response
            .json()
            .await
            .map_err(|e| AuthError::TokenExchangeFailed(format!("userinfo payload: {e}")))?;

        Ok(user.into())
    }
}

impl std::fmt::Debug for GoogleIdentityProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleIdentityProvider")
            .field("config", &self.config)
            .field("force_consent", &self.force_consent)
            .finish_non_exhaustive()
    }
}

impl IdentityProvider for GoogleIdentityProvider {
    fn authorization_url(&self, state: &str, pkce_challenge: &str) -> Result<String> {
        let scope = self.config.scopes.join(" ");
        let mut params = vec![
            ("client_id", self.config.client_id.as_str()),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("response_type", "code"),
            ("scope", scope.as_str()),
            ("state", state),
            ("code_challenge", pkce_challenge),
            ("code_challenge_method", "S256"),
            ("access_type", "offline"),
            ("include_granted_scopes", "true"),
        ];

        if self.force_consent {
            params.push(("prompt", "consent"));
        }

        let query = serde_urlencoded::to_string(&params)
            .map_err(|e| AuthError::Internal(format!("Failed to build URL: {e}")))?;

        Ok(format!("{}?{query}", self.config.auth_url))
    }

    async fn exchange_code(&self, code: &str, pkce_verifier: &str) -> Result<ProviderTokens> {
        let params = [
            ("code", code),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("grant_type", "authorization_code"),
            ("code_verifier", pkce_verifier),
        ];

        let response = self
            .http_client
            .post(&self.config.token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| AuthError::TokenExchangeFailed(format!("token request: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(
                status = %status,
                body = %truncate(&body),
                "Google token exchange rejected"
            );
            return Err(AuthError::TokenExchangeFailed(format!(
                "token endpoint returned HTTP {status}"
            )));
        }

        let token: GoogleTokenResponse = response
            .json()
            .await
            .map_err(|e| AuthError::TokenExchangeFailed(format!("token payload: {e}")))?;

        // The id_token comes straight from the token endpoint over TLS, so its
        // claims can be read without re-verifying the signature.
        let claims = match token.id_token.as_deref().map(decode_id_token_claims) {
            Some(Ok(claims)) => claims,
            Some(Err(e)) => {
                tracing::debug!(error = %e, "Unreadable id_token, falling back to UserInfo");
                self.fetch_user_info(&token.access_token).await?
            }
            None => self.fetch_user_info(&token.access_token).await?,
        };

        Ok(ProviderTokens {
            expires_at: self.expiry_from(token.expires_in),
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            claims,
        })
    }

    async fn refresh_access_token(&self, refresh_token: &str) -> Result<RefreshedAccessToken> {
        let params = [
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ];

        let response = self
            .http_client
            .post(&self.config.token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| AuthError::RefreshFailed(format!("refresh request: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(
                status = %status,
                body = %truncate(&body),
                "Google token refresh rejected"
            );
            return Err(AuthError::RefreshFailed(format!(
                "token endpoint returned HTTP {status}"
            )));
        }

        let token: GoogleTokenResponse = response
            .json()
            .await
            .map_err(|e| AuthError::RefreshFailed(format!("refresh payload: {e}")))?;

        Ok(RefreshedAccessToken {
            expires_at: self.expiry_from(token.expires_in),
            access_token: token.access_token,
            // Google normally keeps the original refresh token.
            refresh_token: token.refresh_token,
        })
    }

    async fn revoke_token(&self, token: &str) -> Result<()> {
        let response = self
            .http_client
            .post(&self.config.revoke_url)
            .form(&[("token", token)])
            .send()
            .await
            .map_err(|e| AuthError::Internal(format!("revocation request: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::Internal(format!(
                "revocation endpoint returned HTTP {status}"
            )));
        }

        Ok(())
    }
}

fn truncate(body: &str) -> &str {
    match body.char_indices().nth(MAX_LOGGED_BODY) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}

/// Read the payload segment of a compact JWT.
fn decode_id_token_claims(id_token: &str) -> Result<IdentityClaims> {
    let payload = id_token
        .split('.')
        .nth(1)
        .ok_or_else(|| AuthError::Serialization("id_token is not a compact JWT".into()))?;
    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| AuthError::Serialization(format!("id_token payload: {e}")))?;
    let claims: GoogleClaims = serde_json::from_slice(&bytes)
        .map_err(|e| AuthError::Serialization(format!("id_token claims: {e}")))?;
    Ok(claims.into())
}

/// Google's token endpoint response.
#[derive(Debug, Deserialize)]
struct GoogleTokenResponse {
    access_token: String,
    /// Seconds until expiry (typically 3599).
    expires_in: Option<i64>,
    /// Only on the first authorization with `access_type=offline`.
    refresh_token: Option<String>,
    /// Present when the `openid` scope was granted.
    id_token: Option<String>,
}

/// Claims shared by the id_token payload and the UserInfo response.
#[derive(Debug, Deserialize)]
struct GoogleClaims {
    sub: String,
    email: String,
    #[serde(default, deserialize_with = "bool_or_string")]
    email_verified: bool,
    name: Option<String>,
}

impl From<GoogleClaims> for IdentityClaims {
    fn from(claims: GoogleClaims) -> Self {
        Self {
            subject: claims.sub,
            email: claims.email,
            email_verified: claims.email_verified,
            name: claims.name,
        }
    }
}

/// Google has historically sent `email_verified` both as a JSON bool and as
/// the string `"true"`.
fn bool_or_string<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Text(String),
    }

    Ok(match Flag::deserialize(deserializer)? {
        Flag::Bool(b) => b,
        Flag::Text(s) => s.eq_ignore_ascii_case("true"),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::mocks::ManualClock;
    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(base: &str) -> GoogleConfig {
        GoogleConfig::new(
            "test_client_id".to_string(),
            "test_secret".to_string(),
            "http://localhost:3000/auth/google/callback".to_string(),
        )
        .with_base_url(base)
    }

    fn fixed_clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
        ))
    }

    fn id_token(claims: &serde_json::Value) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
        format!("{header}.{payload}.signature")
    }

    #[test]
    fn test_authorization_url() {
        let google = GoogleIdentityProvider::new(config("https://accounts.example.test"));

        let url = google
            .authorization_url("test_state_123", "challenge_abc")
            .unwrap();

        assert!(url.starts_with("https://accounts.example.test/auth?"));
        assert!(url.contains("client_id=test_client_id"));
        assert!(url.contains(
            "redirect_uri=http%3A%2F%2Flocalhost%3A3000%2Fauth%2Fgoogle%2Fcallback"
        ));
        assert!(url.contains("response_type=code"));
        assert!(url.contains("scope=openid+email+profile"));
        assert!(url.contains("state=test_state_123"));
        assert!(url.contains("code_challenge=challenge_abc"));
        assert!(url.contains("code_challenge_method=S256"));
        assert!(url.contains("access_type=offline"));
        assert!(!url.contains("prompt=consent"));
    }

    #[test]
    fn test_authorization_url_is_deterministic() {
        let google = GoogleIdentityProvider::new(config("https://accounts.example.test"))
            .with_force_consent(true);

        let first = google.authorization_url("s", "c").unwrap();
        let second = google.authorization_url("s", "c").unwrap();

        assert_eq!(first, second);
        assert!(first.contains("prompt=consent"));
    }

    #[tokio::test]
    async fn test_exchange_code_reads_id_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=authorization_code"))
            .and(body_string_contains("code_verifier=verifier-xyz"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "ya29.access",
                "expires_in": 3599,
                "refresh_token": "1//refresh",
                "token_type": "Bearer",
                "id_token": id_token(&json!({
                    "sub": "110169484474386276334",
                    "email": "alice@example.com",
                    "email_verified": true,
                    "name": "Alice"
                })),
            })))
            .expect(1)
            .mount(&server)
            .await;

        let clock = fixed_clock();
        let google = GoogleIdentityProvider::new(config(&server.uri())).with_clock(clock.clone());

        let tokens = google.exchange_code("code-1", "verifier-xyz").await.unwrap();

        assert_eq!(tokens.access_token, "ya29.access");
        assert_eq!(tokens.refresh_token.as_deref(), Some("1//refresh"));
        assert_eq!(tokens.expires_at, clock.now() + Duration::seconds(3599));
        assert_eq!(tokens.claims.subject, "110169484474386276334");
        assert!(tokens.claims.email_verified);
    }

    #[tokio::test]
    async fn test_exchange_code_falls_back_to_userinfo() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "ya29.access",
                "token_type": "Bearer",
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/userinfo"))
            .and(header("authorization", "Bearer ya29.access"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "sub": "42",
                "email": "bob@example.com",
                "email_verified": "false",
            })))
            .mount(&server)
            .await;

        let clock = fixed_clock();
        let google = GoogleIdentityProvider::new(config(&server.uri())).with_clock(clock.clone());

        let tokens = google.exchange_code("code", "verifier").await.unwrap();

        assert_eq!(tokens.claims.subject, "42");
        assert!(!tokens.claims.email_verified);
        assert_eq!(tokens.expires_at, clock.now() + Duration::hours(1));
        assert!(tokens.refresh_token.is_none());
    }

    #[tokio::test]
    async fn test_exchange_code_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": "invalid_grant",
                "error_description": "Bad Request"
            })))
            .mount(&server)
            .await;

        let google = GoogleIdentityProvider::new(config(&server.uri()));

        let err = google.exchange_code("stale", "verifier").await.unwrap_err();

        assert!(matches!(err, AuthError::TokenExchangeFailed(_)));
        assert!(!err.to_string().contains("invalid_grant"));
    }

    #[tokio::test]
    async fn test_exchange_code_malformed_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let google = GoogleIdentityProvider::new(config(&server.uri()));

        let err = google.exchange_code("code", "verifier").await.unwrap_err();
        assert!(matches!(err, AuthError::TokenExchangeFailed(_)));
    }

    #[tokio::test]
    async fn test_refresh_access_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "ya29.fresh",
                "expires_in": 1800,
                "token_type": "Bearer",
            })))
            .mount(&server)
            .await;

        let clock = fixed_clock();
        let google = GoogleIdentityProvider::new(config(&server.uri())).with_clock(clock.clone());

        let refreshed = google.refresh_access_token("1//refresh").await.unwrap();

        assert_eq!(refreshed.access_token, "ya29.fresh");
        assert!(refreshed.refresh_token.is_none());
        assert_eq!(refreshed.expires_at, clock.now() + Duration::seconds(1800));
    }

    #[tokio::test]
    async fn test_refresh_failure_maps_to_refresh_failed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let google = GoogleIdentityProvider::new(config(&server.uri()));

        let err = google.refresh_access_token("1//refresh").await.unwrap_err();
        assert!(matches!(err, AuthError::RefreshFailed(_)));
    }

    #[tokio::test]
    async fn test_revoke_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/revoke"))
            .and(body_string_contains("token=ya29.access"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let google = GoogleIdentityProvider::new(config(&server.uri()));

        google.revoke_token("ya29.access").await.unwrap();
    }

    #[tokio::test]
    async fn test_revoke_token_failure_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/revoke"))
            .respond_with(ResponseTemplate::new(400))
            .mount(&server)
            .await;

        let google = GoogleIdentityProvider::new(config(&server.uri()));

        assert!(google.revoke_token("unknown").await.is_err());
    }

    #[test]
    fn test_decode_id_token_rejects_garbage() {
        assert!(decode_id_token_claims("not-a-jwt").is_err());
        assert!(decode_id_token_claims("a.!!!.c").is_err());
    }
}
