//! Custom Axum extractors.
//!
//! - `CorrelationId`: Extract or generate request correlation IDs
//! - `ClientIp`: Extract client IP address from the connection, or from
//!   proxy headers when [`TrustForwardedHeaders`] is installed
//! - `UserAgent`: Extract User-Agent header
//! - `BearerToken`: Extract the token from `Authorization: Bearer <token>`
//!
//! # Examples
//!
//! ```ignore
//! async fn handler(
//!     correlation_id: CorrelationId,
//!     client_ip: ClientIp,
//!     bearer: Option<BearerToken>,
//! ) -> Result<Json<Response>, AppError> {
//!     tracing::info!(
//!         correlation_id = %correlation_id.0,
//!         client_ip = %client_ip.0,
//!         has_bearer = bearer.is_some(),
//!         "Processing request"
//!     );
//!     Ok(Json(response))
//! }
//! ```

use crate::error::AppError;
use axum::{
    async_trait,
    extract::{ConnectInfo, FromRequestParts},
    http::{HeaderMap, header, request::Parts},
};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use uuid::Uuid;

/// Correlation ID for request tracing.
///
/// Reads the ID stored by the correlation-id middleware, then the
/// `X-Correlation-ID` header, and generates a new UUID v4 otherwise.
#[derive(Debug, Clone, Copy)]
pub struct CorrelationId(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for CorrelationId
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(id) = parts.extensions.get::<Uuid>() {
            return Ok(Self(*id));
        }

        let correlation_id = parts
            .headers
            .get(crate::middleware::CORRELATION_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| Uuid::parse_str(s).ok())
            .unwrap_or_else(Uuid::new_v4);

        Ok(Self(correlation_id))
    }
}

/// Marker that lets [`ClientIp`] read forwarding headers.
///
/// Insert it with `axum::Extension(TrustForwardedHeaders)` only when every
/// request arrives through a reverse proxy that overwrites `X-Forwarded-For`
/// and `X-Real-IP`. Without it those headers are client-controlled and are
/// ignored.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrustForwardedHeaders;

/// Client IP address.
///
/// # Priority
///
/// 1. With [`TrustForwardedHeaders`] present: the last `X-Forwarded-For`
///    entry (the one the proxy appended), then `X-Real-IP`
/// 2. Connection IP from `ConnectInfo`, when the server was started with it
/// 3. `127.0.0.1`
#[derive(Debug, Clone, Copy)]
pub struct ClientIp(pub IpAddr);

#[async_trait]
impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let trust_forwarded = parts.extensions.get::<TrustForwardedHeaders>().is_some();
        let ip = extract_client_ip(&parts.headers, parts.extensions.get(), trust_forwarded);

        Ok(Self(ip))
    }
}

fn extract_client_ip(
    headers: &HeaderMap,
    connect_info: Option<&ConnectInfo<SocketAddr>>,
    trust_forwarded: bool,
) -> IpAddr {
    if trust_forwarded {
        let forwarded = headers
            .get("X-Forwarded-For")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.rsplit(',').next())
            .and_then(|last| last.trim().parse::<IpAddr>().ok());
        if let Some(ip) = forwarded {
            return ip;
        }

        let real_ip = headers
            .get("X-Real-IP")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<IpAddr>().ok());
        if let Some(ip) = real_ip {
            return ip;
        }
    }

    connect_info.map_or(IpAddr::V4(Ipv4Addr::LOCALHOST), |info| info.0.ip())
}

/// User-Agent header, or `"Unknown"` if not present.
#[derive(Debug, Clone)]
pub struct UserAgent(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for UserAgent
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_agent = parts
            .headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("Unknown")
            .to_string();

        Ok(Self(user_agent))
    }
}

/// Bearer token from the `Authorization` header.
///
/// Rejects with 401 when the header is missing, not a bearer credential, or
/// empty. Use `Option<BearerToken>` when another credential source (such as a
/// cookie) is acceptable.
#[derive(Clone)]
pub struct BearerToken(pub String);

impl std::fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("BearerToken").field(&"<redacted>").finish()
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for BearerToken
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::unauthorized("Missing authorization header"))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .map(str::trim)
            .ok_or_else(|| AppError::unauthorized("Expected 'Bearer <token>'"))?;

        if token.is_empty() {
            return Err(AppError::unauthorized("Empty bearer token"));
        }

        Ok(Self(token.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::http::{Request, StatusCode};

    fn parts(builder: axum::http::request::Builder) -> Parts {
        builder.body(()).expect("Valid request").into_parts().0
    }

    #[tokio::test]
    async fn test_correlation_id_from_header() {
        let uuid = Uuid::new_v4();
        let mut parts = parts(Request::builder().header("X-Correlation-ID", uuid.to_string()));

        let correlation_id = CorrelationId::from_request_parts(&mut parts, &())
            .await
            .unwrap();

        assert_eq!(correlation_id.0, uuid);
    }

    #[tokio::test]
    async fn test_correlation_id_prefers_extension() {
        let from_layer = Uuid::new_v4();
        let mut parts = parts(Request::builder().header("X-Correlation-ID", Uuid::new_v4().to_string()));
        parts.extensions.insert(from_layer);

        let correlation_id = CorrelationId::from_request_parts(&mut parts, &())
            .await
            .unwrap();

        assert_eq!(correlation_id.0, from_layer);
    }

    #[tokio::test]
    async fn test_client_ip_ignores_forwarding_headers_by_default() {
        let mut parts = parts(
            Request::builder()
                .header("X-Forwarded-For", "203.0.113.1")
                .header("X-Real-IP", "203.0.113.2"),
        );
        parts
            .extensions
            .insert(ConnectInfo(SocketAddr::from(([192, 0, 2, 7], 41000))));

        let client_ip = ClientIp::from_request_parts(&mut parts, &()).await.unwrap();

        assert_eq!(client_ip.0.to_string(), "192.0.2.7");
    }

    #[tokio::test]
    async fn test_client_ip_from_trusted_x_forwarded_for() {
        let mut parts = parts(Request::builder().header("X-Forwarded-For", "203.0.113.1, 198.51.100.1"));
        parts.extensions.insert(TrustForwardedHeaders);

        let client_ip = ClientIp::from_request_parts(&mut parts, &()).await.unwrap();

        assert_eq!(client_ip.0.to_string(), "198.51.100.1");
    }

    #[tokio::test]
    async fn test_client_ip_from_trusted_x_real_ip() {
        let mut parts = parts(Request::builder().header("X-Real-IP", "203.0.113.2"));
        parts.extensions.insert(TrustForwardedHeaders);

        let client_ip = ClientIp::from_request_parts(&mut parts, &()).await.unwrap();

        assert_eq!(client_ip.0.to_string(), "203.0.113.2");
    }

    #[tokio::test]
    async fn test_client_ip_from_connect_info() {
        let mut parts = parts(Request::builder());
        parts
            .extensions
            .insert(ConnectInfo(SocketAddr::from(([192, 0, 2, 7], 41000))));

        let client_ip = ClientIp::from_request_parts(&mut parts, &()).await.unwrap();

        assert_eq!(client_ip.0.to_string(), "192.0.2.7");
    }

    #[tokio::test]
    async fn test_client_ip_fallback() {
        let mut parts = parts(Request::builder());

        let client_ip = ClientIp::from_request_parts(&mut parts, &()).await.unwrap();

        assert_eq!(client_ip.0.to_string(), "127.0.0.1");
    }

    #[tokio::test]
    async fn test_user_agent_fallback() {
        let mut parts = parts(Request::builder());

        let user_agent = UserAgent::from_request_parts(&mut parts, &()).await.unwrap();

        assert_eq!(user_agent.0, "Unknown");
    }

    #[tokio::test]
    async fn test_bearer_token() {
        let mut parts = parts(Request::builder().header("Authorization", "Bearer abc.def.ghi"));

        let bearer = BearerToken::from_request_parts(&mut parts, &()).await.unwrap();

        assert_eq!(bearer.0, "abc.def.ghi");
        assert!(!format!("{bearer:?}").contains("abc"));
    }

    #[tokio::test]
    async fn test_bearer_token_rejects_other_schemes() {
        let mut parts = parts(Request::builder().header("Authorization", "Basic dXNlcjpwdw=="));

        let err = BearerToken::from_request_parts(&mut parts, &())
            .await
            .unwrap_err();

        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_bearer_token_rejects_empty() {
        let mut parts = parts(Request::builder().header("Authorization", "Bearer   "));

        assert!(BearerToken::from_request_parts(&mut parts, &()).await.is_err());
    }
}
