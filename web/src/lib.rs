//! Axum glue shared by Gatekeeper's HTTP handlers.
//!
//! Handlers stay thin: extract request data, call into the domain service,
//! map the outcome to a response. This crate holds the pieces every handler
//! needs for that:
//!
//! - [`AppError`]: JSON error body plus status, with `Retry-After` for 429s
//! - extractors: [`CorrelationId`], [`ClientIp`], [`UserAgent`], [`BearerToken`]
//! - [`correlation_id_layer`]: request span + `X-Correlation-ID` echo

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod extractors;
pub mod middleware;

pub use error::AppError;
pub use extractors::{BearerToken, ClientIp, CorrelationId, TrustForwardedHeaders, UserAgent};
pub use middleware::{CORRELATION_ID_HEADER, CorrelationIdExt, correlation_id_layer};

/// Result type alias for web handlers.
pub type WebResult<T> = Result<T, AppError>;
