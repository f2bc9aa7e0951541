//! Session store trait.

use crate::error::Result;
use crate::state::{AuthenticationSession, SessionId, UserId};
use chrono::{DateTime, Utc};

/// Session store.
///
/// System of record for [`AuthenticationSession`]s. No caching in front of
/// it: a deleted session must stop validating on the very next request.
///
/// # Implementation Notes
///
/// - `create` rejects an existing id with `AuthError::DuplicateSession`
/// - `update_activity` is last-writer-wins but never moves the timestamp back
/// - `extend_and_rotate` checks existence and expiry in the same atomic unit
///   as the write, so it cannot apply after a concurrent `delete`
/// - `delete` is idempotent
pub trait SessionStore: Send + Sync {
    /// Insert a new session.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Session ID already exists → `AuthError::DuplicateSession`
    /// - Backend fails
    fn create(
        &self,
        session: &AuthenticationSession,
    ) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Load a session by id.
    ///
    /// Expired sessions are returned as-is; the caller decides what to do.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Session not found → `AuthError::SessionNotFound`
    /// - Backend fails
    fn find_by_id(
        &self,
        session_id: SessionId,
    ) -> impl std::future::Future<Output = Result<AuthenticationSession>> + Send;

    /// All sessions owned by a user.
    ///
    /// # Errors
    ///
    /// Returns error if the backend fails.
    fn find_by_user_id(
        &self,
        user_id: UserId,
    ) -> impl std::future::Future<Output = Result<Vec<AuthenticationSession>>> + Send;

    /// Map a provider access or refresh token back to its session.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - No session holds the token → `AuthError::SessionNotFound`
    /// - Backend fails
    fn find_by_provider_token(
        &self,
        token: &str,
    ) -> impl std::future::Future<Output = Result<AuthenticationSession>> + Send;

    /// Touch `last_activity_at`.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Session not found → `AuthError::SessionNotFound`
    /// - Backend fails
    fn update_activity(
        &self,
        session_id: SessionId,
        at: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Atomically replace the provider tokens and the signed session token.
    ///
    /// `session_expires_at` is never changed.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Session not found → `AuthError::SessionNotFound`
    /// - `now > session_expires_at` → `AuthError::SessionExpired` (nothing written)
    /// - Backend fails
    #[allow(clippy::too_many_arguments)]
    fn extend_and_rotate(
        &self,
        session_id: SessionId,
        access_token: &str,
        refresh_token: Option<&str>,
        token_expires_at: DateTime<Utc>,
        session_token: &str,
        now: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<AuthenticationSession>> + Send;

    /// Delete a session. Deleting a missing session succeeds.
    ///
    /// # Errors
    ///
    /// Returns error if the backend fails.
    fn delete(
        &self,
        session_id: SessionId,
    ) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Delete every session of a user.
    ///
    /// # Returns
    ///
    /// Number of sessions deleted.
    ///
    /// # Errors
    ///
    /// Returns error if the backend fails.
    fn delete_by_user_id(
        &self,
        user_id: UserId,
    ) -> impl std::future::Future<Output = Result<usize>> + Send;

    /// Delete sessions with `now > session_expires_at`.
    ///
    /// # Returns
    ///
    /// Number of sessions deleted.
    ///
    /// # Errors
    ///
    /// Returns error if the backend fails.
    fn delete_expired(
        &self,
        now: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<usize>> + Send;
}
