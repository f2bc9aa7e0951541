//! OAuth state persistence trait.

use crate::error::Result;
use crate::state::OAuthStateRecord;
use chrono::{DateTime, Utc};

/// Keyed storage for in-flight OAuth state records.
///
/// # Implementation Notes
///
/// - `take` must be an atomic get-and-delete (Redis `GETDEL`, a single
///   locked map removal, `DELETE ... RETURNING`). Two concurrent calls with
///   the same token must never both return the record.
/// - Expiry is decided by the caller; `take` returns expired records too.
pub trait StateRepository: Send + Sync {
    /// Insert a new record.
    ///
    /// # Errors
    ///
    /// Returns error if the backend fails.
    fn insert(
        &self,
        record: &OAuthStateRecord,
    ) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Atomically remove and return the record for `state_token`.
    ///
    /// # Returns
    ///
    /// `None` if the token never existed or was already taken.
    ///
    /// # Errors
    ///
    /// Returns error if the backend fails.
    fn take(
        &self,
        state_token: &str,
    ) -> impl std::future::Future<Output = Result<Option<OAuthStateRecord>>> + Send;

    /// Remove records with `expires_at < now`.
    ///
    /// # Returns
    ///
    /// Number of records removed.
    ///
    /// # Errors
    ///
    /// Returns error if the backend fails.
    fn delete_expired(
        &self,
        now: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<usize>> + Send;
}
