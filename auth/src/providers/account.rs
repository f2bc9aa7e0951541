//! Account repository trait.

use crate::error::Result;
use crate::state::{Account, NewOAuthAccount};

/// Accounts keyed by provider subject.
///
/// The subject column carries a unique constraint. That constraint, not a
/// prior lookup, decides which of two concurrent sign-ups wins.
pub trait AccountRepository: Send + Sync {
    /// Find the account linked to a provider subject.
    ///
    /// # Errors
    ///
    /// Returns error if the backend fails.
    fn find_by_provider_subject(
        &self,
        subject: &str,
    ) -> impl std::future::Future<Output = Result<Option<Account>>> + Send;

    /// Create an account.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Subject already linked → `AuthError::AccountAlreadyExists`
    /// - Backend fails
    fn create_oauth_account(
        &self,
        account: &NewOAuthAccount,
    ) -> impl std::future::Future<Output = Result<Account>> + Send;
}
