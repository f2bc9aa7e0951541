//! In-memory stores.
//!
//! Each store is a single `Mutex`-guarded map, so every operation (including
//! the atomic take and the check-then-write of `extend_and_rotate`) happens
//! under one lock. Clones share the same map.
//!
//! Suitable for tests and single-process deployments. State is lost on
//! restart.

use crate::error::{AuthError, Result};
use crate::providers::{AccountRepository, SessionStore, StateRepository};
use crate::state::{
    Account, AuthenticationSession, NewOAuthAccount, OAuthStateRecord, SessionId, UserId,
};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

fn poisoned(store: &str) -> AuthError {
    AuthError::Storage(format!("{store} lock poisoned"))
}

// ═══════════════════════════════════════════════════════════════════════
// OAuth state
// ═══════════════════════════════════════════════════════════════════════

/// In-memory OAuth state records.
#[derive(Debug, Clone, Default)]
pub struct MemoryStateRepository {
    records: Arc<Mutex<HashMap<String, OAuthStateRecord>>>,
}

impl MemoryStateRepository {
    /// Create an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records, expired or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.lock().map_or(0, |r| r.len())
    }

    /// `true` when nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, OAuthStateRecord>>> {
        self.records.lock().map_err(|_| poisoned("state repository"))
    }
}

impl StateRepository for MemoryStateRepository {
    async fn insert(&self, record: &OAuthStateRecord) -> Result<()> {
        self.lock()?
            .insert(record.state_token.clone(), record.clone());
        Ok(())
    }

    async fn take(&self, state_token: &str) -> Result<Option<OAuthStateRecord>> {
        Ok(self.lock()?.remove(state_token))
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut records = self.lock()?;
        let before = records.len();
        records.retain(|_, record| !record.is_expired_at(now));
        Ok(before - records.len())
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Sessions
// ═══════════════════════════════════════════════════════════════════════

/// In-memory session store.
#[derive(Debug, Clone, Default)]
pub struct MemorySessionStore {
    sessions: Arc<Mutex<HashMap<SessionId, AuthenticationSession>>>,
}

impl MemorySessionStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored sessions, expired or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.lock().map_or(0, |s| s.len())
    }

    /// `true` when nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<SessionId, AuthenticationSession>>> {
        self.sessions.lock().map_err(|_| poisoned("session store"))
    }
}

impl SessionStore for MemorySessionStore {
    async fn create(&self, session: &AuthenticationSession) -> Result<()> {
        let mut sessions = self.lock()?;
        if sessions.contains_key(&session.session_id) {
            return Err(AuthError::DuplicateSession);
        }
        sessions.insert(session.session_id, session.clone());
        Ok(())
    }

    async fn find_by_id(&self, session_id: SessionId) -> Result<AuthenticationSession> {
        self.lock()?
            .get(&session_id)
            .cloned()
            .ok_or(AuthError::SessionNotFound)
    }

    async fn find_by_user_id(&self, user_id: UserId) -> Result<Vec<AuthenticationSession>> {
        let mut found: Vec<_> = self
            .lock()?
            .values()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect();
        found.sort_by_key(|s| s.created_at);
        Ok(found)
    }

    async fn find_by_provider_token(&self, token: &str) -> Result<AuthenticationSession> {
        if token.is_empty() {
            return Err(AuthError::SessionNotFound);
        }
        self.lock()?
            .values()
            .find(|s| s.holds_provider_token(token))
            .cloned()
            .ok_or(AuthError::SessionNotFound)
    }

    async fn update_activity(&self, session_id: SessionId, at: DateTime<Utc>) -> Result<()> {
        let mut sessions = self.lock()?;
        let session = sessions
            .get_mut(&session_id)
            .ok_or(AuthError::SessionNotFound)?;
        session.last_activity_at = session.last_activity_at.max(at);
        Ok(())
    }

    async fn extend_and_rotate(
        &self,
        session_id: SessionId,
        access_token: &str,
        refresh_token: Option<&str>,
        token_expires_at: DateTime<Utc>,
        session_token: &str,
        now: DateTime<Utc>,
    ) -> Result<AuthenticationSession> {
        let mut sessions = self.lock()?;
        let session = sessions
            .get_mut(&session_id)
            .ok_or(AuthError::SessionNotFound)?;

        if session.is_expired_at(now) {
            return Err(AuthError::SessionExpired);
        }

        session.access_token = access_token.to_string();
        if let Some(refresh_token) = refresh_token {
            session.refresh_token = Some(refresh_token.to_string());
        }
        session.token_expires_at = Some(token_expires_at);
        session.session_token = session_token.to_string();
        Ok(session.clone())
    }

    async fn delete(&self, session_id: SessionId) -> Result<()> {
        self.lock()?.remove(&session_id);
        Ok(())
    }

    async fn delete_by_user_id(&self, user_id: UserId) -> Result<usize> {
        let mut sessions = self.lock()?;
        let before = sessions.len();
        sessions.retain(|_, s| s.user_id != user_id);
        Ok(before - sessions.len())
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut sessions = self.lock()?;
        let before = sessions.len();
        sessions.retain(|_, s| !s.is_expired_at(now));
        Ok(before - sessions.len())
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Accounts
// ═══════════════════════════════════════════════════════════════════════

/// In-memory accounts keyed by provider subject.
#[derive(Debug, Clone, Default)]
pub struct MemoryAccountRepository {
    accounts: Arc<Mutex<HashMap<String, Account>>>,
}

impl MemoryAccountRepository {
    /// Create an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of accounts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.accounts.lock().map_or(0, |a| a.len())
    }

    /// `true` when there are no accounts.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AccountRepository for MemoryAccountRepository {
    async fn find_by_provider_subject(&self, subject: &str) -> Result<Option<Account>> {
        let accounts = self
            .accounts
            .lock()
            .map_err(|_| poisoned("account repository"))?;
        Ok(accounts.get(subject).cloned())
    }

    async fn create_oauth_account(&self, account: &NewOAuthAccount) -> Result<Account> {
        let mut accounts = self
            .accounts
            .lock()
            .map_err(|_| poisoned("account repository"))?;

        if accounts.contains_key(&account.provider_subject) {
            return Err(AuthError::AccountAlreadyExists);
        }

        let created = Account {
            user_id: UserId::new(),
            provider_subject: account.provider_subject.clone(),
            email: account.email.clone(),
            name: account.name.clone(),
            created_at: account.created_at,
        };
        accounts.insert(account.provider_subject.clone(), created.clone());
        Ok(created)
    }
}
