//! PostgreSQL account repository.
//!
//! # Example
//!
//! ```no_run
//! use gatekeeper_auth::stores::postgres::PostgresAccountRepository;
//! use sqlx::PgPool;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let pool = PgPool::connect("postgresql://localhost/gatekeeper").await?;
//! let repository = PostgresAccountRepository::new(pool);
//! repository.migrate().await?;
//! # Ok(())
//! # }
//! ```

use crate::error::{AuthError, Result};
use crate::providers::AccountRepository;
use crate::state::{Account, NewOAuthAccount, UserId};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

/// PostgreSQL-backed [`AccountRepository`].
///
/// The `UNIQUE (provider_subject)` constraint decides concurrent sign-ups:
/// the insert uses `ON CONFLICT DO NOTHING` and a missing `RETURNING` row
/// means another request linked the subject first.
#[derive(Clone)]
pub struct PostgresAccountRepository {
    pool: PgPool,
}

impl PostgresAccountRepository {
    /// Create a repository on an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run database migrations.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Storage`] if migrations fail.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AuthError::Storage(format!("Migration failed: {e}")))?;
        Ok(())
    }

    fn account_from_row(row: &PgRow) -> Result<Account> {
        let read = |e: sqlx::Error| AuthError::Storage(format!("Failed to read account row: {e}"));
        Ok(Account {
            user_id: UserId(row.try_get("user_id").map_err(read)?),
            provider_subject: row.try_get("provider_subject").map_err(read)?,
            email: row.try_get("email").map_err(read)?,
            name: row.try_get("name").map_err(read)?,
            created_at: row.try_get("created_at").map_err(read)?,
        })
    }
}

impl AccountRepository for PostgresAccountRepository {
    async fn find_by_provider_subject(&self, subject: &str) -> Result<Option<Account>> {
        let row = sqlx::query(
            r"
            SELECT user_id, provider_subject, email, name, created_at
            FROM accounts
            WHERE provider_subject = $1
            ",
        )
        .bind(subject)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AuthError::Storage(format!("Failed to load account: {e}")))?;

        row.as_ref().map(Self::account_from_row).transpose()
    }

    async fn create_oauth_account(&self, account: &NewOAuthAccount) -> Result<Account> {
        let row = sqlx::query(
            r"
            INSERT INTO accounts (user_id, provider_subject, email, name, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (provider_subject) DO NOTHING
            RETURNING user_id, provider_subject, email, name, created_at
            ",
        )
        .bind(UserId::new().0)
        .bind(&account.provider_subject)
        .bind(&account.email)
        .bind(&account.name)
        .bind(account.created_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AuthError::Storage(format!("Failed to create account: {e}")))?;

        let Some(row) = row else {
            tracing::info!("Account creation lost to an existing link for this subject");
            return Err(AuthError::AccountAlreadyExists);
        };

        let created = Self::account_from_row(&row)?;
        tracing::info!(user_id = %created.user_id.0, "Created account");
        Ok(created)
    }
}
