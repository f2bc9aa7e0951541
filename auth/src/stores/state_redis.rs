//! Redis-based OAuth state repository.
//!
//! # Architecture
//!
//! - **Key**: `oauth_state:{state_token}` → bincode-serialized [`OAuthStateRecord`]
//! - **TTL**: record lifetime plus one minute, so a slightly late callback still
//!   finds the record and is reported as expired rather than unknown
//! - **Atomic take**: `GETDEL`, so two callbacks racing on one token cannot
//!   both receive the record
//!
//! # Example
//!
//! ```no_run
//! use gatekeeper_auth::stores::RedisStateRepository;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let repository = RedisStateRepository::new("redis://127.0.0.1:6379").await?;
//! # Ok(())
//! # }
//! ```

use crate::config::STATE_TTL_SKEW;
use crate::error::{AuthError, Result};
use crate::providers::StateRepository;
use crate::state::OAuthStateRecord;
use chrono::{DateTime, Utc};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};

/// Redis-backed [`StateRepository`].
#[derive(Clone)]
pub struct RedisStateRepository {
    conn_manager: ConnectionManager,
}

impl RedisStateRepository {
    /// Connect to Redis.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Storage`] if the connection fails.
    pub async fn new(redis_url: &str) -> Result<Self> {
        let client = Client::open(redis_url)
            .map_err(|e| AuthError::Storage(format!("Failed to create Redis client: {e}")))?;

        let conn_manager = ConnectionManager::new(client).await.map_err(|e| {
            AuthError::Storage(format!("Failed to create Redis connection manager: {e}"))
        })?;

        Ok(Self { conn_manager })
    }

    fn state_key(state_token: &str) -> String {
        format!("oauth_state:{state_token}")
    }
}

impl StateRepository for RedisStateRepository {
    async fn insert(&self, record: &OAuthStateRecord) -> Result<()> {
        let mut conn = self.conn_manager.clone();
        let key = Self::state_key(&record.state_token);

        let bytes =
            bincode::serialize(record).map_err(|e| AuthError::Serialization(e.to_string()))?;

        let ttl = (record.expires_at - record.created_at) + STATE_TTL_SKEW;
        #[allow(clippy::cast_sign_loss)]
        let ttl_seconds = ttl.num_seconds().max(1) as u64;

        // SET NX: a colliding token must not overwrite an in-flight flow.
        let reply: Option<String> = redis::cmd("SET")
            .arg(&key)
            .arg(bytes)
            .arg("NX")
            .arg("EX")
            .arg(ttl_seconds)
            .query_async(&mut conn)
            .await
            .map_err(|e| AuthError::Storage(format!("Failed to store OAuth state: {e}")))?;

        if reply.is_none() {
            return Err(AuthError::Internal("OAuth state token collision".into()));
        }

        tracing::debug!(ttl_seconds, "Stored OAuth state in Redis");
        Ok(())
    }

    async fn take(&self, state_token: &str) -> Result<Option<OAuthStateRecord>> {
        let mut conn = self.conn_manager.clone();
        let key = Self::state_key(state_token);

        let bytes: Option<Vec<u8>> = conn
            .get_del(&key)
            .await
            .map_err(|e| AuthError::Storage(format!("Failed to consume OAuth state: {e}")))?;

        bytes
            .map(|bytes| {
                bincode::deserialize(&bytes).map_err(|e| AuthError::Serialization(e.to_string()))
            })
            .transpose()
    }

    async fn delete_expired(&self, _now: DateTime<Utc>) -> Result<usize> {
        // Key TTLs already bound every record's lifetime.
        Ok(0)
    }
}
