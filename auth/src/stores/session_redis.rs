//! Redis-based session store.
//!
//! # Architecture
//!
//! Each session is a hash at `session:{session_id}`:
//!
//! | Field | Contents |
//! |---|---|
//! | `record` | JSON-serialized [`AuthenticationSession`] |
//! | `session_id` | session id |
//! | `expires_at_ms` | `session_expires_at` in epoch milliseconds (immutable) |
//! | `last_activity_ms` | last activity in epoch milliseconds |
//! | `user_set` | key of the owner's session set |
//! | `access_index`, `refresh_index` | keys of the provider-token index entries |
//!
//! Secondary keys:
//!
//! - `user:{user_id}:sessions` (Set) → session ids of a user
//! - `provider_token:{sha256(token)}` → session id, for revocation lookups
//! - `sessions:by_expiry` (Sorted Set) → session ids scored by expiry, for the sweep
//!
//! Every mutation that touches more than one key is a Lua script, so the
//! indexes never disagree with the hash and `extend_and_rotate` checks
//! existence and expiry in the same atomic unit as its write.
//!
//! Keys carry a TTL of one hour past the session expiry. Until then an
//! expired session is still visible, so validation can report it as expired
//! and delete it.
//!
//! # Example
//!
//! ```no_run
//! use gatekeeper_auth::stores::RedisSessionStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = RedisSessionStore::new("redis://127.0.0.1:6379").await?;
//! # Ok(())
//! # }
//! ```

use crate::error::{AuthError, Result};
use crate::providers::SessionStore;
use crate::state::{AuthenticationSession, SessionId, UserId};
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, Script};
use sha2::{Digest, Sha256};

const EXPIRY_KEY: &str = "sessions:by_expiry";

/// How long keys outlive the session they belong to.
const KEY_GRACE: Duration = Duration::hours(1);

/// Removes one session hash with its index entries. Returns 1 if the hash existed.
const DELETE_SESSION_FN: &str = r"
local function delete_session(key)
    local f = redis.call('HMGET', key, 'access_index', 'refresh_index', 'user_set', 'session_id')
    if not f[4] then
        return 0
    end
    if f[1] then redis.call('DEL', f[1]) end
    if f[2] then redis.call('DEL', f[2]) end
    if f[3] then redis.call('SREM', f[3], f[4]) end
    redis.call('ZREM', 'sessions:by_expiry', f[4])
    redis.call('DEL', key)
    return 1
end
";

// KEYS[1] session, KEYS[2] user set, KEYS[3] expiry zset
// ARGV: record, session_id, expires_at_ms, last_activity_ms, key_expire_at_ms,
//       access_index ('' = none), refresh_index ('' = none)
const CREATE_SCRIPT: &str = r"
if redis.call('EXISTS', KEYS[1]) == 1 then
    return 0
end
redis.call('HSET', KEYS[1],
    'record', ARGV[1],
    'session_id', ARGV[2],
    'expires_at_ms', ARGV[3],
    'last_activity_ms', ARGV[4],
    'user_set', KEYS[2])
if ARGV[6] ~= '' then
    redis.call('HSET', KEYS[1], 'access_index', ARGV[6])
    redis.call('SET', ARGV[6], ARGV[2], 'PXAT', ARGV[5])
end
if ARGV[7] ~= '' then
    redis.call('HSET', KEYS[1], 'refresh_index', ARGV[7])
    redis.call('SET', ARGV[7], ARGV[2], 'PXAT', ARGV[5])
end
redis.call('PEXPIREAT', KEYS[1], ARGV[5])
redis.call('SADD', KEYS[2], ARGV[2])
redis.call('ZADD', KEYS[3], ARGV[3], ARGV[2])
return 1
";

// KEYS[1] session; ARGV[1] activity ms
const TOUCH_SCRIPT: &str = r"
local current = redis.call('HGET', KEYS[1], 'last_activity_ms')
if not current then
    return 0
end
if tonumber(ARGV[1]) > tonumber(current) then
    redis.call('HSET', KEYS[1], 'last_activity_ms', ARGV[1])
end
return 1
";

// KEYS[1] session
// ARGV: now_ms, access_token, refresh_token ('' = keep), token_expires_at,
//       session_token, access_index, refresh_index ('' = keep)
const ROTATE_SCRIPT: &str = r"
local f = redis.call('HMGET', KEYS[1], 'record', 'expires_at_ms', 'session_id', 'access_index', 'refresh_index')
if not f[1] then
    return {'not_found'}
end
if tonumber(ARGV[1]) > tonumber(f[2]) then
    return {'expired'}
end
local ttl_ms = redis.call('PTTL', KEYS[1])
local record = cjson.decode(f[1])
record['access_token'] = ARGV[2]
record['token_expires_at'] = ARGV[4]
record['session_token'] = ARGV[5]
if f[4] then redis.call('DEL', f[4]) end
redis.call('SET', ARGV[6], f[3], 'PX', ttl_ms)
redis.call('HSET', KEYS[1], 'access_index', ARGV[6])
if ARGV[3] ~= '' then
    record['refresh_token'] = ARGV[3]
    if f[5] then redis.call('DEL', f[5]) end
    redis.call('SET', ARGV[7], f[3], 'PX', ttl_ms)
    redis.call('HSET', KEYS[1], 'refresh_index', ARGV[7])
end
local encoded = cjson.encode(record)
redis.call('HSET', KEYS[1], 'record', encoded)
return {'ok', encoded, redis.call('HGET', KEYS[1], 'last_activity_ms')}
";

// KEYS[1] session
const DELETE_BODY: &str = r"
return delete_session(KEYS[1])
";

// KEYS[1] user set
const DELETE_USER_BODY: &str = r"
local deleted = 0
for _, session_id in ipairs(redis.call('SMEMBERS', KEYS[1])) do
    deleted = deleted + delete_session('session:' .. session_id)
end
redis.call('DEL', KEYS[1])
return deleted
";

// KEYS[1] expiry zset; ARGV[1] now_ms
const DELETE_EXPIRED_BODY: &str = r"
local deleted = 0
for _, session_id in ipairs(redis.call('ZRANGEBYSCORE', KEYS[1], '-inf', '(' .. ARGV[1])) do
    deleted = deleted + delete_session('session:' .. session_id)
    redis.call('ZREM', KEYS[1], session_id)
end
return deleted
";

/// Redis-backed [`SessionStore`].
#[derive(Clone)]
pub struct RedisSessionStore {
    conn_manager: ConnectionManager,
    create: Script,
    touch: Script,
    rotate: Script,
    delete: Script,
    delete_user: Script,
    delete_expired: Script,
}

impl RedisSessionStore {
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

        Ok(Self {
            conn_manager,
            create: Script::new(CREATE_SCRIPT),
            touch: Script::new(TOUCH_SCRIPT),
            rotate: Script::new(ROTATE_SCRIPT),
            delete: Script::new(&format!("{DELETE_SESSION_FN}{DELETE_BODY}")),
            delete_user: Script::new(&format!("{DELETE_SESSION_FN}{DELETE_USER_BODY}")),
            delete_expired: Script::new(&format!("{DELETE_SESSION_FN}{DELETE_EXPIRED_BODY}")),
        })
    }

    fn session_key(session_id: SessionId) -> String {
        format!("session:{}", session_id.0)
    }

    fn user_sessions_key(user_id: UserId) -> String {
        format!("user:{}:sessions", user_id.0)
    }

    /// Index key for a provider token. Tokens are hashed so they never appear
    /// in key names.
    fn provider_token_key(token: &str) -> String {
        format!("provider_token:{:x}", Sha256::digest(token.as_bytes()))
    }

    fn decode(record: &str, last_activity_ms: Option<&str>) -> Result<AuthenticationSession> {
        let mut session: AuthenticationSession =
            serde_json::from_str(record).map_err(|e| AuthError::Serialization(e.to_string()))?;

        let touched = last_activity_ms
            .and_then(|ms| ms.parse::<i64>().ok())
            .and_then(DateTime::from_timestamp_millis);
        if let Some(touched) = touched {
            session.last_activity_at = session.last_activity_at.max(touched);
        }
        Ok(session)
    }

    fn storage_error(context: &str, e: &redis::RedisError) -> AuthError {
        AuthError::Storage(format!("{context}: {e}"))
    }
}

impl SessionStore for RedisSessionStore {
    async fn create(&self, session: &AuthenticationSession) -> Result<()> {
        let mut conn = self.conn_manager.clone();

        let record =
            serde_json::to_string(session).map_err(|e| AuthError::Serialization(e.to_string()))?;
        let key_expire_at_ms = (session.session_expires_at + KEY_GRACE).timestamp_millis();
        let access_index = if session.access_token.is_empty() {
            String::new()
        } else {
            Self::provider_token_key(&session.access_token)
        };
        let refresh_index = session
            .refresh_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .map(Self::provider_token_key)
            .unwrap_or_default();

        let created: i64 = self
            .create
            .key(Self::session_key(session.session_id))
            .key(Self::user_sessions_key(session.user_id))
            .key(EXPIRY_KEY)
            .arg(record)
            .arg(session.session_id.0.to_string())
            .arg(session.session_expires_at.timestamp_millis())
            .arg(session.last_activity_at.timestamp_millis())
            .arg(key_expire_at_ms)
            .arg(access_index)
            .arg(refresh_index)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| Self::storage_error("Failed to create session", &e))?;

        if created == 0 {
            return Err(AuthError::DuplicateSession);
        }

        tracing::info!(
            session_id = %session.session_id.0,
            user_id = %session.user_id.0,
            expires_at = %session.session_expires_at,
            "Created session in Redis"
        );
        Ok(())
    }

    async fn find_by_id(&self, session_id: SessionId) -> Result<AuthenticationSession> {
        let mut conn = self.conn_manager.clone();

        let (record, last_activity): (Option<String>, Option<String>) = conn
            .hget(
                Self::session_key(session_id),
                &["record", "last_activity_ms"],
            )
            .await
            .map_err(|e| Self::storage_error("Failed to load session", &e))?;

        let record = record.ok_or(AuthError::SessionNotFound)?;
        Self::decode(&record, last_activity.as_deref())
    }

    async fn find_by_user_id(&self, user_id: UserId) -> Result<Vec<AuthenticationSession>> {
        let mut conn = self.conn_manager.clone();
        let user_key = Self::user_sessions_key(user_id);

        let ids: Vec<String> = conn
            .smembers(&user_key)
            .await
            .map_err(|e| Self::storage_error("Failed to list user sessions", &e))?;

        let mut sessions = Vec::with_capacity(ids.len());
        for id in ids {
            let Ok(uuid) = uuid::Uuid::parse_str(&id) else {
                continue;
            };
            match self.find_by_id(SessionId(uuid)).await {
                Ok(session) => sessions.push(session),
                Err(AuthError::SessionNotFound) => {
                    // Hash expired by TTL; drop the stale member.
                    let _: () = conn
                        .srem(&user_key, &id)
                        .await
                        .map_err(|e| Self::storage_error("Failed to prune user sessions", &e))?;
                }
                Err(e) => return Err(e),
            }
        }
        sessions.sort_by_key(|s| s.created_at);
        Ok(sessions)
    }

    async fn find_by_provider_token(&self, token: &str) -> Result<AuthenticationSession> {
        if token.is_empty() {
            return Err(AuthError::SessionNotFound);
        }
        let mut conn = self.conn_manager.clone();

        let id: Option<String> = conn
            .get(Self::provider_token_key(token))
            .await
            .map_err(|e| Self::storage_error("Failed to look up provider token", &e))?;

        let uuid = id
            .and_then(|id| uuid::Uuid::parse_str(&id).ok())
            .ok_or(AuthError::SessionNotFound)?;

        let session = self.find_by_id(SessionId(uuid)).await?;
        if session.holds_provider_token(token) {
            Ok(session)
        } else {
            Err(AuthError::SessionNotFound)
        }
    }

    async fn update_activity(&self, session_id: SessionId, at: DateTime<Utc>) -> Result<()> {
        let mut conn = self.conn_manager.clone();

        let found: i64 = self
            .touch
            .key(Self::session_key(session_id))
            .arg(at.timestamp_millis())
            .invoke_async(&mut conn)
            .await
            .map_err(|e| Self::storage_error("Failed to update session activity", &e))?;

        if found == 0 {
            return Err(AuthError::SessionNotFound);
        }
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
        let mut conn = self.conn_manager.clone();
        let refresh_token = refresh_token.filter(|t| !t.is_empty());

        let reply: Vec<String> = self
            .rotate
            .key(Self::session_key(session_id))
            .arg(now.timestamp_millis())
            .arg(access_token)
            .arg(refresh_token.unwrap_or_default())
            .arg(token_expires_at.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            .arg(session_token)
            .arg(Self::provider_token_key(access_token))
            .arg(refresh_token.map(Self::provider_token_key).unwrap_or_default())
            .invoke_async(&mut conn)
            .await
            .map_err(|e| Self::storage_error("Failed to rotate session tokens", &e))?;

        match reply.first().map(String::as_str) {
            Some("ok") => {
                let record = reply.get(1).ok_or_else(|| {
                    AuthError::Storage("rotate script returned no record".into())
                })?;
                let session = Self::decode(record, reply.get(2).map(String::as_str))?;
                tracing::info!(session_id = %session_id.0, "Rotated session tokens in Redis");
                Ok(session)
            }
            Some("expired") => Err(AuthError::SessionExpired),
            Some("not_found") => Err(AuthError::SessionNotFound),
            other => Err(AuthError::Storage(format!(
                "unexpected rotate script reply: {other:?}"
            ))),
        }
    }

    async fn delete(&self, session_id: SessionId) -> Result<()> {
        let mut conn = self.conn_manager.clone();

        let deleted: i64 = self
            .delete
            .key(Self::session_key(session_id))
            .invoke_async(&mut conn)
            .await
            .map_err(|e| Self::storage_error("Failed to delete session", &e))?;

        tracing::info!(session_id = %session_id.0, existed = deleted == 1, "Deleted session from Redis");
        Ok(())
    }

    async fn delete_by_user_id(&self, user_id: UserId) -> Result<usize> {
        let mut conn = self.conn_manager.clone();

        let deleted: usize = self
            .delete_user
            .key(Self::user_sessions_key(user_id))
            .invoke_async(&mut conn)
            .await
            .map_err(|e| Self::storage_error("Failed to delete user sessions", &e))?;

        tracing::info!(user_id = %user_id.0, session_count = deleted, "Deleted all user sessions");
        Ok(deleted)
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut conn = self.conn_manager.clone();

        let deleted: usize = self
            .delete_expired
            .key(EXPIRY_KEY)
            .arg(now.timestamp_millis())
            .invoke_async(&mut conn)
            .await
            .map_err(|e| Self::storage_error("Failed to delete expired sessions", &e))?;

        Ok(deleted)
    }
}
