//! Store implementations.
//!
//! - **Memory** - single-process maps, also used by tests
//! - **Redis** - OAuth state (`GETDEL` consume) and sessions (Lua-scripted updates)
//! - **PostgreSQL** - accounts with a unique provider subject (feature `postgres`)

pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;
pub mod session_redis;
pub mod state_redis;

pub use memory::{MemoryAccountRepository, MemorySessionStore, MemoryStateRepository};
#[cfg(feature = "postgres")]
pub use postgres::PostgresAccountRepository;
pub use session_redis::RedisSessionStore;
pub use state_redis::RedisStateRepository;
