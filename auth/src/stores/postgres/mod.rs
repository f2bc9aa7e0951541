//! PostgreSQL storage.
//!
//! Accounts are the only durable records; OAuth state and sessions live in
//! Redis or memory.

pub mod account;

pub use account::PostgresAccountRepository;
