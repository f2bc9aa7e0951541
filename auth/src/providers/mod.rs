//! Collaborator traits.
//!
//! The authentication service depends only on these traits. Concrete
//! implementations live in [`crate::stores`] (memory, Redis, Postgres),
//! [`google`] (the Google identity provider) and [`crate::mocks`] (tests).
//!
//! ```text
//! AuthenticationService
//!   ├── StateRepository   (OAuth state records, atomic take)
//!   ├── SessionStore      (session records, atomic rotate)
//!   ├── AccountRepository (provider subject → account, unique)
//!   └── IdentityProvider  (authorization URL, exchange, refresh, revoke)
//! ```
//!
//! Store methods that make expiry decisions take `now` as an argument so the
//! caller's injected clock is the only time source.

pub mod account;
pub mod google;
pub mod identity;
pub mod session;
pub mod state_repository;

pub use account::AccountRepository;
pub use google::GoogleIdentityProvider;
pub use identity::{IdentityClaims, IdentityProvider, ProviderTokens, RefreshedAccessToken};
pub use session::SessionStore;
pub use state_repository::StateRepository;
