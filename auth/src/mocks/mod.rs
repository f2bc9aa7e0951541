//! Test doubles.
//!
//! In-memory stores live in [`crate::stores::memory`] because they are also
//! fit for single-process deployments. This module adds the pieces only
//! tests want: a clock that moves on command and a scriptable identity
//! provider.

pub mod clock;
pub mod identity;

pub use clock::ManualClock;
pub use identity::{ExchangeCall, MockIdentityProvider};
