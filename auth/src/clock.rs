//! Time source abstraction.
//!
//! Every expiry decision in this crate (state TTL, session lifetime, token
//! expiry claim, refresh skew, rate-limit refill) reads a [`Clock`] instead of
//! calling `Utc::now()` directly, so tests can stand exactly on a boundary.

use chrono::{DateTime, Utc};

/// Clock trait for time abstraction.
pub trait Clock: Send + Sync {
    /// Current time.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
