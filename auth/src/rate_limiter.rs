//! Per-key token-bucket rate limiter.
//!
//! Each key (client IP or user id) owns a bucket of at most `capacity` whole
//! tokens. One token is added every `window / capacity`; a request spends
//! one. A fresh key starts full.
//!
//! # Locking
//!
//! The bucket map sits behind an `RwLock` that is held only to find or insert
//! a bucket. Token arithmetic happens under that bucket's own `Mutex`, so
//! requests for different keys never contend on anything but the short map
//! lookup.
//!
//! # Memory bound
//!
//! [`TokenBucketLimiter::evict_idle`] drops buckets unused for two windows.
//! Independently, the map never holds more than `max_tracked_keys` entries:
//! inserting past the ceiling first evicts idle buckets, then the least
//! recently used one.

use crate::clock::Clock;
use crate::config::RateLimitConfig;
use crate::error::{AuthError, Result};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

#[derive(Debug)]
struct Bucket {
    tokens: u32,
    last_refill: DateTime<Utc>,
    last_seen: DateTime<Utc>,
}

impl Bucket {
    const fn full(capacity: u32, now: DateTime<Utc>) -> Self {
        Self {
            tokens: capacity,
            last_refill: now,
            last_seen: now,
        }
    }

    /// Add the whole tokens earned since `last_refill`.
    ///
    /// `last_refill` advances only by the time those tokens account for, so
    /// partial progress toward the next token is kept.
    fn refill(&mut self, now: DateTime<Utc>, capacity: u32, interval: Duration) {
        if self.tokens >= capacity {
            self.last_refill = now;
            return;
        }

        let elapsed = now - self.last_refill;
        if elapsed <= Duration::zero() {
            return;
        }

        let interval_ns = interval.num_nanoseconds().unwrap_or(i64::MAX).max(1);
        let elapsed_ns = elapsed.num_nanoseconds().unwrap_or(i64::MAX);
        let earned = elapsed_ns / interval_ns;
        if earned == 0 {
            return;
        }

        let room = i64::from(capacity - self.tokens);
        if earned >= room {
            self.tokens = capacity;
            self.last_refill = now;
        } else {
            // earned < room <= u32::MAX
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            {
                self.tokens += earned as u32;
            }
            self.last_refill += Duration::nanoseconds(earned * interval_ns);
        }
    }
}

/// Token-bucket limiter keyed by client identity.
pub struct TokenBucketLimiter {
    buckets: RwLock<HashMap<String, Arc<Mutex<Bucket>>>>,
    capacity: u32,
    window: Duration,
    refill_interval: Duration,
    max_tracked_keys: usize,
    clock: Arc<dyn Clock>,
}

impl TokenBucketLimiter {
    /// Create a limiter.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Configuration`] if the configuration is invalid.
    pub fn new(config: &RateLimitConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate()?;

        let window = Duration::from_std(config.window)
            .map_err(|e| AuthError::Configuration(format!("rate limit window: {e}")))?;
        let refill_interval = window / i32::try_from(config.capacity).unwrap_or(i32::MAX);

        Ok(Self {
            buckets: RwLock::new(HashMap::new()),
            capacity: config.capacity,
            window,
            refill_interval,
            max_tracked_keys: config.max_tracked_keys,
            clock,
        })
    }

    /// Spend one token for `key`.
    ///
    /// Fails closed: an internal error counts as a rejection.
    #[must_use]
    pub fn allow(&self, key: &str) -> bool {
        self.check(key).is_ok()
    }

    /// Spend one token for `key`, reporting how long to wait when empty.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Bucket is empty → [`AuthError::TooManyAttempts`] with the time until
    ///   the next token
    /// - A lock is poisoned → [`AuthError::Internal`]
    pub fn check(&self, key: &str) -> Result<()> {
        let now = self.clock.now();
        let bucket = self.bucket_for(key, now)?;

        let mut bucket = bucket
            .lock()
            .map_err(|_| AuthError::Internal("rate limit bucket lock poisoned".into()))?;
        bucket.refill(now, self.capacity, self.refill_interval);
        bucket.last_seen = now;

        if bucket.tokens > 0 {
            bucket.tokens -= 1;
            return Ok(());
        }

        let wait = (bucket.last_refill + self.refill_interval) - now;
        let retry_after = wait.max(Duration::zero()).to_std().unwrap_or_default();

        tracing::warn!(
            rate_limit_exceeded = true,
            key = %key,
            retry_after_ms = u64::try_from(retry_after.as_millis()).unwrap_or(u64::MAX),
            "Rate limit exceeded"
        );

        Err(AuthError::TooManyAttempts { retry_after })
    }

    /// Drop buckets unused for more than two windows.
    ///
    /// # Returns
    ///
    /// Number of buckets evicted.
    pub fn evict_idle(&self) -> usize {
        let now = self.clock.now();
        let Ok(mut buckets) = self.buckets.write() else {
            tracing::error!("rate limit map lock poisoned, skipping eviction");
            return 0;
        };
        let evicted = self.retain_active(&mut buckets, now);
        if evicted > 0 {
            tracing::debug!(evicted, remaining = buckets.len(), "Evicted idle rate limit buckets");
        }
        evicted
    }

    /// Number of keys currently tracked.
    #[must_use]
    pub fn tracked_keys(&self) -> usize {
        self.buckets.read().map_or(0, |b| b.len())
    }

    fn bucket_for(&self, key: &str, now: DateTime<Utc>) -> Result<Arc<Mutex<Bucket>>> {
        {
            let buckets = self
                .buckets
                .read()
                .map_err(|_| AuthError::Internal("rate limit map lock poisoned".into()))?;
            if let Some(bucket) = buckets.get(key) {
                return Ok(Arc::clone(bucket));
            }
        }

        let mut buckets = self
            .buckets
            .write()
            .map_err(|_| AuthError::Internal("rate limit map lock poisoned".into()))?;

        // Another request may have inserted it between the two locks.
        if let Some(bucket) = buckets.get(key) {
            return Ok(Arc::clone(bucket));
        }

        if buckets.len() >= self.max_tracked_keys {
            self.retain_active(&mut buckets, now);
            if buckets.len() >= self.max_tracked_keys {
                evict_least_recent(&mut buckets);
            }
        }

        let bucket = Arc::new(Mutex::new(Bucket::full(self.capacity, now)));
        buckets.insert(key.to_string(), Arc::clone(&bucket));
        Ok(bucket)
    }

    fn retain_active(
        &self,
        buckets: &mut HashMap<String, Arc<Mutex<Bucket>>>,
        now: DateTime<Utc>,
    ) -> usize {
        let idle_cutoff = now - self.window * 2;
        let before = buckets.len();
        buckets.retain(|_, bucket| {
            bucket
                .lock()
                .map(|b| b.last_seen >= idle_cutoff)
                .unwrap_or(false)
        });
        before - buckets.len()
    }
}

fn evict_least_recent(buckets: &mut HashMap<String, Arc<Mutex<Bucket>>>) {
    let stalest = buckets
        .iter()
        .filter_map(|(key, bucket)| bucket.lock().ok().map(|b| (key.clone(), b.last_seen)))
        .min_by_key(|(_, last_seen)| *last_seen)
        .map(|(key, _)| key);

    if let Some(key) = stalest {
        buckets.remove(&key);
    }
}

impl std::fmt::Debug for TokenBucketLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenBucketLimiter")
            .field("capacity", &self.capacity)
            .field("window", &self.window)
            .field("max_tracked_keys", &self.max_tracked_keys)
            .field("tracked_keys", &self.tracked_keys())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::mocks::ManualClock;

    fn limiter(capacity: u32, window_secs: u64) -> (TokenBucketLimiter, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        let config = RateLimitConfig::new(capacity, std::time::Duration::from_secs(window_secs));
        (TokenBucketLimiter::new(&config, clock.clone()).unwrap(), clock)
    }

    #[test]
    fn test_conservation() {
        let (limiter, clock) = limiter(5, 60);

        for _ in 0..5 {
            assert!(limiter.allow("203.0.113.1"));
        }
        assert!(!limiter.allow("203.0.113.1"));

        clock.advance(Duration::seconds(60));
        for _ in 0..5 {
            assert!(limiter.allow("203.0.113.1"));
        }
        assert!(!limiter.allow("203.0.113.1"));
    }

    #[test]
    fn test_refill_never_exceeds_capacity() {
        let (limiter, clock) = limiter(3, 30);

        assert!(limiter.allow("k"));
        clock.advance(Duration::hours(10));

        for _ in 0..3 {
            assert!(limiter.allow("k"));
        }
        assert!(!limiter.allow("k"));
    }

    #[test]
    fn test_partial_refill() {
        let (limiter, clock) = limiter(4, 60);
        for _ in 0..4 {
            assert!(limiter.allow("k"));
        }

        // One token per 15s; 20s earns one and keeps 5s of progress.
        clock.advance(Duration::seconds(20));
        assert!(limiter.allow("k"));
        assert!(!limiter.allow("k"));

        clock.advance(Duration::seconds(10));
        assert!(limiter.allow("k"));
    }

    #[test]
    fn test_retry_after() {
        let (limiter, clock) = limiter(2, 60);
        assert!(limiter.check("k").is_ok());
        assert!(limiter.check("k").is_ok());

        clock.advance(Duration::seconds(10));
        let err = limiter.check("k").unwrap_err();
        assert_eq!(
            err,
            AuthError::TooManyAttempts {
                retry_after: std::time::Duration::from_secs(20)
            }
        );
    }

    #[test]
    fn test_keys_are_independent() {
        let (limiter, _) = limiter(1, 60);
        assert!(limiter.allow("a"));
        assert!(!limiter.allow("a"));
        assert!(limiter.allow("b"));
    }

    #[test]
    fn test_evict_idle() {
        let (limiter, clock) = limiter(1, 60);
        assert!(limiter.allow("old"));
        clock.advance(Duration::seconds(90));
        assert!(limiter.allow("recent"));

        clock.advance(Duration::seconds(40));
        assert_eq!(limiter.evict_idle(), 1);
        assert_eq!(limiter.tracked_keys(), 1);
    }

    #[test]
    fn test_max_tracked_keys() {
        let clock = Arc::new(ManualClock::default());
        let config = RateLimitConfig::new(1, std::time::Duration::from_secs(60))
            .with_max_tracked_keys(3);
        let limiter = TokenBucketLimiter::new(&config, clock.clone()).unwrap();

        for key in ["a", "b", "c"] {
            assert!(limiter.allow(key));
            clock.advance(Duration::seconds(1));
        }
        assert!(limiter.allow("d"));
        assert_eq!(limiter.tracked_keys(), 3);

        // "a" was the least recently used and got a fresh bucket.
        assert!(limiter.allow("a"));
    }

    #[test]
    fn test_concurrent_single_key() {
        let (limiter, _) = limiter(50, 60);
        let limiter = Arc::new(limiter);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                std::thread::spawn(move || (0..20).filter(|_| limiter.allow("hot")).count())
            })
            .collect();

        let allowed: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(allowed, 50);
    }
}
