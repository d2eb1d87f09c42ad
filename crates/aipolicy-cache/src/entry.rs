use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

/// How a cache lookup should treat the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchPolicy {
    /// An entry younger than this is served without fetching.
    pub ttl: Duration,
    /// Upper bound on a single fetch attempt.
    pub timeout: Duration,
    /// Extra attempts after the first, used only when there is no previous
    /// value to fall back on.
    pub max_retries: u32,
    /// Fixed delay between attempts.
    pub retry_backoff: Duration,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(300),
            timeout: Duration::from_secs(15),
            max_retries: 2,
            retry_backoff: Duration::from_secs(1),
        }
    }
}

impl FetchPolicy {
    #[must_use]
    pub fn new(ttl: Duration, timeout: Duration) -> Self {
        Self {
            ttl,
            timeout,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_retries(mut self, max_retries: u32, retry_backoff: Duration) -> Self {
        self.max_retries = max_retries;
        self.retry_backoff = retry_backoff;
        self
    }

    /// Worst-case wall time of one lookup: every attempt timing out plus the
    /// backoff between them.
    #[must_use]
    pub fn budget(&self) -> Duration {
        let attempts = self.max_retries.saturating_add(1);
        self.timeout
            .saturating_mul(attempts)
            .saturating_add(self.retry_backoff.saturating_mul(self.max_retries))
    }
}

/// A stored value plus the moment it was fetched.
#[derive(Debug)]
pub struct CacheEntry<T> {
    pub data: Arc<T>,
    pub fetched_at: DateTime<Utc>,
    /// Set by `invalidate`; the value stays available as a stale fallback.
    pub invalidated: bool,
}

impl<T> Clone for CacheEntry<T> {
    fn clone(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
            fetched_at: self.fetched_at,
            invalidated: self.invalidated,
        }
    }
}

impl<T> CacheEntry<T> {
    pub(crate) fn new(data: Arc<T>, fetched_at: DateTime<Utc>) -> Self {
        Self {
            data,
            fetched_at,
            invalidated: false,
        }
    }

    #[must_use]
    pub fn age(&self, now: DateTime<Utc>) -> TimeDelta {
        now.signed_duration_since(self.fetched_at)
    }

    #[must_use]
    pub fn is_fresh(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        if self.invalidated {
            return false;
        }
        match TimeDelta::from_std(ttl) {
            Ok(ttl) => self.age(now) < ttl,
            // A ttl beyond chrono's range never expires.
            Err(_) => true,
        }
    }
}

/// The value handed back to callers.
#[derive(Debug)]
pub struct Cached<T> {
    pub data: Arc<T>,
    pub fetched_at: DateTime<Utc>,
    /// True when this is a previous value served because the fetch failed
    /// or the entry has expired.
    pub stale: bool,
    /// True when no network round-trip was awaited to produce this value.
    pub from_cache: bool,
}

impl<T> Clone for Cached<T> {
    fn clone(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
            fetched_at: self.fetched_at,
            stale: self.stale,
            from_cache: self.from_cache,
        }
    }
}

impl<T> Cached<T> {
    pub(crate) fn from_entry(entry: &CacheEntry<T>, stale: bool, from_cache: bool) -> Self {
        Self {
            data: Arc::clone(&entry.data),
            fetched_at: entry.fetched_at,
            stale,
            from_cache,
        }
    }
}
