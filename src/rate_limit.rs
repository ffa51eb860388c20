//! Sliding-window rate limiting per caller identity.
//!
//! Issuance and verification are limited separately. State lives in a
//! [`DashMap`] keyed by `(identity, action)`, so unrelated callers rarely
//! contend on one shard lock.
//!
//! Memory is bounded two ways: expired entries are swept every
//! `cleanup_interval` requests, and at most `max_tracked_identities` pairs are
//! tracked. A new identity arriving while the map is full forces a sweep and
//! is rejected if the map is still full.

use std::{
    fmt,
    hash::Hash,
    sync::atomic::{AtomicU64, Ordering},
    time::{Duration, Instant},
};

use dashmap::{mapref::entry::Entry, DashMap};
use serde::{Deserialize, Serialize};

use crate::errors::TicketError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Issue,
    Verify,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Issue => "issue",
            Self::Verify => "verify",
        })
    }
}

/// At most `max_requests` per `window_ms`. Zero requests means unlimited.
///
/// A positive `max_requests` needs a positive `window_ms`; see
/// [`RateLimitConfig::validate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowLimit {
    pub max_requests: u32,
    pub window_ms: u64,
}

impl WindowLimit {
    #[must_use]
    pub const fn new(max_requests: u32, window: Duration) -> Self {
        // windows beyond u64 milliseconds are not meaningful
        #[allow(clippy::cast_possible_truncation)]
        let window_ms = window.as_millis() as u64;
        Self { max_requests, window_ms }
    }

    #[must_use]
    pub const fn unlimited() -> Self {
        Self { max_requests: 0, window_ms: 0 }
    }

    #[must_use]
    pub const fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    #[must_use]
    pub const fn is_unlimited(&self) -> bool {
        self.max_requests == 0
    }

    /// A zero window forgets every request at once, so nothing is ever refused.
    #[must_use]
    pub const fn is_degenerate(&self) -> bool {
        self.max_requests > 0 && self.window_ms == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub issue: WindowLimit,
    pub verify: WindowLimit,
    /// Sweep expired entries every N requests.
    pub cleanup_interval: u64,
    /// Hard cap on tracked (identity, action) pairs.
    pub max_tracked_identities: usize,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            issue: WindowLimit::new(10, Duration::from_secs(60)),
            verify: WindowLimit::new(60, Duration::from_secs(60)),
            cleanup_interval: 100,
            max_tracked_identities: 10_000,
        }
    }
}

impl RateLimitConfig {
    /// No limits, e.g. for offline tooling.
    #[must_use]
    pub fn unlimited() -> Self {
        Self {
            issue: WindowLimit::unlimited(),
            verify: WindowLimit::unlimited(),
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn limit_for(&self, action: Action) -> WindowLimit {
        match action {
            Action::Issue => self.issue,
            Action::Verify => self.verify,
        }
    }

    /// # Errors
    ///
    /// `InvalidConfig` for a limited action with a zero window, or a zero
    /// identity cap.
    pub fn validate(&self) -> Result<(), TicketError> {
        for action in [Action::Issue, Action::Verify] {
            let limit = self.limit_for(action);
            if limit.is_degenerate() {
                return Err(TicketError::InvalidConfig(format!(
                    "rate_limit.{action} allows {} requests in a zero-length window",
                    limit.max_requests
                )));
            }
        }
        if self.max_tracked_identities == 0 {
            return Err(TicketError::InvalidConfig(
                "rate_limit.max_tracked_identities must be positive".into(),
            ));
        }
        Ok(())
    }
}

pub struct RateLimiter<K> {
    config: RateLimitConfig,
    requests: DashMap<(K, Action), Vec<Instant>>,
    request_count: AtomicU64,
}

impl<K: Hash + Eq> fmt::Debug for RateLimiter<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimiter")
            .field("config", &self.config)
            .field("tracked", &self.requests.len())
            .finish_non_exhaustive()
    }
}

impl<K: Hash + Eq + Clone + fmt::Debug> RateLimiter<K> {
    /// Limiter over `config` as given. Use [`try_new`](Self::try_new) for
    /// configuration read from outside.
    #[must_use]
    pub fn new(config: RateLimitConfig) -> Self {
        Self { config, requests: DashMap::new(), request_count: AtomicU64::new(0) }
    }

    /// # Errors
    ///
    /// As [`RateLimitConfig::validate`].
    pub fn try_new(config: RateLimitConfig) -> Result<Self, TicketError> {
        config.validate()?;
        Ok(Self::new(config))
    }

    #[must_use]
    pub const fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Record a request if it is within limits.
    #[must_use]
    pub fn allow(&self, identity: &K, action: Action) -> bool {
        self.check(identity, action).is_ok()
    }

    /// # Errors
    ///
    /// `RateLimitExceeded` when the identity is over its limit for `action`, or
    /// when it is new and the tracking cap is reached.
    pub fn check(&self, identity: &K, action: Action) -> Result<(), TicketError> {
        self.check_at(identity, action, Instant::now())
    }

    /// [`check`](Self::check) against an explicit instant.
    ///
    /// # Errors
    ///
    /// See [`check`](Self::check).
    pub fn check_at(&self, identity: &K, action: Action, now: Instant) -> Result<(), TicketError> {
        let limit = self.config.limit_for(action);
        if limit.is_unlimited() {
            return Ok(());
        }
        let cutoff = now.checked_sub(limit.window());
        let recent = |t: &Instant| cutoff.map_or(true, |c| *t > c);

        let count = self.request_count.fetch_add(1, Ordering::Relaxed);
        if self.config.cleanup_interval > 0 && count > 0 && count % self.config.cleanup_interval == 0 {
            tracing::debug!(request_count = count, "running periodic rate limiter cleanup");
            self.cleanup_at(now);
        }

        let key = (identity.clone(), action);
        // len() visits every shard, so it must run before the entry lock is held
        if !self.requests.contains_key(&key) && self.requests.len() >= self.config.max_tracked_identities {
            tracing::debug!(cap = self.config.max_tracked_identities, "rate limiter full, forcing cleanup");
            self.cleanup_at(now);
            if self.requests.len() >= self.config.max_tracked_identities {
                tracing::warn!(
                    identity = ?identity,
                    %action,
                    cap = self.config.max_tracked_identities,
                    "too many tracked identities, rejecting new one"
                );
                return Err(TicketError::RateLimitExceeded);
            }
        }

        let max = usize::try_from(limit.max_requests).unwrap_or(usize::MAX);
        match self.requests.entry(key) {
            Entry::Occupied(mut entry) => {
                let timestamps = entry.get_mut();
                timestamps.retain(|t| recent(t));
                if timestamps.len() >= max {
                    tracing::warn!(
                        identity = ?identity,
                        %action,
                        requests = timestamps.len(),
                        max = limit.max_requests,
                        "rate limit exceeded"
                    );
                    return Err(TicketError::RateLimitExceeded);
                }
                timestamps.push(now);
            }
            Entry::Vacant(entry) => {
                entry.insert(vec![now]);
            }
        }
        Ok(())
    }

    /// Drop timestamps outside their window and forget idle identities.
    pub fn cleanup(&self) {
        self.cleanup_at(Instant::now());
    }

    fn cleanup_at(&self, now: Instant) {
        let before = self.requests.len();
        self.requests.retain(|(_, action), timestamps| {
            let cutoff = now.checked_sub(self.config.limit_for(*action).window());
            timestamps.retain(|t| cutoff.map_or(true, |c| *t > c));
            !timestamps.is_empty()
        });
        let remaining = self.requests.len();
        if remaining < before {
            tracing::debug!(removed = before - remaining, remaining, "rate limiter cleanup");
        }
    }

    /// Number of (identity, action) pairs currently tracked.
    #[must_use]
    pub fn tracked(&self) -> usize {
        self.requests.len()
    }
}
