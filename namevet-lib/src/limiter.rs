//! Per-upstream rate limiting using the token bucket algorithm.
//!
//! Every upstream (an RDAP host, a WHOIS server, the DNS resolver, a social
//! platform, the domain corpus) gets its own bucket, so an exhausted bucket
//! for one service never delays calls to another. Callers never queue
//! indefinitely: if the next token is further away than `max_wait`, the
//! acquire fails and the caller reports `RateLimited`.

use crate::error::ProbeFailure;
use crate::types::{RateLimit, RateLimitConfig};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Token bucket for a single upstream.
///
/// Tokens refill continuously at `per_second` up to `burst`. A caller may
/// reserve a token that is not there yet as long as it arrives within the
/// allowed wait; the balance then goes negative and later callers wait
/// behind it.
#[derive(Debug)]
pub struct TokenBucket {
    limit: RateLimit,
    tokens: f64,
    last_refill: Instant,
    /// Upstream told us to back off; no tokens before this instant
    blocked_until: Option<Instant>,
}

impl TokenBucket {
    /// Create a bucket that starts full.
    pub fn new(limit: RateLimit) -> Self {
        Self {
            limit,
            tokens: limit.burst,
            last_refill: Instant::now(),
            blocked_until: None,
        }
    }

    /// Reserve one token.
    ///
    /// Returns how long the caller must wait before making its call, or
    /// `None` when that wait would exceed `max_wait`.
    pub fn reserve(&mut self, now: Instant, max_wait: Duration) -> Option<Duration> {
        self.refill(now);

        let blocked_for = self
            .blocked_until
            .map(|until| until.saturating_duration_since(now))
            .unwrap_or_default();
        if blocked_for > max_wait {
            return None;
        }

        let wait = if self.tokens >= 1.0 {
            Duration::ZERO
        } else if self.limit.per_second > 0.0 {
            Duration::from_secs_f64((1.0 - self.tokens) / self.limit.per_second)
        } else {
            return None;
        };

        let wait = wait.max(blocked_for);
        if wait > max_wait {
            return None;
        }

        self.tokens -= 1.0;
        Some(wait)
    }

    /// Drain the bucket and refuse tokens for `cooldown`.
    pub fn penalize(&mut self, now: Instant, cooldown: Duration) {
        self.refill(now);
        self.tokens = self.tokens.min(0.0);
        self.blocked_until = Some(now + cooldown);
    }

    /// Whether the upstream is still cooling down at `now`.
    pub fn is_blocked(&self, now: Instant) -> bool {
        self.blocked_until.is_some_and(|until| until > now)
    }

    /// Current available tokens. Useful for diagnostics.
    pub fn available_tokens(&self) -> f64 {
        self.tokens
    }

    fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill);
        self.tokens =
            (self.tokens + elapsed.as_secs_f64() * self.limit.per_second).min(self.limit.burst);
        self.last_refill = now;
        if self.blocked_until.is_some_and(|until| until <= now) {
            self.blocked_until = None;
        }
    }
}

/// Set of independent token buckets keyed by upstream name.
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    buckets: Mutex<HashMap<String, Arc<Mutex<TokenBucket>>>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            buckets: Mutex::new(HashMap::new()),
        }
    }

    /// Take a token for `upstream`, sleeping for at most `max_wait`.
    ///
    /// # Errors
    ///
    /// `ProbeFailure::RateLimited` when the bucket cannot supply a token in
    /// time. No lock is held while sleeping.
    pub async fn acquire(&self, upstream: &str) -> Result<(), ProbeFailure> {
        let bucket = self.bucket(upstream)?;
        let wait = {
            let mut bucket = bucket.lock().map_err(|_| ProbeFailure::RateLimited)?;
            bucket.reserve(Instant::now(), self.config.max_wait)
        };

        match wait {
            Some(wait) if wait.is_zero() => Ok(()),
            Some(wait) => {
                tracing::debug!(upstream, wait_ms = wait.as_millis() as u64, "waiting for rate limit token");
                tokio::time::sleep(wait).await;
                Ok(())
            }
            None => {
                tracing::debug!(upstream, "rate limit bucket exhausted");
                Err(ProbeFailure::RateLimited)
            }
        }
    }

    /// Back off an upstream that throttled us.
    pub fn penalize(&self, upstream: &str) {
        if let Ok(bucket) = self.bucket(upstream) {
            if let Ok(mut bucket) = bucket.lock() {
                bucket.penalize(Instant::now(), self.config.cooldown);
                tracing::warn!(
                    upstream,
                    cooldown_secs = self.config.cooldown.as_secs(),
                    "upstream is rate limiting us, backing off"
                );
            }
        }
    }

    /// Upstreams currently cooling down, sorted.
    pub fn throttled_upstreams(&self) -> Vec<String> {
        let now = Instant::now();
        let Ok(buckets) = self.buckets.lock() else {
            return Vec::new();
        };
        let mut throttled: Vec<String> = buckets
            .iter()
            .filter(|(_, bucket)| bucket.lock().map(|b| b.is_blocked(now)).unwrap_or(true))
            .map(|(name, _)| name.clone())
            .collect();
        throttled.sort();
        throttled
    }

    /// Whether the limiter's shared state is usable (no poisoned locks).
    pub fn is_operational(&self) -> bool {
        match self.buckets.lock() {
            Ok(buckets) => buckets.values().all(|bucket| !bucket.is_poisoned()),
            Err(_) => false,
        }
    }

    fn bucket(&self, upstream: &str) -> Result<Arc<Mutex<TokenBucket>>, ProbeFailure> {
        let mut buckets = self.buckets.lock().map_err(|_| ProbeFailure::RateLimited)?;
        let bucket = buckets.entry(upstream.to_string()).or_insert_with(|| {
            let limit = self
                .config
                .overrides
                .get(upstream)
                .copied()
                .unwrap_or(self.config.default);
            Arc::new(Mutex::new(TokenBucket::new(limit)))
        });
        Ok(Arc::clone(bucket))
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}
