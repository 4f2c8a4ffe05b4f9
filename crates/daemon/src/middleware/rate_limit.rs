// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Token-bucket rate limiting, sharded per connection and per route class
//! so one noisy route never starves another on the same connection.

use std::collections::HashMap;
use std::time::{Duration, Instant};

struct TokenBucket {
    capacity: f64,
    tokens: f64,
    refill_per_sec: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn new(capacity: f64, refill_per_sec: f64, now: Instant) -> Self {
        Self { capacity, tokens: capacity, refill_per_sec, last_refill: now }
    }

    fn try_acquire(&mut self, now: Instant) -> Result<(), Duration> {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        self.last_refill = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            Ok(())
        } else {
            let deficit = 1.0 - self.tokens;
            let wait_secs = deficit / self.refill_per_sec;
            Err(Duration::from_secs_f64(wait_secs.max(0.0)))
        }
    }
}

/// One per connection. Lives as long as the connection does; dropped when
/// the connection closes, so there is no cross-connection contention.
pub struct RateLimiter {
    capacity: f64,
    refill_per_sec: f64,
    buckets: HashMap<String, TokenBucket>,
}

impl RateLimiter {
    pub fn new(capacity: f64, refill_per_sec: f64) -> Self {
        Self { capacity, refill_per_sec, buckets: HashMap::new() }
    }

    /// `Ok(())` on success; `Err(retry_after)` when the route class's bucket
    /// is currently empty.
    pub fn check(&mut self, route_class: &str, now: Instant) -> Result<(), Duration> {
        let capacity = self.capacity;
        let refill_per_sec = self.refill_per_sec;
        self.buckets
            .entry(route_class.to_string())
            .or_insert_with(|| TokenBucket::new(capacity, refill_per_sec, now))
            .try_acquire(now)
    }
}

#[cfg(test)]
#[path = "rate_limit_tests.rs"]
mod tests;
