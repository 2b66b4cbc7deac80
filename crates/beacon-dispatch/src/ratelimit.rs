// SPDX-FileCopyrightText: 2026 Beacon Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-destination token buckets.
//!
//! Each destination group gets its own bucket holding up to `burst` tokens,
//! refilled at `rate_per_minute`. Waiters for one destination queue on that
//! bucket's async mutex in arrival order; other destinations are unaffected.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

#[derive(Debug)]
struct TokenBucket {
    tokens: f64,
    capacity: f64,
    /// Tokens per second.
    refill_rate: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn new(capacity: u32, per_minute: u32) -> Self {
        let capacity = f64::from(capacity.max(1));
        Self {
            tokens: capacity,
            capacity,
            refill_rate: f64::from(per_minute.max(1)) / 60.0,
            last_refill: Instant::now(),
        }
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.capacity);
        self.last_refill = now;
    }

    fn try_consume(&mut self) -> bool {
        self.refill();
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    fn time_until_available(&self) -> Duration {
        if self.tokens >= 1.0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64((1.0 - self.tokens) / self.refill_rate)
        }
    }
}

/// The caller's cancellation fired while waiting for a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;

/// Token buckets keyed by destination group id.
#[derive(Debug)]
pub struct DestinationLimiter {
    buckets: DashMap<String, Arc<Mutex<TokenBucket>>>,
    rate_per_minute: u32,
    burst: u32,
}

impl DestinationLimiter {
    pub fn new(rate_per_minute: u32, burst: u32) -> Self {
        Self {
            buckets: DashMap::new(),
            rate_per_minute,
            burst,
        }
    }

    fn bucket(&self, destination: &str) -> Arc<Mutex<TokenBucket>> {
        self.buckets
            .entry(destination.to_string())
            .or_insert_with(|| {
                Arc::new(Mutex::new(TokenBucket::new(self.burst, self.rate_per_minute)))
            })
            .clone()
    }

    /// Wait for a send slot on `destination`.
    pub async fn acquire(
        &self,
        destination: &str,
        cancel: &CancellationToken,
    ) -> Result<(), Cancelled> {
        let bucket = self.bucket(destination);
        let mut bucket = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Cancelled),
            guard = bucket.lock() => guard,
        };
        loop {
            if bucket.try_consume() {
                return Ok(());
            }
            let wait = bucket.time_until_available();
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Cancelled),
                _ = tokio::time::sleep(wait) => {}
            }
        }
    }

    /// Take a slot only if one is free right now.
    pub fn try_acquire(&self, destination: &str) -> bool {
        let bucket = self.bucket(destination);
        match bucket.try_lock() {
            Ok(mut b) => b.try_consume(),
            Err(_) => false,
        }
    }

    /// Number of destinations with a bucket.
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}
