use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};
use tracing::debug;

use crate::config::RateLimitConfig;

/// Source of permits for outbound carrier calls.
///
/// The dispatch worker awaits one permit per message part. Implementations
/// are shared by every request the worker handles.
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// Wait until a permit is available and take it.
    async fn acquire(&self);
}

/// Build the token source described by `config`.
pub fn from_config(config: &RateLimitConfig) -> Arc<dyn TokenSource> {
    if config.enabled {
        Arc::new(RateLimiter::new(config))
    } else {
        Arc::new(Unlimited)
    }
}

/// Rate limiter implementation using token bucket algorithm
///
/// Time is read from [`tokio::time::Instant`], so a paused test runtime
/// drives it deterministically. Waiters are served in arrival order.
#[derive(Debug)]
pub struct RateLimiter {
    bucket: Mutex<TokenBucket>,
    interval: Duration,
}

#[derive(Debug)]
struct TokenBucket {
    tokens: u32,
    last_refill: Instant,
    max_tokens: u32,
    refill_amount: u32,
    interval: Duration,
}

impl TokenBucket {
    fn new(max_tokens: u32, refill_amount: u32, interval: Duration) -> Self {
        Self {
            tokens: max_tokens,
            last_refill: Instant::now(),
            max_tokens,
            refill_amount,
            interval,
        }
    }

    fn try_consume(&mut self, now: Instant) -> bool {
        self.refill(now);

        if self.tokens == 0 {
            return false;
        }
        // A full bucket does not accrue, so the refill clock starts at the first take.
        if self.tokens == self.max_tokens {
            self.last_refill = now;
        }
        self.tokens -= 1;
        true
    }

    fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill);
        let intervals = elapsed.as_nanos() / self.interval.as_nanos();
        if intervals == 0 {
            return;
        }

        let added = intervals.saturating_mul(u128::from(self.refill_amount));
        let tokens = (u128::from(self.tokens) + added).min(u128::from(self.max_tokens));
        self.tokens = tokens as u32;

        if self.tokens == self.max_tokens {
            self.last_refill = now;
        } else {
            // Below capacity `intervals` is small; keep the fractional remainder.
            self.last_refill += self.interval * intervals as u32;
        }
    }

    fn next_refill(&self) -> Instant {
        self.last_refill + self.interval
    }
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self::with_rate(
            config.burst.max(1),
            config.tokens_per_interval.max(1),
            config.interval(),
        )
    }

    /// Bucket holding `burst` tokens, refilled by `per_interval` every `interval`.
    pub fn with_rate(burst: u32, per_interval: u32, interval: Duration) -> Self {
        let interval = interval.max(Duration::from_millis(1));
        Self {
            bucket: Mutex::new(TokenBucket::new(burst.max(1), per_interval.max(1), interval)),
            interval,
        }
    }

    /// Take a token if one is available right now.
    pub fn try_acquire(&self) -> RateLimitResult {
        let Ok(mut bucket) = self.bucket.try_lock() else {
            // Someone is already queued for the next token.
            return RateLimitResult::Limited {
                retry_after: self.interval,
            };
        };

        let now = Instant::now();
        if bucket.try_consume(now) {
            RateLimitResult::Allowed
        } else {
            RateLimitResult::Limited {
                retry_after: bucket.next_refill().saturating_duration_since(now),
            }
        }
    }
}

#[async_trait]
impl TokenSource for RateLimiter {
    async fn acquire(&self) {
        // Holding the lock while sleeping queues later callers behind us.
        let mut bucket = self.bucket.lock().await;
        loop {
            let now = Instant::now();
            if bucket.try_consume(now) {
                debug!(remaining = bucket.tokens, "rate limit token acquired");
                return;
            }
            let next = bucket.next_refill();
            debug!(
                wait_ms = next.saturating_duration_since(now).as_millis() as u64,
                "waiting for rate limit token"
            );
            sleep_until(next).await;
        }
    }
}

/// Token source that never waits.
#[derive(Debug, Default, Clone, Copy)]
pub struct Unlimited;

#[async_trait]
impl TokenSource for Unlimited {
    async fn acquire(&self) {}
}

/// Result of rate limit check
#[derive(Debug, PartialEq, Eq)]
pub enum RateLimitResult {
    Allowed,
    Limited { retry_after: Duration },
}
