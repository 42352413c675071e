//! Client-side token bucket.
//!
//! Veracode allows roughly 500 requests per minute per account. The limiter lets a
//! burst of up to `burst` requests through immediately and then refills one token
//! every `period`. Callers that find the bucket empty take a reservation and sleep
//! until it matures; they are never rejected for lack of capacity.

use log::debug;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::{Result, VeracodeError};

/// Default refill period: 500 requests per minute.
pub const DEFAULT_PERIOD: Duration = Duration::from_millis(120);

/// Default burst capacity.
pub const DEFAULT_BURST: u32 = 500;

/// Rate limit settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Time to refill a single token
    pub period: Duration,
    /// Maximum number of tokens in the bucket
    pub burst: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            period: DEFAULT_PERIOD,
            burst: DEFAULT_BURST,
        }
    }
}

#[derive(Debug)]
struct Bucket {
    /// Goes negative while callers hold outstanding reservations
    tokens: f64,
    last_refill: Instant,
}

/// Token bucket shared by every request issued through one client.
#[derive(Debug)]
pub struct RateLimiter {
    period: Duration,
    burst: u32,
    bucket: Mutex<Bucket>,
}

impl RateLimiter {
    /// A limiter that starts with a full bucket.
    ///
    /// A `burst` of zero is treated as one. A zero `period` disables limiting.
    #[must_use]
    pub fn new(period: Duration, burst: u32) -> Self {
        let burst = burst.max(1);
        Self {
            period,
            burst,
            bucket: Mutex::new(Bucket {
                tokens: f64::from(burst),
                last_refill: Instant::now(),
            }),
        }
    }

    #[must_use]
    pub fn from_config(config: RateLimitConfig) -> Self {
        Self::new(config.period, config.burst)
    }

    #[must_use]
    pub fn period(&self) -> Duration {
        self.period
    }

    #[must_use]
    pub fn burst(&self) -> u32 {
        self.burst
    }

    /// Tokens currently in the bucket. Negative while reservations are outstanding.
    #[must_use]
    pub fn available(&self) -> f64 {
        let mut bucket = self.lock();
        self.refill(&mut bucket, Instant::now());
        bucket.tokens
    }

    /// Wait until a token is available.
    ///
    /// # Errors
    ///
    /// Returns [`VeracodeError::RateLimitCancelled`] if `cancel` fires first. The
    /// reserved token is handed back to the bucket in that case.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(VeracodeError::RateLimitCancelled);
        }

        let wait = self.reserve();
        if wait.is_zero() {
            return Ok(());
        }

        debug!("Rate limit reached, waiting {}ms for a token", wait.as_millis());

        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                self.release();
                Err(VeracodeError::RateLimitCancelled)
            }
            () = tokio::time::sleep(wait) => Ok(()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Bucket> {
        self.bucket.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn refill(&self, bucket: &mut Bucket, now: Instant) {
        if self.period.is_zero() {
            bucket.tokens = f64::from(self.burst);
        } else {
            let elapsed = now.saturating_duration_since(bucket.last_refill);
            let refilled = elapsed.as_secs_f64() / self.period.as_secs_f64();
            bucket.tokens = (bucket.tokens + refilled).min(f64::from(self.burst));
        }
        bucket.last_refill = now;
    }

    /// Take one token and return how long the caller must wait for it.
    fn reserve(&self) -> Duration {
        let mut bucket = self.lock();
        self.refill(&mut bucket, Instant::now());
        bucket.tokens -= 1.0;

        if bucket.tokens >= 0.0 {
            Duration::ZERO
        } else {
            self.period.mul_f64(-bucket.tokens)
        }
    }

    fn release(&self) {
        let mut bucket = self.lock();
        self.refill(&mut bucket, Instant::now());
        bucket.tokens = (bucket.tokens + 1.0).min(f64::from(self.burst));
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::from_config(RateLimitConfig::default())
    }
}
