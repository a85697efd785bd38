//! Token-bucket rate limiter shared by every outbound exchange call.
//!
//! This is the sole point of cross-component backpressure: the engine, the
//! monitor and the conditional service all call `wait()` before touching
//! the exchange port.

use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Token bucket: `tokens` refill at `rate` per second, capped at `burst`.
///
/// Invariant: `0 <= tokens <= burst` at every observation point.
#[derive(Debug)]
pub struct RateLimiter {
    rate: f64,
    burst: f64,
    state: Mutex<BucketState>,
}

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_check: Instant,
}

/// Sleep between `acquire` attempts inside `wait`.
const POLL_SLEEP: Duration = Duration::from_millis(50);

impl RateLimiter {
    /// Create a bucket that starts full.
    #[must_use]
    pub fn new(rate: f64, burst: u32) -> Self {
        let burst = f64::from(burst.max(1));
        Self {
            rate: rate.max(f64::MIN_POSITIVE),
            burst,
            state: Mutex::new(BucketState {
                tokens: burst,
                last_check: Instant::now(),
            }),
        }
    }

    /// Try to take one token. Refills by `elapsed × rate` (capped at
    /// `burst`) first; returns `false` without side effects when the bucket
    /// is empty.
    pub fn acquire(&self) -> bool {
        let Ok(mut state) = self.state.lock() else {
            // A poisoned bucket fails closed; callers retry via wait().
            return false;
        };
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_check).as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.rate).min(self.burst);
        state.last_check = now;

        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Suspend until a token is available.
    pub async fn wait(&self) {
        while !self.acquire() {
            tokio::time::sleep(POLL_SLEEP).await;
        }
    }

    /// Current token count, refreshed to now. Diagnostic only.
    #[must_use]
    pub fn available(&self) -> f64 {
        let Ok(mut state) = self.state.lock() else {
            return 0.0;
        };
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_check).as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.rate).min(self.burst);
        state.last_check = now;
        state.tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_full_and_drains_to_zero() {
        let limiter = RateLimiter::new(0.000_001, 3);
        assert!(limiter.acquire());
        assert!(limiter.acquire());
        assert!(limiter.acquire());
        // Bucket empty, negligible refill at this rate.
        assert!(!limiter.acquire());
        assert!(limiter.available() >= 0.0);
    }

    #[test]
    fn tokens_never_exceed_burst() {
        let limiter = RateLimiter::new(1_000_000.0, 5);
        // Give the refill arithmetic elapsed time to overshoot with.
        std::thread::sleep(Duration::from_millis(20));
        assert!(limiter.available() <= 5.0);
        for _ in 0..5 {
            assert!(limiter.acquire());
        }
        let available = limiter.available();
        assert!((0.0..=5.0).contains(&available));
    }

    #[test]
    fn refills_over_time() {
        let limiter = RateLimiter::new(100.0, 1);
        assert!(limiter.acquire());
        assert!(!limiter.acquire());
        std::thread::sleep(Duration::from_millis(30));
        // 30ms at 100 tokens/sec is plenty for one token.
        assert!(limiter.acquire());
    }

    #[tokio::test]
    async fn wait_suspends_until_a_token_appears() {
        let limiter = RateLimiter::new(100.0, 1);
        assert!(limiter.acquire());
        assert!(!limiter.acquire());
        // Refill at 100 tokens/sec frees this within one poll sleep.
        limiter.wait().await;
    }

    #[test]
    fn failed_acquire_has_no_side_effects() {
        let limiter = RateLimiter::new(0.000_001, 1);
        assert!(limiter.acquire());
        let before = limiter.available();
        assert!(!limiter.acquire());
        let after = limiter.available();
        assert!((after - before).abs() < 1e-6);
    }
}
