//! Backpressure primitive protecting the remote model API.
//!
//! Two simultaneous constraints: a minimum wall-clock interval between
//! successive calls (`60/rpm` seconds), and a token bucket of capacity
//! `rpm` refilling continuously at `rpm` tokens per minute. `acquire()`
//! suspends until both are satisfied, re-checking after every sleep.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

struct LimiterState {
    tokens: f64,
    last_refill: Instant,
    last_call: Option<Instant>,
}

pub struct RateLimiter {
    state: Mutex<LimiterState>,
    min_interval: Duration,
    capacity: f64,
    refill_per_second: f64,
}

impl RateLimiter {
    /// Build a limiter for the given requests-per-minute ceiling.
    /// An `rpm` of zero is coerced to 1 to keep the arithmetic sane.
    pub fn new(rpm: u32) -> Self {
        let rpm = rpm.max(1) as f64;
        Self {
            state: Mutex::new(LimiterState {
                tokens: rpm,
                last_refill: Instant::now(),
                last_call: None,
            }),
            min_interval: Duration::from_secs_f64(60.0 / rpm),
            capacity: rpm,
            refill_per_second: rpm / 60.0,
        }
    }

    /// Suspend until it is safe to issue one more remote call.
    ///
    /// Never returns early: a wakeup before a token is available loops back
    /// into the check. No fairness guarantee among concurrent callers, but
    /// every waiter makes progress once capacity frees up.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut state = self.state.lock().await;
                let now = Instant::now();

                let elapsed = now.saturating_duration_since(state.last_refill);
                state.tokens =
                    (state.tokens + elapsed.as_secs_f64() * self.refill_per_second)
                        .min(self.capacity);
                state.last_refill = now;

                let interval_wait = match state.last_call {
                    Some(last) => (last + self.min_interval).saturating_duration_since(now),
                    None => Duration::ZERO,
                };

                if state.tokens >= 1.0 && interval_wait.is_zero() {
                    state.tokens -= 1.0;
                    state.last_call = Some(now);
                    return;
                }

                let token_wait = if state.tokens >= 1.0 {
                    Duration::ZERO
                } else {
                    Duration::from_secs_f64((1.0 - state.tokens) / self.refill_per_second)
                };

                interval_wait.max(token_wait)
            };

            // Lock released before sleeping; minimum tick avoids busy-spin.
            tokio::time::sleep(wait.max(Duration::from_millis(5))).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_min_interval_enforced_over_many_calls() {
        // 60 RPM means one call per second; 120 sequential acquires must
        // span at least ~119 seconds of (simulated) elapsed time.
        let limiter = RateLimiter::new(60);
        let start = Instant::now();

        for _ in 0..120 {
            limiter.acquire().await;
        }

        let elapsed = start.elapsed();
        assert!(
            elapsed >= Duration::from_secs_f64(118.9),
            "120 acquires took only {:?}",
            elapsed
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_acquire_is_immediate() {
        let limiter = RateLimiter::new(10);
        let start = Instant::now();
        limiter.acquire().await;
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_all_complete() {
        let limiter = Arc::new(RateLimiter::new(120));
        let mut handles = Vec::new();

        for _ in 0..8 {
            let limiter = Arc::clone(&limiter);
            handles.push(tokio::spawn(async move {
                limiter.acquire().await;
            }));
        }

        for handle in handles {
            handle.await.expect("caller starved or panicked");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_bucket_does_not_overfill_during_idle() {
        let limiter = RateLimiter::new(60);

        // A long idle period must not bank more than `capacity` tokens.
        tokio::time::sleep(Duration::from_secs(600)).await;

        let start = Instant::now();
        for _ in 0..61 {
            limiter.acquire().await;
        }
        // 60 banked tokens go fast, but min-interval still paces every call,
        // so 61 calls need at least ~60 seconds.
        assert!(start.elapsed() >= Duration::from_secs_f64(59.9));
    }
}
