//! Per-call timeout, retry with exponential backoff, and fallback.
//!
//! This wrapper is identical regardless of which level or execution
//! strategy invokes it: acquire the rate limiter, take a concurrency
//! permit, run the call under a hard timeout, back off and retry on
//! failure, and after exhausting retries return the standard fallback
//! result. It never returns an error to the scheduler.

use crate::errors::EngineError;
use crate::models::AgentResult;
use crate::orchestrator::rate_limit::RateLimiter;
use anyhow::Result;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

/// Retry/timeout knobs for a single agent call.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    /// First backoff delay, in seconds.
    pub base_delay_secs: f64,
    /// Backoff grows as `base * multiplier^attempt`.
    pub multiplier: f64,
    /// Hard per-call timeout, in seconds.
    pub timeout_seconds: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay_secs: 2.0,
            multiplier: 2.0,
            timeout_seconds: 120,
        }
    }
}

impl RetryPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        let secs = self.base_delay_secs * self.multiplier.powi(attempt as i32);
        // Cap pathological configurations at one minute per wait.
        Duration::from_secs_f64(secs.min(60.0))
    }
}

/// Run one agent call with rate limiting, bounded concurrency, a hard
/// timeout, and exponential-backoff retries. Exhaustion yields the
/// fallback result; sibling calls in the same level are never affected.
pub async fn call_with_retry<F, Fut>(
    agent_name: &str,
    policy: &RetryPolicy,
    limiter: &RateLimiter,
    semaphore: &Arc<Semaphore>,
    call: F,
) -> AgentResult
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<AgentResult>>,
{
    let mut last_error = String::new();

    for attempt in 0..=policy.max_retries {
        limiter.acquire().await;

        // Closed semaphore only happens on shutdown; treat as a failure.
        let permit = match semaphore.acquire().await {
            Ok(permit) => permit,
            Err(_) => {
                last_error = "concurrency guard closed".to_string();
                break;
            }
        };

        let timeout = Duration::from_secs(policy.timeout_seconds);
        let outcome = tokio::time::timeout(timeout, call()).await;
        drop(permit);

        match outcome {
            Ok(Ok(result)) => {
                debug!(agent = agent_name, attempt, "agent call succeeded");
                return result;
            }
            Ok(Err(e)) => {
                last_error = e.to_string();
                warn!(
                    agent = agent_name,
                    attempt,
                    error = %e,
                    "agent call failed"
                );
            }
            Err(_) => {
                last_error = EngineError::Timeout {
                    agent: agent_name.to_string(),
                    seconds: policy.timeout_seconds,
                }
                .to_string();
                warn!(
                    agent = agent_name,
                    attempt, "agent call exceeded hard timeout"
                );
            }
        }

        if attempt < policy.max_retries {
            let delay = policy.backoff(attempt);
            debug!(agent = agent_name, ?delay, "backing off before retry");
            tokio::time::sleep(delay).await;
        }
    }

    warn!(
        agent = agent_name,
        "retries exhausted, substituting fallback result"
    );
    AgentResult::fallback(agent_name, &last_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AgentStatus;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn test_policy() -> RetryPolicy {
        RetryPolicy {
            max_retries: 2,
            base_delay_secs: 0.1,
            multiplier: 2.0,
            timeout_seconds: 5,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_on_first_attempt() {
        let limiter = RateLimiter::new(600);
        let semaphore = Arc::new(Semaphore::new(4));

        let result = call_with_retry("engagement", &test_policy(), &limiter, &semaphore, || {
            async {
                Ok(crate::agents::normalize_result(
                    "engagement",
                    &serde_json::json!({"score": 70}),
                ))
            }
        })
        .await;

        assert_eq!(result.status, AgentStatus::Ok);
        assert_eq!(result.score, 70.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fallback_after_exhaustion() {
        let limiter = RateLimiter::new(600);
        let semaphore = Arc::new(Semaphore::new(4));
        let attempts = AtomicU32::new(0);

        let result = call_with_retry("growth", &test_policy(), &limiter, &semaphore, || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(anyhow::anyhow!("model unavailable")) }
        })
        .await;

        assert_eq!(attempts.load(Ordering::SeqCst), 3); // initial + 2 retries
        assert!(result.error_flag);
        assert_eq!(result.score, 50.0);
        assert_eq!(result.confidence, 0.30);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_on_second_attempt() {
        let limiter = RateLimiter::new(600);
        let semaphore = Arc::new(Semaphore::new(4));
        let attempts = AtomicU32::new(0);

        let result = call_with_retry("hashtag_strategy", &test_policy(), &limiter, &semaphore, || {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(anyhow::anyhow!("transient"))
                } else {
                    Ok(crate::agents::normalize_result(
                        "hashtag_strategy",
                        &serde_json::json!({"score": 64}),
                    ))
                }
            }
        })
        .await;

        assert!(result.is_ok());
        assert_eq!(result.score, 64.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hard_timeout_triggers_retry_path() {
        let limiter = RateLimiter::new(600);
        let semaphore = Arc::new(Semaphore::new(4));
        let policy = RetryPolicy {
            max_retries: 0,
            base_delay_secs: 0.1,
            multiplier: 2.0,
            timeout_seconds: 1,
        };

        let result = call_with_retry("posting_behavior", &policy, &limiter, &semaphore, || {
            async {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(AgentResult::fallback("posting_behavior", "unreachable"))
            }
        })
        .await;

        assert!(result.error_flag);
        assert!(result.findings[0].contains("timed out"));
    }
}
