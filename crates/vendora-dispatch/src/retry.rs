//! Retry controller — bounded exponential backoff around one channel send.
//!
//! An explicit loop with an immutable attempt index, never recursion over
//! shared counters: the backoff math and the test assertions stay simple.
//! Permanent failures short-circuit; transient ones burn an attempt.

use std::future::Future;
use std::time::Duration;

use chrono::Utc;
use vendora_core::config::RetryConfig;
use vendora_core::types::{AttemptOutcome, DeliveryAttempt, SendFailure, SendOutcome};

/// Backoff policy for one notification.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total sender invocations. 0 means fail fast: the sender still runs
    /// once, but a transient failure is final.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(retry: &RetryConfig) -> Self {
        Self {
            max_attempts: retry.max_attempts,
            base_delay: Duration::from_millis(retry.base_delay_ms),
            max_delay: Duration::from_millis(retry.max_delay_ms),
        }
    }

    /// Delay before attempt `n + 1`, given attempt `n` (1-based) failed:
    /// `base * 2^(n-1)`, capped.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u64 << attempt.saturating_sub(1).min(20);
        self.base_delay
            .saturating_mul(factor as u32)
            .min(self.max_delay)
    }

    /// Sender invocations this policy allows in total.
    pub fn invocation_cap(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

/// Drive `op` until it succeeds, fails permanently, or the policy is
/// exhausted. Every attempt is reported to `observe` (used for best-effort
/// queue bookkeeping; it must not block and cannot abort the loop).
pub async fn send_with_retry<F, Fut, O>(
    policy: &RetryPolicy,
    mut op: F,
    mut observe: O,
) -> SendOutcome
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = SendOutcome>,
    O: FnMut(&DeliveryAttempt),
{
    let cap = policy.invocation_cap();
    let mut last_failure: Option<SendFailure> = None;

    for attempt in 1..=cap {
        let started_at = Utc::now();
        match op(attempt).await {
            Ok(sent) => {
                observe(&DeliveryAttempt {
                    attempt_number: attempt,
                    started_at,
                    outcome: AttemptOutcome::Success,
                    error_detail: None,
                });
                return Ok(sent);
            }
            Err(failure) => {
                let outcome = if failure.is_transient() {
                    AttemptOutcome::TransientFailure
                } else {
                    AttemptOutcome::PermanentFailure
                };
                observe(&DeliveryAttempt {
                    attempt_number: attempt,
                    started_at,
                    outcome,
                    error_detail: Some(failure.error.clone()),
                });

                if !failure.is_transient() {
                    return Err(failure);
                }

                tracing::warn!(
                    "Delivery attempt {attempt}/{cap} failed: {}",
                    failure.error
                );
                last_failure = Some(failure);

                if attempt < cap {
                    tokio::time::sleep(policy.backoff(attempt)).await;
                }
            }
        }
    }

    Err(last_failure
        .unwrap_or_else(|| SendFailure::transient("delivery failed with no attempts recorded")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use vendora_core::types::Sent;

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(8),
        }
    }

    /// Sender that fails transiently `k` times, then succeeds.
    fn flaky(k: u32, calls: Arc<AtomicU32>) -> impl FnMut(u32) -> std::pin::Pin<Box<dyn Future<Output = SendOutcome> + Send>> {
        move |_attempt| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            Box::pin(async move {
                if n < k {
                    Err(SendFailure::transient("provider 503"))
                } else {
                    Ok(Sent { provider_id: "msg-1".into() })
                }
            })
        }
    }

    #[tokio::test]
    async fn test_succeeds_after_k_transient_failures() {
        let calls = Arc::new(AtomicU32::new(0));
        let outcome = send_with_retry(&policy(5), flaky(2, calls.clone()), |_| {}).await;
        assert!(outcome.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 3); // k + 1
    }

    #[tokio::test]
    async fn test_exhaustion_invokes_exactly_max_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let outcome = send_with_retry(&policy(3), flaky(99, calls.clone()), |_| {}).await;
        let failure = outcome.unwrap_err();
        assert!(failure.is_transient());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_zero_max_attempts_fails_fast() {
        let calls = Arc::new(AtomicU32::new(0));
        let outcome = send_with_retry(&policy(0), flaky(99, calls.clone()), |_| {}).await;
        assert!(outcome.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_permanent_failure_never_retries() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls2 = calls.clone();
        let outcome = send_with_retry(
            &policy(5),
            move |_| {
                calls2.fetch_add(1, Ordering::SeqCst);
                Box::pin(async { Err(SendFailure::permanent("invalid recipient")) })
                    as std::pin::Pin<Box<dyn Future<Output = SendOutcome> + Send>>
            },
            |_| {},
        )
        .await;
        assert!(!outcome.unwrap_err().is_transient());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_observer_sees_every_attempt_in_order() {
        let calls = Arc::new(AtomicU32::new(0));
        let mut seen = Vec::new();
        let _ = send_with_retry(&policy(3), flaky(1, calls), |attempt| {
            seen.push((attempt.attempt_number, attempt.outcome));
        })
        .await;
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0], (1, AttemptOutcome::TransientFailure));
        assert_eq!(seen[1], (2, AttemptOutcome::Success));
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let p = RetryPolicy {
            max_attempts: 10,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(450),
        };
        assert_eq!(p.backoff(1), Duration::from_millis(100));
        assert_eq!(p.backoff(2), Duration::from_millis(200));
        assert_eq!(p.backoff(3), Duration::from_millis(400));
        assert_eq!(p.backoff(4), Duration::from_millis(450)); // capped
        assert_eq!(p.backoff(10), Duration::from_millis(450));
    }
}
