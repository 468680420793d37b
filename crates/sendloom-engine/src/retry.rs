//! Retry governor — bounded exponential backoff around one fallible
//! delivery attempt.
//!
//! Backoff governs the cadence *within* one contact's attempts; the pacing
//! gate between contacts is untouched by anything here.

use rand::Rng;
use std::future::Future;
use tokio::time::{sleep, Duration};

use sendloom_core::cancel::CancelToken;
use sendloom_core::config::RetryConfig;
use sendloom_core::error::{Result, SendloomError};

/// Run `op` up to `policy.max_attempts` times. Between failed attempts the
/// delay starts at `initial_delay_ms`, multiplies by `backoff_multiplier`
/// and is capped at `max_delay_ms`; a small random jitter (up to 10%) is
/// added to each sleep. The first success returns immediately; exhaustion
/// returns `RetryExhausted` wrapping the last error. Cancellation is checked
/// before every attempt and surfaces as `Cancelled`, not as a failure.
pub async fn run_with_retry<T, F, Fut>(
    mut op: F,
    policy: &RetryConfig,
    cancel: &CancelToken,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut delay = Duration::from_millis(policy.initial_delay_ms);
    let max_delay = Duration::from_millis(policy.max_delay_ms);
    let mut last_error: Option<SendloomError> = None;

    for attempt in 1..=max_attempts {
        if cancel.is_cancelled() {
            return Err(SendloomError::Cancelled);
        }

        match op().await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!("Attempt {attempt}/{max_attempts} succeeded");
                } else {
                    tracing::debug!("Attempt 1/{max_attempts} succeeded");
                }
                return Ok(value);
            }
            Err(SendloomError::Cancelled) => return Err(SendloomError::Cancelled),
            Err(e) => {
                tracing::warn!("Attempt {attempt}/{max_attempts} failed: {e}");
                last_error = Some(e);
                if attempt < max_attempts {
                    sleep(with_jitter(delay)).await;
                    delay = (delay.mul_f64(policy.backoff_multiplier)).min(max_delay);
                }
            }
        }
    }

    Err(SendloomError::RetryExhausted {
        attempts: max_attempts,
        last: Box::new(last_error.unwrap_or_else(|| {
            SendloomError::Transport("no attempt was executed".into())
        })),
    })
}

/// Add up to 10% random jitter so parallel processes do not fall into
/// lockstep against the same endpoint.
fn with_jitter(delay: Duration) -> Duration {
    let jitter_ms = delay.as_millis() as u64 / 10;
    if jitter_ms == 0 {
        return delay;
    }
    delay + Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_ms))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use tokio::time::Instant;

    fn policy(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            initial_delay_ms: 1000,
            max_delay_ms: 10000,
            backoff_multiplier: 2.0,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_success_returns_immediately() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let result = run_with_retry(
            move || {
                let c = c.clone();
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, SendloomError>(42)
                }
            },
            &policy(3),
            &CancelToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(result, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_makes_exact_attempts_with_backoff() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let start = Instant::now();
        let err = run_with_retry(
            move || {
                let c = c.clone();
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(SendloomError::Transport("boom".into()))
                }
            },
            &policy(3),
            &CancelToken::new(),
        )
        .await
        .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // ~1000ms then ~2000ms between attempts, plus at most 10% jitter each.
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(3000), "elapsed {elapsed:?}");
        assert!(elapsed <= Duration::from_millis(3400), "elapsed {elapsed:?}");

        match err {
            SendloomError::RetryExhausted { attempts, last } => {
                assert_eq!(attempts, 3);
                assert!(last.to_string().contains("boom"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovery_on_second_attempt() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let result = run_with_retry(
            move || {
                let c = c.clone();
                async move {
                    if c.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err(SendloomError::Transport("transient".into()))
                    } else {
                        Ok("ok")
                    }
                }
            },
            &policy(3),
            &CancelToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(result, "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_attempt_never_sleeps() {
        let start = Instant::now();
        let err = run_with_retry(
            || async { Err::<(), _>(SendloomError::Transport("boom".into())) },
            &policy(1),
            &CancelToken::new(),
        )
        .await
        .unwrap_err();
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert!(matches!(
            err,
            SendloomError::RetryExhausted { attempts: 1, .. }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_short_circuits() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let err = run_with_retry(
            move || {
                let c = c.clone();
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, SendloomError>(())
                }
            },
            &policy(3),
            &cancel,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, SendloomError::Cancelled));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
