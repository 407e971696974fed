//! Property tests for the retry policy.
//!
//! Invariants tested:
//! - Never exceeds max_attempts
//! - Stops at the first success
//! - Non-retryable errors are returned after one attempt
//! - Never waits past the elapsed-time budget
//! - Exponential delays grow monotonically and respect the cap
//! - Jittered delays stay inside the randomization band

use super::{TestError, paused_runtime};
use proptest::prelude::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use storeguard_retry::{
    ExponentialBackoff, ExponentialRandomBackoff, FixedInterval, IntervalFunction, RetryConfig,
};
use tokio::time::Instant;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    /// Property: retry never exceeds max_attempts
    #[test]
    fn retry_respects_max_attempts(max_attempts in 1usize..=10) {
        let rt = paused_runtime();
        rt.block_on(async {
            let calls = Arc::new(AtomicUsize::new(0));
            let policy = RetryConfig::builder()
                .backoff(FixedInterval::new(Duration::from_millis(1)))
                .max_attempts(max_attempts)
                .unbounded_elapsed_time()
                .build();

            let result = policy
                .run(|| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err::<(), _>(TestError::Transient) }
                })
                .await;

            prop_assert_eq!(result, Err(TestError::Transient));
            prop_assert_eq!(calls.load(Ordering::SeqCst), max_attempts);
            Ok(())
        })?;
    }

    /// Property: the first success ends the loop
    #[test]
    fn retry_stops_at_first_success(
        max_attempts in 2usize..=10,
        failures in 0usize..10,
    ) {
        let failures = failures % max_attempts;
        let rt = paused_runtime();
        rt.block_on(async {
            let calls = AtomicUsize::new(0);
            let policy = RetryConfig::builder()
                .backoff(FixedInterval::new(Duration::from_millis(10)))
                .max_attempts(max_attempts)
                .build();

            let result = policy
                .run(|| {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    async move { if n < failures { Err(TestError::Transient) } else { Ok(n) } }
                })
                .await;

            prop_assert_eq!(result, Ok(failures));
            prop_assert_eq!(calls.load(Ordering::SeqCst), failures + 1);
            Ok(())
        })?;
    }

    /// Property: a non-retryable error is returned from the attempt that
    /// produced it
    #[test]
    fn retry_predicate_is_respected(transient_first in 0usize..5) {
        let rt = paused_runtime();
        rt.block_on(async {
            let calls = AtomicUsize::new(0);
            let policy = RetryConfig::request_path()
                .retry_on(|e: &TestError| *e == TestError::Transient)
                .build();

            let result = policy
                .run(|| {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    async move {
                        if n < transient_first { Err::<(), _>(TestError::Transient) } else { Err(TestError::Fatal) }
                    }
                })
                .await;

            prop_assert_eq!(result, Err(TestError::Fatal));
            prop_assert_eq!(calls.load(Ordering::SeqCst), transient_first + 1);
            Ok(())
        })?;
    }

    /// Property: the loop gives up rather than sleep past its budget
    #[test]
    fn retry_stays_within_elapsed_budget(
        initial_ms in 10u64..=500,
        budget_ms in 100u64..=10_000,
    ) {
        let rt = paused_runtime();
        rt.block_on(async {
            let budget = Duration::from_millis(budget_ms);
            let policy = RetryConfig::builder()
                .initial_delay(Duration::from_millis(initial_ms))
                .max_delay(Duration::from_secs(2))
                .randomization_factor(0.0)
                .max_elapsed_time(budget)
                .build();
            let calls = AtomicUsize::new(0);

            let started = Instant::now();
            let _ = policy
                .run(|| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err::<(), _>(TestError::Transient) }
                })
                .await;
            let elapsed = started.elapsed();

            prop_assert!(elapsed <= budget, "waited {:?} with a {:?} budget", elapsed, budget);
            // the next wait would have overrun the budget
            let attempts = calls.load(Ordering::SeqCst);
            prop_assert!(elapsed + policy.config().delay_after(attempts) > budget);
            Ok(())
        })?;
    }

    /// Property: exponential delays never shrink and never pass the cap
    #[test]
    fn exponential_delays_are_monotone_and_capped(
        initial_ms in 1u64..=1000,
        multiplier in 1.0f64..=4.0,
        cap_ms in 1u64..=60_000,
    ) {
        let cap = Duration::from_millis(cap_ms);
        let backoff = ExponentialBackoff::new(Duration::from_millis(initial_ms))
            .multiplier(multiplier)
            .max_interval(cap);

        let mut previous = Duration::ZERO;
        for retry in 0..40 {
            let delay = backoff.next_interval(retry);
            prop_assert!(delay >= previous);
            prop_assert!(delay <= cap);
            previous = delay;
        }
    }

    /// Property: jitter keeps each delay inside `base × [1 - f, 1 + f]`
    #[test]
    fn jittered_delays_stay_in_band(
        initial_ms in 10u64..=1000,
        factor in 0.0f64..=1.0,
        retry in 0usize..8,
    ) {
        let base = ExponentialBackoff::new(Duration::from_millis(initial_ms))
            .multiplier(1.5)
            .next_interval(retry)
            .as_secs_f64();
        let jittered = ExponentialRandomBackoff::new(Duration::from_millis(initial_ms), factor)
            .multiplier(1.5);

        for _ in 0..20 {
            let delay = jittered.next_interval(retry).as_secs_f64();
            prop_assert!(delay >= base * (1.0 - factor) - 1e-6);
            prop_assert!(delay <= base * (1.0 + factor) + 1e-6);
        }
    }
}
