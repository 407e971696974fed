//! Property tests for the circuit breaker.
//!
//! Invariants tested:
//! - A consecutive-failure policy opens after exactly `n` failures
//! - An open breaker never runs the operation
//! - A failure-ratio breaker agrees with a simple counting model
//! - Half-open closes after `probes` successes and reopens on any failure

use super::{TestError, paused_runtime};
use proptest::prelude::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use storeguard_circuitbreaker::{CircuitBreakerConfig, CircuitState, Counts, TripPolicy};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(40))]

    /// Property: the breaker opens on the n-th consecutive failure, not before
    #[test]
    fn opens_after_exactly_n_consecutive_failures(
        threshold in 1u32..=20,
        extra in 1usize..=10,
    ) {
        let rt = paused_runtime();
        rt.block_on(async {
            let breaker = CircuitBreakerConfig::builder()
                .trip_policy(TripPolicy::consecutive_failures(threshold))
                .build();
            let runs = Arc::new(AtomicUsize::new(0));

            for i in 1..=threshold {
                let runs = Arc::clone(&runs);
                let _ = breaker
                    .execute(|| async move {
                        runs.fetch_add(1, Ordering::SeqCst);
                        Err::<(), _>(TestError::Transient)
                    })
                    .await;
                let expected = if i < threshold { CircuitState::Closed } else { CircuitState::Open };
                prop_assert_eq!(breaker.state(), expected);
            }

            // nothing else reaches the operation
            for _ in 0..extra {
                let runs = Arc::clone(&runs);
                let result = breaker
                    .execute(|| async move {
                        runs.fetch_add(1, Ordering::SeqCst);
                        Ok::<_, TestError>(())
                    })
                    .await;
                prop_assert!(result.unwrap_err().is_circuit_open());
            }
            prop_assert_eq!(runs.load(Ordering::SeqCst), threshold as usize);

            Ok(())
        })?;
    }

    /// Property: a success anywhere in the run resets the consecutive count
    #[test]
    fn interleaved_successes_keep_the_breaker_closed(
        threshold in 2u32..=10,
        rounds in 1usize..=20,
    ) {
        let rt = paused_runtime();
        rt.block_on(async {
            let breaker = CircuitBreakerConfig::builder()
                .trip_policy(TripPolicy::consecutive_failures(threshold))
                .build();

            for _ in 0..rounds {
                for _ in 0..threshold - 1 {
                    let _ = breaker.execute(|| async { Err::<(), _>(TestError::Transient) }).await;
                }
                breaker.execute(|| async { Ok::<_, TestError>(()) }).await.unwrap();
            }

            prop_assert_eq!(breaker.state(), CircuitState::Closed);
            prop_assert_eq!(breaker.counts().consecutive_failures, 0);
            Ok(())
        })?;
    }

    /// Property: a failure-ratio breaker follows the counting model call by call
    #[test]
    fn failure_ratio_matches_model(
        min_requests in 1u32..=10,
        ratio in 0.1f64..=1.0,
        outcomes in prop::collection::vec(any::<bool>(), 1..60),
    ) {
        let rt = paused_runtime();
        rt.block_on(async {
            let breaker = CircuitBreakerConfig::builder()
                .trip_policy(TripPolicy::failure_ratio(min_requests, ratio))
                .open_timeout(Duration::from_secs(60))
                .build();

            let mut model = Counts::default();
            let mut open = false;

            for ok in outcomes {
                let result = breaker
                    .execute(|| async move { if ok { Ok(()) } else { Err(TestError::Transient) } })
                    .await;

                if open {
                    prop_assert!(result.unwrap_err().is_circuit_open());
                    continue;
                }

                model.requests += 1;
                if ok {
                    model.total_successes += 1;
                    model.consecutive_successes += 1;
                    model.consecutive_failures = 0;
                } else {
                    model.total_failures += 1;
                    model.consecutive_failures += 1;
                    model.consecutive_successes = 0;
                    if model.requests >= min_requests && model.failure_ratio() >= ratio {
                        open = true;
                        model = Counts::default();
                    }
                }

                prop_assert_eq!(breaker.counts(), model);
                let expected = if open { CircuitState::Open } else { CircuitState::Closed };
                prop_assert_eq!(breaker.state(), expected);
            }
            Ok(())
        })?;
    }

    /// Property: half-open closes after `probes` successes, or reopens on the
    /// first failed probe
    #[test]
    fn half_open_resolves_on_probe_outcomes(
        probes in 1u32..=5,
        fail_at in prop::option::of(0u32..5),
    ) {
        let rt = paused_runtime();
        rt.block_on(async {
            let breaker = CircuitBreakerConfig::builder()
                .trip_policy(TripPolicy::consecutive_failures(1))
                .max_half_open_probes(probes)
                .open_timeout(Duration::from_secs(5))
                .build();
            let _ = breaker.execute(|| async { Err::<(), _>(TestError::Fatal) }).await;
            tokio::time::advance(Duration::from_secs(5)).await;
            prop_assert_eq!(breaker.state(), CircuitState::HalfOpen);

            let fail_at = fail_at.filter(|at| *at < probes);
            for i in 0..probes {
                let fails = fail_at == Some(i);
                let _ = breaker
                    .execute(|| async move { if fails { Err(TestError::Transient) } else { Ok(()) } })
                    .await;
                if fails {
                    prop_assert_eq!(breaker.state(), CircuitState::Open);
                    return Ok(());
                }
            }
            prop_assert_eq!(breaker.state(), CircuitState::Closed);
            prop_assert_eq!(breaker.counts(), Counts::default());
            Ok(())
        })?;
    }
}
