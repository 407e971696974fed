use super::support::{DbError, Flaky};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use storeguard_circuitbreaker::{CircuitBreakerConfig, CircuitState, Counts, TripPolicy};
use storeguard_executor::{ResilienceError, ResilientExecutor};
use storeguard_retry::{FixedInterval, RetryConfig};

fn executor(trip_after: u32) -> ResilientExecutor<DbError> {
    ResilientExecutor::new(
        CircuitBreakerConfig::builder()
            .name("orders-db")
            .trip_policy(TripPolicy::consecutive_failures(trip_after))
            .open_timeout(Duration::from_secs(2))
            .build(),
        RetryConfig::builder()
            .backoff(FixedInterval::new(Duration::from_millis(10)))
            .max_attempts(4)
            .build(),
    )
}

#[tokio::test(start_paused = true)]
async fn a_fully_retried_failure_is_one_breaker_failure() {
    let executor = executor(10);
    let flaky = Flaky::always_failing();

    let err = executor.execute(|| flaky.call()).await.unwrap_err();

    assert_eq!(err, ResilienceError::Application(DbError::Refused));
    assert_eq!(flaky.calls(), 4);
    let counts = executor.breaker().counts();
    assert_eq!(counts.requests, 1);
    assert_eq!(counts.total_failures, 1);
    assert_eq!(counts.consecutive_failures, 1);
}

#[tokio::test(start_paused = true)]
async fn a_recovered_call_is_one_breaker_success() {
    let executor = executor(10);
    let flaky = Flaky::new(3);

    assert_eq!(executor.execute(|| flaky.call()).await.unwrap(), "row");
    let counts = executor.breaker().counts();
    assert_eq!((counts.requests, counts.total_successes, counts.total_failures), (1, 1, 0));
}

#[tokio::test(start_paused = true)]
async fn breaker_lifecycle_end_to_end() {
    let executor = executor(2);
    let failing = Flaky::always_failing();

    // two failing calls open the breaker
    for _ in 0..2 {
        let err = executor.execute(|| failing.call()).await.unwrap_err();
        assert!(err.is_application());
    }
    assert_eq!(executor.breaker().state(), CircuitState::Open);

    // the third fails fast without running the operation
    let untouched = Flaky::new(0);
    let err = executor.execute(|| untouched.call()).await.unwrap_err();
    assert!(err.is_circuit_open());
    assert!(err.is_fail_fast());
    assert_eq!(err.breaker_name(), Some("orders-db"));
    assert_eq!(untouched.calls(), 0);

    // past the timeout a successful call closes it with fresh counts
    tokio::time::sleep(Duration::from_millis(2100)).await;
    assert_eq!(executor.execute(|| untouched.call()).await.unwrap(), "row");
    assert_eq!(executor.breaker().state(), CircuitState::Closed);
    assert_eq!(executor.breaker().counts(), Counts::default());

    // the next failure is judged from zero
    executor.execute(|| failing.call()).await.unwrap_err();
    assert_eq!(executor.breaker().state(), CircuitState::Closed);
    assert_eq!(executor.breaker().counts().consecutive_failures, 1);
}

#[tokio::test(start_paused = true)]
async fn datastore_preset() {
    let executor = ResilientExecutor::<DbError>::for_datastore();
    assert_eq!(executor.breaker().name(), "DatabaseCB");
    assert_eq!(executor.breaker().config().open_timeout(), Duration::from_secs(30));
    assert_eq!(executor.retry().config().name(), "DatabaseRetry");
    assert_eq!(executor.retry().config().max_elapsed_time(), Some(Duration::from_secs(5)));

    let failing = Flaky::always_failing();
    for _ in 0..3 {
        executor.execute(|| failing.call()).await.unwrap_err();
    }
    assert!(executor.breaker().is_open());
    // at most six physical attempts per logical call
    assert!(failing.calls() <= 18);
}

#[tokio::test(start_paused = true)]
async fn datastore_preset_returns_syntax_errors_at_once() {
    let executor = ResilientExecutor::<DbError>::for_datastore();
    let calls = AtomicUsize::new(0);

    let err = executor
        .execute(|| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(DbError::Syntax) }
        })
        .await
        .unwrap_err();

    assert_eq!(err.application_error(), Some(DbError::Syntax));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}
