use super::support::{DbError, Flaky};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use storeguard_circuitbreaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError, CircuitState, Counts, TripPolicy,
};
use tower::{Service, ServiceExt};

fn ratio_breaker() -> CircuitBreaker {
    CircuitBreakerConfig::builder()
        .name("ratio")
        .trip_policy(TripPolicy::failure_ratio(3, 0.6))
        .open_timeout(Duration::from_secs(30))
        .build()
}

async fn fail(breaker: &CircuitBreaker) -> Result<(), CircuitBreakerError<DbError>> {
    breaker.execute(|| async { Err(DbError::Refused) }).await
}

async fn succeed(breaker: &CircuitBreaker) -> Result<(), CircuitBreakerError<DbError>> {
    breaker.execute(|| async { Ok(()) }).await
}

#[tokio::test]
async fn three_failures_open_a_ratio_breaker() {
    let breaker = ratio_breaker();

    fail(&breaker).await.unwrap_err();
    fail(&breaker).await.unwrap_err();
    assert_eq!(breaker.state(), CircuitState::Closed);

    fail(&breaker).await.unwrap_err();
    assert_eq!(breaker.state(), CircuitState::Open);
    assert_eq!(breaker.counts(), Counts::default());
}

#[tokio::test]
async fn two_failures_and_a_success_stay_closed() {
    let breaker = ratio_breaker();

    fail(&breaker).await.unwrap_err();
    fail(&breaker).await.unwrap_err();
    succeed(&breaker).await.unwrap();

    assert_eq!(breaker.state(), CircuitState::Closed);
    let counts = breaker.counts();
    assert_eq!(counts.requests, 3);
    assert_eq!(counts.total_failures, 2);
    assert_eq!(counts.consecutive_successes, 1);
}

#[tokio::test]
async fn open_breaker_does_not_run_the_operation() {
    let breaker = ratio_breaker();
    for _ in 0..3 {
        fail(&breaker).await.unwrap_err();
    }

    let flaky = Flaky::new(0);
    let err = breaker.execute(|| flaky.call()).await.unwrap_err();
    assert!(err.is_circuit_open());
    assert_eq!(flaky.calls(), 0);
    assert!(breaker.is_open());
    assert_eq!(breaker.health_status(), "unhealthy");
}

#[tokio::test(start_paused = true)]
async fn cooldown_admits_a_probe_that_closes_the_breaker() {
    let breaker = ratio_breaker();
    for _ in 0..3 {
        fail(&breaker).await.unwrap_err();
    }

    tokio::time::advance(Duration::from_secs(29)).await;
    assert_eq!(breaker.state(), CircuitState::Open);

    tokio::time::advance(Duration::from_secs(1)).await;
    assert_eq!(breaker.state(), CircuitState::HalfOpen);
    assert_eq!(breaker.health_status(), "degraded");

    succeed(&breaker).await.unwrap();
    assert_eq!(breaker.state(), CircuitState::Closed);
    assert_eq!(breaker.counts(), Counts::default());
}

#[tokio::test(start_paused = true)]
async fn failed_probe_restarts_the_cooldown() {
    let breaker = ratio_breaker();
    for _ in 0..3 {
        fail(&breaker).await.unwrap_err();
    }
    tokio::time::advance(Duration::from_secs(30)).await;

    fail(&breaker).await.unwrap_err();
    assert_eq!(breaker.state(), CircuitState::Open);

    tokio::time::advance(Duration::from_secs(29)).await;
    assert!(succeed(&breaker).await.unwrap_err().is_circuit_open());

    tokio::time::advance(Duration::from_secs(1)).await;
    succeed(&breaker).await.unwrap();
    assert_eq!(breaker.state(), CircuitState::Closed);
}

#[tokio::test(start_paused = true)]
async fn clear_interval_forgets_old_failures() {
    let breaker = CircuitBreakerConfig::builder()
        .trip_policy(TripPolicy::consecutive_failures(3))
        .clear_interval(Duration::from_secs(10))
        .build();

    fail(&breaker).await.unwrap_err();
    fail(&breaker).await.unwrap_err();
    tokio::time::advance(Duration::from_secs(10)).await;
    assert_eq!(breaker.counts(), Counts::default());

    fail(&breaker).await.unwrap_err();
    fail(&breaker).await.unwrap_err();
    assert_eq!(breaker.state(), CircuitState::Closed);
    fail(&breaker).await.unwrap_err();
    assert_eq!(breaker.state(), CircuitState::Open);
}

#[tokio::test]
async fn custom_trip_policy() {
    let breaker = CircuitBreakerConfig::builder()
        .trip_when(|counts| counts.total_failures >= 1 && counts.requests >= 4)
        .build();

    succeed(&breaker).await.unwrap();
    succeed(&breaker).await.unwrap();
    fail(&breaker).await.unwrap_err();
    assert_eq!(breaker.state(), CircuitState::Closed);

    fail(&breaker).await.unwrap_err();
    assert_eq!(breaker.state(), CircuitState::Open);
}

#[tokio::test]
async fn trip_policy_is_only_consulted_after_a_failure() {
    let consulted = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&consulted);
    let breaker = CircuitBreakerConfig::builder()
        .trip_when(move |counts| {
            seen.fetch_add(1, Ordering::SeqCst);
            counts.requests >= 2
        })
        .build();

    // the predicate already holds, but successes never trip the breaker
    succeed(&breaker).await.unwrap();
    succeed(&breaker).await.unwrap();
    succeed(&breaker).await.unwrap();
    assert_eq!(breaker.state(), CircuitState::Closed);
    assert_eq!(consulted.load(Ordering::SeqCst), 0);

    fail(&breaker).await.unwrap_err();
    assert_eq!(consulted.load(Ordering::SeqCst), 1);
    assert_eq!(breaker.state(), CircuitState::Open);
}

#[tokio::test]
async fn defaults_trip_after_more_than_five_consecutive_failures() {
    let breaker = CircuitBreaker::builder().build();
    assert_eq!(breaker.config().open_timeout(), Duration::from_secs(60));
    assert_eq!(breaker.config().max_half_open_probes(), 1);

    for _ in 0..5 {
        fail(&breaker).await.unwrap_err();
    }
    assert_eq!(breaker.state(), CircuitState::Closed);
    fail(&breaker).await.unwrap_err();
    assert_eq!(breaker.state(), CircuitState::Open);
}

#[tokio::test]
async fn callbacks_see_every_outcome() {
    let permitted = Arc::new(AtomicUsize::new(0));
    let rejected = Arc::new(AtomicUsize::new(0));
    let failures = Arc::new(AtomicUsize::new(0));
    let opened = Arc::new(AtomicUsize::new(0));

    let breaker = {
        let (p, r, f, o) = (
            Arc::clone(&permitted),
            Arc::clone(&rejected),
            Arc::clone(&failures),
            Arc::clone(&opened),
        );
        CircuitBreakerConfig::builder()
            .trip_policy(TripPolicy::consecutive_failures(2))
            .on_call_permitted(move |_| {
                p.fetch_add(1, Ordering::SeqCst);
            })
            .on_call_rejected(move |state| {
                assert_eq!(state, CircuitState::Open);
                r.fetch_add(1, Ordering::SeqCst);
            })
            .on_failure(move |_| {
                f.fetch_add(1, Ordering::SeqCst);
            })
            .on_state_transition(move |from, to| {
                if (from, to) == (CircuitState::Closed, CircuitState::Open) {
                    o.fetch_add(1, Ordering::SeqCst);
                }
            })
            .build()
    };

    for _ in 0..4 {
        let _ = fail(&breaker).await;
    }

    assert_eq!(permitted.load(Ordering::SeqCst), 2);
    assert_eq!(failures.load(Ordering::SeqCst), 2);
    assert_eq!(rejected.load(Ordering::SeqCst), 2);
    assert_eq!(opened.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn layer_guards_a_tower_service() {
    let breaker = CircuitBreakerConfig::builder()
        .trip_policy(TripPolicy::consecutive_failures(1))
        .build();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let inner = tower::service_fn(move |fail: bool| {
        counter.fetch_add(1, Ordering::SeqCst);
        async move { if fail { Err(DbError::Syntax) } else { Ok("ok") } }
    });
    let mut service = tower::Layer::layer(&breaker.layer(), inner);

    assert_eq!(service.ready().await.unwrap().call(false).await.unwrap(), "ok");
    let err = service.ready().await.unwrap().call(true).await.unwrap_err();
    assert!(matches!(err, CircuitBreakerError::Inner(DbError::Syntax)));

    let err = service.ready().await.unwrap().call(false).await.unwrap_err();
    assert!(err.is_circuit_open());
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert!(breaker.is_open());
}
