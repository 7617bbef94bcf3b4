use std::sync::{
    atomic::{AtomicU32, Ordering},
    Arc,
};

use super::*;
use shared::error::{ApiError, ErrorCode};

fn instant_policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        base_delay: Duration::ZERO,
        max_delay: Duration::ZERO,
    }
}

fn unavailable() -> DspError {
    DspError::Api(ApiError::new(
        ErrorCode::ServiceUnavailable,
        503,
        "try again later",
    ))
}

#[test]
fn delays_double_and_are_capped() {
    let policy = RetryPolicy::default();
    assert_eq!(policy.delay_for(0), Duration::from_secs(1));
    assert_eq!(policy.delay_for(1), Duration::from_secs(2));
    assert_eq!(policy.delay_for(6), Duration::from_secs(64));
    assert_eq!(policy.delay_for(10), Duration::from_secs(64));
    assert_eq!(policy.delay_for(40), Duration::from_secs(64));
}

#[tokio::test(start_paused = true)]
async fn default_policy_sleeps_six_times_for_63_seconds() {
    let calls = Arc::new(AtomicU32::new(0));
    let started = tokio::time::Instant::now();
    let err = with_retry(&RetryPolicy::default(), "always down", || {
        let calls = calls.clone();
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(unavailable())
        }
    })
    .await
    .expect_err("exhausted");
    assert!(matches!(err, DspError::RetryExhausted { attempts: 7, .. }));
    assert_eq!(calls.load(Ordering::SeqCst), 7);
    // 1 + 2 + 4 + 8 + 16 + 32
    assert_eq!(started.elapsed(), Duration::from_secs(63));
}

#[tokio::test]
async fn transient_errors_are_retried_until_success() {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();
    let value = with_retry(&instant_policy(7), "cannot read project", || {
        let counter = counter.clone();
        async move {
            if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(unavailable())
            } else {
                Ok(42)
            }
        }
    })
    .await
    .expect("third attempt succeeds");
    assert_eq!(value, 42);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn terminal_error_stops_immediately() {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();
    let err = with_retry(&instant_policy(7), "cannot create project", || {
        let counter = counter.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(DspError::Api(ApiError::new(
                ErrorCode::Validation,
                400,
                "duplicate shortcode",
            )))
        }
    })
    .await
    .expect_err("terminal");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    match err {
        DspError::Operation { context, source } => {
            assert_eq!(context, "cannot create project");
            assert_eq!(source.api_code(), Some(ErrorCode::Validation));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn exhaustion_keeps_last_error() {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();
    let err = with_retry(&instant_policy(3), "cannot reach server", || {
        let counter = counter.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(unavailable())
        }
    })
    .await
    .expect_err("exhausted");
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert!(matches!(
        err,
        DspError::RetryExhausted { attempts: 3, ref context, .. } if context == "cannot reach server"
    ));
    assert_eq!(err.api_code(), Some(ErrorCode::ServiceUnavailable));
}

#[tokio::test]
async fn login_with_retry_gives_up_on_unreachable_server() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");

    let err = login_with_retry(
        &format!("http://{addr}"),
        "root@example.com",
        "test",
        &instant_policy(2),
    )
    .await
    .expect_err("nothing listens");
    assert!(matches!(err, DspError::RetryExhausted { attempts: 2, .. }));
}
