//! Tests for the retry control loop.

use super::*;
use crate::context::{Context, ContextError};
use crate::status::{self, Code, HasStatus, Status, StatusSource};
use crate::testing::CountingSleeper;
use std::fmt;
use std::time::Duration;

/// An error with no status of its own.
#[derive(Debug, Clone, PartialEq)]
struct PlainError(&'static str);

impl fmt::Display for PlainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

impl std::error::Error for PlainError {}

impl StatusSource for PlainError {}

/// An error with an owned message, so its identity can be checked after a
/// move.
#[derive(Debug)]
struct OwnedError(Box<str>);

impl fmt::Display for OwnedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for OwnedError {}

impl StatusSource for OwnedError {}

/// A caller-defined error that knows its own status.
#[derive(Debug, Clone)]
struct ApiError;

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("api: not found")
    }
}

impl std::error::Error for ApiError {}

impl HasStatus for ApiError {
    fn status(&self) -> Status {
        Status::new(Code::NotFound, "not found")
    }
}

fn no_wait(_: &Context, _: Duration) -> Result<(), ContextError> {
    Ok(())
}

#[test]
fn test_runs_until_operation_stops() {
    let mut n = 0;
    let end_retry = PlainError("end retry");

    let result: Result<(), _> = retry(
        &Context::background(),
        &Backoff::default(),
        || {
            n += 1;
            if n < 10 {
                Attempt::again()
            } else {
                Attempt::fail(end_retry.clone())
            }
        },
        no_wait,
    );

    assert_eq!(result, Err(RetryError::Terminal(PlainError("end retry"))));
    assert_eq!(n, 10);
}

#[test]
fn test_terminal_error_is_the_same_value() {
    let message: Box<str> = "already exists".into();
    let address = message.as_ptr();
    let mut slot = Some(OwnedError(message));

    let result: Result<(), RetryError<OwnedError>> = retry(
        &Context::background(),
        &Backoff::default(),
        || match slot.take() {
            Some(err) => Attempt::fail(err),
            None => Attempt::success(()),
        },
        no_wait,
    );

    let err = crate::assert_terminal!(result);
    assert!(std::ptr::eq(err.0.as_ptr(), address));
}

#[test]
fn test_sleeper_error_ends_loop() {
    let sleeper = CountingSleeper::abort_after(10, ContextError::DeadlineExceeded);
    let mut calls = 0;

    let result: Result<(), RetryError<PlainError>> = retry(
        &Context::background(),
        &Backoff::default(),
        || {
            calls += 1;
            Attempt::again()
        },
        |ctx, pause| sleeper.sleep(ctx, pause),
    );

    assert!(result.is_err());
    assert_eq!(sleeper.calls(), 10);
    assert_eq!(calls, 10);
}

#[test]
fn test_abort_without_last_error_reports_reason() {
    let result: Result<(), RetryError<PlainError>> = retry(
        &Context::background(),
        &Backoff::default(),
        Attempt::again,
        |_, _| Err(ContextError::DeadlineExceeded),
    );

    let err = result.unwrap_err();
    assert_eq!(err, RetryError::aborted(ContextError::DeadlineExceeded, None));
    assert_eq!(err.to_string(), "context deadline exceeded");
    assert_eq!(err.code(), Code::DeadlineExceeded);
}

#[test]
fn test_abort_preserves_status_of_last_error() {
    let err = retry::<(), _, _, _>(
        &Context::background(),
        &Backoff::default(),
        || Attempt::retry(Status::new(Code::NotFound, "not found")),
        |_, _| Err(ContextError::DeadlineExceeded),
    )
    .unwrap_err();

    let last = Status::new(Code::NotFound, "not found");
    assert_eq!(
        err.to_string(),
        format!("retry failed with context deadline exceeded; last error: {}", last)
    );
    let status = err.status();
    assert_eq!(status.code(), Code::NotFound);
    assert_eq!(status.message(), "not found");

    let boxed: Box<dyn std::error::Error> = Box::new(err);
    let status = status::convert(boxed.as_ref());
    assert_eq!(status.code(), Code::NotFound);
    assert_eq!(status.message(), "not found");
}

#[test]
fn test_abort_preserves_status_of_caller_defined_error() {
    let err = retry::<(), _, _, _>(
        &Context::background(),
        &Backoff::default(),
        || Attempt::retry(ApiError),
        CountingSleeper::abort_after(1, ContextError::DeadlineExceeded).sleep_fn(),
    )
    .unwrap_err();

    assert_eq!(err.code(), Code::NotFound);
    assert_eq!(err.message(), "not found");
    assert_eq!(
        err.to_string(),
        "retry failed with context deadline exceeded; last error: api: not found"
    );
}

#[test]
fn test_abort_wraps_plain_error_with_unknown() {
    let err = retry::<(), _, _, _>(
        &Context::background(),
        &Backoff::default(),
        || Attempt::retry(PlainError("test error")),
        |_, _| Err(ContextError::DeadlineExceeded),
    )
    .unwrap_err();

    assert_eq!(
        err.to_string(),
        "retry failed with context deadline exceeded; last error: test error"
    );
    assert_eq!(err.code(), Code::Unknown);
}

#[test]
fn test_success_on_first_attempt() {
    let sleeper = CountingSleeper::new();

    let result: Result<(), RetryError<PlainError>> = retry(
        &Context::background(),
        &Backoff::default(),
        || Attempt::success(()),
        |ctx, pause| sleeper.sleep(ctx, pause),
    );

    assert_eq!(result, Ok(()));
    assert_eq!(sleeper.calls(), 0);
}

#[test]
fn test_success_value_is_returned() {
    let mut n = 0;
    let result: Result<u32, RetryError<PlainError>> = retry(
        &Context::background(),
        &Backoff::default(),
        || {
            n += 1;
            if n < 3 {
                Attempt::retry(PlainError("flaky"))
            } else {
                Attempt::success(n * 10)
            }
        },
        no_wait,
    );

    assert_eq!(result, Ok(30));
}

#[test]
fn test_last_error_is_most_recent_real_error() {
    let mut n = 0;
    let err = retry::<(), _, _, _>(
        &Context::background(),
        &Backoff::default(),
        || {
            n += 1;
            match n {
                1 => Attempt::retry(PlainError("first")),
                2 => Attempt::retry(PlainError("second")),
                _ => Attempt::again(),
            }
        },
        CountingSleeper::abort_after(4, ContextError::Cancelled).sleep_fn(),
    )
    .unwrap_err();

    assert_eq!(err.error(), Some(&PlainError("second")));
    assert_eq!(
        err.to_string(),
        "retry failed with context canceled; last error: second"
    );
}

#[test]
fn test_context_errors_are_not_remembered() {
    let mut n = 0;
    let err = retry::<(), _, _, _>(
        &Context::background(),
        &Backoff::default(),
        || {
            n += 1;
            Attempt::retry(ContextError::DeadlineExceeded)
        },
        CountingSleeper::abort_after(3, ContextError::Cancelled).sleep_fn(),
    )
    .unwrap_err();

    assert_eq!(n, 3);
    assert_eq!(err, RetryError::aborted(ContextError::Cancelled, None));
    assert_eq!(err.to_string(), "context canceled");
    assert_eq!(err.code(), Code::Cancelled);
}

#[test]
fn test_nested_loop_keeps_inner_status() {
    let inner = || {
        retry::<(), _, _, _>(
            &Context::background(),
            &Backoff::default(),
            || Attempt::retry(Status::new(Code::NotFound, "not found")),
            CountingSleeper::abort_after(1, ContextError::DeadlineExceeded).sleep_fn(),
        )
    };

    let err = retry::<(), _, _, _>(
        &Context::background(),
        &Backoff::default(),
        || match inner() {
            Ok(()) => Attempt::success(()),
            Err(err) => Attempt::retry(err),
        },
        CountingSleeper::abort_after(2, ContextError::DeadlineExceeded).sleep_fn(),
    )
    .unwrap_err();

    let inner_err = err.error().expect("inner error is remembered");
    assert!(inner_err.is_aborted());
    assert_eq!(
        err.to_string(),
        format!("retry failed with context deadline exceeded; last error: {}", inner_err)
    );
    assert_eq!(err.code(), Code::NotFound);
    assert_eq!(err.message(), "not found");
}

#[test]
fn test_sleeper_receives_backoff_pauses() {
    let sleeper = CountingSleeper::abort_after(5, ContextError::DeadlineExceeded);
    let backoff = Backoff::new(Duration::from_millis(10), Duration::from_millis(50), 2.0);

    let _ = retry::<(), PlainError, _, _>(
        &Context::background(),
        &backoff,
        Attempt::again,
        |ctx, pause| sleeper.sleep(ctx, pause),
    );

    assert_eq!(
        sleeper.pauses(),
        vec![
            Duration::from_millis(10),
            Duration::from_millis(20),
            Duration::from_millis(40),
            Duration::from_millis(50),
            Duration::from_millis(50),
        ]
    );
}

#[test]
fn test_zero_value_backoff_with_many_attempts() {
    let sleeper = CountingSleeper::abort_after(1000, ContextError::DeadlineExceeded);

    let _ = retry::<(), PlainError, _, _>(
        &Context::background(),
        &Backoff::default(),
        Attempt::again,
        |ctx, pause| sleeper.sleep(ctx, pause),
    );

    assert_eq!(sleeper.calls(), 1000);
    assert!(sleeper
        .pauses()
        .iter()
        .all(|p| *p <= Duration::from_secs(30)));
}

#[test]
fn test_sleeper_sees_callers_context() {
    let (ctx, cancel) = Context::background().with_cancel();
    let mut n = 0;

    let result: Result<(), RetryError<PlainError>> = retry(
        &ctx,
        &Backoff::default(),
        || {
            n += 1;
            if n == 2 {
                cancel.cancel();
            }
            Attempt::again()
        },
        |ctx, _| match ctx.err() {
            Some(err) => Err(err),
            None => Ok(()),
        },
    );

    assert_eq!(
        result,
        Err(RetryError::aborted(ContextError::Cancelled, None))
    );
    assert_eq!(n, 2);
}

#[test]
fn test_stop_pair_operations() {
    let mut n = 0;
    let result: Result<(), RetryError<PlainError>> = retry(
        &Context::background(),
        &Backoff::default(),
        || {
            n += 1;
            Attempt::from((n == 4, None))
        },
        no_wait,
    );

    assert_eq!(result, Ok(()));
    assert_eq!(n, 4);
}

#[test]
fn test_real_sleep_with_expired_context() {
    let ctx = Context::background().with_timeout(Duration::ZERO);

    let err = retry::<(), _, _, _>(
        &ctx,
        &Backoff::new(Duration::from_secs(10), Duration::from_secs(10), 1.0),
        || Attempt::retry(Status::new(Code::Unavailable, "down")),
        sleep,
    )
    .unwrap_err();

    assert_eq!(err.reason(), Some(ContextError::DeadlineExceeded));
    assert_eq!(err.code(), Code::Unavailable);
}

#[cfg(feature = "jitter")]
#[test]
fn test_nan_jitter_factor_does_not_break_the_loop() {
    let sleeper = CountingSleeper::abort_after(3, ContextError::DeadlineExceeded);
    let backoff = Backoff::default().with_jitter(f64::NAN);

    let err = retry::<(), _, _, _>(
        &Context::background(),
        &backoff,
        || Attempt::retry(PlainError("flaky")),
        sleeper.sleep_fn(),
    )
    .unwrap_err();

    assert_eq!(err.reason(), Some(ContextError::DeadlineExceeded));
    assert_eq!(
        sleeper.pauses(),
        vec![
            Duration::from_secs(1),
            Duration::from_secs(2),
            Duration::from_secs(4)
        ]
    );
}

#[cfg(feature = "async")]
mod async_tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_retry_async_runs_until_stop() {
        let attempts = Arc::new(AtomicU32::new(0));
        let sleeper = CountingSleeper::new();

        let result: Result<&str, RetryError<PlainError>> = retry_async(
            &Context::background(),
            &Backoff::default(),
            {
                let attempts = attempts.clone();
                move || {
                    let attempts = attempts.clone();
                    async move {
                        let n = attempts.fetch_add(1, Ordering::SeqCst);
                        if n < 2 {
                            Attempt::retry(PlainError("transient failure"))
                        } else {
                            Attempt::success("success")
                        }
                    }
                }
            },
            |ctx, pause| sleeper.sleep_ready(ctx, pause),
        )
        .await;

        assert_eq!(result, Ok("success"));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        assert_eq!(sleeper.calls(), 2);
    }

    #[tokio::test]
    async fn test_retry_async_abort_preserves_status() {
        let err = retry_async::<(), _, _, _, _, _>(
            &Context::background(),
            &Backoff::default(),
            || async { Attempt::<(), _>::retry(Status::new(Code::NotFound, "not found")) },
            |_, _| async { Err::<(), _>(ContextError::DeadlineExceeded) },
        )
        .await
        .unwrap_err();

        assert!(err
            .to_string()
            .starts_with("retry failed with context deadline exceeded; last error: "));
        assert_eq!(err.code(), Code::NotFound);
    }

    #[tokio::test]
    async fn test_retry_async_with_real_deadline() {
        let ctx = Context::background().with_timeout(Duration::from_millis(30));
        let backoff = Backoff::new(Duration::from_millis(5), Duration::from_millis(5), 1.0);

        let err = retry_async::<(), _, _, _, _, _>(
            &ctx,
            &backoff,
            || async { Attempt::<(), _>::retry(PlainError("test error")) },
            sleep_async,
        )
        .await
        .unwrap_err();

        assert_eq!(err.reason(), Some(ContextError::DeadlineExceeded));
        assert_eq!(err.code(), Code::Unknown);
    }
}
