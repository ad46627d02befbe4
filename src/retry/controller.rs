//! The retry control loop.

use std::error::Error as StdError;
use std::time::Duration;

#[cfg(feature = "async")]
use std::future::Future;

use crate::context::{Context, ContextError};
use crate::retry::{Attempt, Backoff, Pauses, RetryError};
use crate::status::StatusSource;

/// Run `operation` until it returns [`Attempt::Done`] or `sleeper` refuses to
/// wait.
///
/// Between attempts the loop asks `backoff` for the next pause and hands it
/// to `sleeper` along with `ctx`. The sleeper is the only place the loop
/// blocks; pass [`sleep`] for real waiting, or a fake in tests.
///
/// # Returns
///
/// - `Ok(value)` when the operation stops with success.
/// - [`RetryError::Terminal`] holding the operation's error, untouched, when
///   it stops with a failure.
/// - [`RetryError::Aborted`] when the sleeper returns an error, carrying that
///   reason and the last error the operation reported while retrying.
///   An error that is itself a [`ContextError`] is not remembered as the
///   last error.
///
/// # Example
///
/// ```rust
/// use redial::{retry, Attempt, Backoff, Context};
/// use std::time::Duration;
///
/// let mut calls = 0;
/// let result = retry(
///     &Context::background(),
///     &Backoff::new(Duration::from_millis(1), Duration::from_millis(5), 2.0),
///     || {
///         calls += 1;
///         if calls < 3 {
///             Attempt::retry(std::io::Error::other("flaky"))
///         } else {
///             Attempt::success("done")
///         }
///     },
///     redial::sleep,
/// );
///
/// assert_eq!(result.unwrap(), "done");
/// assert_eq!(calls, 3);
/// ```
pub fn retry<T, E, Op, S>(
    ctx: &Context,
    backoff: &Backoff,
    mut operation: Op,
    mut sleeper: S,
) -> Result<T, RetryError<E>>
where
    E: StatusSource,
    Op: FnMut() -> Attempt<T, E>,
    S: FnMut(&Context, Duration) -> Result<(), ContextError>,
{
    let mut state = Attempting::new(backoff);
    loop {
        if let Some(result) = state.observe(operation()) {
            return result;
        }
        let pause = state.next_pause();
        if let Err(reason) = sleeper(ctx, pause) {
            return Err(state.abort(reason));
        }
    }
}

/// Async counterpart of [`retry`].
///
/// `operation` returns a future per attempt. `sleeper` receives an owned
/// clone of `ctx` so the future it returns does not borrow from the loop;
/// pass [`sleep_async`] for real waiting.
///
/// # Example
///
/// ```rust
/// use redial::{retry_async, Attempt, Backoff, Code, Context, Status};
/// use std::time::Duration;
///
/// # tokio_test::block_on(async {
/// let result = retry_async(
///     &Context::background(),
///     &Backoff::new(Duration::from_millis(1), Duration::from_millis(2), 2.0),
///     || async { Attempt::<(), _>::fail(Status::new(Code::NotFound, "not found")) },
///     redial::sleep_async,
/// )
/// .await;
///
/// assert!(result.unwrap_err().is_terminal());
/// # });
/// ```
#[cfg(feature = "async")]
pub async fn retry_async<T, E, Op, Fut, S, SFut>(
    ctx: &Context,
    backoff: &Backoff,
    mut operation: Op,
    mut sleeper: S,
) -> Result<T, RetryError<E>>
where
    E: StatusSource,
    Op: FnMut() -> Fut,
    Fut: Future<Output = Attempt<T, E>>,
    S: FnMut(Context, Duration) -> SFut,
    SFut: Future<Output = Result<(), ContextError>>,
{
    let mut state = Attempting::new(backoff);
    loop {
        if let Some(result) = state.observe(operation().await) {
            return result;
        }
        let pause = state.next_pause();
        if let Err(reason) = sleeper(ctx.clone(), pause).await {
            return Err(state.abort(reason));
        }
    }
}

/// Block for `pause`, or until `ctx` is cancelled or reaches its deadline.
///
/// Returns the context's error if it finishes first, including when it was
/// already done on entry.
pub fn sleep(ctx: &Context, pause: Duration) -> Result<(), ContextError> {
    ctx.wait(pause)
}

/// Async counterpart of [`sleep`], built on `tokio::time`.
#[cfg(feature = "async")]
pub async fn sleep_async(ctx: Context, pause: Duration) -> Result<(), ContextError> {
    ctx.wait_async(pause).await
}

/// Whether `error` is itself a context error. Errors that merely wrap one,
/// such as an inner loop's [`RetryError`], still count as real errors.
fn is_context_error(error: &(dyn StdError + 'static)) -> bool {
    error.is::<ContextError>()
}

/// Loop state while attempts are still being made.
struct Attempting<'a, E> {
    pauses: Pauses<'a>,
    last_error: Option<E>,
    attempts: u32,
}

impl<'a, E: StatusSource> Attempting<'a, E> {
    fn new(backoff: &'a Backoff) -> Self {
        Self {
            pauses: backoff.pauses(),
            last_error: None,
            attempts: 0,
        }
    }

    /// Record one attempt. Returns the final result if the attempt stops the
    /// loop.
    fn observe<T>(&mut self, attempt: Attempt<T, E>) -> Option<Result<T, RetryError<E>>> {
        self.attempts = self.attempts.saturating_add(1);
        match attempt {
            Attempt::Done(result) => {
                #[cfg(feature = "tracing")]
                tracing::debug!(
                    attempts = self.attempts,
                    success = result.is_ok(),
                    "retry loop stopped by operation"
                );
                Some(result.map_err(RetryError::Terminal))
            }
            Attempt::Retry(Some(error)) if !is_context_error(&error) => {
                self.last_error = Some(error);
                None
            }
            Attempt::Retry(_) => None,
        }
    }

    fn next_pause(&mut self) -> Duration {
        let pause = self.pauses.next_pause();
        #[cfg(feature = "tracing")]
        tracing::debug!(
            attempt = self.attempts,
            pause_ms = pause.as_millis() as u64,
            last_error = ?self.last_error,
            "retrying after backoff"
        );
        pause
    }

    fn abort(self, reason: ContextError) -> RetryError<E> {
        #[cfg(feature = "tracing")]
        tracing::debug!(attempts = self.attempts, %reason, "retry loop aborted");
        RetryError::aborted(reason, self.last_error)
    }
}
