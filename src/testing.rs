//! Testing utilities for code built on the retry loop
//!
//! Retry loops wait between attempts, which makes tests slow and
//! timing-dependent. This module provides a fake sleeper that returns
//! instantly, counts how often it was asked to wait, and can end the loop
//! on a chosen call, plus assertion macros for the errors the loop returns.
//!
//! # Examples
//!
//! ## CountingSleeper
//!
//! ```rust
//! use redial::testing::CountingSleeper;
//! use redial::{retry, Attempt, Backoff, Context, ContextError};
//!
//! let sleeper = CountingSleeper::abort_after(3, ContextError::DeadlineExceeded);
//!
//! let result = retry(
//!     &Context::background(),
//!     &Backoff::default(),
//!     || Attempt::<(), std::io::Error>::again(),
//!     |ctx, pause| sleeper.sleep(ctx, pause),
//! );
//!
//! assert!(result.is_err());
//! assert_eq!(sleeper.calls(), 3);
//! ```
//!
//! ## Assertion Macros
//!
//! ```rust
//! use redial::{assert_code, assert_terminal, Code, RetryError, Status};
//!
//! let result: Result<(), _> = Err(RetryError::Terminal(Status::new(Code::NotFound, "gone")));
//! let err = assert_terminal!(result);
//! assert_code!(err, Code::NotFound);
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crate::context::{Context, ContextError};

/// A sleeper that never waits.
///
/// Every call is counted and its pause recorded. Built with
/// [`CountingSleeper::abort_after`], the `n`th call (1-indexed) and every
/// later one return the configured error, which ends a retry loop the way an
/// expiring deadline would.
///
/// Clones share their counters, so a clone can be moved into a closure while
/// the original is inspected afterwards.
///
/// # Example
///
/// ```rust
/// use redial::testing::CountingSleeper;
/// use redial::Context;
/// use std::time::Duration;
///
/// let sleeper = CountingSleeper::new();
/// sleeper.sleep(&Context::background(), Duration::from_secs(3600)).unwrap();
///
/// assert_eq!(sleeper.calls(), 1);
/// assert_eq!(sleeper.pauses(), vec![Duration::from_secs(3600)]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct CountingSleeper {
    calls: Arc<AtomicUsize>,
    pauses: Arc<Mutex<Vec<Duration>>>,
    abort: Option<(usize, ContextError)>,
}

impl CountingSleeper {
    /// A sleeper that always succeeds.
    pub fn new() -> Self {
        Self::default()
    }

    /// A sleeper whose `n`th and later calls fail with `reason`.
    ///
    /// `n = 0` behaves like `n = 1`: the first call already fails.
    pub fn abort_after(n: usize, reason: ContextError) -> Self {
        Self {
            abort: Some((n.max(1), reason)),
            ..Self::default()
        }
    }

    /// Record a pause and return instantly.
    ///
    /// Matches the shape of [`sleep`](crate::sleep), so it can stand in for
    /// it through a closure: `|ctx, pause| sleeper.sleep(ctx, pause)`.
    pub fn sleep(&self, _ctx: &Context, pause: Duration) -> Result<(), ContextError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.pauses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(pause);

        match self.abort {
            Some((n, reason)) if call >= n => Err(reason),
            _ => Ok(()),
        }
    }

    /// A sleeper closure sharing this sleeper's counters.
    pub fn sleep_fn(&self) -> impl FnMut(&Context, Duration) -> Result<(), ContextError> {
        let sleeper = self.clone();
        move |ctx: &Context, pause: Duration| sleeper.sleep(ctx, pause)
    }

    /// Async form of [`CountingSleeper::sleep`], for
    /// [`retry_async`](crate::retry_async()).
    ///
    /// The returned future is already complete.
    pub fn sleep_ready(
        &self,
        ctx: Context,
        pause: Duration,
    ) -> futures::future::Ready<Result<(), ContextError>> {
        futures::future::ready(self.sleep(&ctx, pause))
    }

    /// How many times the sleeper was called.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every pause requested so far, in order.
    pub fn pauses(&self) -> Vec<Duration> {
        self.pauses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Assert that a value reports a given status code.
///
/// Works with anything implementing [`HasStatus`](crate::HasStatus).
///
/// # Example
///
/// ```rust
/// use redial::{assert_code, Code, Status};
///
/// let status = Status::new(Code::Unavailable, "busy");
/// assert_code!(status, Code::Unavailable);
/// ```
#[macro_export]
macro_rules! assert_code {
    ($err:expr, $code:expr) => {{
        let status = $crate::HasStatus::status(&$err);
        assert_eq!(
            status.code(),
            $code,
            "Expected status code {:?}, got status: {}",
            $code,
            status
        );
    }};
}

/// Assert that a retry result failed with a terminal error, and return it.
///
/// This macro will panic if the result is `Ok` or an aborted loop.
///
/// # Example
///
/// ```rust
/// use redial::{assert_terminal, RetryError};
///
/// let result: Result<(), RetryError<&str>> = Err(RetryError::Terminal("stop"));
/// assert_eq!(assert_terminal!(result), "stop");
/// ```
#[macro_export]
macro_rules! assert_terminal {
    ($result:expr) => {
        match $result {
            Err($crate::RetryError::Terminal(e)) => e,
            Err(other) => panic!("Expected Terminal error, got: {:?}", other),
            Ok(v) => panic!("Expected Terminal error, got Ok: {:?}", v),
        }
    };
}
