//! # Redial
//!
//! Retry-with-backoff for remote calls, with errors that keep their status.
//!
//! A call to a network service fails; should it be tried again, after how
//! long, and what does the caller see when the retrying finally stops?
//! Redial answers those three questions with one small control loop:
//!
//! - the **operation** says after each attempt whether to stop,
//! - the **backoff policy** says how long to pause before the next attempt,
//! - the **sleeper** does the pausing, and is the only thing that can end a
//!   loop the operation never stops (a deadline or a cancellation).
//!
//! Whatever ends the loop, the error handed back answers [`HasStatus`], so
//! callers always get a [`Code`] and a message to inspect. Codes and
//! statuses are tonic's; operation errors implement [`StatusSource`] so the
//! loop can find their status.
//!
//! ## Quick Example
//!
//! ```rust
//! use redial::{retry, Attempt, Backoff, Code, Context, ContextError, HasStatus, Status};
//! use std::time::Duration;
//!
//! // A lookup that keeps failing until the deadline hits.
//! let ctx = Context::background().with_timeout(Duration::from_millis(20));
//! let backoff = Backoff::new(Duration::from_millis(1), Duration::from_millis(4), 2.0);
//!
//! let err = retry(
//!     &ctx,
//!     &backoff,
//!     || Attempt::<(), _>::retry(Status::new(Code::NotFound, "not found")),
//!     redial::sleep,
//! )
//! .unwrap_err();
//!
//! // The abort reason is in the text, the last error's status survives.
//! assert_eq!(err.reason(), Some(ContextError::DeadlineExceeded));
//! assert!(err.to_string().starts_with("retry failed with context deadline exceeded"));
//! assert_eq!(err.code(), Code::NotFound);
//! assert_eq!(err.message(), "not found");
//! ```
//!
//! ## Features
//!
//! - `async`: [`retry_async`] and [`sleep_async`], built on tokio
//! - `jitter`: randomized pauses via `rand`
//! - `tracing`: debug events for every retry and abort
//! - `serde`: (de)serialize [`Backoff`] and [`Jitter`]
//! - `proptest`: `Arbitrary` for [`Backoff`] and [`Jitter`]
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod context;
pub mod retry;
pub mod status;
pub mod testing;

// Re-exports
pub use context::{CancelHandle, Context, ContextError};
pub use retry::{
    retry, sleep, Attempt, Backoff, Jitter, Pauses, RetryError, DEFAULT_RETRYABLE,
};
#[cfg(feature = "async")]
pub use retry::{retry_async, sleep_async};
pub use status::{Code, HasStatus, Status, StatusSource};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::context::{CancelHandle, Context, ContextError};
    #[cfg(feature = "async")]
    pub use crate::retry::{retry_async, sleep_async};
    pub use crate::retry::{retry, sleep, Attempt, Backoff, RetryError};
    pub use crate::status::{Code, HasStatus, Status, StatusSource};
}
