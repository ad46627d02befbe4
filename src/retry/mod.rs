//! Retry with exponential backoff for remote calls.
//!
//! The core of the crate is a single control loop, [`retry`]. It calls an
//! operation, and after every attempt that asks to be retried it waits for
//! the next backoff pause through an injected sleeper:
//!
//! - **Operation**: returns an [`Attempt`]: `Done` stops the loop, `Retry`
//!   asks for another go and may record the attempt's error.
//! - **Backoff**: [`Backoff`] is plain data; each call derives its own
//!   [`Pauses`] from it, so policies are shared freely.
//! - **Sleeper**: the only place the loop waits. [`sleep`] waits for real and
//!   honours the [`Context`](crate::Context); tests substitute an instant fake
//!   such as [`CountingSleeper`](crate::testing::CountingSleeper).
//!
//! # Quick Start
//!
//! ```rust
//! use redial::{retry, Attempt, Backoff, Code, Context, Status, DEFAULT_RETRYABLE};
//! use std::time::Duration;
//!
//! fn get_widget(attempt: u32) -> Result<&'static str, Status> {
//!     if attempt < 2 {
//!         Err(Status::new(Code::Unavailable, "try later"))
//!     } else {
//!         Ok("widget")
//!     }
//! }
//!
//! let ctx = Context::background().with_timeout(Duration::from_secs(5));
//! let backoff = Backoff::new(Duration::from_millis(1), Duration::from_millis(10), 2.0);
//!
//! let mut n = 0;
//! let widget = retry(
//!     &ctx,
//!     &backoff,
//!     || {
//!         n += 1;
//!         Attempt::from_rpc(get_widget(n), DEFAULT_RETRYABLE)
//!     },
//!     redial::sleep,
//! );
//!
//! assert_eq!(widget.unwrap(), "widget");
//! ```
//!
//! # Jitter Support
//!
//! Enable the `jitter` feature to randomize pauses:
//!
//! ```toml
//! redial = { version = "...", features = ["jitter"] }
//! ```
//!
//! # Error Types
//!
//! - [`RetryError`]: either the operation's own error, untouched, or an
//!   aborted loop combining the abort reason with the last error; both
//!   report a [`Status`](crate::Status)

mod attempt;
mod controller;
mod error;
mod policy;

pub use attempt::{Attempt, DEFAULT_RETRYABLE};
pub use controller::{retry, sleep};
#[cfg(feature = "async")]
pub use controller::{retry_async, sleep_async};
pub use error::RetryError;
pub use policy::{Backoff, Jitter, Pauses};

#[cfg(test)]
mod tests;
