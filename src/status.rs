//! Status-bearing errors.
//!
//! The status types are tonic's [`Code`] and [`Status`]. This module adds
//! the two capabilities the retry controller relies on:
//!
//! - [`HasStatus`]: the value carries a status. Callers ask it for `code()`
//!   and `message()` instead of matching on concrete error types.
//! - [`StatusSource`]: the bound on operation errors. It answers "which
//!   status, if any, does this error carry?" Every [`HasStatus`] error is a
//!   source automatically. Errors without a status opt in with an empty
//!   impl and report [`Code::Unknown`].
//!
//! # Examples
//!
//! ```
//! use redial::status::{self, HasStatus, StatusSource};
//! use redial::{Code, Status};
//! use std::fmt;
//!
//! #[derive(Debug)]
//! struct ApiError;
//!
//! impl fmt::Display for ApiError {
//!     fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
//!         f.write_str("api: not found")
//!     }
//! }
//!
//! impl std::error::Error for ApiError {}
//!
//! impl HasStatus for ApiError {
//!     fn status(&self) -> Status {
//!         Status::new(Code::NotFound, "not found")
//!     }
//! }
//!
//! assert_eq!(ApiError.find_status().map(|s| s.code()), Some(Code::NotFound));
//!
//! let plain = std::io::Error::other("disk on fire");
//! assert_eq!(status::convert(&plain).code(), Code::Unknown);
//! ```

use std::error::Error as StdError;

pub use tonic::{Code, Status};

use crate::context::ContextError;

/// The capability of exposing a [`Status`].
///
/// Implemented by [`Status`], [`ContextError`] and every error the retry
/// controller returns. Implementing it for your own error type makes that
/// type a [`StatusSource`] too, so a retry loop that gives up keeps your
/// status.
pub trait HasStatus {
    /// The status carried by this value.
    fn status(&self) -> Status;

    /// Shorthand for `self.status().code()`.
    fn code(&self) -> Code {
        self.status().code()
    }

    /// Shorthand for the status message.
    fn message(&self) -> String {
        self.status().message().to_owned()
    }
}

impl HasStatus for Status {
    fn status(&self) -> Status {
        self.clone()
    }
}

impl HasStatus for ContextError {
    fn status(&self) -> Status {
        from_context_error(*self)
    }
}

/// Errors an operation may hand to the retry loop.
///
/// `find_status` returns the status the error carries, or `None` when it
/// has none. The default looks for a [`Status`] or [`ContextError`] in the
/// error and its `source()` chain, so a plain error type needs only
/// `impl StatusSource for MyError {}`.
pub trait StatusSource: StdError + Sized + 'static {
    /// The status this error carries, if any.
    fn find_status(&self) -> Option<Status> {
        from_error(self)
    }
}

impl<T> StatusSource for T
where
    T: HasStatus + StdError + 'static,
{
    fn find_status(&self) -> Option<Status> {
        Some(self.status())
    }
}

impl StatusSource for std::io::Error {
    fn find_status(&self) -> Option<Status> {
        self.get_ref().and_then(|inner| from_error(inner))
    }
}

/// Look for a status in `err` and its sources.
///
/// The first [`Status`] or [`ContextError`] in the chain wins; a context
/// error maps to the matching code. Errors that only implement
/// [`HasStatus`] are not visible through `dyn Error`.
pub fn from_error(err: &(dyn StdError + 'static)) -> Option<Status> {
    let mut current = Some(err);
    while let Some(err) = current {
        if let Some(status) = err.downcast_ref::<Status>() {
            return Some(status.clone());
        }
        if let Some(reason) = err.downcast_ref::<ContextError>() {
            return Some(from_context_error(*reason));
        }
        current = err.source();
    }
    None
}

/// Like [`from_error`], but never fails: errors without a status become
/// [`Code::Unknown`] with the error's text as the message.
pub fn convert(err: &(dyn StdError + 'static)) -> Status {
    from_error(err).unwrap_or_else(|| Status::unknown(err.to_string()))
}

/// The status reported for a loop that ended on `err` with no error of its
/// own to report.
pub fn from_context_error(err: ContextError) -> Status {
    let code = match err {
        ContextError::Cancelled => Code::Cancelled,
        ContextError::DeadlineExceeded => Code::DeadlineExceeded,
    };
    Status::new(code, err.to_string())
}

impl From<ContextError> for Status {
    fn from(err: ContextError) -> Self {
        from_context_error(err)
    }
}
