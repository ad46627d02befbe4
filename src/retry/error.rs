//! Error type for retry loops.

use std::error::Error as StdError;
use std::fmt;

use crate::context::ContextError;
use crate::status::{self, HasStatus, Status, StatusSource};

/// Error returned by [`retry`](crate::retry()) when it does not succeed.
///
/// There are exactly two ways a retry loop can fail:
///
/// - the operation itself asked to stop with an error, which is handed back
///   untouched as [`RetryError::Terminal`];
/// - the sleeper refused to wait any longer (deadline or cancellation),
///   giving [`RetryError::Aborted`], which combines the abort reason with the
///   last error the operation produced.
///
/// Either way the error answers [`HasStatus`]: a terminal error reports its
/// own status, and an aborted loop reports the status of its last error, so
/// callers can still tell `NotFound` from `AlreadyExists` after a deadline.
///
/// The `source()` of a terminal error is the operation's error; for an
/// aborted loop it is the last error, or the abort reason when there is
/// none. [`status::convert`] on a boxed `RetryError` therefore finds the
/// same status as [`HasStatus::status`] whenever that status is a [`Status`].
///
/// # Examples
///
/// ```rust
/// use redial::{retry, Attempt, Backoff, Code, Context, ContextError, HasStatus, RetryError, Status};
///
/// let err = retry(
///     &Context::background(),
///     &Backoff::default(),
///     || Attempt::<(), _>::Retry(Some(Status::new(Code::NotFound, "not found"))),
///     |_, _| Err(ContextError::DeadlineExceeded),
/// )
/// .unwrap_err();
///
/// let last = Status::new(Code::NotFound, "not found");
/// assert_eq!(
///     err.to_string(),
///     format!("retry failed with context deadline exceeded; last error: {}", last)
/// );
/// assert_eq!(err.code(), Code::NotFound);
/// assert_eq!(err.message(), "not found");
/// assert!(matches!(err, RetryError::Aborted { .. }));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryError<E> {
    /// The operation stopped the loop with this error.
    Terminal(E),
    /// The sleeper aborted the loop.
    Aborted {
        /// Why waiting was abandoned.
        reason: ContextError,
        /// The most recent error the operation returned while retrying, if
        /// any.
        last_error: Option<E>,
    },
}

impl<E> RetryError<E> {
    /// Create an aborted-loop error.
    pub fn aborted(reason: ContextError, last_error: Option<E>) -> Self {
        Self::Aborted { reason, last_error }
    }

    /// Returns true if the operation stopped the loop itself.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Terminal(_))
    }

    /// Returns true if the sleeper aborted the loop.
    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted { .. })
    }

    /// The abort reason, for aborted loops.
    pub fn reason(&self) -> Option<ContextError> {
        match self {
            Self::Terminal(_) => None,
            Self::Aborted { reason, .. } => Some(*reason),
        }
    }

    /// The operation's error: the terminal error, or the last error seen
    /// before an abort.
    pub fn error(&self) -> Option<&E> {
        match self {
            Self::Terminal(e) => Some(e),
            Self::Aborted { last_error, .. } => last_error.as_ref(),
        }
    }

    /// Extract the operation's error, discarding the abort reason.
    pub fn into_inner(self) -> Option<E> {
        match self {
            Self::Terminal(e) => Some(e),
            Self::Aborted { last_error, .. } => last_error,
        }
    }
}

impl<E: fmt::Display> fmt::Display for RetryError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Terminal(e) => write!(f, "{}", e),
            Self::Aborted {
                reason,
                last_error: Some(e),
            } => write!(f, "retry failed with {}; last error: {}", reason, e),
            Self::Aborted {
                reason,
                last_error: None,
            } => write!(f, "{}", reason),
        }
    }
}

impl<E: StdError + 'static> StdError for RetryError<E> {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Terminal(e) => Some(e),
            Self::Aborted {
                last_error: Some(e),
                ..
            } => Some(e),
            Self::Aborted { reason, .. } => Some(reason),
        }
    }
}

impl<E: StatusSource> HasStatus for RetryError<E> {
    fn status(&self) -> Status {
        match self {
            Self::Terminal(e) => e
                .find_status()
                .unwrap_or_else(|| Status::unknown(e.to_string())),
            Self::Aborted {
                last_error: Some(e),
                ..
            } => e
                .find_status()
                .unwrap_or_else(|| Status::unknown(self.to_string())),
            Self::Aborted {
                reason,
                last_error: None,
            } => status::from_context_error(*reason),
        }
    }
}

impl<E: StatusSource> From<RetryError<E>> for Status {
    fn from(err: RetryError<E>) -> Self {
        err.status()
    }
}
