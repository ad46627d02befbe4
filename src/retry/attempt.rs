//! The outcome of a single attempt.

use crate::status::{Code, StatusSource};

/// Codes that [`Attempt::from_rpc`] retries when callers have no list of
/// their own.
pub const DEFAULT_RETRYABLE: &[Code] = &[Code::Unavailable];

/// What one call of the operation tells the retry loop.
///
/// `Done` stops the loop (success or an unrecoverable failure); `Retry`
/// asks for another attempt after a pause and may carry the error this
/// attempt produced. Only the most recent error is remembered; it is
/// reported if the loop is later aborted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attempt<T, E> {
    /// Stop retrying and return this result.
    Done(Result<T, E>),
    /// Try again, optionally recording this attempt's error.
    Retry(Option<E>),
}

impl<T, E> Attempt<T, E> {
    /// Stop with a successful value.
    pub fn success(value: T) -> Self {
        Self::Done(Ok(value))
    }

    /// Stop with an error that will not be retried.
    pub fn fail(error: E) -> Self {
        Self::Done(Err(error))
    }

    /// Retry after recording `error`.
    pub fn retry(error: E) -> Self {
        Self::Retry(Some(error))
    }

    /// Retry without an error to record.
    pub fn again() -> Self {
        Self::Retry(None)
    }

    /// Returns true if this attempt stops the loop.
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done(_))
    }

    /// Classify an RPC result by its status code.
    ///
    /// Success stops the loop. An error whose status code (see
    /// [`StatusSource::find_status`]; no status counts as
    /// [`Code::Unknown`]) is in `retryable` asks for a retry; any other
    /// error stops the loop with that error.
    ///
    /// ```
    /// use redial::{Attempt, Code, Status, DEFAULT_RETRYABLE};
    ///
    /// let busy: Result<(), Status> = Err(Status::new(Code::Unavailable, "busy"));
    /// assert!(!Attempt::from_rpc(busy, DEFAULT_RETRYABLE).is_done());
    ///
    /// let missing: Result<(), Status> = Err(Status::new(Code::NotFound, "gone"));
    /// assert!(Attempt::from_rpc(missing, DEFAULT_RETRYABLE).is_done());
    /// ```
    pub fn from_rpc(result: Result<T, E>, retryable: &[Code]) -> Self
    where
        E: StatusSource,
    {
        match result {
            Ok(value) => Self::Done(Ok(value)),
            Err(error) => {
                let code = error.find_status().map_or(Code::Unknown, |s| s.code());
                if retryable.contains(&code) {
                    Self::Retry(Some(error))
                } else {
                    Self::Done(Err(error))
                }
            }
        }
    }
}

/// The `(stop, error)` pair used by callback-style operations.
impl<E> From<(bool, Option<E>)> for Attempt<(), E> {
    fn from((stop, error): (bool, Option<E>)) -> Self {
        match (stop, error) {
            (true, None) => Self::Done(Ok(())),
            (true, Some(error)) => Self::Done(Err(error)),
            (false, error) => Self::Retry(error),
        }
    }
}
