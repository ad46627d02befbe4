//! Cancellation and deadlines for retry loops
//!
//! A [`Context`] is handed to every sleeper call. It carries an optional
//! deadline and an optional cancellation signal; a sleeper returns the
//! matching [`ContextError`] as soon as either fires, which is what ends a
//! retry loop whose operation never asks to stop on its own.
//!
//! Contexts are cheap to clone and safe to share across threads. Deriving a
//! context never loosens it: a child's deadline is the earlier of its own and
//! its parent's, and cancelling a parent cancels every child.
//!
//! # Examples
//!
//! ```
//! use redial::{Context, ContextError};
//! use std::time::Duration;
//!
//! let (ctx, cancel) = Context::background().with_cancel();
//! assert_eq!(ctx.err(), None);
//!
//! cancel.cancel();
//! assert_eq!(ctx.err(), Some(ContextError::Cancelled));
//!
//! let expired = Context::background().with_timeout(Duration::ZERO);
//! assert_eq!(expired.err(), Some(ContextError::DeadlineExceeded));
//! ```

use std::error::Error as StdError;
use std::fmt;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, Weak};
use std::time::{Duration, Instant};

#[cfg(feature = "async")]
use tokio_util::sync::CancellationToken;

/// Why a context is done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContextError {
    /// The context was cancelled through its [`CancelHandle`].
    Cancelled,
    /// The context's deadline passed.
    DeadlineExceeded,
}

impl fmt::Display for ContextError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContextError::Cancelled => f.write_str("context canceled"),
            ContextError::DeadlineExceeded => f.write_str("context deadline exceeded"),
        }
    }
}

impl StdError for ContextError {}

/// Deadline and cancellation carried through a retry loop.
#[derive(Clone, Default)]
pub struct Context {
    deadline: Option<Instant>,
    cancel: Option<Arc<CancelState>>,
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("deadline", &self.deadline)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

impl Context {
    /// A context that is never cancelled and has no deadline.
    pub fn background() -> Self {
        Self::default()
    }

    /// Derive a context that expires at `deadline`.
    ///
    /// If this context already has an earlier deadline, that one is kept.
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(existing) => existing.min(deadline),
            None => deadline,
        };
        Self {
            deadline: Some(deadline),
            cancel: self.cancel.clone(),
        }
    }

    /// Derive a context that expires `timeout` from now.
    ///
    /// A timeout too large to represent leaves the deadline unchanged.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.with_deadline(deadline),
            None => self.clone(),
        }
    }

    /// Derive a cancellable context.
    ///
    /// The returned handle cancels the new context (and anything derived
    /// from it). Cancelling this context's own parent cancels the new one too.
    pub fn with_cancel(&self) -> (Self, CancelHandle) {
        let state = Arc::new(CancelState::new(self.cancel.as_deref()));
        if let Some(parent) = &self.cancel {
            parent.adopt(&state);
        }
        let ctx = Self {
            deadline: self.deadline,
            cancel: Some(Arc::clone(&state)),
        };
        (ctx, CancelHandle { state })
    }

    /// The deadline, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Why the context is done, or `None` while it is still live.
    ///
    /// Cancellation is reported ahead of an expired deadline.
    pub fn err(&self) -> Option<ContextError> {
        if self.is_cancelled() {
            return Some(ContextError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(ContextError::DeadlineExceeded),
            _ => None,
        }
    }

    /// Whether the context is cancelled or past its deadline.
    pub fn is_done(&self) -> bool {
        self.err().is_some()
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|state| state.is_cancelled())
    }

    /// Block the current thread for `pause`, returning early if the context
    /// finishes first.
    pub(crate) fn wait(&self, pause: Duration) -> Result<(), ContextError> {
        if let Some(err) = self.err() {
            return Err(err);
        }

        let wake = Instant::now().checked_add(pause);
        let (until, expired) = self.wake_point(wake);

        match &self.cancel {
            Some(state) => {
                if state.wait_until(until) {
                    Err(ContextError::Cancelled)
                } else {
                    expired
                }
            }
            None => {
                match until {
                    Some(until) => std::thread::sleep(until.saturating_duration_since(Instant::now())),
                    None => std::thread::sleep(pause),
                }
                expired
            }
        }
    }

    /// When a wait should end and what it reports at that point.
    ///
    /// A deadline that falls at or before the natural wake-up wins.
    fn wake_point(&self, wake: Option<Instant>) -> (Option<Instant>, Result<(), ContextError>) {
        match (wake, self.deadline) {
            (Some(wake), Some(deadline)) if deadline <= wake => {
                (Some(deadline), Err(ContextError::DeadlineExceeded))
            }
            (None, Some(deadline)) => (Some(deadline), Err(ContextError::DeadlineExceeded)),
            (wake, _) => (wake, Ok(())),
        }
    }

    /// Suspend the current task for `pause`, returning early if the context
    /// finishes first.
    #[cfg(feature = "async")]
    pub(crate) async fn wait_async(&self, pause: Duration) -> Result<(), ContextError> {
        if let Some(err) = self.err() {
            return Err(err);
        }

        let deadline = async {
            match self.deadline {
                Some(deadline) => {
                    tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)).await
                }
                None => std::future::pending().await,
            }
        };
        let cancelled = async {
            match &self.cancel {
                Some(state) => state.token.cancelled().await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            biased;
            _ = cancelled => Err(ContextError::Cancelled),
            _ = deadline => Err(ContextError::DeadlineExceeded),
            _ = tokio::time::sleep(pause) => Ok(()),
        }
    }
}

/// Cancels the [`Context`] it was created with.
///
/// Dropping the handle does not cancel anything.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    state: Arc<CancelState>,
}

impl CancelHandle {
    /// Cancel the context and every context derived from it.
    ///
    /// Blocked sleepers wake immediately. Cancelling twice is a no-op.
    pub fn cancel(&self) {
        self.state.cancel();
    }

    /// Whether [`CancelHandle::cancel`] has been called (directly or through
    /// a parent).
    pub fn is_cancelled(&self) -> bool {
        self.state.is_cancelled()
    }
}

struct CancelState {
    cancelled: Mutex<bool>,
    wakeup: Condvar,
    children: Mutex<Vec<Weak<CancelState>>>,
    #[cfg(feature = "async")]
    token: CancellationToken,
}

impl fmt::Debug for CancelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelState")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

impl CancelState {
    #[cfg_attr(not(feature = "async"), allow(unused_variables))]
    fn new(parent: Option<&CancelState>) -> Self {
        Self {
            cancelled: Mutex::new(false),
            wakeup: Condvar::new(),
            children: Mutex::new(Vec::new()),
            #[cfg(feature = "async")]
            token: parent.map_or_else(CancellationToken::new, |p| p.token.child_token()),
        }
    }

    fn flag(&self) -> MutexGuard<'_, bool> {
        self.cancelled.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_cancelled(&self) -> bool {
        *self.flag()
    }

    fn cancel(&self) {
        {
            let mut cancelled = self.flag();
            if *cancelled {
                return;
            }
            *cancelled = true;
        }
        self.wakeup.notify_all();
        #[cfg(feature = "async")]
        self.token.cancel();

        let children = std::mem::take(
            &mut *self.children.lock().unwrap_or_else(PoisonError::into_inner),
        );
        for child in children.iter().filter_map(Weak::upgrade) {
            child.cancel();
        }
    }

    /// Register `child` so that cancelling `self` cancels it as well.
    fn adopt(&self, child: &Arc<CancelState>) {
        let mut children = self.children.lock().unwrap_or_else(PoisonError::into_inner);
        if self.is_cancelled() {
            drop(children);
            child.cancel();
            return;
        }
        children.retain(|weak| weak.strong_count() > 0);
        children.push(Arc::downgrade(child));
    }

    /// Wait until cancelled or until `until` passes. Returns true if
    /// cancelled.
    fn wait_until(&self, until: Option<Instant>) -> bool {
        let mut cancelled = self.flag();
        loop {
            if *cancelled {
                return true;
            }
            match until {
                Some(until) => {
                    let now = Instant::now();
                    if now >= until {
                        return false;
                    }
                    cancelled = self
                        .wakeup
                        .wait_timeout(cancelled, until - now)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0;
                }
                None => {
                    cancelled = self
                        .wakeup
                        .wait(cancelled)
                        .unwrap_or_else(PoisonError::into_inner);
                }
            }
        }
    }
}
