use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;

/// Why a [`SendContext`] stopped allowing work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Cancelled {
    #[error("send deadline exceeded")]
    DeadlineExceeded,
    #[error("send cancelled")]
    Cancelled,
}

/// Longest a blocking primitive runs before a cancellable context is polled
/// again.
pub(crate) const CANCEL_POLL: Duration = Duration::from_millis(100);

impl From<Cancelled> for io::Error {
    fn from(reason: Cancelled) -> Self {
        // not `Interrupted`: `read_line` and `write_all` retry that kind
        let kind = match reason {
            Cancelled::DeadlineExceeded => io::ErrorKind::TimedOut,
            Cancelled::Cancelled => io::ErrorKind::ConnectionAborted,
        };
        io::Error::new(kind, reason)
    }
}

/// Cancellation/timeout signal threaded through one send call.
///
/// Every blocking step (MX lookup, each connect attempt, each SMTP round trip)
/// consults the context before starting and bounds itself by the remaining
/// budget. With a cancel handle attached, blocking waits are cut into
/// `CANCEL_POLL` slices so a tripped handle is noticed while a step is still
/// in flight. Clones share the same cancel flag.
#[derive(Debug, Clone, Default)]
pub struct SendContext {
    deadline: Option<Instant>,
    cancel: Option<Arc<AtomicBool>>,
}

impl SendContext {
    /// No deadline and no cancel handle: the caller decides by not bounding.
    pub fn background() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            deadline: Some(deadline),
            cancel: None,
        }
    }

    /// Attach a fresh cancel flag, returning the handle that trips it.
    pub fn cancellable(mut self) -> (Self, CancelHandle) {
        let flag = Arc::new(AtomicBool::new(false));
        self.cancel = Some(Arc::clone(&flag));
        (self, CancelHandle(flag))
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn check(&self) -> Result<(), Cancelled> {
        self.remaining().map(|_| ())
    }

    /// Time left before the deadline, `None` when unbounded.
    ///
    /// Never yields `Some(Duration::ZERO)`: an elapsed deadline is reported as
    /// [`Cancelled::DeadlineExceeded`], so the value is always usable as a
    /// socket timeout.
    pub fn remaining(&self) -> Result<Option<Duration>, Cancelled> {
        if self
            .cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Acquire))
        {
            return Err(Cancelled::Cancelled);
        }
        match self.deadline {
            None => Ok(None),
            Some(deadline) => {
                let left = deadline.saturating_duration_since(Instant::now());
                if left.is_zero() {
                    Err(Cancelled::DeadlineExceeded)
                } else {
                    Ok(Some(left))
                }
            }
        }
    }

    pub(crate) fn is_cancellable(&self) -> bool {
        self.cancel.is_some()
    }

    /// Whether anything can stop a step early.
    pub(crate) fn is_bounded(&self) -> bool {
        self.deadline.is_some() || self.cancel.is_some()
    }

    /// Timeout for the next blocking wait: the remaining budget, capped at
    /// `CANCEL_POLL` when a cancel handle has to be polled.
    pub(crate) fn slice(&self) -> Result<Option<Duration>, Cancelled> {
        let remaining = self.remaining()?;
        if !self.is_cancellable() {
            return Ok(remaining);
        }
        Ok(Some(remaining.map_or(CANCEL_POLL, |left| left.min(CANCEL_POLL))))
    }

    /// Run `work` on a helper thread and wait for its result no longer than
    /// the context allows.
    ///
    /// For blocking calls that take no timeout of their own (name lookup,
    /// `connect`). A worker that is given up on runs to completion in the
    /// background and its result is dropped.
    pub(crate) fn wait_for<T, F>(&self, name: &str, work: F) -> io::Result<T>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        thread::Builder::new().name(name.to_string()).spawn(move || {
            // receiver gone: the caller stopped waiting
            let _ = tx.send(work());
        })?;
        loop {
            let received = match self.slice()? {
                Some(wait) => rx.recv_timeout(wait),
                None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
            };
            match received {
                Ok(value) => return Ok(value),
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(io::Error::other(format!("{name} worker exited early")));
                }
            }
        }
    }
}

/// Trips the cancel flag of the [`SendContext`] it was created with.
#[derive(Debug, Clone)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}
