//! Cancellation context threaded through every operation.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::Error;

/// Carries a deadline and a cancellation flag that downstream I/O observes.
/// Cheap to clone; clones share the same cancellation flag.
#[derive(Clone)]
pub struct Ctx {
    deadline: Option<Instant>,
    cancelled: Arc<AtomicBool>,
}

impl Ctx {
    /// A context with no deadline and no cancellation.
    #[must_use]
    pub fn background() -> Self {
        Self { deadline: None, cancelled: Arc::new(AtomicBool::new(false)) }
    }

    /// A context that is considered cancelled after `timeout` elapses.
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self { deadline: Some(Instant::now() + timeout), cancelled: Arc::new(AtomicBool::new(false)) }
    }

    /// A handle that can cancel this context (and every clone of it) from
    /// another thread.
    #[must_use]
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle { cancelled: self.cancelled.clone() }
    }

    /// True if the context has been cancelled or its deadline has passed.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        if self.cancelled.load(Ordering::Acquire) {
            return true;
        }
        matches!(self.deadline, Some(d) if Instant::now() >= d)
    }

    /// Returns `Err` if the context is cancelled or past its deadline;
    /// callers check this at I/O boundaries (backend reads/writes, HTTP
    /// calls) so an in-flight operation can abort promptly.
    pub fn check(&self) -> Result<(), Error> {
        if self.is_cancelled() {
            return Err(Error::Io(io::Error::new(io::ErrorKind::Interrupted, "context cancelled")));
        }
        Ok(())
    }
}

impl Default for Ctx {
    fn default() -> Self {
        Self::background()
    }
}

/// A handle that can cancel the [`Ctx`] it was taken from.
#[derive(Clone)]
pub struct CancelHandle {
    cancelled: Arc<AtomicBool>,
}

impl CancelHandle {
    /// Cancel the associated context.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }
}
