//! Cooperative cancellation
//!
//! Long-running operations poll a [`CancellationToken`] between iterations
//! and return [`Outcome::Cancelled`] instead of a partial result.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared flag observed by long-running operations
///
/// Clones share the same flag, so one clone can be handed to a worker and the
/// other kept by the caller to request cancellation.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation; irreversible for this token
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

/// Result of a cancellable operation
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Completed(T),
    Cancelled,
}

impl<T> Outcome<T> {
    /// The completed value, if any
    pub fn completed(self) -> Option<T> {
        match self {
            Outcome::Completed(value) => Some(value),
            Outcome::Cancelled => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Outcome::Cancelled)
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Completed(value) => Outcome::Completed(f(value)),
            Outcome::Cancelled => Outcome::Cancelled,
        }
    }
}

/// Return `Ok(Outcome::Cancelled)` from the enclosing function when the token fired
macro_rules! bail_if_cancelled {
    ($token:expr) => {
        if $token.is_cancelled() {
            tracing::debug!("operation cancelled");
            return Ok($crate::cancel::Outcome::Cancelled);
        }
    };
}

pub(crate) use bail_if_cancelled;
