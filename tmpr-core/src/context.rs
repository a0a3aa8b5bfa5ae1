//! Cancellable, deadline-bearing operation context.
//!
//! Every capability call receives a [`Context`]. Contexts form a tree: a
//! derived context is cancelled whenever its parent is, and inherits the
//! parent's deadline unless it sets an earlier one. Cancelling a derived
//! context never reaches back up to its parent.

use std::time::Duration;

use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;

use crate::{Error, Result};

#[derive(Debug, Clone)]
pub struct Context {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl Context {
    /// Root context: never cancelled on its own and without a deadline.
    pub fn background() -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: None,
        }
    }

    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(current) if current <= deadline => current,
            _ => deadline,
        };

        Self {
            token: self.token.child_token(),
            deadline: Some(deadline),
        }
    }

    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// True once cancelled explicitly or through a parent. Deadline expiry is
    /// only observed by [`Context::done`] and [`Context::run`].
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves with the reason once the context is cancelled or its deadline
    /// has passed.
    pub async fn done(&self) -> Error {
        match self.deadline {
            Some(deadline) => tokio::select! {
                _ = self.token.cancelled() => Error::Cancelled,
                _ = sleep_until(deadline) => Error::DeadlineExceeded,
            },
            None => {
                self.token.cancelled().await;
                Error::Cancelled
            }
        }
    }

    /// Drive `fut` to completion unless the context ends first, in which case
    /// `fut` is dropped and the cancellation reason returned.
    pub async fn run<F, T>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        if self.is_cancelled() {
            return Err(Error::Cancelled);
        }

        tokio::select! {
            biased;
            reason = self.done() => Err(reason),
            res = fut => res,
        }
    }
}
