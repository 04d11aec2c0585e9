//! Caller-supplied execution context: a cancellation token plus an optional deadline.
//!
//! The pool never times anything out on its own. Waiting for a free connection,
//! running a statement and draining rows are all bounded only by the context
//! the caller passes in.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::PgPoolError;

#[derive(Debug, Clone, Default)]
pub struct Context {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl Context {
    /// A context that is never cancelled and has no deadline.
    #[must_use]
    pub fn background() -> Self {
        Self::default()
    }

    /// Wrap an existing token, e.g. one shared with a shutdown handler.
    #[must_use]
    pub fn new(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    #[must_use]
    pub fn with_timeout(self, timeout: Duration) -> Self {
        // A timeout too large to represent is no deadline at all.
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.with_deadline(deadline),
            None => self,
        }
    }

    /// Keeps the earlier of the existing and the new deadline.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(current) => current.min(deadline),
            None => deadline,
        });
        self
    }

    /// A context cancelled together with this one but cancellable on its own.
    #[must_use]
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    #[must_use]
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// The error this context would yield right now, if it is already done.
    #[must_use]
    pub fn err(&self) -> Option<PgPoolError> {
        if self.token.is_cancelled() {
            Some(PgPoolError::Cancelled)
        } else if self.deadline.is_some_and(|d| Instant::now() >= d) {
            Some(PgPoolError::DeadlineExceeded)
        } else {
            None
        }
    }

    #[must_use]
    pub fn is_done(&self) -> bool {
        self.err().is_some()
    }

    /// Drive `fut` until it completes or the context ends, whichever comes first.
    ///
    /// When the context wins, `fut` is dropped in place; anything it owns
    /// (a pooled connection in particular) is released by its destructor.
    ///
    /// # Errors
    /// Returns `Cancelled` or `DeadlineExceeded` when the context ends first,
    /// otherwise whatever `fut` returns.
    pub async fn run<F, T>(&self, fut: F) -> Result<T, PgPoolError>
    where
        F: Future<Output = Result<T, PgPoolError>>,
    {
        if let Some(err) = self.err() {
            return Err(err);
        }
        let deadline = self.deadline;
        let expired = async move {
            match deadline {
                Some(d) => tokio::time::sleep_until(d).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::select! {
            biased;
            () = self.token.cancelled() => Err(PgPoolError::Cancelled),
            () = expired => Err(PgPoolError::DeadlineExceeded),
            res = fut => res,
        }
    }
}
