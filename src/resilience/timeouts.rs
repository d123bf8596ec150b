//! Deadline racing and cancellation.
//!
//! # Responsibilities
//! - Race an invocation against an optional deadline
//! - Signal cancellation to the abandoned invocation
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities; dropping the losing future is the
//!   cancellation, the token only tells cooperative code to stop early
//! - Timeouts are a distinct outcome, never an error
//! - No deadline means wait unconditionally

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;

/// Outcome of [`run_bounded`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Bounded<T> {
    Completed(T),
    TimedOut,
}

/// Owner side of a cancellation signal.
#[derive(Debug)]
pub struct CancelSource {
    tx: watch::Sender<bool>,
}

/// Observer side of a cancellation signal, handed to invocations.
#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

impl CancelSource {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx }
    }

    pub fn token(&self) -> CancelToken {
        CancelToken {
            rx: self.tx.subscribe(),
        }
    }

    /// Mark cancelled. Idempotent.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }
}

impl Default for CancelSource {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancelled. Never resolves if the source is dropped
    /// without cancelling.
    pub async fn cancelled(&mut self) {
        if self.rx.wait_for(|cancelled| *cancelled).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Await `fut`, giving up after `deadline` if one is set.
///
/// On expiry `fut` is dropped and `cancel` is triggered; its result can no
/// longer be observed.
pub async fn run_bounded<F>(deadline: Option<Duration>, cancel: &CancelSource, fut: F) -> Bounded<F::Output>
where
    F: Future,
{
    let Some(deadline) = deadline else {
        return Bounded::Completed(fut.await);
    };

    match tokio::time::timeout(deadline, fut).await {
        Ok(output) => Bounded::Completed(output),
        Err(_) => {
            cancel.cancel();
            Bounded::TimedOut
        }
    }
}
