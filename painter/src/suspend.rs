//! Deadlines and cancellation for every point where an operation waits.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use crate::error::{PainterError, Result, Suspension};

/// Cooperative cancellation shared between an operation and whoever may
/// abort it.
#[derive(Debug, Clone)]
pub struct CancelToken {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Fail fast between suspension points.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(PainterError::Cancelled);
        }
        Ok(())
    }

    /// Resolves once `cancel` has been called.
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so the channel cannot close under us.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

/// Run `fut` under an optional deadline, aborting early on cancellation.
pub async fn bounded<F, T>(
    what: Suspension,
    deadline: Option<Duration>,
    cancel: &CancelToken,
    fut: F,
) -> Result<T>
where
    F: Future<Output = T>,
{
    cancel.check()?;
    let waited = async {
        match deadline {
            Some(limit) => tokio::time::timeout(limit, fut)
                .await
                .map_err(|_| PainterError::TimedOut(what)),
            None => Ok(fut.await),
        }
    };
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(PainterError::Cancelled),
        result = waited => result,
    }
}
