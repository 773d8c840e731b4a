use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::SyncError;

/// Per-stream run bounds: the shared shutdown token plus this stream's
/// deadline.
#[derive(Debug, Clone)]
pub struct RunContext {
    cancel: CancellationToken,
    deadline: Instant,
}

impl RunContext {
    pub fn new(cancel: CancellationToken, budget: Duration) -> Self {
        Self {
            cancel,
            deadline: Instant::now() + budget,
        }
    }

    pub fn token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// Called between pages, branches and files.
    pub fn check(&self) -> Result<(), SyncError> {
        if self.cancel.is_cancelled() {
            return Err(SyncError::Cancelled);
        }
        if Instant::now() >= self.deadline {
            return Err(SyncError::DeadlineExceeded);
        }
        Ok(())
    }

    /// Run `fut` unless the token fires or the deadline passes first.
    pub async fn guard<F, T>(&self, fut: F) -> Result<T, SyncError>
    where
        F: std::future::Future<Output = Result<T, SyncError>>,
    {
        tokio::select! {
            _ = self.cancel.cancelled() => Err(SyncError::Cancelled),
            _ = tokio::time::sleep_until(self.deadline) => Err(SyncError::DeadlineExceeded),
            res = fut => res,
        }
    }
}
