use datahub_common::error::DatahubError;

use crate::csv_io::CsvError;
use crate::phorest::client::PhorestClientError;
use crate::phorest::export::ExportError;

/// Failure of one stream run.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error(transparent)]
    Upstream(#[from] PhorestClientError),

    #[error(transparent)]
    Export(#[from] ExportError),

    #[error(transparent)]
    Csv(#[from] CsvError),

    #[error(transparent)]
    Store(#[from] DatahubError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("sync cancelled")]
    Cancelled,

    #[error("stream deadline exceeded")]
    DeadlineExceeded,
}

impl SyncError {
    /// Cancellation and deadline errors stop a stream outright; per-branch
    /// loops must not swallow them.
    pub fn is_interrupt(&self) -> bool {
        matches!(
            self,
            SyncError::Cancelled
                | SyncError::DeadlineExceeded
                | SyncError::Export(ExportError::Cancelled)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interrupts_are_recognised() {
        assert!(SyncError::Cancelled.is_interrupt());
        assert!(SyncError::DeadlineExceeded.is_interrupt());
        assert!(SyncError::Export(ExportError::Cancelled).is_interrupt());
        assert!(!SyncError::Store(DatahubError::Database("down".into())).is_interrupt());
    }

    #[test]
    fn store_errors_display_their_message() {
        let err: SyncError = DatahubError::Database("connection refused".into()).into();
        assert_eq!(err.to_string(), "database error: connection refused");
    }
}
