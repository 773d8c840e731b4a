use async_trait::async_trait;

use crate::context::RunContext;
use crate::error::SyncError;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncResult {
    pub source: String,
    pub upserted: usize,
    pub skipped: usize,
    pub errors: usize,
}

impl SyncResult {
    pub fn new(source: &str) -> Self {
        Self {
            source: source.to_string(),
            ..Default::default()
        }
    }
}

/// One incremental stream.
#[async_trait]
pub trait Connector: Send + Sync {
    fn source_name(&self) -> &str;
    async fn sync(&self, ctx: &RunContext) -> Result<SyncResult, SyncError>;
}
