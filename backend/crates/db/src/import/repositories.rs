use async_trait::async_trait;

use crate::clients::models::Client;
use crate::import::models::LatestRevisions;
use crate::transactions::models::TransactionBatch;
use crate::watermarks::models::WatermarkAdvance;
use datahub_common::error::DatahubResult;

/// Transactional write path for export-driven streams: the batch and its
/// watermark move land together or not at all.
#[async_trait]
pub trait ImportRepository: Send + Sync {
    async fn commit_clients(
        &self,
        clients: &[Client],
        advance: Option<&WatermarkAdvance>,
    ) -> DatahubResult<u64>;

    async fn commit_transactions(
        &self,
        batch: &TransactionBatch,
        advance: Option<&WatermarkAdvance>,
    ) -> DatahubResult<u64>;

    async fn latest_revisions(&self) -> DatahubResult<LatestRevisions>;
}
