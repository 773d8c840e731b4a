use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::watermarks::models::SyncStream;
use datahub_common::error::DatahubResult;

#[async_trait]
pub trait WatermarkRepository: Send + Sync {
    /// Stored timestamp for the pair, `None` when no row (or no value) exists.
    /// A blank branch reads the `ALL` row.
    async fn get(&self, stream: SyncStream, branch: &str) -> DatahubResult<Option<DateTime<Utc>>>;

    /// Move the watermark to `max(stored, candidate)`. A `None` candidate is a
    /// no-op.
    async fn advance(
        &self,
        stream: SyncStream,
        branch: &str,
        candidate: Option<DateTime<Utc>>,
    ) -> DatahubResult<()>;

    /// Number of watermark rows across the given streams.
    async fn count_for(&self, streams: &[SyncStream]) -> DatahubResult<i64>;
}
