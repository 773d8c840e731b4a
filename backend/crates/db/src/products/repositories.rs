use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::products::models::{ProductApplied, ProductSnapshot};
use datahub_common::error::DatahubResult;

#[async_trait]
pub trait ProductRepository: Send + Sync {
    /// Newest-wins upsert of the product master and its branch stock row,
    /// plus a history row when the stock row was written and its quantity
    /// moved. All of it commits together.
    async fn apply_snapshot(
        &self,
        snapshot: &ProductSnapshot,
        snapshot_time: DateTime<Utc>,
    ) -> DatahubResult<ProductApplied>;
}
