use async_trait::async_trait;

use crate::branches::models::Branch;
use datahub_common::error::DatahubResult;

#[async_trait]
pub trait BranchRepository: Send + Sync {
    async fn upsert_branches(&self, branches: &[Branch]) -> DatahubResult<u64>;
}
