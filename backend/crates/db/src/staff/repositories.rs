use async_trait::async_trait;

use crate::staff::models::Staff;
use datahub_common::error::DatahubResult;

#[async_trait]
pub trait StaffRepository: Send + Sync {
    /// Newest-wins upsert keyed by `(staff_id, branch_id)`.
    async fn upsert_staff(&self, staff: &[Staff]) -> DatahubResult<u64>;
}
