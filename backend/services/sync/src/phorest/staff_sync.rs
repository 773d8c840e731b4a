use async_trait::async_trait;
use chrono::Utc;

use datahub_config::BranchConfig;
use datahub_db::staff::models::Staff;
use datahub_db::staff::repositories::StaffRepository;
use datahub_db::watermarks::models::SyncStream;
use datahub_db::watermarks::repositories::WatermarkRepository;

use super::client::PhorestClient;
use crate::connector::{Connector, SyncResult};
use crate::context::RunContext;
use crate::error::SyncError;

const STREAM: SyncStream = SyncStream::Staff;

/// Full refresh of every configured branch's staff, archived included.
pub struct StaffSyncer<S, W> {
    client: PhorestClient,
    branches: Vec<BranchConfig>,
    staff_repo: S,
    watermarks: W,
}

impl<S, W> StaffSyncer<S, W>
where
    S: StaffRepository,
    W: WatermarkRepository,
{
    pub fn new(
        client: PhorestClient,
        branches: Vec<BranchConfig>,
        staff_repo: S,
        watermarks: W,
    ) -> Self {
        Self {
            client,
            branches,
            staff_repo,
            watermarks,
        }
    }

    async fn sync_branch(&self, ctx: &RunContext, branch: &BranchConfig) -> Result<usize, SyncError> {
        let fetched = ctx
            .guard(async { Ok(self.client.fetch_staff(&branch.branch_id).await?) })
            .await?;
        let staff: Vec<Staff> = fetched
            .into_iter()
            .filter(|s| !s.staff_id.trim().is_empty())
            .map(|s| s.into_staff(&branch.branch_id))
            .collect();

        let upserted = self.staff_repo.upsert_staff(&staff).await? as usize;
        self.watermarks
            .advance(STREAM, &branch.branch_id, Some(Utc::now()))
            .await?;
        Ok(upserted)
    }
}

#[async_trait]
impl<S, W> Connector for StaffSyncer<S, W>
where
    S: StaffRepository,
    W: WatermarkRepository,
{
    fn source_name(&self) -> &str {
        STREAM.as_str()
    }

    async fn sync(&self, ctx: &RunContext) -> Result<SyncResult, SyncError> {
        let mut result = SyncResult::new(self.source_name());

        for branch in &self.branches {
            ctx.check()?;
            match self.sync_branch(ctx, branch).await {
                Ok(n) => {
                    tracing::info!(branch = %branch.branch_id, name = %branch.name, upserted = n, "staff synced");
                    result.upserted += n;
                }
                Err(e) if e.is_interrupt() => return Err(e),
                Err(e) => {
                    tracing::error!(branch = %branch.branch_id, error = %e, "staff sync failed for branch");
                    result.errors += 1;
                }
            }
        }

        Ok(result)
    }
}
