use async_trait::async_trait;
use chrono::Utc;

use datahub_db::branches::models::Branch;
use datahub_db::branches::repositories::BranchRepository;
use datahub_db::watermarks::models::{SyncStream, ALL_BRANCHES};
use datahub_db::watermarks::repositories::WatermarkRepository;

use super::client::PhorestClient;
use crate::connector::{Connector, SyncResult};
use crate::context::RunContext;
use crate::error::SyncError;

const STREAM: SyncStream = SyncStream::Branches;

/// Full refresh of the business's branches on every run.
pub struct BranchSyncer<B, W> {
    client: PhorestClient,
    branch_repo: B,
    watermarks: W,
}

impl<B, W> BranchSyncer<B, W>
where
    B: BranchRepository,
    W: WatermarkRepository,
{
    pub fn new(client: PhorestClient, branch_repo: B, watermarks: W) -> Self {
        Self {
            client,
            branch_repo,
            watermarks,
        }
    }
}

#[async_trait]
impl<B, W> Connector for BranchSyncer<B, W>
where
    B: BranchRepository,
    W: WatermarkRepository,
{
    fn source_name(&self) -> &str {
        STREAM.as_str()
    }

    async fn sync(&self, ctx: &RunContext) -> Result<SyncResult, SyncError> {
        ctx.check()?;
        let mut result = SyncResult::new(self.source_name());

        let fetched = ctx
            .guard(async { Ok(self.client.fetch_branches().await?) })
            .await?;
        let branches: Vec<Branch> = fetched
            .into_iter()
            .filter(|b| !b.branch_id.trim().is_empty())
            .map(Branch::from)
            .collect();

        result.upserted = self.branch_repo.upsert_branches(&branches).await? as usize;
        self.watermarks
            .advance(STREAM, ALL_BRANCHES, Some(Utc::now()))
            .await?;

        tracing::info!(entity = STREAM.as_str(), fetched = branches.len(), upserted = result.upserted, "branches synced");
        Ok(result)
    }
}
