use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use datahub_config::BranchConfig;
use datahub_db::import::repositories::ImportRepository;
use datahub_db::watermarks::models::{SyncStream, WatermarkAdvance, ALL_BRANCHES};
use datahub_db::watermarks::repositories::WatermarkRepository;

use super::export::{ExportClient, ExportRequest, JobType};
use super::filters::updated_since;
use super::transaction_sync::ExportDirs;
use crate::archive::{archive_or_warn, export_file_name};
use crate::connector::{Connector, SyncResult};
use crate::context::RunContext;
use crate::csv_io::{self, clients::read_clients};
use crate::error::SyncError;

const STREAM: SyncStream = SyncStream::Clients;

/// Business-wide clients export. Clients are not partitioned by branch, so
/// one job is run against a single branch and the watermark is kept under
/// `ALL`.
pub struct ClientSyncer<I, W> {
    export: ExportClient,
    branch: BranchConfig,
    import_repo: I,
    watermarks: W,
    dirs: ExportDirs,
    max_wait: Duration,
}

impl<I, W> ClientSyncer<I, W>
where
    I: ImportRepository,
    W: WatermarkRepository,
{
    pub fn new(
        export: ExportClient,
        branch: BranchConfig,
        import_repo: I,
        watermarks: W,
        dirs: ExportDirs,
        max_wait: Duration,
    ) -> Self {
        Self {
            export,
            branch,
            import_repo,
            watermarks,
            dirs,
            max_wait,
        }
    }

    async fn fetch(&self, ctx: &RunContext) -> Result<Option<PathBuf>, SyncError> {
        let watermark = self.watermarks.get(STREAM, ALL_BRANCHES).await?;
        let filter_expression = updated_since(watermark);
        match &filter_expression {
            Some(filter) => tracing::info!(branch = %self.branch.branch_id, %filter, "requesting clients export"),
            None => tracing::info!(branch = %self.branch.branch_id, "no clients watermark, requesting full export"),
        }

        let request = ExportRequest {
            job_type: JobType::ClientCsv,
            start_filter: None,
            finish_filter: None,
            filter_expression,
        };
        let dest = self.dirs.export_dir.join(export_file_name(
            STREAM.as_str(),
            &self.branch.branch_id,
            Utc::now(),
        ));
        let max_wait = std::cmp::min(self.max_wait, ctx.remaining());

        Ok(self
            .export
            .export_to_file(&self.branch.branch_id, &request, max_wait, ctx.token(), &dest)
            .await?)
    }
}

#[async_trait]
impl<I, W> Connector for ClientSyncer<I, W>
where
    I: ImportRepository,
    W: WatermarkRepository,
{
    fn source_name(&self) -> &str {
        STREAM.as_str()
    }

    async fn sync(&self, ctx: &RunContext) -> Result<SyncResult, SyncError> {
        ctx.check()?;
        let mut result = SyncResult::new(self.source_name());

        let Some(file) = self.fetch(ctx).await? else {
            return Ok(result);
        };

        let (clients, skipped) = csv_io::run_blocking(file.clone(), read_clients).await?;
        result.skipped = skipped;
        if clients.is_empty() {
            return Ok(result);
        }

        let advance = datahub_db::merge::max_updated_at(clients.iter())
            .map(|at| WatermarkAdvance::new(STREAM, ALL_BRANCHES, at));
        result.upserted = self
            .import_repo
            .commit_clients(&clients, advance.as_ref())
            .await? as usize;

        archive_or_warn(&file, &self.dirs.data_dir.join(STREAM.as_str())).await;
        tracing::info!(upserted = result.upserted, skipped, "clients imported");
        Ok(result)
    }
}
