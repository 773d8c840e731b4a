use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use datahub_config::BranchConfig;
use datahub_db::import::repositories::ImportRepository;
use datahub_db::watermarks::models::{SyncStream, WatermarkAdvance};
use datahub_db::watermarks::repositories::WatermarkRepository;

use super::export::{ExportClient, ExportRequest, JobType};
use super::filters::ExportWindow;
use crate::archive::{archive_or_warn, export_file_name};
use crate::connector::{Connector, SyncResult};
use crate::context::RunContext;
use crate::csv_io::{self, transactions::read_transactions};
use crate::error::SyncError;

const STREAM: SyncStream = SyncStream::Transactions;

/// Where export files land and where they are archived after import.
#[derive(Debug, Clone)]
pub struct ExportDirs {
    pub export_dir: PathBuf,
    pub data_dir: PathBuf,
}

/// Outcome of one branch's import.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct Imported {
    written: usize,
    skipped: usize,
}

/// Per-branch transactions export, imported with its watermark move in one
/// database transaction.
pub struct TransactionSyncer<I, W> {
    export: ExportClient,
    branches: Vec<BranchConfig>,
    import_repo: I,
    watermarks: W,
    dirs: ExportDirs,
    max_wait: Duration,
}

impl<I, W> TransactionSyncer<I, W>
where
    I: ImportRepository,
    W: WatermarkRepository,
{
    pub fn new(
        export: ExportClient,
        branches: Vec<BranchConfig>,
        import_repo: I,
        watermarks: W,
        dirs: ExportDirs,
        max_wait: Duration,
    ) -> Self {
        Self {
            export,
            branches,
            import_repo,
            watermarks,
            dirs,
            max_wait,
        }
    }

    /// Fetch the branch's export. `None` when the window is empty. Any error
    /// here is structural and aborts the stream.
    async fn fetch(&self, ctx: &RunContext, branch_id: &str) -> Result<Option<PathBuf>, SyncError> {
        let watermark = self.watermarks.get(STREAM, branch_id).await?;
        let now = Utc::now();
        let window = ExportWindow::since(watermark, now.date_naive());

        tracing::info!(
            branch = branch_id,
            start = %window.start_filter(),
            finish = %window.finish_filter(),
            "requesting transactions export"
        );

        let request = ExportRequest {
            job_type: JobType::TransactionsCsv,
            start_filter: Some(window.start_filter()),
            finish_filter: Some(window.finish_filter()),
            filter_expression: Some(window.filter_expression()),
        };
        let dest = self
            .dirs
            .export_dir
            .join(export_file_name(STREAM.as_str(), branch_id, now));
        let max_wait = std::cmp::min(self.max_wait, ctx.remaining());

        let file = self
            .export
            .export_to_file(branch_id, &request, max_wait, ctx.token(), &dest)
            .await?;
        Ok(file)
    }

    /// Parse and commit one downloaded file. Errors are contained to the
    /// branch.
    async fn import(&self, branch_id: &str, file: PathBuf) -> Result<Imported, SyncError> {
        let (batch, skipped) = csv_io::run_blocking(file.clone(), read_transactions).await?;
        if batch.is_empty() {
            tracing::info!(branch = branch_id, skipped, "export held no usable rows");
            return Ok(Imported { written: 0, skipped });
        }

        let advance = batch
            .max_updated_at()
            .map(|at| WatermarkAdvance::new(STREAM, branch_id, at));
        let written = self
            .import_repo
            .commit_transactions(&batch, advance.as_ref())
            .await?;

        archive_or_warn(&file, &self.dirs.data_dir.join(STREAM.as_str())).await;
        Ok(Imported {
            written: written as usize,
            skipped,
        })
    }
}

#[async_trait]
impl<I, W> Connector for TransactionSyncer<I, W>
where
    I: ImportRepository,
    W: WatermarkRepository,
{
    fn source_name(&self) -> &str {
        STREAM.as_str()
    }

    async fn sync(&self, ctx: &RunContext) -> Result<SyncResult, SyncError> {
        let mut result = SyncResult::new(self.source_name());

        for branch in &self.branches {
            ctx.check()?;
            let branch_id = branch.branch_id.as_str();

            let Some(file) = self.fetch(ctx, branch_id).await? else {
                continue;
            };

            match self.import(branch_id, file).await {
                Ok(done) => {
                    tracing::info!(branch = branch_id, written = done.written, skipped = done.skipped, "transactions imported");
                    result.upserted += done.written;
                    result.skipped += done.skipped;
                }
                Err(e) => {
                    tracing::error!(branch = branch_id, error = %e, "transactions import failed; watermark not advanced");
                    result.errors += 1;
                }
            }
        }

        Ok(result)
    }
}
