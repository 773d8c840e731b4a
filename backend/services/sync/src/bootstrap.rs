//! One-time load of archived CSV snapshots into an empty warehouse.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use datahub_db::import::repositories::ImportRepository;
use datahub_db::reviews::repositories::ReviewRepository;
use datahub_db::watermarks::models::{SyncStream, ALL_BRANCHES};
use datahub_db::watermarks::repositories::WatermarkRepository;

use crate::connector::{Connector, SyncResult};
use crate::context::RunContext;
use crate::csv_io::{self, clients::read_clients, reviews::read_reviews, transactions::read_transactions};
use crate::error::SyncError;

/// Streams whose watermark rows mark the bootstrap as done.
const GATED_STREAMS: [SyncStream; 2] = [SyncStream::Clients, SyncStream::Transactions];

/// Imports `DATA_DIR/transactions` and `DATA_DIR/clients`, then seeds their
/// watermarks from what landed. Runs only while neither stream has a
/// watermark row.
pub struct CsvBootstrap<I, W> {
    import_repo: I,
    watermarks: W,
    data_dir: PathBuf,
}

impl<I, W> CsvBootstrap<I, W>
where
    I: ImportRepository,
    W: WatermarkRepository,
{
    pub fn new(import_repo: I, watermarks: W, data_dir: PathBuf) -> Self {
        Self {
            import_repo,
            watermarks,
            data_dir,
        }
    }

    async fn import_transactions_file(&self, path: &Path) -> Result<(usize, usize), SyncError> {
        let (batch, skipped) = csv_io::run_blocking(path.to_path_buf(), read_transactions).await?;
        if batch.is_empty() {
            return Ok((0, skipped));
        }
        let written = self.import_repo.commit_transactions(&batch, None).await?;
        Ok((written as usize, skipped))
    }

    async fn import_clients_file(&self, path: &Path) -> Result<(usize, usize), SyncError> {
        let (clients, skipped) = csv_io::run_blocking(path.to_path_buf(), read_clients).await?;
        if clients.is_empty() {
            return Ok((0, skipped));
        }
        let written = self.import_repo.commit_clients(&clients, None).await?;
        Ok((written as usize, skipped))
    }

    async fn import_dir(
        &self,
        ctx: &RunContext,
        stream: SyncStream,
        result: &mut SyncResult,
    ) -> Result<(), SyncError> {
        let dir = self.data_dir.join(stream.as_str());
        let files = csv_io::list_csv_files(&dir)?;
        tracing::info!(entity = stream.as_str(), dir = %dir.display(), files = files.len(), "importing seed files");

        for file in files {
            ctx.check()?;
            let imported = match stream {
                SyncStream::Clients => self.import_clients_file(&file).await,
                _ => self.import_transactions_file(&file).await,
            };
            match imported {
                Ok((written, skipped)) => {
                    tracing::info!(path = %file.display(), written, skipped, "seed file committed");
                    result.upserted += written;
                    result.skipped += skipped;
                }
                Err(e) => {
                    tracing::error!(path = %file.display(), error = %e, "seed file failed");
                    result.errors += 1;
                }
            }
        }
        Ok(())
    }

    /// Seed watermarks from the newest revisions now stored.
    async fn seed_watermarks(&self) -> Result<(), SyncError> {
        let latest = self.import_repo.latest_revisions().await?;

        for (branch, at) in &latest.transactions_by_branch {
            self.watermarks
                .advance(SyncStream::Transactions, branch, Some(*at))
                .await?;
            tracing::info!(entity = "transactions", branch = %branch, at = %at, "seeded watermark");
        }
        match latest.clients {
            Some(at) => {
                self.watermarks
                    .advance(SyncStream::Clients, ALL_BRANCHES, Some(at))
                    .await?;
                tracing::info!(entity = "clients", at = %at, "seeded watermark");
            }
            None => tracing::info!("no client revisions stored, clients watermark left unset"),
        }
        Ok(())
    }
}

#[async_trait]
impl<I, W> Connector for CsvBootstrap<I, W>
where
    I: ImportRepository,
    W: WatermarkRepository,
{
    fn source_name(&self) -> &str {
        "bootstrap"
    }

    async fn sync(&self, ctx: &RunContext) -> Result<SyncResult, SyncError> {
        let mut result = SyncResult::new(self.source_name());

        let existing = self.watermarks.count_for(&GATED_STREAMS).await?;
        if existing > 0 {
            tracing::info!(existing, "watermarks present, skipping csv bootstrap");
            return Ok(result);
        }

        self.import_dir(ctx, SyncStream::Transactions, &mut result).await?;
        self.import_dir(ctx, SyncStream::Clients, &mut result).await?;
        self.seed_watermarks().await?;

        Ok(result)
    }
}

/// Imports `DATA_DIR/reviews` while the reviews table is empty.
pub struct ReviewBootstrap<R> {
    review_repo: R,
    data_dir: PathBuf,
}

impl<R: ReviewRepository> ReviewBootstrap<R> {
    pub fn new(review_repo: R, data_dir: PathBuf) -> Self {
        Self {
            review_repo,
            data_dir,
        }
    }
}

#[async_trait]
impl<R: ReviewRepository> Connector for ReviewBootstrap<R> {
    fn source_name(&self) -> &str {
        "reviews_bootstrap"
    }

    async fn sync(&self, ctx: &RunContext) -> Result<SyncResult, SyncError> {
        let mut result = SyncResult::new(self.source_name());

        if self.review_repo.has_any().await? {
            tracing::info!("reviews already stored, skipping reviews bootstrap");
            return Ok(result);
        }

        let dir = self.data_dir.join(SyncStream::Reviews.as_str());
        for file in csv_io::list_csv_files(&dir)? {
            ctx.check()?;
            let parsed = match csv_io::run_blocking(file.clone(), read_reviews).await {
                Ok(parsed) => parsed,
                Err(e) => {
                    tracing::error!(path = %file.display(), error = %e, "review seed file failed");
                    result.errors += 1;
                    continue;
                }
            };
            result.skipped += parsed.skipped;
            match self.review_repo.insert_missing(&parsed.rows).await {
                Ok(n) => result.upserted += n as usize,
                Err(e) => {
                    tracing::error!(path = %file.display(), error = %e, "review seed insert failed");
                    result.errors += 1;
                }
            }
        }

        tracing::info!(inserted = result.upserted, "reviews bootstrap finished");
        Ok(result)
    }
}
