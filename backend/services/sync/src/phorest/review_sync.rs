use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use datahub_config::BranchConfig;
use datahub_db::reviews::models::Review;
use datahub_db::reviews::repositories::ReviewRepository;
use datahub_db::watermarks::models::SyncStream;
use datahub_db::watermarks::repositories::WatermarkRepository;

use super::client::PhorestClient;
use crate::archive::{archive_or_warn, export_file_name};
use crate::connector::{Connector, SyncResult};
use crate::context::RunContext;
use crate::csv_io::{self, reviews::write_reviews};
use crate::error::SyncError;

const STREAM: SyncStream = SyncStream::Reviews;
pub const REVIEW_PAGE_SIZE: u32 = 100;

/// Stop paging once `pages` consecutive pages are at least `ratio` already
/// stored.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DuplicateStop {
    pub ratio: f64,
    pub pages: usize,
}

impl Default for DuplicateStop {
    fn default() -> Self {
        Self {
            ratio: 0.9,
            pages: 3,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReviewDirs {
    pub export_dir: PathBuf,
    pub data_dir: PathBuf,
}

#[derive(Debug, Default)]
struct BranchReviews {
    inserted: usize,
    pages: u32,
    fresh: Vec<Review>,
    newest: Option<NaiveDate>,
}

/// Paged, insert-only review sync that stops once it runs into history
/// already stored.
pub struct ReviewSyncer<R, W> {
    client: PhorestClient,
    branches: Vec<BranchConfig>,
    review_repo: R,
    watermarks: W,
    stop: DuplicateStop,
    dirs: ReviewDirs,
}

impl<R, W> ReviewSyncer<R, W>
where
    R: ReviewRepository,
    W: WatermarkRepository,
{
    pub fn new(
        client: PhorestClient,
        branches: Vec<BranchConfig>,
        review_repo: R,
        watermarks: W,
        stop: DuplicateStop,
        dirs: ReviewDirs,
    ) -> Self {
        Self {
            client,
            branches,
            review_repo,
            watermarks,
            stop,
            dirs,
        }
    }

    async fn page_through(
        &self,
        ctx: &RunContext,
        branch_id: &str,
    ) -> Result<BranchReviews, SyncError> {
        let mut out = BranchReviews::default();
        let mut duplicate_run = 0usize;
        let mut page_no = 0u32;

        loop {
            ctx.check()?;
            let page = ctx
                .guard(async {
                    Ok(self
                        .client
                        .fetch_reviews_page(branch_id, page_no, REVIEW_PAGE_SIZE)
                        .await?)
                })
                .await?;
            out.pages += 1;

            if page.items.is_empty() {
                break;
            }
            let is_last = page.page.is_last(page.items.len());

            let reviews: Vec<Review> = page
                .items
                .into_iter()
                .filter(|r| !r.review_id.trim().is_empty())
                .map(|r| r.into_review(branch_id))
                .collect();
            let ids: Vec<String> = reviews.iter().map(|r| r.review_id.clone()).collect();
            let existing = self.review_repo.existing_ids(&ids).await?;
            let dup_ratio = if reviews.is_empty() {
                1.0
            } else {
                existing.len() as f64 / reviews.len() as f64
            };

            out.inserted += self.review_repo.insert_missing(&reviews).await? as usize;

            tracing::debug!(branch = branch_id, page = page_no, size = reviews.len(), existing = existing.len(), dup_ratio, "review page");

            if dup_ratio < 1.0 {
                let page_newest = reviews.iter().filter_map(|r| r.review_date).max();
                out.newest = out.newest.max(page_newest);
            }
            out.fresh.extend(
                reviews
                    .into_iter()
                    .filter(|r| !existing.contains(&r.review_id)),
            );

            if dup_ratio >= self.stop.ratio {
                duplicate_run += 1;
            } else {
                duplicate_run = 0;
            }
            if duplicate_run >= self.stop.pages {
                tracing::info!(branch = branch_id, page = page_no, pages = duplicate_run, "reached stored history, stopping");
                break;
            }
            if is_last {
                break;
            }
            page_no += 1;
        }

        Ok(out)
    }

    async fn sync_branch(&self, ctx: &RunContext, branch_id: &str) -> Result<usize, SyncError> {
        let found = self.page_through(ctx, branch_id).await?;

        if found.fresh.is_empty() {
            tracing::info!(branch = branch_id, pages = found.pages, "no new reviews");
            return Ok(found.inserted);
        }

        let file = self
            .dirs
            .export_dir
            .join(export_file_name(STREAM.as_str(), branch_id, Utc::now()));
        let rows = found.fresh;
        let written = csv_io::run_blocking(file.clone(), move |path| write_reviews(path, &rows)).await;
        match written {
            Ok(()) => archive_or_warn(&file, &self.dirs.data_dir.join(STREAM.as_str())).await,
            Err(e) => tracing::warn!(branch = branch_id, error = %e, "failed to write review archive"),
        }

        if let Some(day) = found.newest {
            self.watermarks
                .advance(STREAM, branch_id, Some(midnight_utc(day)))
                .await?;
        }

        tracing::info!(branch = branch_id, pages = found.pages, inserted = found.inserted, "reviews synced");
        Ok(found.inserted)
    }
}

fn midnight_utc(day: NaiveDate) -> DateTime<Utc> {
    day.and_time(chrono::NaiveTime::MIN).and_utc()
}

#[async_trait]
impl<R, W> Connector for ReviewSyncer<R, W>
where
    R: ReviewRepository,
    W: WatermarkRepository,
{
    fn source_name(&self) -> &str {
        STREAM.as_str()
    }

    async fn sync(&self, ctx: &RunContext) -> Result<SyncResult, SyncError> {
        let mut result = SyncResult::new(self.source_name());

        for branch in &self.branches {
            ctx.check()?;
            match self.sync_branch(ctx, &branch.branch_id).await {
                Ok(n) => result.upserted += n,
                Err(e) if e.is_interrupt() => return Err(e),
                Err(e) => {
                    tracing::error!(branch = %branch.branch_id, error = %e, "review sync failed for branch");
                    result.errors += 1;
                }
            }
        }

        Ok(result)
    }
}
