use async_trait::async_trait;
use chrono::{DateTime, Utc};

use datahub_config::BranchConfig;
use datahub_db::products::repositories::ProductRepository;
use datahub_db::watermarks::models::SyncStream;
use datahub_db::watermarks::repositories::WatermarkRepository;

use super::client::{PhorestClient, ProductQuery};
use crate::connector::{Connector, SyncResult};
use crate::context::RunContext;
use crate::error::SyncError;

const STREAM: SyncStream = SyncStream::Products;
pub const PRODUCT_PAGE_SIZE: u32 = 100;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct BranchProducts {
    seen: usize,
    stock_written: usize,
    history_written: usize,
    newest: Option<DateTime<Utc>>,
}

/// Product master, per-branch stock and stock history, fetched by upstream
/// change time.
pub struct ProductSyncer<P, W> {
    client: PhorestClient,
    branches: Vec<BranchConfig>,
    product_repo: P,
    watermarks: W,
    product_type: Option<String>,
}

impl<P, W> ProductSyncer<P, W>
where
    P: ProductRepository,
    W: WatermarkRepository,
{
    pub fn new(
        client: PhorestClient,
        branches: Vec<BranchConfig>,
        product_repo: P,
        watermarks: W,
        product_type: Option<String>,
    ) -> Self {
        Self {
            client,
            branches,
            product_repo,
            watermarks,
            product_type,
        }
    }

    async fn sync_branch(&self, ctx: &RunContext, branch_id: &str) -> Result<BranchProducts, SyncError> {
        let now = Utc::now();
        let watermark = self.watermarks.get(STREAM, branch_id).await?;
        let mut query = ProductQuery {
            branch_id: branch_id.to_string(),
            product_type: self.product_type.clone(),
            updated_window: watermark.map(|after| (after, now)),
            page: 0,
            size: PRODUCT_PAGE_SIZE,
        };

        match watermark {
            Some(after) => tracing::info!(branch = branch_id, %after, before = %now, "incremental product window"),
            None => tracing::info!(branch = branch_id, "no product watermark, full listing"),
        }

        let mut out = BranchProducts::default();
        loop {
            ctx.check()?;
            let page = ctx
                .guard(async { Ok(self.client.fetch_products_page(&query).await?) })
                .await?;
            if page.items.is_empty() {
                break;
            }
            let is_last = page.page.is_last(page.items.len());

            for api in page.items {
                if api.product_id.trim().is_empty() {
                    continue;
                }
                let snapshot = api.into_snapshot(branch_id);
                let applied = self.product_repo.apply_snapshot(&snapshot, now).await?;

                out.seen += 1;
                out.stock_written += usize::from(applied.stock_written);
                out.history_written += usize::from(applied.history_written);
                out.newest = out.newest.max(snapshot.product.updated_at_upstream);
            }

            if is_last {
                break;
            }
            query.page += 1;
        }

        self.watermarks.advance(STREAM, branch_id, out.newest).await?;
        Ok(out)
    }
}

#[async_trait]
impl<P, W> Connector for ProductSyncer<P, W>
where
    P: ProductRepository,
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
                Ok(done) => {
                    tracing::info!(
                        branch = %branch.branch_id,
                        seen = done.seen,
                        stock_written = done.stock_written,
                        history_written = done.history_written,
                        "products synced"
                    );
                    result.upserted += done.stock_written;
                    result.skipped += done.seen - done.stock_written;
                }
                Err(e) if e.is_interrupt() => return Err(e),
                Err(e) => {
                    tracing::error!(branch = %branch.branch_id, error = %e, "product sync failed for branch");
                    result.errors += 1;
                }
            }
        }

        Ok(result)
    }
}
