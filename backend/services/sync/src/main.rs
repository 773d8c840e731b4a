mod archive;
mod bootstrap;
mod connector;
mod context;
mod csv_io;
mod error;
mod phorest;
#[cfg(test)]
mod test_support;

use std::time::Duration;

use datahub_config::{init_tracing, AppConfig, StreamFlags};
use datahub_db::branches::pg_repository::PgBranchRepository;
use datahub_db::import::pg_repository::PgImportRepository;
use datahub_db::products::pg_repository::PgProductRepository;
use datahub_db::reviews::pg_repository::PgReviewRepository;
use datahub_db::staff::pg_repository::PgStaffRepository;
use datahub_db::watermarks::pg_repository::PgWatermarkRepository;
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;

use crate::bootstrap::{CsvBootstrap, ReviewBootstrap};
use crate::connector::{Connector, SyncResult};
use crate::context::RunContext;
use crate::phorest::branch_sync::BranchSyncer;
use crate::phorest::client::{PhorestClient, PhorestClientConfig};
use crate::phorest::client_sync::ClientSyncer;
use crate::phorest::export::ExportClient;
use crate::phorest::product_sync::ProductSyncer;
use crate::phorest::review_sync::{DuplicateStop, ReviewDirs, ReviewSyncer};
use crate::phorest::staff_sync::StaffSyncer;
use crate::phorest::transaction_sync::{ExportDirs, TransactionSyncer};

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    let cfg = match AppConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            init_tracing("info");
            tracing::error!(error = %e, "invalid configuration");
            std::process::exit(1);
        }
    };
    init_tracing(&cfg.log_level);

    tracing::info!(
        service = "datahub-sync",
        branches = cfg.branches.len(),
        streams = ?planned_streams(&cfg.streams),
        "starting"
    );

    let pool = match connect(&cfg).await {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!(error = %e, "database unavailable");
            std::process::exit(1);
        }
    };

    let client = match PhorestClient::new(PhorestClientConfig::from_app_config(&cfg)) {
        Ok(client) => client,
        Err(e) => {
            tracing::error!(error = %e, "failed to build phorest client");
            std::process::exit(1);
        }
    };

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupt received, cancelling remaining work");
                cancel.cancel();
            }
        });
    }

    run(&cfg, &pool, client, &cancel).await;

    tracing::info!(service = "datahub-sync", "finished");
}

async fn connect(cfg: &AppConfig) -> datahub_common::error::DatahubResult<PgPool> {
    let pool = datahub_db::create_pool(&cfg.database_url).await?;
    datahub_db::health_check(&pool).await?;
    if cfg.auto_migrate {
        datahub_db::run_migrations(&pool).await?;
    }
    Ok(pool)
}

/// Every enabled stream, in run order.
async fn run(cfg: &AppConfig, pool: &PgPool, client: PhorestClient, cancel: &CancellationToken) {
    let budget = Duration::from_secs(cfg.stream_deadline_secs);
    let max_wait = Duration::from_secs(cfg.export_max_wait_secs);
    let export = ExportClient::new(client.clone());
    let export_dirs = ExportDirs {
        export_dir: cfg.export_dir.clone(),
        data_dir: cfg.data_dir.clone(),
    };
    let watermarks = || PgWatermarkRepository::new(pool.clone());

    if cfg.streams.bootstrap {
        let csv = CsvBootstrap::new(
            PgImportRepository::new(pool.clone()),
            watermarks(),
            cfg.data_dir.clone(),
        );
        run_stream(&csv, cancel, budget).await;

        let reviews = ReviewBootstrap::new(PgReviewRepository::new(pool.clone()), cfg.data_dir.clone());
        run_stream(&reviews, cancel, budget).await;
    }

    if cfg.streams.branches {
        let syncer = BranchSyncer::new(client.clone(), PgBranchRepository::new(pool.clone()), watermarks());
        run_stream(&syncer, cancel, budget).await;
    }

    if cfg.streams.staff {
        let syncer = StaffSyncer::new(
            client.clone(),
            cfg.branches.clone(),
            PgStaffRepository::new(pool.clone()),
            watermarks(),
        );
        run_stream(&syncer, cancel, budget).await;
    }

    if cfg.streams.clients {
        // Clients are business-wide; any configured branch can host the job.
        match cfg.branches.first() {
            Some(branch) => {
                let syncer = ClientSyncer::new(
                    export.clone(),
                    branch.clone(),
                    PgImportRepository::new(pool.clone()),
                    watermarks(),
                    export_dirs.clone(),
                    max_wait,
                );
                run_stream(&syncer, cancel, budget).await;
            }
            None => tracing::warn!("no branches configured, skipping clients"),
        }
    }

    if cfg.streams.transactions {
        let syncer = TransactionSyncer::new(
            export.clone(),
            cfg.branches.clone(),
            PgImportRepository::new(pool.clone()),
            watermarks(),
            export_dirs.clone(),
            max_wait,
        );
        run_stream(&syncer, cancel, budget).await;
    }

    if cfg.streams.reviews {
        let syncer = ReviewSyncer::new(
            client.clone(),
            cfg.branches.clone(),
            PgReviewRepository::new(pool.clone()),
            watermarks(),
            DuplicateStop {
                ratio: cfg.reviews_dup_ratio,
                pages: cfg.reviews_dup_pages,
            },
            ReviewDirs {
                export_dir: cfg.export_dir.clone(),
                data_dir: cfg.data_dir.clone(),
            },
        );
        run_stream(&syncer, cancel, budget).await;
    }

    if cfg.streams.products {
        let syncer = ProductSyncer::new(
            client,
            cfg.branches.clone(),
            PgProductRepository::new(pool.clone()),
            watermarks(),
            cfg.product_type_filter.clone(),
        );
        run_stream(&syncer, cancel, budget).await;
    }
}

/// Run one stream under a fresh deadline. Errors are logged and swallowed so
/// the next stream still runs.
async fn run_stream(
    connector: &dyn Connector,
    cancel: &CancellationToken,
    budget: Duration,
) -> Option<SyncResult> {
    let source = connector.source_name();
    if cancel.is_cancelled() {
        tracing::warn!(source, "skipped, run cancelled");
        return None;
    }

    let ctx = RunContext::new(cancel.clone(), budget);
    tracing::info!(source, "sync started");

    match connector.sync(&ctx).await {
        Ok(result) => {
            tracing::info!(
                source = result.source,
                upserted = result.upserted,
                skipped = result.skipped,
                errors = result.errors,
                "sync completed"
            );
            Some(result)
        }
        Err(e) => {
            tracing::error!(source, error = %e, "sync failed");
            None
        }
    }
}

fn planned_streams(flags: &StreamFlags) -> Vec<&'static str> {
    [
        (flags.bootstrap, "bootstrap"),
        (flags.branches, "branches"),
        (flags.staff, "staff"),
        (flags.clients, "clients"),
        (flags.transactions, "transactions"),
        (flags.reviews, "reviews"),
        (flags.products, "products"),
    ]
    .into_iter()
    .filter_map(|(on, name)| on.then_some(name))
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyncError;
    use async_trait::async_trait;

    struct Scripted {
        fail: bool,
    }

    #[async_trait]
    impl Connector for Scripted {
        fn source_name(&self) -> &str {
            "scripted"
        }

        async fn sync(&self, ctx: &RunContext) -> Result<SyncResult, SyncError> {
            ctx.check()?;
            if self.fail {
                return Err(SyncError::DeadlineExceeded);
            }
            Ok(SyncResult {
                upserted: 4,
                ..SyncResult::new("scripted")
            })
        }
    }

    #[test]
    fn planned_streams_follow_run_order() {
        let flags = StreamFlags {
            bootstrap: true,
            branches: false,
            staff: true,
            clients: false,
            transactions: true,
            reviews: false,
            products: true,
        };
        assert_eq!(
            planned_streams(&flags),
            vec!["bootstrap", "staff", "transactions", "products"]
        );
    }

    #[tokio::test]
    async fn stream_error_is_swallowed() {
        let token = CancellationToken::new();
        let failed = run_stream(&Scripted { fail: true }, &token, Duration::from_secs(5)).await;
        assert!(failed.is_none());

        let ok = run_stream(&Scripted { fail: false }, &token, Duration::from_secs(5)).await;
        assert_eq!(ok.map(|r| r.upserted), Some(4));
    }

    #[tokio::test]
    async fn cancelled_run_skips_remaining_streams() {
        let token = CancellationToken::new();
        token.cancel();
        let result = run_stream(&Scripted { fail: false }, &token, Duration::from_secs(5)).await;
        assert!(result.is_none());
    }
}
