pub mod branches;
pub mod clients;
pub mod import;
pub mod merge;
pub mod products;
pub mod reviews;
pub mod staff;
pub mod transactions;
pub mod watermarks;

use datahub_common::error::{DatahubError, DatahubResult};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

/// Create a Postgres connection pool from a database URL.
pub async fn create_pool(database_url: &str) -> DatahubResult<PgPool> {
    tracing::info!("connecting to database");
    PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
        .map_err(|e| DatahubError::Database(e.to_string()))
}

/// Round-trip a trivial query so a dead database fails the run up front.
pub async fn health_check(pool: &PgPool) -> DatahubResult<()> {
    sqlx::query("select 1")
        .execute(pool)
        .await
        .map_err(|e| DatahubError::Database(e.to_string()))?;
    Ok(())
}

/// Apply the embedded schema migrations.
pub async fn run_migrations(pool: &PgPool) -> DatahubResult<()> {
    tracing::info!("running database migrations");
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| DatahubError::Database(format!("migration failed: {e}")))
}
