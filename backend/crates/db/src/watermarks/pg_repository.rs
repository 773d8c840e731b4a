use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgRow, PgPool, Postgres, Row, Transaction};

use crate::watermarks::models::{normalize_branch, SyncStream, SyncWatermark, WatermarkAdvance};
use crate::watermarks::repositories::WatermarkRepository;
use datahub_common::error::{DatahubError, DatahubResult};

// greatest() skips nulls, so a row created without a value takes the candidate.
const ADVANCE_SQL: &str = "insert into sync_watermarks (entity, branch_id, last_updated_upstream)
     values ($1, $2, $3)
     on conflict (entity, branch_id) do update set
       last_updated_upstream = greatest(sync_watermarks.last_updated_upstream, excluded.last_updated_upstream),
       updated_at = now()";

#[derive(Clone)]
pub struct PgWatermarkRepository {
    pool: PgPool,
}

impl PgWatermarkRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn map_row(row: PgRow) -> DatahubResult<SyncWatermark> {
        let entity: String = row.get("entity");
        Ok(SyncWatermark {
            entity: entity.parse().map_err(DatahubError::Database)?,
            branch_id: row.get("branch_id"),
            last_updated_upstream: row.get("last_updated_upstream"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }

    pub async fn find(&self, stream: SyncStream, branch: &str) -> DatahubResult<Option<SyncWatermark>> {
        let row = sqlx::query(
            "select entity, branch_id, last_updated_upstream, created_at, updated_at
             from sync_watermarks
             where entity = $1 and branch_id = $2",
        )
        .bind(stream.as_str())
        .bind(normalize_branch(branch))
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DatahubError::Database(e.to_string()))?;

        row.map(Self::map_row).transpose()
    }
}

/// Apply a watermark move inside a caller-owned transaction.
pub async fn advance_in_tx(
    tx: &mut Transaction<'_, Postgres>,
    advance: &WatermarkAdvance,
) -> DatahubResult<()> {
    sqlx::query(ADVANCE_SQL)
        .bind(advance.stream.as_str())
        .bind(normalize_branch(&advance.branch))
        .bind(advance.candidate)
        .execute(&mut **tx)
        .await
        .map_err(|e| DatahubError::Database(e.to_string()))?;
    Ok(())
}

#[async_trait]
impl WatermarkRepository for PgWatermarkRepository {
    async fn get(&self, stream: SyncStream, branch: &str) -> DatahubResult<Option<DateTime<Utc>>> {
        Ok(self
            .find(stream, branch)
            .await?
            .and_then(|wm| wm.last_updated_upstream))
    }

    async fn advance(
        &self,
        stream: SyncStream,
        branch: &str,
        candidate: Option<DateTime<Utc>>,
    ) -> DatahubResult<()> {
        let Some(candidate) = candidate else {
            return Ok(());
        };

        sqlx::query(ADVANCE_SQL)
            .bind(stream.as_str())
            .bind(normalize_branch(branch))
            .bind(candidate)
            .execute(&self.pool)
            .await
            .map_err(|e| DatahubError::Database(e.to_string()))?;

        tracing::debug!(entity = stream.as_str(), branch = normalize_branch(branch), %candidate, "watermark advanced");
        Ok(())
    }

    async fn count_for(&self, streams: &[SyncStream]) -> DatahubResult<i64> {
        let names: Vec<String> = streams.iter().map(|s| s.as_str().to_owned()).collect();
        let row = sqlx::query("select count(*) as n from sync_watermarks where entity = any($1)")
            .bind(names)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DatahubError::Database(e.to_string()))?;
        Ok(row.get("n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_db;
    use chrono::TimeZone;

    async fn test_repo() -> Option<(PgWatermarkRepository, PgPool)> {
        let pool = test_db::pool().await?;
        Some((PgWatermarkRepository::new(pool.clone()), pool))
    }

    fn ts(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, d, 0, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn get_returns_none_without_row() {
        let (repo, _pool) = match test_repo().await {
            Some(r) => r,
            None => return,
        };
        let branch = test_db::unique("br");
        let got = repo.get(SyncStream::Transactions, &branch).await.expect("get");
        assert!(got.is_none());
    }

    #[tokio::test]
    async fn advance_never_moves_backwards() {
        let (repo, _pool) = match test_repo().await {
            Some(r) => r,
            None => return,
        };
        let branch = test_db::unique("br");
        repo.advance(SyncStream::Transactions, &branch, Some(ts(5)))
            .await
            .expect("first advance");
        repo.advance(SyncStream::Transactions, &branch, Some(ts(1)))
            .await
            .expect("stale advance");

        let got = repo.get(SyncStream::Transactions, &branch).await.expect("get");
        assert_eq!(got, Some(ts(5)));

        repo.advance(SyncStream::Transactions, &branch, Some(ts(9)))
            .await
            .expect("newer advance");
        let got = repo.get(SyncStream::Transactions, &branch).await.expect("get");
        assert_eq!(got, Some(ts(9)));
    }

    #[tokio::test]
    async fn advance_with_none_is_noop() {
        let (repo, _pool) = match test_repo().await {
            Some(r) => r,
            None => return,
        };
        let branch = test_db::unique("br");
        repo.advance(SyncStream::Products, &branch, None).await.expect("noop");
        assert!(repo.find(SyncStream::Products, &branch).await.expect("find").is_none());
    }

    #[tokio::test]
    async fn blank_branch_shares_the_all_row() {
        let (repo, pool) = match test_repo().await {
            Some(r) => r,
            None => return,
        };
        // The ALL row is global, so isolate by clearing it for this stream.
        sqlx::query("delete from sync_watermarks where entity = 'clients' and branch_id = 'ALL'")
            .execute(&pool)
            .await
            .expect("cleanup");

        repo.advance(SyncStream::Clients, "", Some(ts(3))).await.expect("advance");
        let blank = repo.get(SyncStream::Clients, "").await.expect("blank");
        let all = repo.get(SyncStream::Clients, "ALL").await.expect("all");
        assert_eq!(blank, Some(ts(3)));
        assert_eq!(blank, all);

        let row = repo.find(SyncStream::Clients, "ALL").await.expect("find").expect("row");
        assert_eq!(row.branch_id, "ALL");
        assert_eq!(row.entity, SyncStream::Clients);
    }

    #[tokio::test]
    async fn advance_in_tx_rolls_back_with_transaction() {
        let (repo, pool) = match test_repo().await {
            Some(r) => r,
            None => return,
        };
        let branch = test_db::unique("br");
        {
            let mut tx = pool.begin().await.expect("begin");
            advance_in_tx(&mut tx, &WatermarkAdvance::new(SyncStream::Reviews, &branch, ts(2)))
                .await
                .expect("advance in tx");
            // dropped without commit
        }
        assert!(repo.get(SyncStream::Reviews, &branch).await.expect("get").is_none());
    }
}
