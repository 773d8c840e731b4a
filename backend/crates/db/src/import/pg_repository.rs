use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};

use crate::clients::models::Client;
use crate::clients::pg_repository::upsert_clients;
use crate::import::models::LatestRevisions;
use crate::import::repositories::ImportRepository;
use crate::transactions::models::TransactionBatch;
use crate::transactions::pg_repository::upsert_batch;
use crate::watermarks::models::WatermarkAdvance;
use crate::watermarks::pg_repository::advance_in_tx;
use datahub_common::error::{DatahubError, DatahubResult};

#[derive(Clone)]
pub struct PgImportRepository {
    pool: PgPool,
}

impl PgImportRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ImportRepository for PgImportRepository {
    async fn commit_clients(
        &self,
        clients: &[Client],
        advance: Option<&WatermarkAdvance>,
    ) -> DatahubResult<u64> {
        // Dropping `tx` on any early return rolls back.
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DatahubError::Database(e.to_string()))?;

        let written = upsert_clients(&mut tx, clients).await?;
        if let Some(advance) = advance {
            advance_in_tx(&mut tx, advance).await?;
        }

        tx.commit()
            .await
            .map_err(|e| DatahubError::Database(e.to_string()))?;
        Ok(written)
    }

    async fn commit_transactions(
        &self,
        batch: &TransactionBatch,
        advance: Option<&WatermarkAdvance>,
    ) -> DatahubResult<u64> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DatahubError::Database(e.to_string()))?;

        let written = upsert_batch(&mut tx, batch).await?;
        if let Some(advance) = advance {
            advance_in_tx(&mut tx, advance).await?;
        }

        tx.commit()
            .await
            .map_err(|e| DatahubError::Database(e.to_string()))?;
        Ok(written)
    }

    async fn latest_revisions(&self) -> DatahubResult<LatestRevisions> {
        let rows = sqlx::query(
            "select branch_id, max(updated_at_upstream) as latest
             from transaction_items
             where updated_at_upstream is not null and branch_id <> ''
             group by branch_id
             order by branch_id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DatahubError::Database(e.to_string()))?;

        let transactions_by_branch: Vec<(String, DateTime<Utc>)> = rows
            .into_iter()
            .map(|r| (r.get("branch_id"), r.get("latest")))
            .collect();

        let clients: Option<DateTime<Utc>> = sqlx::query("select max(updated_at_upstream) as latest from clients")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DatahubError::Database(e.to_string()))?
            .get("latest");

        Ok(LatestRevisions {
            transactions_by_branch,
            clients,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_db;
    use crate::transactions::models::TransactionItem;
    use crate::watermarks::models::SyncStream;
    use crate::watermarks::pg_repository::PgWatermarkRepository;
    use crate::watermarks::repositories::WatermarkRepository;
    use chrono::TimeZone;

    fn line(branch: &str, tx_id: &str, at: DateTime<Utc>) -> TransactionItem {
        TransactionItem {
            transaction_item_id: format!("{tx_id}-1"),
            transaction_id: tx_id.to_owned(),
            branch_id: branch.to_owned(),
            updated_at_upstream: Some(at),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn batch_and_watermark_commit_together() {
        let pool = match test_db::pool().await {
            Some(p) => p,
            None => return,
        };
        let repo = PgImportRepository::new(pool.clone());
        let watermarks = PgWatermarkRepository::new(pool.clone());
        let branch = test_db::unique("br");
        let at = Utc.with_ymd_and_hms(2024, 7, 1, 12, 0, 0).unwrap();
        let batch = TransactionBatch::from_items(vec![line(&branch, &test_db::unique("tx"), at)]);

        let advance = WatermarkAdvance::new(SyncStream::Transactions, &branch, at);
        let written = repo
            .commit_transactions(&batch, Some(&advance))
            .await
            .expect("commit");
        assert_eq!(written, 2);
        assert_eq!(
            watermarks.get(SyncStream::Transactions, &branch).await.expect("get"),
            Some(at)
        );

        let latest = repo.latest_revisions().await.expect("latest");
        assert!(latest
            .transactions_by_branch
            .iter()
            .any(|(b, t)| b == &branch && *t == at));
    }

    #[tokio::test]
    async fn failed_watermark_write_rolls_back_the_batch() {
        let pool = match test_db::pool().await {
            Some(p) => p,
            None => return,
        };

        sqlx::query(
            "create or replace function reject_poisoned_watermark() returns trigger as $$
             begin
               if new.branch_id like 'poison-%' then
                 raise exception 'watermark write rejected';
               end if;
               return new;
             end;
             $$ language plpgsql",
        )
        .execute(&pool)
        .await
        .expect("trigger fn");
        sqlx::query("drop trigger if exists reject_poisoned_watermark on sync_watermarks")
            .execute(&pool)
            .await
            .expect("drop trigger");
        sqlx::query(
            "create trigger reject_poisoned_watermark before insert or update on sync_watermarks
             for each row execute function reject_poisoned_watermark()",
        )
        .execute(&pool)
        .await
        .expect("create trigger");

        let repo = PgImportRepository::new(pool.clone());
        let watermarks = PgWatermarkRepository::new(pool.clone());
        let branch = test_db::unique("poison");
        let client_id = test_db::unique("client");
        let at = Utc.with_ymd_and_hms(2024, 8, 1, 0, 0, 0).unwrap();
        let clients = vec![Client {
            client_id: client_id.clone(),
            first_name: "Never".into(),
            updated_at_upstream: Some(at),
            ..Default::default()
        }];

        let advance = WatermarkAdvance::new(SyncStream::Clients, &branch, at);
        let result = repo.commit_clients(&clients, Some(&advance)).await;
        assert!(matches!(result, Err(DatahubError::Database(_))));

        let visible: i64 = sqlx::query("select count(*) as n from clients where client_id = $1")
            .bind(&client_id)
            .fetch_one(&pool)
            .await
            .expect("count")
            .get("n");
        assert_eq!(visible, 0);
        assert!(watermarks.get(SyncStream::Clients, &branch).await.expect("get").is_none());
    }
}
