use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::branches::models::Branch;
use crate::branches::repositories::BranchRepository;
use crate::merge::{column_list, dedup_newest, excluded_assignments, NEWEST_WINS_PREDICATE};
use datahub_common::error::{DatahubError, DatahubResult};

const COLUMNS: [&str; 14] = [
    "branch_id",
    "name",
    "time_zone",
    "latitude",
    "longitude",
    "street_address_1",
    "street_address_2",
    "city",
    "state",
    "postal_code",
    "country",
    "currency_code",
    "account_id",
    "updated_at_upstream",
];

#[derive(Clone)]
pub struct PgBranchRepository {
    pool: PgPool,
}

impl PgBranchRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BranchRepository for PgBranchRepository {
    async fn upsert_branches(&self, branches: &[Branch]) -> DatahubResult<u64> {
        let rows = dedup_newest(branches.to_vec());
        if rows.is_empty() {
            return Ok(0);
        }

        // A business has a handful of branches; one statement is enough.
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "insert into branches as t ({}) ",
            column_list(&COLUMNS)
        ));
        qb.push_values(&rows, |mut b, br| {
            b.push_bind(&br.branch_id)
                .push_bind(&br.name)
                .push_bind(&br.time_zone)
                .push_bind(br.latitude)
                .push_bind(br.longitude)
                .push_bind(&br.street_address_1)
                .push_bind(&br.street_address_2)
                .push_bind(&br.city)
                .push_bind(&br.state)
                .push_bind(&br.postal_code)
                .push_bind(&br.country)
                .push_bind(&br.currency_code)
                .push_bind(br.account_id)
                .push_bind(br.updated_at_upstream);
        });
        qb.push(" on conflict (branch_id) do update set ");
        qb.push(excluded_assignments(&COLUMNS, &["branch_id"]));
        qb.push(", updated_at = now()");
        qb.push(NEWEST_WINS_PREDICATE);

        let result = qb
            .build()
            .execute(&self.pool)
            .await
            .map_err(|e| DatahubError::Database(e.to_string()))?;
        Ok(result.rows_affected())
    }
}
