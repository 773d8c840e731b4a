use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::merge::{
    column_list, dedup_newest, excluded_assignments, NEWEST_WINS_PREDICATE,
    TRANSACTION_CHUNK_SIZE,
};
use crate::staff::models::Staff;
use crate::staff::repositories::StaffRepository;
use datahub_common::error::{DatahubError, DatahubResult};

const COLUMNS: [&str; 20] = [
    "staff_id",
    "branch_id",
    "staff_category_id",
    "staff_category_name",
    "user_id",
    "first_name",
    "last_name",
    "birth_date",
    "start_date",
    "self_employed",
    "archived",
    "mobile",
    "email",
    "gender",
    "notes",
    "online_profile",
    "hide_from_online_bookings",
    "hide_from_appointment_screen",
    "image_url",
    "updated_at_upstream",
];

#[derive(Clone)]
pub struct PgStaffRepository {
    pool: PgPool,
}

impl PgStaffRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StaffRepository for PgStaffRepository {
    async fn upsert_staff(&self, staff: &[Staff]) -> DatahubResult<u64> {
        let rows = dedup_newest(staff.to_vec());
        let mut written = 0;

        for chunk in rows.chunks(TRANSACTION_CHUNK_SIZE) {
            let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(format!(
                "insert into staff as t ({}) ",
                column_list(&COLUMNS)
            ));
            qb.push_values(chunk, |mut b, s| {
                b.push_bind(&s.staff_id)
                    .push_bind(&s.branch_id)
                    .push_bind(&s.staff_category_id)
                    .push_bind(&s.staff_category_name)
                    .push_bind(&s.user_id)
                    .push_bind(&s.first_name)
                    .push_bind(&s.last_name)
                    .push_bind(s.birth_date)
                    .push_bind(s.start_date)
                    .push_bind(s.self_employed)
                    .push_bind(s.archived)
                    .push_bind(&s.mobile)
                    .push_bind(&s.email)
                    .push_bind(&s.gender)
                    .push_bind(&s.notes)
                    .push_bind(&s.online_profile)
                    .push_bind(s.hide_from_online_bookings)
                    .push_bind(s.hide_from_appointment_screen)
                    .push_bind(&s.image_url)
                    .push_bind(s.updated_at_upstream);
            });
            qb.push(" on conflict (staff_id, branch_id) do update set ");
            qb.push(excluded_assignments(&COLUMNS, &["staff_id", "branch_id"]));
            qb.push(", updated_at = now()");
            qb.push(NEWEST_WINS_PREDICATE);

            written += qb
                .build()
                .execute(&self.pool)
                .await
                .map_err(|e| DatahubError::Database(e.to_string()))?
                .rows_affected();
        }

        Ok(written)
    }
}
