use sqlx::{Postgres, QueryBuilder, Transaction};

use crate::clients::models::Client;
use crate::merge::{
    column_list, dedup_newest, excluded_assignments, CLIENT_CHUNK_SIZE, NEWEST_WINS_PREDICATE,
};
use datahub_common::error::{DatahubError, DatahubResult};

const COLUMNS: [&str; 38] = [
    "client_id",
    "version",
    "first_name",
    "last_name",
    "mobile",
    "linked_client_mobile",
    "land_line",
    "email",
    "created_at_upstream",
    "updated_at_upstream",
    "birth_date",
    "gender",
    "sms_marketing_consent",
    "email_marketing_consent",
    "sms_reminder_consent",
    "email_reminder_consent",
    "archived",
    "deleted",
    "banned",
    "merged_to_client_id",
    "street_address_1",
    "street_address_2",
    "city",
    "state",
    "postal_code",
    "country",
    "client_since",
    "first_visit",
    "last_visit",
    "notes",
    "photo_url",
    "preferred_staff_id",
    "credit_account_credit_days",
    "credit_account_credit_limit",
    "loyalty_card_serial_number",
    "external_id",
    "creating_branch_id",
    "client_category_ids",
];

/// Newest-wins upsert of a client batch, one statement per chunk.
///
/// Returns the number of rows inserted or overwritten; stale rows are not
/// counted.
pub async fn upsert_clients(
    tx: &mut Transaction<'_, Postgres>,
    clients: &[Client],
) -> DatahubResult<u64> {
    let rows = dedup_newest(clients.to_vec());
    let mut written = 0;

    for chunk in rows.chunks(CLIENT_CHUNK_SIZE) {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "insert into clients as t ({}) ",
            column_list(&COLUMNS)
        ));
        qb.push_values(chunk, |mut b, c| {
            b.push_bind(&c.client_id)
                .push_bind(c.version)
                .push_bind(&c.first_name)
                .push_bind(&c.last_name)
                .push_bind(&c.mobile)
                .push_bind(&c.linked_client_mobile)
                .push_bind(&c.land_line)
                .push_bind(&c.email)
                .push_bind(c.created_at_upstream)
                .push_bind(c.updated_at_upstream)
                .push_bind(c.birth_date)
                .push_bind(&c.gender)
                .push_bind(c.sms_marketing_consent)
                .push_bind(c.email_marketing_consent)
                .push_bind(c.sms_reminder_consent)
                .push_bind(c.email_reminder_consent)
                .push_bind(c.archived)
                .push_bind(c.deleted)
                .push_bind(c.banned)
                .push_bind(&c.merged_to_client_id)
                .push_bind(&c.street_address_1)
                .push_bind(&c.street_address_2)
                .push_bind(&c.city)
                .push_bind(&c.state)
                .push_bind(&c.postal_code)
                .push_bind(&c.country)
                .push_bind(c.client_since)
                .push_bind(c.first_visit)
                .push_bind(c.last_visit)
                .push_bind(&c.notes)
                .push_bind(&c.photo_url)
                .push_bind(&c.preferred_staff_id)
                .push_bind(c.credit_account_credit_days)
                .push_bind(c.credit_account_credit_limit)
                .push_bind(&c.loyalty_card_serial_number)
                .push_bind(&c.external_id)
                .push_bind(&c.creating_branch_id)
                .push_bind(&c.client_category_ids);
        });
        qb.push(" on conflict (client_id) do update set ");
        qb.push(excluded_assignments(&COLUMNS, &["client_id"]));
        qb.push(", updated_at = now()");
        qb.push(NEWEST_WINS_PREDICATE);

        let result = qb
            .build()
            .execute(&mut **tx)
            .await
            .map_err(|e| DatahubError::Database(e.to_string()))?;
        written += result.rows_affected();
    }

    Ok(written)
}
