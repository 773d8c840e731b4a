use sqlx::{Postgres, QueryBuilder, Transaction as PgTransaction};

use crate::merge::{
    column_list, dedup_newest, excluded_assignments, NEWEST_WINS_PREDICATE,
    TRANSACTION_CHUNK_SIZE,
};
use crate::transactions::models::{Transaction, TransactionBatch, TransactionItem};
use datahub_common::error::{DatahubError, DatahubResult};

const HEADER_COLUMNS: [&str; 10] = [
    "transaction_id",
    "branch_id",
    "branch_name",
    "client_id",
    "client_first_name",
    "client_last_name",
    "client_source",
    "purchased_date",
    "purchase_time",
    "updated_at_upstream",
];

const ITEM_COLUMNS: [&str; 120] = [
    "transaction_item_id",
    "transaction_id",
    "branch_id",
    "branch_name",
    "client_id",
    "client_first_name",
    "client_last_name",
    "client_source",
    "purchased_date",
    "purchase_time",
    "item_type",
    "description",
    "quantity",
    "purchase_voucher_discount_percentage",
    "purchase_online_deposit",
    "purchase_online_discount_amount",
    "service_id",
    "service_name",
    "service_category_id",
    "service_category_name",
    "package_id",
    "package_name",
    "special_offer_id",
    "special_offer_name",
    "product_id",
    "product_name",
    "product_brand_id",
    "product_brand_name",
    "product_category_id",
    "product_category_name",
    "product_barcode",
    "product_code",
    "course_id",
    "course_name",
    "client_course_name",
    "voucher_serial",
    "service_reward_id",
    "service_reward_name",
    "product_reward_id",
    "product_reward_name",
    "unit_price",
    "original_price",
    "discount_type",
    "discount_value",
    "item_online_deposit",
    "item_online_discount",
    "loyalty_points_awarded",
    "tax_rate",
    "total_amount",
    "total_amount_pre_vouch_disc",
    "net_total_amount",
    "gross_total_amount",
    "net_price",
    "gross_price",
    "discount_amount",
    "tax_amount",
    "staff_tips",
    "product_cost_price",
    "service_cost",
    "service_cost_type",
    "gross_total_with_discount",
    "gross_total_with_discount_minus_tax",
    "simple_discount_amount",
    "membership_benefit_used",
    "membership_discount_amount",
    "deal",
    "session_net_amount",
    "session_gross_amount",
    "phorest_tips",
    "payment_type",
    "payment_type_ids",
    "payment_type_amounts",
    "payment_type_codes",
    "payment_type_names",
    "payment_type_voucher_serials",
    "payment_type_prepaid_tax_amounts",
    "outstanding_balance_pmt",
    "open_sale",
    "open_sale_type",
    "purchase_type",
    "online_booking",
    "voided",
    "voided_transaction_id",
    "void_reason",
    "department_id",
    "department_name",
    "staff_id",
    "staff_first_name",
    "staff_last_name",
    "staff_category_id",
    "staff_category_name",
    "is_requested_staff",
    "primary_staff_id",
    "preferred_staff_id",
    "preferred_staff_name",
    "appointment_id",
    "appointment_date",
    "appointment_created",
    "appointment_rating",
    "client_birthday",
    "client_gender",
    "client_email",
    "client_first_visit",
    "appt_client_id",
    "appt_client_first_name",
    "appt_client_last_name",
    "appt_client_birthday",
    "appt_client_gender",
    "appt_client_email",
    "appt_client_first_visit",
    "internet_category_ids",
    "internet_category_names",
    "branch_product_id",
    "fixed_discount_id",
    "fixed_discount_name",
    "client_course_id",
    "creating_user",
    "tax_rate_name",
    "sale_fee_id",
    "updated_at_upstream",
];

/// Headers first, then lines. Returns rows written across both tables.
pub async fn upsert_batch(
    tx: &mut PgTransaction<'_, Postgres>,
    batch: &TransactionBatch,
) -> DatahubResult<u64> {
    let headers = upsert_transactions(tx, &batch.transactions).await?;
    let items = upsert_items(tx, &batch.items).await?;
    tracing::debug!(headers, items, "transaction batch written");
    Ok(headers + items)
}

pub async fn upsert_transactions(
    tx: &mut PgTransaction<'_, Postgres>,
    transactions: &[Transaction],
) -> DatahubResult<u64> {
    let rows = dedup_newest(transactions.to_vec());
    let mut written = 0;

    for chunk in rows.chunks(TRANSACTION_CHUNK_SIZE) {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "insert into transactions as t ({}) ",
            column_list(&HEADER_COLUMNS)
        ));
        qb.push_values(chunk, |mut b, t| {
            b.push_bind(&t.transaction_id)
                .push_bind(&t.branch_id)
                .push_bind(&t.branch_name)
                .push_bind(&t.client_id)
                .push_bind(&t.client_first_name)
                .push_bind(&t.client_last_name)
                .push_bind(&t.client_source)
                .push_bind(t.purchased_date)
                .push_bind(t.purchase_time)
                .push_bind(t.updated_at_upstream);
        });
        qb.push(" on conflict (transaction_id) do update set ");
        qb.push(excluded_assignments(&HEADER_COLUMNS, &["transaction_id"]));
        qb.push(", updated_at = now()");
        qb.push(NEWEST_WINS_PREDICATE);

        written += qb
            .build()
            .execute(&mut **tx)
            .await
            .map_err(|e| DatahubError::Database(e.to_string()))?
            .rows_affected();
    }

    Ok(written)
}

pub async fn upsert_items(
    tx: &mut PgTransaction<'_, Postgres>,
    items: &[TransactionItem],
) -> DatahubResult<u64> {
    let rows = dedup_newest(items.to_vec());
    let mut written = 0;

    for chunk in rows.chunks(TRANSACTION_CHUNK_SIZE) {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "insert into transaction_items as t ({}) ",
            column_list(&ITEM_COLUMNS)
        ));
        qb.push_values(chunk, |mut b, i| {
            b.push_bind(&i.transaction_item_id)
                .push_bind(&i.transaction_id)
                .push_bind(&i.branch_id)
                .push_bind(&i.branch_name)
                .push_bind(&i.client_id)
                .push_bind(&i.client_first_name)
                .push_bind(&i.client_last_name)
                .push_bind(&i.client_source)
                .push_bind(i.purchased_date)
                .push_bind(i.purchase_time)
                .push_bind(&i.item_type)
                .push_bind(&i.description)
                .push_bind(i.quantity)
                .push_bind(i.purchase_voucher_discount_percentage)
                .push_bind(i.purchase_online_deposit)
                .push_bind(i.purchase_online_discount_amount)
                .push_bind(&i.service_id)
                .push_bind(&i.service_name)
                .push_bind(&i.service_category_id)
                .push_bind(&i.service_category_name)
                .push_bind(&i.package_id)
                .push_bind(&i.package_name)
                .push_bind(&i.special_offer_id)
                .push_bind(&i.special_offer_name)
                .push_bind(&i.product_id)
                .push_bind(&i.product_name)
                .push_bind(&i.product_brand_id)
                .push_bind(&i.product_brand_name)
                .push_bind(&i.product_category_id)
                .push_bind(&i.product_category_name)
                .push_bind(&i.product_barcode)
                .push_bind(&i.product_code)
                .push_bind(&i.course_id)
                .push_bind(&i.course_name)
                .push_bind(&i.client_course_name)
                .push_bind(&i.voucher_serial)
                .push_bind(&i.service_reward_id)
                .push_bind(&i.service_reward_name)
                .push_bind(&i.product_reward_id)
                .push_bind(&i.product_reward_name)
                .push_bind(i.unit_price)
                .push_bind(i.original_price)
                .push_bind(i.discount_type)
                .push_bind(i.discount_value)
                .push_bind(i.item_online_deposit)
                .push_bind(i.item_online_discount)
                .push_bind(i.loyalty_points_awarded)
                .push_bind(i.tax_rate)
                .push_bind(i.total_amount)
                .push_bind(i.total_amount_pre_vouch_disc)
                .push_bind(i.net_total_amount)
                .push_bind(i.gross_total_amount)
                .push_bind(i.net_price)
                .push_bind(i.gross_price)
                .push_bind(i.discount_amount)
                .push_bind(i.tax_amount)
                .push_bind(i.staff_tips)
                .push_bind(i.product_cost_price)
                .push_bind(i.service_cost)
                .push_bind(&i.service_cost_type)
                .push_bind(i.gross_total_with_discount)
                .push_bind(i.gross_total_with_discount_minus_tax)
                .push_bind(i.simple_discount_amount)
                .push_bind(i.membership_benefit_used)
                .push_bind(i.membership_discount_amount)
                .push_bind(i.deal)
                .push_bind(i.session_net_amount)
                .push_bind(i.session_gross_amount)
                .push_bind(i.phorest_tips)
                .push_bind(&i.payment_type)
                .push_bind(&i.payment_type_ids)
                .push_bind(&i.payment_type_amounts)
                .push_bind(&i.payment_type_codes)
                .push_bind(&i.payment_type_names)
                .push_bind(&i.payment_type_voucher_serials)
                .push_bind(&i.payment_type_prepaid_tax_amounts)
                .push_bind(i.outstanding_balance_pmt)
                .push_bind(i.open_sale)
                .push_bind(&i.open_sale_type)
                .push_bind(&i.purchase_type)
                .push_bind(i.online_booking)
                .push_bind(i.voided)
                .push_bind(&i.voided_transaction_id)
                .push_bind(&i.void_reason)
                .push_bind(&i.department_id)
                .push_bind(&i.department_name)
                .push_bind(&i.staff_id)
                .push_bind(&i.staff_first_name)
                .push_bind(&i.staff_last_name)
                .push_bind(&i.staff_category_id)
                .push_bind(&i.staff_category_name)
                .push_bind(i.is_requested_staff)
                .push_bind(&i.primary_staff_id)
                .push_bind(&i.preferred_staff_id)
                .push_bind(&i.preferred_staff_name)
                .push_bind(&i.appointment_id)
                .push_bind(i.appointment_date)
                .push_bind(i.appointment_created)
                .push_bind(i.appointment_rating)
                .push_bind(i.client_birthday)
                .push_bind(&i.client_gender)
                .push_bind(&i.client_email)
                .push_bind(i.client_first_visit)
                .push_bind(&i.appt_client_id)
                .push_bind(&i.appt_client_first_name)
                .push_bind(&i.appt_client_last_name)
                .push_bind(i.appt_client_birthday)
                .push_bind(&i.appt_client_gender)
                .push_bind(&i.appt_client_email)
                .push_bind(i.appt_client_first_visit)
                .push_bind(&i.internet_category_ids)
                .push_bind(&i.internet_category_names)
                .push_bind(&i.branch_product_id)
                .push_bind(&i.fixed_discount_id)
                .push_bind(&i.fixed_discount_name)
                .push_bind(&i.client_course_id)
                .push_bind(&i.creating_user)
                .push_bind(&i.tax_rate_name)
                .push_bind(&i.sale_fee_id)
                .push_bind(i.updated_at_upstream);
        });
        qb.push(" on conflict (transaction_item_id) do update set ");
        qb.push(excluded_assignments(&ITEM_COLUMNS, &["transaction_item_id"]));
        qb.push(", updated_at = now()");
        qb.push(NEWEST_WINS_PREDICATE);

        written += qb
            .build()
            .execute(&mut **tx)
            .await
            .map_err(|e| DatahubError::Database(e.to_string()))?
            .rows_affected();
    }

    Ok(written)
}
