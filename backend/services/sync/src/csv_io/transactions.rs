use std::path::Path;

use datahub_db::transactions::models::{TransactionBatch, TransactionItem};

use super::{read_rows, CsvError, Row};

/// One line per row. Rows without a `transaction_id` are skipped.
fn item_from_row(row: &Row<'_>) -> Option<TransactionItem> {
    let transaction_id = row.raw("transaction_id").trim();
    if transaction_id.is_empty() {
        return None;
    }

    Some(TransactionItem {
        transaction_item_id: row.raw("transaction_item_id").trim().to_string(),
        transaction_id: transaction_id.to_string(),
        branch_id: row.text("branch_id"),
        branch_name: row.text("branch_name"),
        client_id: row.text("client_id"),
        client_first_name: row.text("client_first_name"),
        client_last_name: row.text("client_last_name"),
        client_source: row.text("client_source"),
        purchased_date: row.date("purchased_date"),
        purchase_time: row.clock("purchase_time"),
        item_type: row.text("item_type"),
        description: row.text("description"),
        quantity: row.float("quantity"),
        purchase_voucher_discount_percentage: row.float("purchase_voucher_discount_percentage"),
        purchase_online_deposit: row.float("purchase_online_deposit"),
        purchase_online_discount_amount: row.float("purchase_online_discount_amount"),
        service_id: row.text("service_id"),
        service_name: row.text("service_name"),
        service_category_id: row.text("service_category_id"),
        service_category_name: row.text("service_category_name"),
        package_id: row.text("package_id"),
        package_name: row.text("package_name"),
        special_offer_id: row.text("special_offer_id"),
        special_offer_name: row.text("special_offer_name"),
        product_id: row.text("product_id"),
        product_name: row.text("product_name"),
        product_brand_id: row.text("product_brand_id"),
        product_brand_name: row.text("product_brand_name"),
        product_category_id: row.text("product_category_id"),
        product_category_name: row.text("product_category_name"),
        product_barcode: row.text("product_barcode"),
        product_code: row.text("product_code"),
        course_id: row.text("course_id"),
        course_name: row.text("course_name"),
        client_course_name: row.text("client_course_name"),
        voucher_serial: row.text("voucher_serial"),
        service_reward_id: row.text("service_reward_id"),
        service_reward_name: row.text("service_reward_name"),
        product_reward_id: row.text("product_reward_id"),
        product_reward_name: row.text("product_reward_name"),
        unit_price: row.float("unit_price"),
        original_price: row.float("original_price"),
        discount_type: row.float("discount_type"),
        discount_value: row.float("discount_value"),
        item_online_deposit: row.float("item_online_deposit"),
        item_online_discount: row.float("item_online_discount"),
        loyalty_points_awarded: row.float("loyalty_points_awarded"),
        tax_rate: row.float("tax_rate"),
        total_amount: row.float("total_amount"),
        total_amount_pre_vouch_disc: row.float("total_amount_pre_vouch_disc"),
        net_total_amount: row.float("net_total_amount"),
        gross_total_amount: row.float("gross_total_amount"),
        net_price: row.float("net_price"),
        gross_price: row.float("gross_price"),
        discount_amount: row.float("discount_amount"),
        tax_amount: row.float("tax_amount"),
        staff_tips: row.float("staff_tips"),
        product_cost_price: row.float("product_cost_price"),
        service_cost: row.float("service_cost"),
        service_cost_type: row.text("service_cost_type"),
        gross_total_with_discount: row.float("gross_total_with_discount"),
        gross_total_with_discount_minus_tax: row.float("gross_total_with_discount_minus_tax"),
        simple_discount_amount: row.float("simple_discount_amount"),
        membership_benefit_used: row.int("membership_benefit_used"),
        membership_discount_amount: row.float("membership_discount_amount"),
        deal: row.float("deal"),
        session_net_amount: row.float("session_net_amount"),
        session_gross_amount: row.float("session_gross_amount"),
        phorest_tips: row.float("phorest_tips"),
        payment_type: row.text("payment_type"),
        payment_type_ids: row.text("payment_type_ids"),
        payment_type_amounts: row.text("payment_type_amounts"),
        payment_type_codes: row.text("payment_type_codes"),
        payment_type_names: row.text("payment_type_names"),
        payment_type_voucher_serials: row.text("payment_type_voucher_serials"),
        payment_type_prepaid_tax_amounts: row.text("payment_type_prepaid_tax_amounts"),
        outstanding_balance_pmt: row.bigint("outstanding_balance_pmt"),
        open_sale: row.flag("open_sale"),
        open_sale_type: row.text("open_sale_type"),
        purchase_type: row.text("purchase_type"),
        online_booking: row.bigint("online_booking"),
        voided: row.flag("void"),
        voided_transaction_id: row.text("voided_transaction_id"),
        void_reason: row.text("void_reason"),
        department_id: row.text("department_id"),
        department_name: row.text("department_name"),
        staff_id: row.text("staff_id"),
        staff_first_name: row.text("staff_first_name"),
        staff_last_name: row.text("staff_last_name"),
        staff_category_id: row.text("staff_category_id"),
        staff_category_name: row.text("staff_category_name"),
        is_requested_staff: row.int("is_requested_staff"),
        primary_staff_id: row.text("primary_staff_id"),
        preferred_staff_id: row.text("preferred_staff_id"),
        preferred_staff_name: row.text("preferred_staff_name"),
        appointment_id: row.text("appointment_id"),
        appointment_date: row.date("appointment_date"),
        appointment_created: row.timestamp("appointment_created"),
        appointment_rating: row.bigint("appointment_rating"),
        client_birthday: row.date("client_birthday"),
        client_gender: row.text("client_gender"),
        client_email: row.text("client_email"),
        client_first_visit: row.date("client_first_visit"),
        appt_client_id: row.text("appt_client_id"),
        appt_client_first_name: row.text("appt_client_first_name"),
        appt_client_last_name: row.text("appt_client_last_name"),
        appt_client_birthday: row.date("appt_client_birthday"),
        appt_client_gender: row.text("appt_client_gender"),
        appt_client_email: row.text("appt_client_email"),
        appt_client_first_visit: row.date("appt_client_first_visit"),
        internet_category_ids: row.text("internet_category_ids"),
        internet_category_names: row.text("internet_category_names"),
        branch_product_id: row.text("branch_product_id"),
        fixed_discount_id: row.text("fixed_discount_id"),
        fixed_discount_name: row.text("fixed_discount_name"),
        client_course_id: row.text("client_course_id"),
        creating_user: row.text("creating_user"),
        tax_rate_name: row.text("tax_rate_name"),
        sale_fee_id: row.text("sale_fee_id"),
        updated_at_upstream: row.timestamp("purchase_updated_at"),
    })
}

/// Parse a transactions export into headers and lines, plus the number of
/// rows skipped.
pub fn read_transactions(path: &Path) -> Result<(TransactionBatch, usize), CsvError> {
    let parsed = read_rows(path, item_from_row)?;
    let batch = TransactionBatch::from_items(parsed.rows);

    tracing::info!(
        path = %path.display(),
        transactions = batch.transactions.len(),
        items = batch.items.len(),
        skipped = parsed.skipped,
        "parsed transactions csv"
    );
    Ok((batch, parsed.skipped))
}
