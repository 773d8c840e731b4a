use std::path::Path;

use datahub_db::clients::models::Client;
use datahub_db::merge::dedup_newest;

use super::{read_rows, CsvError, Row};

fn client_from_row(row: &Row<'_>) -> Option<Client> {
    let client_id = row.raw("client_id").trim();
    if client_id.is_empty() {
        return None;
    }

    Some(Client {
        client_id: client_id.to_string(),
        version: row.opt_int("version"),
        first_name: row.text("first_name"),
        last_name: row.text("last_name"),
        mobile: row.text("mobile"),
        linked_client_mobile: row.text("linked_client_mobile"),
        land_line: row.text("land_line"),
        email: row.text("email"),
        created_at_upstream: row.timestamp("created_at"),
        updated_at_upstream: row.timestamp("updated_at"),
        birth_date: row.date("birth_date"),
        gender: row.text("gender"),
        sms_marketing_consent: row.flag("sms_marketing_consent"),
        email_marketing_consent: row.flag("email_marketing_consent"),
        sms_reminder_consent: row.flag("sms_reminder_consent"),
        email_reminder_consent: row.flag("email_reminder_consent"),
        archived: row.flag("archived"),
        deleted: row.flag("deleted"),
        banned: row.flag("banned"),
        merged_to_client_id: row.text("merged_to_client_id"),
        street_address_1: row.text("street_address_1"),
        street_address_2: row.text("street_address_2"),
        city: row.text("city"),
        state: row.text("state"),
        postal_code: row.text("postal_code"),
        country: row.text("country"),
        client_since: row.date("client_since"),
        first_visit: row.date("first_visit"),
        last_visit: row.date("last_visit"),
        notes: row.text("notes"),
        photo_url: row.text("photo_url"),
        preferred_staff_id: row.text("preferred_staff_id"),
        credit_account_credit_days: row.opt_int("credit_account_credit_days"),
        credit_account_credit_limit: row.opt_float("credit_account_credit_limit"),
        loyalty_card_serial_number: row.text("loyalty_card_serial_number"),
        external_id: row.text("external_id"),
        creating_branch_id: row.text("creating_branch_id"),
        client_category_ids: row.text("client_category_ids"),
    })
}

/// Parse a clients export, one row per client id (newest `updated_at` wins),
/// plus the number of rows skipped.
pub fn read_clients(path: &Path) -> Result<(Vec<Client>, usize), CsvError> {
    let parsed = read_rows(path, client_from_row)?;
    let clients = dedup_newest(parsed.rows);

    tracing::info!(
        path = %path.display(),
        clients = clients.len(),
        skipped = parsed.skipped,
        "parsed clients csv"
    );
    Ok((clients, parsed.skipped))
}
