use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::merge::Mergeable;

/// A salon client as exported by the upstream client CSV.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Client {
    pub client_id: String,
    pub version: Option<i32>,
    pub first_name: String,
    pub last_name: String,
    pub mobile: String,
    pub linked_client_mobile: String,
    pub land_line: String,
    pub email: String,
    pub created_at_upstream: Option<DateTime<Utc>>,
    pub updated_at_upstream: Option<DateTime<Utc>>,
    pub birth_date: Option<NaiveDate>,
    pub gender: String,
    pub sms_marketing_consent: bool,
    pub email_marketing_consent: bool,
    pub sms_reminder_consent: bool,
    pub email_reminder_consent: bool,
    pub archived: bool,
    pub deleted: bool,
    pub banned: bool,
    pub merged_to_client_id: String,
    pub street_address_1: String,
    pub street_address_2: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
    pub client_since: Option<NaiveDate>,
    pub first_visit: Option<NaiveDate>,
    pub last_visit: Option<NaiveDate>,
    pub notes: String,
    pub photo_url: String,
    pub preferred_staff_id: String,
    pub credit_account_credit_days: Option<i32>,
    pub credit_account_credit_limit: Option<f64>,
    pub loyalty_card_serial_number: String,
    pub external_id: String,
    pub creating_branch_id: String,
    pub client_category_ids: String,
}

impl Mergeable for Client {
    type Key = String;

    fn natural_key(&self) -> String {
        self.client_id.clone()
    }

    fn updated_at_upstream(&self) -> Option<DateTime<Utc>> {
        self.updated_at_upstream
    }
}
