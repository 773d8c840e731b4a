use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::merge::Mergeable;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Branch {
    pub branch_id: String,
    pub name: String,
    pub time_zone: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub street_address_1: String,
    pub street_address_2: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
    pub currency_code: String,
    pub account_id: Option<i64>,
    pub updated_at_upstream: Option<DateTime<Utc>>,
}

impl Mergeable for Branch {
    type Key = String;

    fn natural_key(&self) -> String {
        self.branch_id.clone()
    }

    fn updated_at_upstream(&self) -> Option<DateTime<Utc>> {
        self.updated_at_upstream
    }
}
