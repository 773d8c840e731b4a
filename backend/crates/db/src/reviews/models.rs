use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A client review. Immutable once stored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub review_id: String,
    pub branch_id: String,
    pub client_id: String,
    pub client_first_name: String,
    pub client_last_name: String,
    pub review_date: Option<NaiveDate>,
    pub visit_date: Option<NaiveDate>,
    pub staff_id: String,
    pub staff_first_name: String,
    pub staff_last_name: String,
    pub text: String,
    pub rating: i32,
    pub facebook_review: bool,
    pub twitter_review: bool,
}
