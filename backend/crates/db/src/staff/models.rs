use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::merge::Mergeable;

/// A staff member as listed for one branch. The same person may appear
/// under several branches.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Staff {
    pub staff_id: String,
    pub branch_id: String,
    pub staff_category_id: String,
    pub staff_category_name: String,
    pub user_id: String,
    pub first_name: String,
    pub last_name: String,
    pub birth_date: Option<NaiveDate>,
    pub start_date: Option<NaiveDate>,
    pub self_employed: bool,
    pub archived: bool,
    pub mobile: String,
    pub email: String,
    pub gender: String,
    pub notes: String,
    pub online_profile: String,
    pub hide_from_online_bookings: bool,
    pub hide_from_appointment_screen: bool,
    pub image_url: String,
    /// The staff listing carries no change time, so this stays `None` and
    /// every refresh overwrites.
    pub updated_at_upstream: Option<DateTime<Utc>>,
}

impl Mergeable for Staff {
    type Key = (String, String);

    fn natural_key(&self) -> Self::Key {
        (self.staff_id.clone(), self.branch_id.clone())
    }

    fn updated_at_upstream(&self) -> Option<DateTime<Utc>> {
        self.updated_at_upstream
    }
}
