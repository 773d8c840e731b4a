use chrono::{DateTime, Utc};

/// Newest stored revisions, used to seed watermarks after a bootstrap load.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LatestRevisions {
    /// `(branch_id, max(updated_at_upstream))` over transaction lines.
    pub transactions_by_branch: Vec<(String, DateTime<Utc>)>,
    pub clients: Option<DateTime<Utc>>,
}
