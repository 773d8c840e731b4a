//! Newest-wins merge rules shared by every mutable entity.
//!
//! The SQL upserts encode the same rule as [`should_overwrite`] in their
//! `where` clause; the in-memory helpers here collapse a batch before it is
//! written so one statement never carries the same conflict key twice.

use std::collections::HashMap;
use std::hash::Hash;

use chrono::{DateTime, Utc};

/// Rows per statement for wide transaction-like records.
pub const TRANSACTION_CHUNK_SIZE: usize = 500;
/// Rows per statement for clients.
pub const CLIENT_CHUNK_SIZE: usize = 1000;

/// Conditional clause appended to `on conflict ... do update` for tables
/// keyed by `updated_at_upstream`. `t` must alias the target table.
pub const NEWEST_WINS_PREDICATE: &str = " where t.updated_at_upstream is null \
     or excluded.updated_at_upstream > t.updated_at_upstream";

/// `a, b, c` for an insert column list.
pub(crate) fn column_list(columns: &[&str]) -> String {
    columns.join(", ")
}

/// `b = excluded.b, c = excluded.c` for every column except the conflict key(s).
pub(crate) fn excluded_assignments(columns: &[&str], keys: &[&str]) -> String {
    columns
        .iter()
        .filter(|c| !keys.contains(c))
        .map(|c| format!("{c} = excluded.{c}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// A record that carries a natural key and an upstream revision time.
pub trait Mergeable {
    type Key: Eq + Hash + Clone;

    fn natural_key(&self) -> Self::Key;
    fn updated_at_upstream(&self) -> Option<DateTime<Utc>>;
}

/// Whether an incoming row replaces the stored one.
///
/// Nothing stored (or a stored row without a revision) always loses.
/// Otherwise the incoming revision must be strictly newer; an incoming row
/// without a revision never replaces a dated one.
pub fn should_overwrite(stored: Option<DateTime<Utc>>, incoming: Option<DateTime<Utc>>) -> bool {
    match (stored, incoming) {
        (None, _) => true,
        (Some(_), None) => false,
        (Some(s), Some(i)) => i > s,
    }
}

/// Collapse rows sharing a natural key, keeping the newest revision.
///
/// Ties and undated duplicates keep the first row seen. Output follows the
/// order in which each key first appeared.
pub fn dedup_newest<T: Mergeable>(rows: Vec<T>) -> Vec<T> {
    let mut slot_by_key: HashMap<T::Key, usize> = HashMap::with_capacity(rows.len());
    let mut out: Vec<T> = Vec::with_capacity(rows.len());

    for row in rows {
        match slot_by_key.get(&row.natural_key()) {
            Some(&slot) => {
                let kept = out[slot].updated_at_upstream();
                let incoming = row.updated_at_upstream();
                if (kept.is_none() && incoming.is_some())
                    || matches!((kept, incoming), (Some(k), Some(i)) if i > k)
                {
                    out[slot] = row;
                }
            }
            None => {
                slot_by_key.insert(row.natural_key(), out.len());
                out.push(row);
            }
        }
    }

    out
}

/// Greatest `updated_at_upstream` across rows, if any row carries one.
pub fn max_updated_at<'a, T, I>(rows: I) -> Option<DateTime<Utc>>
where
    T: Mergeable + 'a,
    I: IntoIterator<Item = &'a T>,
{
    rows.into_iter().filter_map(|r| r.updated_at_upstream()).max()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[derive(Debug, Clone, PartialEq)]
    struct Row {
        id: &'static str,
        name: &'static str,
        at: Option<DateTime<Utc>>,
    }

    impl Mergeable for Row {
        type Key = &'static str;

        fn natural_key(&self) -> Self::Key {
            self.id
        }

        fn updated_at_upstream(&self) -> Option<DateTime<Utc>> {
            self.at
        }
    }

    fn day(d: u32) -> Option<DateTime<Utc>> {
        Some(Utc.with_ymd_and_hms(2024, 2, d, 0, 0, 0).unwrap())
    }

    #[test]
    fn overwrite_when_nothing_stored() {
        assert!(should_overwrite(None, day(1)));
        assert!(should_overwrite(None, None));
    }

    #[test]
    fn stale_or_equal_incoming_is_rejected() {
        assert!(!should_overwrite(day(10), day(1)));
        assert!(!should_overwrite(day(10), day(10)));
        assert!(!should_overwrite(day(10), None));
    }

    #[test]
    fn newer_incoming_wins_at_full_precision() {
        let stored = Utc.with_ymd_and_hms(2024, 2, 1, 10, 0, 0).unwrap();
        let incoming = stored + chrono::Duration::milliseconds(1);
        assert!(should_overwrite(Some(stored), Some(incoming)));
    }

    #[test]
    fn dedup_keeps_newest_per_key_in_first_seen_order() {
        let rows = vec![
            Row { id: "t1", name: "old", at: day(1) },
            Row { id: "t2", name: "only", at: day(3) },
            Row { id: "t1", name: "new", at: day(5) },
            Row { id: "t1", name: "older", at: day(2) },
        ];

        let out = dedup_newest(rows);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].id, "t1");
        assert_eq!(out[0].name, "new");
        assert_eq!(out[1].id, "t2");
    }

    #[test]
    fn dedup_prefers_dated_over_undated_and_first_on_tie() {
        let rows = vec![
            Row { id: "c", name: "undated", at: None },
            Row { id: "c", name: "dated", at: day(4) },
            Row { id: "c", name: "tie", at: day(4) },
        ];
        let out = dedup_newest(rows);
        assert_eq!(out, vec![Row { id: "c", name: "dated", at: day(4) }]);
    }

    #[test]
    fn assignments_skip_conflict_keys() {
        let cols = ["staff_id", "branch_id", "first_name", "updated_at_upstream"];
        assert_eq!(
            excluded_assignments(&cols, &["staff_id", "branch_id"]),
            "first_name = excluded.first_name, updated_at_upstream = excluded.updated_at_upstream"
        );
        assert_eq!(column_list(&cols[..2]), "staff_id, branch_id");
    }

    #[test]
    fn max_updated_at_ignores_undated_rows() {
        let rows = [
            Row { id: "a", name: "", at: None },
            Row { id: "b", name: "", at: day(7) },
            Row { id: "c", name: "", at: day(2) },
        ];
        assert_eq!(max_updated_at(rows.iter()), day(7));
        assert_eq!(max_updated_at::<Row, _>(std::iter::empty()), None);
    }
}
