//! Change-window expressions for export jobs and listing queries.

use chrono::{DateTime, NaiveDate, Utc};

/// First day requested when a branch has never been synced.
pub fn history_start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2000, 1, 1).unwrap_or(NaiveDate::MIN)
}

const DATE_FMT: &str = "%Y-%m-%d";

/// Millisecond-precision UTC timestamp as the listing endpoints expect it.
pub fn api_timestamp(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

/// Bounded day window for a transactions export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportWindow {
    pub start: NaiveDate,
    pub finish: NaiveDate,
}

impl ExportWindow {
    /// `[watermark day, today]`, or `[2000-01-01, today]` without a watermark.
    pub fn since(watermark: Option<DateTime<Utc>>, today: NaiveDate) -> Self {
        let start = watermark.map(|w| w.date_naive()).unwrap_or_else(history_start);
        Self {
            start,
            finish: today,
        }
    }

    pub fn start_filter(&self) -> String {
        self.start.format(DATE_FMT).to_string()
    }

    pub fn finish_filter(&self) -> String {
        self.finish.format(DATE_FMT).to_string()
    }

    /// `updated=<{finish}T23:59:59.999Z&updated=>{start}T00:00:00.000Z`
    pub fn filter_expression(&self) -> String {
        format!(
            "updated=<{}T23:59:59.999Z&updated=>{}T00:00:00.000Z",
            self.finish_filter(),
            self.start_filter()
        )
    }
}

/// Open-ended "updated since" filter; `None` asks for a full export.
pub fn updated_since(watermark: Option<DateTime<Utc>>) -> Option<String> {
    watermark.map(|w| format!("updated=>{}", w.format("%Y-%m-%dT%H:%M:%S.000Z")))
}
