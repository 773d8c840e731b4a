use std::path::Path;

use datahub_db::reviews::models::Review;

use super::{read_rows, CsvError, Parsed, Row};

/// Column order of review archives. Reading accepts any order.
pub const REVIEW_COLUMNS: [&str; 14] = [
    "review_id",
    "branch_id",
    "client_id",
    "client_first_name",
    "client_last_name",
    "review_date",
    "visit_date",
    "staff_id",
    "staff_first_name",
    "staff_last_name",
    "text",
    "rating",
    "facebook_review",
    "twitter_review",
];

fn review_from_row(row: &Row<'_>) -> Option<Review> {
    let review_id = row.raw("review_id").trim();
    let branch_id = row.raw("branch_id").trim();
    if review_id.is_empty() || branch_id.is_empty() {
        return None;
    }

    Some(Review {
        review_id: review_id.to_string(),
        branch_id: branch_id.to_string(),
        client_id: row.text("client_id"),
        client_first_name: row.text("client_first_name"),
        client_last_name: row.text("client_last_name"),
        review_date: row.date("review_date"),
        visit_date: row.date("visit_date"),
        staff_id: row.text("staff_id"),
        staff_first_name: row.text("staff_first_name"),
        staff_last_name: row.text("staff_last_name"),
        text: row.text("text"),
        rating: row.int("rating"),
        facebook_review: row.flag("facebook_review"),
        twitter_review: row.flag("twitter_review"),
    })
}

pub fn read_reviews(path: &Path) -> Result<Parsed<Review>, CsvError> {
    read_rows(path, review_from_row)
}

fn date_cell(date: Option<chrono::NaiveDate>) -> String {
    date.map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

/// Write `reviews` to `path` with the archive header.
pub fn write_reviews(path: &Path, reviews: &[Review]) -> Result<(), CsvError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(REVIEW_COLUMNS)?;

    for r in reviews {
        writer.write_record([
            r.review_id.clone(),
            r.branch_id.clone(),
            r.client_id.clone(),
            r.client_first_name.clone(),
            r.client_last_name.clone(),
            date_cell(r.review_date),
            date_cell(r.visit_date),
            r.staff_id.clone(),
            r.staff_first_name.clone(),
            r.staff_last_name.clone(),
            r.text.clone(),
            r.rating.to_string(),
            r.facebook_review.to_string(),
            r.twitter_review.to_string(),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::write_csv;
    use chrono::NaiveDate;

    #[test]
    fn archive_is_readable_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("archive").join("reviews.csv");
        let review = Review {
            review_id: "r1".into(),
            branch_id: "br-1".into(),
            client_first_name: "Ann".into(),
            review_date: NaiveDate::from_ymd_opt(2024, 5, 3),
            text: "lovely, \"really\" lovely".into(),
            rating: 5,
            facebook_review: true,
            ..Default::default()
        };

        write_reviews(&path, std::slice::from_ref(&review)).unwrap();
        let parsed = read_reviews(&path).unwrap();

        assert_eq!(parsed.skipped, 0);
        assert_eq!(parsed.rows, vec![review]);
    }

    #[test]
    fn rows_need_review_and_branch_ids() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(
            dir.path(),
            "reviews.csv",
            "branch_id,review_id,rating\nbr-1,r1,4\n,r2,5\nbr-1,,3\n",
        );
        let parsed = read_reviews(&path).unwrap();
        assert_eq!(parsed.rows.len(), 1);
        assert_eq!(parsed.rows[0].rating, 4);
        assert_eq!(parsed.skipped, 2);
    }
}
