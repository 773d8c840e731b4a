use std::collections::HashSet;

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder, Row};

use crate::merge::TRANSACTION_CHUNK_SIZE;
use crate::reviews::models::Review;
use crate::reviews::repositories::ReviewRepository;
use datahub_common::error::{DatahubError, DatahubResult};

#[derive(Clone)]
pub struct PgReviewRepository {
    pool: PgPool,
}

impl PgReviewRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReviewRepository for PgReviewRepository {
    async fn existing_ids(&self, review_ids: &[String]) -> DatahubResult<HashSet<String>> {
        if review_ids.is_empty() {
            return Ok(HashSet::new());
        }

        let rows = sqlx::query("select review_id from reviews where review_id = any($1)")
            .bind(review_ids)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DatahubError::Database(e.to_string()))?;

        Ok(rows.into_iter().map(|r| r.get("review_id")).collect())
    }

    async fn insert_missing(&self, reviews: &[Review]) -> DatahubResult<u64> {
        let mut inserted = 0;

        for chunk in reviews.chunks(TRANSACTION_CHUNK_SIZE) {
            let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(
                "insert into reviews (review_id, branch_id, client_id, client_first_name, client_last_name, \
                 review_date, visit_date, staff_id, staff_first_name, staff_last_name, text, rating, \
                 facebook_review, twitter_review) ",
            );
            qb.push_values(chunk, |mut b, r| {
                b.push_bind(&r.review_id)
                    .push_bind(&r.branch_id)
                    .push_bind(&r.client_id)
                    .push_bind(&r.client_first_name)
                    .push_bind(&r.client_last_name)
                    .push_bind(r.review_date)
                    .push_bind(r.visit_date)
                    .push_bind(&r.staff_id)
                    .push_bind(&r.staff_first_name)
                    .push_bind(&r.staff_last_name)
                    .push_bind(&r.text)
                    .push_bind(r.rating)
                    .push_bind(r.facebook_review)
                    .push_bind(r.twitter_review);
            });
            qb.push(" on conflict (review_id) do nothing");

            inserted += qb
                .build()
                .execute(&self.pool)
                .await
                .map_err(|e| DatahubError::Database(e.to_string()))?
                .rows_affected();
        }

        Ok(inserted)
    }

    async fn has_any(&self) -> DatahubResult<bool> {
        let row = sqlx::query("select exists(select 1 from reviews) as present")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DatahubError::Database(e.to_string()))?;
        Ok(row.get("present"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_db;

    fn review(id: &str, text: &str) -> Review {
        Review {
            review_id: id.to_owned(),
            branch_id: "br-1".to_owned(),
            text: text.to_owned(),
            rating: 5,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn stored_review_is_never_edited() {
        let pool = match test_db::pool().await {
            Some(p) => p,
            None => return,
        };
        let repo = PgReviewRepository::new(pool.clone());
        let id = test_db::unique("R1");

        assert_eq!(repo.insert_missing(&[review(&id, "great service")]).await.expect("first"), 1);
        assert_eq!(repo.insert_missing(&[review(&id, "edited")]).await.expect("second"), 0);

        let text: String = sqlx::query("select text from reviews where review_id = $1")
            .bind(&id)
            .fetch_one(&pool)
            .await
            .expect("row")
            .get("text");
        assert_eq!(text, "great service");
        assert!(repo.has_any().await.expect("has_any"));
    }

    #[tokio::test]
    async fn existing_ids_returns_only_stored_ids() {
        let pool = match test_db::pool().await {
            Some(p) => p,
            None => return,
        };
        let repo = PgReviewRepository::new(pool);
        let stored = test_db::unique("R");
        let missing = test_db::unique("R");
        repo.insert_missing(&[review(&stored, "ok")]).await.expect("insert");

        let found = repo
            .existing_ids(&[stored.clone(), missing.clone()])
            .await
            .expect("lookup");
        assert!(found.contains(&stored));
        assert!(!found.contains(&missing));
        assert!(repo.existing_ids(&[]).await.expect("empty").is_empty());
    }
}
