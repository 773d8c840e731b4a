use std::collections::HashSet;

use async_trait::async_trait;

use crate::reviews::models::Review;
use datahub_common::error::DatahubResult;

#[async_trait]
pub trait ReviewRepository: Send + Sync {
    /// Subset of `review_ids` already stored.
    async fn existing_ids(&self, review_ids: &[String]) -> DatahubResult<HashSet<String>>;

    /// Insert reviews whose id is not stored yet; existing ids are left
    /// untouched. Returns the number of rows inserted.
    async fn insert_missing(&self, reviews: &[Review]) -> DatahubResult<u64>;

    /// Whether any review is stored at all.
    async fn has_any(&self) -> DatahubResult<bool>;
}
