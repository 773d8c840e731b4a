use std::time::Duration;

use datahub_config::AppConfig;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;

use super::models::{
    ApiBranch, ApiProduct, ApiReview, ApiStaff, BranchListing, ListPage, ProductListing,
    ReviewListing, StaffListing,
};

pub const STAFF_PAGE_SIZE: u32 = 200;
pub const BRANCH_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone)]
pub struct PhorestClientConfig {
    pub base_url: String,
    pub business_id: String,
    pub username: String,
    pub password: String,
    pub max_retries: u32,
    pub timeout_secs: u64,
}

impl PhorestClientConfig {
    pub fn from_app_config(cfg: &AppConfig) -> Self {
        Self {
            base_url: cfg.phorest_base_url.clone(),
            business_id: cfg.phorest_business.clone(),
            username: cfg.phorest_username.clone(),
            password: cfg.phorest_password.clone(),
            max_retries: cfg.phorest_max_retries,
            timeout_secs: cfg.phorest_timeout_secs,
        }
    }
}

/// Query for one page of the product listing.
#[derive(Debug, Clone, Default)]
pub struct ProductQuery {
    pub branch_id: String,
    pub product_type: Option<String>,
    /// `(updatedAfter, updatedBefore)`; upstream rejects one without the other.
    pub updated_window: Option<(chrono::DateTime<chrono::Utc>, chrono::DateTime<chrono::Utc>)>,
    pub page: u32,
    pub size: u32,
}

impl ProductQuery {
    pub fn to_query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("size", self.size.to_string()),
            ("page", self.page.to_string()),
        ];
        if let Some(product_type) = &self.product_type {
            pairs.push(("productType", product_type.clone()));
        }
        if let Some((after, before)) = self.updated_window {
            pairs.push(("updatedAfter", super::filters::api_timestamp(after)));
            pairs.push(("updatedBefore", super::filters::api_timestamp(before)));
        }
        pairs
    }
}

#[derive(Clone)]
pub struct PhorestClient {
    client: Client,
    config: PhorestClientConfig,
}

#[derive(Debug, thiserror::Error)]
pub enum PhorestClientError {
    #[error("HTTP {status}: {body}")]
    HttpError { status: StatusCode, body: String },

    #[error("request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("max retries exceeded after {attempts} attempts: {last_error}")]
    MaxRetriesExceeded { attempts: u32, last_error: String },
}

impl PhorestClient {
    pub fn new(config: PhorestClientConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { client, config })
    }

    /// For testing: create a client pointing at a specific base URL (e.g., wiremock).
    #[cfg(test)]
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.config.base_url = base_url.to_string();
        self
    }

    pub fn config(&self) -> &PhorestClientConfig {
        &self.config
    }

    pub(crate) fn http(&self) -> &Client {
        &self.client
    }

    /// `{base}/business/{business}` prefix shared by every resource path.
    pub(crate) fn business_url(&self) -> String {
        format!("{}/business/{}", self.config.base_url, self.config.business_id)
    }

    pub(crate) fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .basic_auth(&self.config.username, Some(&self.config.password))
            .header(reqwest::header::ACCEPT, "application/json")
    }

    /// Fetch every branch of the business.
    pub async fn fetch_branches(&self) -> Result<Vec<ApiBranch>, PhorestClientError> {
        let url = format!("{}/branch", self.business_url());
        let mut page = 0;
        let mut all = Vec::new();

        loop {
            let query = [("size", BRANCH_PAGE_SIZE.to_string()), ("page", page.to_string())];
            let listing: BranchListing = self
                .request_with_retry(|| self.authed(self.client.get(&url).query(&query)))
                .await?;
            let done = listing.page.is_last(listing.embedded.branches.len());
            all.extend(listing.embedded.branches);
            if done {
                break;
            }
            page += 1;
        }

        Ok(all)
    }

    /// Fetch every staff member of a branch, archived included.
    pub async fn fetch_staff(&self, branch_id: &str) -> Result<Vec<ApiStaff>, PhorestClientError> {
        let url = format!("{}/branch/{}/staff", self.business_url(), branch_id);
        let mut page = 0;
        let mut all = Vec::new();

        loop {
            let query = [
                ("fetch_archived", "true".to_string()),
                ("size", STAFF_PAGE_SIZE.to_string()),
                ("page", page.to_string()),
            ];
            let listing: StaffListing = self
                .request_with_retry(|| self.authed(self.client.get(&url).query(&query)))
                .await?;
            let done = listing.page.is_last(listing.embedded.staffs.len());
            all.extend(listing.embedded.staffs);
            if done {
                break;
            }
            page += 1;
        }

        Ok(all)
    }

    /// One page of a branch's reviews.
    pub async fn fetch_reviews_page(
        &self,
        branch_id: &str,
        page: u32,
        size: u32,
    ) -> Result<ListPage<ApiReview>, PhorestClientError> {
        let url = format!("{}/branch/{}/review", self.business_url(), branch_id);
        let query = [("size", size.to_string()), ("page", page.to_string())];
        let listing: ReviewListing = self
            .request_with_retry(|| self.authed(self.client.get(&url).query(&query)))
            .await?;
        Ok(ListPage {
            items: listing.embedded.reviews,
            page: listing.page,
        })
    }

    /// One page of a branch's products.
    pub async fn fetch_products_page(
        &self,
        query: &ProductQuery,
    ) -> Result<ListPage<ApiProduct>, PhorestClientError> {
        let url = format!("{}/branch/{}/product", self.business_url(), query.branch_id);
        let pairs = query.to_query_pairs();
        let listing: ProductListing = self
            .request_with_retry(|| self.authed(self.client.get(&url).query(&pairs)))
            .await?;
        Ok(ListPage {
            items: listing.embedded.products,
            page: listing.page,
        })
    }

    /// Send once, without retries. Used where the caller owns the retry
    /// policy.
    pub(crate) async fn request_once<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
    ) -> Result<T, PhorestClientError> {
        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PhorestClientError::HttpError { status, body });
        }
        response
            .json::<T>()
            .await
            .map_err(PhorestClientError::RequestError)
    }

    async fn request_with_retry<T, F>(&self, build: F) -> Result<T, PhorestClientError>
    where
        T: DeserializeOwned,
        F: Fn() -> RequestBuilder,
    {
        let mut last_error = String::new();

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                let backoff_secs = std::cmp::min(1u64 << attempt, 30);
                tracing::warn!(attempt, backoff_secs, "retrying after backoff");
                tokio::time::sleep(Duration::from_secs(backoff_secs)).await;
            }

            let response = match build().send().await {
                Ok(resp) => resp,
                Err(e) => {
                    last_error = e.to_string();
                    if e.is_timeout() || e.is_connect() {
                        continue;
                    }
                    return Err(PhorestClientError::RequestError(e));
                }
            };

            let status = response.status();

            if status.is_success() {
                return response
                    .json::<T>()
                    .await
                    .map_err(PhorestClientError::RequestError);
            }

            // Honor Retry-After header for 429
            if status == StatusCode::TOO_MANY_REQUESTS {
                if let Some(retry_after) = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                {
                    let wait = std::cmp::min(retry_after, 60);
                    tracing::warn!(wait, "rate-limited, waiting Retry-After");
                    tokio::time::sleep(Duration::from_secs(wait)).await;
                }
                last_error = "429 Too Many Requests".to_string();
                continue;
            }

            if status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                last_error = format!("{status}: {body}");
                continue;
            }

            // Fail fast on 4xx (except 429 handled above)
            let body = response.text().await.unwrap_or_default();
            return Err(PhorestClientError::HttpError { status, body });
        }

        Err(PhorestClientError::MaxRetriesExceeded {
            attempts: self.config.max_retries + 1,
            last_error,
        })
    }
}
