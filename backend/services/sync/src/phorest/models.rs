//! Listing payloads of the Phorest third-party API and their conversion
//! into storage records.

use chrono::{DateTime, NaiveDate, Utc};
use datahub_db::branches::models::Branch;
use datahub_db::products::models::{Product, ProductSnapshot, ProductStock};
use datahub_db::reviews::models::Review;
use datahub_db::staff::models::Staff;
use serde::Deserialize;

/// Spring-style `page` envelope returned with every listing.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct PageInfo {
    pub size: u32,
    pub total_elements: u64,
    pub total_pages: u32,
    pub number: u32,
}

impl PageInfo {
    /// True when no page follows the one just read. A zero `totalPages`
    /// (or no envelope at all) carries no information, so paging then runs
    /// until an empty page.
    pub fn is_last(&self, items_on_page: usize) -> bool {
        items_on_page == 0
            || (self.total_pages > 0 && self.number.saturating_add(1) >= self.total_pages)
    }
}

/// A page of items after the `_embedded` envelope is unwrapped.
#[derive(Debug, Clone)]
pub struct ListPage<T> {
    pub items: Vec<T>,
    pub page: PageInfo,
}

macro_rules! listing {
    ($listing:ident, $embedded:ident, $field:ident, $item:ty) => {
        #[derive(Debug, Deserialize)]
        pub struct $listing {
            #[serde(rename = "_embedded", default)]
            pub embedded: $embedded,
            #[serde(default)]
            pub page: PageInfo,
        }

        #[derive(Debug, Default, Deserialize)]
        pub struct $embedded {
            #[serde(default)]
            pub $field: Vec<$item>,
        }
    };
}

listing!(BranchListing, BranchEmbedded, branches, ApiBranch);
listing!(StaffListing, StaffEmbedded, staffs, ApiStaff);
listing!(ReviewListing, ReviewEmbedded, reviews, ApiReview);
listing!(ProductListing, ProductEmbedded, products, ApiProduct);

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiBranch {
    pub branch_id: String,
    pub name: String,
    pub time_zone: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub street_address1: String,
    pub street_address2: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
    pub currency_code: String,
    pub account_id: Option<i64>,
}

impl From<ApiBranch> for Branch {
    fn from(b: ApiBranch) -> Self {
        Branch {
            branch_id: b.branch_id,
            name: b.name,
            time_zone: b.time_zone,
            latitude: b.latitude,
            longitude: b.longitude,
            street_address_1: b.street_address1,
            street_address_2: b.street_address2,
            city: b.city,
            state: b.state,
            postal_code: b.postal_code,
            country: b.country,
            currency_code: b.currency_code,
            account_id: b.account_id,
            updated_at_upstream: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiStaff {
    pub staff_id: String,
    pub staff_category_id: String,
    pub staff_category_name: String,
    pub user_id: String,
    pub first_name: String,
    pub last_name: String,
    pub birth_date: Option<String>,
    pub start_date: Option<String>,
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
}

impl ApiStaff {
    /// Staff rows are keyed per branch; the payload does not carry one.
    pub fn into_staff(self, branch_id: &str) -> Staff {
        Staff {
            staff_id: self.staff_id,
            branch_id: branch_id.to_owned(),
            staff_category_id: self.staff_category_id,
            staff_category_name: self.staff_category_name,
            user_id: self.user_id,
            first_name: self.first_name,
            last_name: self.last_name,
            birth_date: self.birth_date.as_deref().and_then(parse_api_date),
            start_date: self.start_date.as_deref().and_then(parse_api_date),
            self_employed: self.self_employed,
            archived: self.archived,
            mobile: self.mobile,
            email: self.email,
            gender: self.gender,
            notes: self.notes,
            online_profile: self.online_profile,
            hide_from_online_bookings: self.hide_from_online_bookings,
            hide_from_appointment_screen: self.hide_from_appointment_screen,
            image_url: self.image_url,
            updated_at_upstream: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiReview {
    pub review_id: String,
    pub client_id: String,
    pub client_first_name: String,
    pub client_last_name: String,
    pub review_date: Option<String>,
    pub visit_date: Option<String>,
    pub staff_id: String,
    pub staff_first_name: String,
    pub staff_last_name: String,
    pub text: String,
    pub rating: i32,
    pub facebook_review: bool,
    pub twitter_review: bool,
}

impl ApiReview {
    pub fn into_review(self, branch_id: &str) -> Review {
        Review {
            review_id: self.review_id,
            branch_id: branch_id.to_owned(),
            client_id: self.client_id,
            client_first_name: self.client_first_name,
            client_last_name: self.client_last_name,
            review_date: self.review_date.as_deref().and_then(parse_api_date),
            visit_date: self.visit_date.as_deref().and_then(parse_api_date),
            staff_id: self.staff_id,
            staff_first_name: self.staff_first_name,
            staff_last_name: self.staff_last_name,
            text: self.text,
            rating: self.rating,
            facebook_review: self.facebook_review,
            twitter_review: self.twitter_review,
        }
    }
}

/// Product as listed per branch: master data and that branch's stock in
/// one object.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiProduct {
    pub product_id: String,
    pub parent_product_id: Option<String>,
    pub name: String,
    pub brand_id: Option<String>,
    pub brand_name: Option<String>,
    pub category_id: Option<String>,
    pub category_name: Option<String>,
    pub archived: bool,
    pub price: Option<f64>,
    pub min_quantity: Option<f64>,
    pub max_quantity: Option<f64>,
    #[serde(rename = "type")]
    pub product_type: Option<String>,
    pub barcode: Option<String>,
    pub measurement_quantity: Option<f64>,
    pub measurement_unit: Option<String>,
    pub reorder_count: Option<f64>,
    pub reorder_cost: Option<f64>,
    pub quantity_in_stock: Option<f64>,
    pub code: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl ApiProduct {
    pub fn into_snapshot(self, branch_id: &str) -> ProductSnapshot {
        let stock = ProductStock {
            product_id: self.product_id.clone(),
            branch_id: branch_id.to_owned(),
            price: self.price,
            min_quantity: self.min_quantity,
            max_quantity: self.max_quantity,
            quantity_in_stock: self.quantity_in_stock,
            reorder_count: self.reorder_count,
            reorder_cost: self.reorder_cost,
            archived: self.archived,
            created_at_upstream: self.created_at,
            updated_at_upstream: self.updated_at,
        };
        let product = Product {
            product_id: self.product_id,
            parent_id: non_blank(self.parent_product_id),
            name: self.name,
            brand_id: non_blank(self.brand_id),
            brand_name: non_blank(self.brand_name),
            category_id: non_blank(self.category_id),
            category_name: non_blank(self.category_name),
            code: non_blank(self.code),
            barcode: non_blank(self.barcode),
            type_raw: non_blank(self.product_type),
            measurement_qty: self.measurement_quantity,
            measurement_unit: non_blank(self.measurement_unit),
            archived: self.archived,
            created_at_upstream: self.created_at,
            updated_at_upstream: self.updated_at,
        };
        ProductSnapshot { product, stock }
    }
}

/// `YYYY-MM-DD`, tolerating a trailing time part.
pub fn parse_api_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    let day = raw.get(..10).unwrap_or(raw);
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_info_detects_last_page() {
        let page = PageInfo {
            size: 100,
            total_elements: 250,
            total_pages: 3,
            number: 1,
        };
        assert!(!page.is_last(100));
        assert!(PageInfo { number: 2, ..page }.is_last(50));
        assert!(page.is_last(0));
    }

    #[test]
    fn unknown_page_count_keeps_paging_until_empty() {
        assert!(!PageInfo::default().is_last(5));
        assert!(PageInfo::default().is_last(0));

        let bogus = PageInfo {
            number: u32::MAX,
            total_pages: 3,
            ..PageInfo::default()
        };
        assert!(bogus.is_last(1));
    }

    #[test]
    fn review_listing_decodes_embedded_payload() {
        let listing: ReviewListing = serde_json::from_value(serde_json::json!({
            "_embedded": { "reviews": [{
                "reviewId": "r1",
                "clientId": "c1",
                "reviewDate": "2024-05-03",
                "visitDate": "2024-05-01T10:00:00",
                "text": "great service",
                "rating": 5,
                "facebookReview": true
            }]},
            "page": { "size": 100, "totalElements": 1, "totalPages": 1, "number": 0 }
        }))
        .unwrap();

        let review = listing.embedded.reviews[0].clone().into_review("br-1");
        assert_eq!(review.branch_id, "br-1");
        assert_eq!(review.review_date, NaiveDate::from_ymd_opt(2024, 5, 3));
        assert_eq!(review.visit_date, NaiveDate::from_ymd_opt(2024, 5, 1));
        assert!(review.facebook_review);
        assert!(!review.twitter_review);
    }

    #[test]
    fn product_splits_into_master_and_stock() {
        let api: ApiProduct = serde_json::from_value(serde_json::json!({
            "productId": "p1",
            "parentProductId": "",
            "name": "Shampoo",
            "type": "RETAIL",
            "price": 12.5,
            "quantityInStock": 4,
            "updatedAt": "2025-01-02T03:04:05.678Z"
        }))
        .unwrap();

        let snap = api.into_snapshot("br-1");
        assert_eq!(snap.product.parent_id, None);
        assert_eq!(snap.product.type_raw.as_deref(), Some("RETAIL"));
        assert_eq!(snap.stock.branch_id, "br-1");
        assert_eq!(snap.stock.quantity_in_stock, Some(4.0));
        assert_eq!(
            snap.stock.updated_at_upstream,
            snap.product.updated_at_upstream
        );
    }

    #[test]
    fn staff_dates_tolerate_garbage() {
        let staff = ApiStaff {
            staff_id: "s1".into(),
            birth_date: Some("not a date".into()),
            start_date: Some("2020-02-01".into()),
            ..Default::default()
        }
        .into_staff("br-1");
        assert_eq!(staff.birth_date, None);
        assert_eq!(staff.start_date, NaiveDate::from_ymd_opt(2020, 2, 1));
        assert_eq!(staff.updated_at_upstream, None);
    }
}
