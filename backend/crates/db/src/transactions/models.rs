use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::merge::{dedup_newest, Mergeable};

/// Sale header. Holds only the columns constant across all lines of a sale.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub transaction_id: String,
    pub branch_id: String,
    pub branch_name: String,
    pub client_id: String,
    pub client_first_name: String,
    pub client_last_name: String,
    pub client_source: String,
    pub purchased_date: Option<NaiveDate>,
    pub purchase_time: Option<NaiveTime>,
    pub updated_at_upstream: Option<DateTime<Utc>>,
}

/// One line of a sale (service, product, package...). References its
/// header by `transaction_id`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionItem {
    pub transaction_item_id: String,
    pub transaction_id: String,
    pub branch_id: String,
    pub branch_name: String,
    pub client_id: String,
    pub client_first_name: String,
    pub client_last_name: String,
    pub client_source: String,
    pub purchased_date: Option<NaiveDate>,
    pub purchase_time: Option<NaiveTime>,
    pub item_type: String,
    pub description: String,
    pub quantity: f64,
    pub purchase_voucher_discount_percentage: f64,
    pub purchase_online_deposit: f64,
    pub purchase_online_discount_amount: f64,
    pub service_id: String,
    pub service_name: String,
    pub service_category_id: String,
    pub service_category_name: String,
    pub package_id: String,
    pub package_name: String,
    pub special_offer_id: String,
    pub special_offer_name: String,
    pub product_id: String,
    pub product_name: String,
    pub product_brand_id: String,
    pub product_brand_name: String,
    pub product_category_id: String,
    pub product_category_name: String,
    pub product_barcode: String,
    pub product_code: String,
    pub course_id: String,
    pub course_name: String,
    pub client_course_name: String,
    pub voucher_serial: String,
    pub service_reward_id: String,
    pub service_reward_name: String,
    pub product_reward_id: String,
    pub product_reward_name: String,
    pub unit_price: f64,
    pub original_price: f64,
    pub discount_type: f64,
    pub discount_value: f64,
    pub item_online_deposit: f64,
    pub item_online_discount: f64,
    pub loyalty_points_awarded: f64,
    pub tax_rate: f64,
    pub total_amount: f64,
    pub total_amount_pre_vouch_disc: f64,
    pub net_total_amount: f64,
    pub gross_total_amount: f64,
    pub net_price: f64,
    pub gross_price: f64,
    pub discount_amount: f64,
    pub tax_amount: f64,
    pub staff_tips: f64,
    pub product_cost_price: f64,
    pub service_cost: f64,
    pub service_cost_type: String,
    pub gross_total_with_discount: f64,
    pub gross_total_with_discount_minus_tax: f64,
    pub simple_discount_amount: f64,
    pub membership_benefit_used: i32,
    pub membership_discount_amount: f64,
    pub deal: f64,
    pub session_net_amount: f64,
    pub session_gross_amount: f64,
    pub phorest_tips: f64,
    pub payment_type: String,
    pub payment_type_ids: String,
    pub payment_type_amounts: String,
    pub payment_type_codes: String,
    pub payment_type_names: String,
    pub payment_type_voucher_serials: String,
    pub payment_type_prepaid_tax_amounts: String,
    pub outstanding_balance_pmt: i64,
    pub open_sale: bool,
    pub open_sale_type: String,
    pub purchase_type: String,
    pub online_booking: i64,
    pub voided: bool,
    pub voided_transaction_id: String,
    pub void_reason: String,
    pub department_id: String,
    pub department_name: String,
    pub staff_id: String,
    pub staff_first_name: String,
    pub staff_last_name: String,
    pub staff_category_id: String,
    pub staff_category_name: String,
    pub is_requested_staff: i32,
    pub primary_staff_id: String,
    pub preferred_staff_id: String,
    pub preferred_staff_name: String,
    pub appointment_id: String,
    pub appointment_date: Option<NaiveDate>,
    pub appointment_created: Option<DateTime<Utc>>,
    pub appointment_rating: i64,
    pub client_birthday: Option<NaiveDate>,
    pub client_gender: String,
    pub client_email: String,
    pub client_first_visit: Option<NaiveDate>,
    pub appt_client_id: String,
    pub appt_client_first_name: String,
    pub appt_client_last_name: String,
    pub appt_client_birthday: Option<NaiveDate>,
    pub appt_client_gender: String,
    pub appt_client_email: String,
    pub appt_client_first_visit: Option<NaiveDate>,
    pub internet_category_ids: String,
    pub internet_category_names: String,
    pub branch_product_id: String,
    pub fixed_discount_id: String,
    pub fixed_discount_name: String,
    pub client_course_id: String,
    pub creating_user: String,
    pub tax_rate_name: String,
    pub sale_fee_id: String,
    pub updated_at_upstream: Option<DateTime<Utc>>,
}

impl TransactionItem {
    /// Header view of this line.
    pub fn header(&self) -> Transaction {
        Transaction {
            transaction_id: self.transaction_id.clone(),
            branch_id: self.branch_id.clone(),
            branch_name: self.branch_name.clone(),
            client_id: self.client_id.clone(),
            client_first_name: self.client_first_name.clone(),
            client_last_name: self.client_last_name.clone(),
            client_source: self.client_source.clone(),
            purchased_date: self.purchased_date,
            purchase_time: self.purchase_time,
            updated_at_upstream: self.updated_at_upstream,
        }
    }
}

impl Mergeable for Transaction {
    type Key = String;

    fn natural_key(&self) -> String {
        self.transaction_id.clone()
    }

    fn updated_at_upstream(&self) -> Option<DateTime<Utc>> {
        self.updated_at_upstream
    }
}

impl Mergeable for TransactionItem {
    type Key = String;

    fn natural_key(&self) -> String {
        self.transaction_item_id.clone()
    }

    fn updated_at_upstream(&self) -> Option<DateTime<Utc>> {
        self.updated_at_upstream
    }
}

/// Headers plus lines parsed from one transactions export.
#[derive(Debug, Clone, Default)]
pub struct TransactionBatch {
    pub transactions: Vec<Transaction>,
    pub items: Vec<TransactionItem>,
}

impl TransactionBatch {
    /// Build a batch from raw lines: one header per `transaction_id`, taken
    /// from the newest line. Lines without an item id still contribute their
    /// header but are not stored as items.
    pub fn from_items(items: Vec<TransactionItem>) -> Self {
        let transactions = dedup_newest(items.iter().map(TransactionItem::header).collect());
        let items = dedup_newest(
            items
                .into_iter()
                .filter(|i| !i.transaction_item_id.is_empty())
                .collect(),
        );
        Self {
            transactions,
            items,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty() && self.items.is_empty()
    }

    /// Newest revision anywhere in the batch.
    pub fn max_updated_at(&self) -> Option<DateTime<Utc>> {
        crate::merge::max_updated_at(self.items.iter())
            .max(crate::merge::max_updated_at(self.transactions.iter()))
    }
}
