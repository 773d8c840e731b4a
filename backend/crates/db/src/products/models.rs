use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// `source` value for history rows written by the sync.
pub const HISTORY_SOURCE_SYNC: &str = "sync";

/// Business-wide product master.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub product_id: String,
    pub parent_id: Option<String>,
    pub name: String,
    pub brand_id: Option<String>,
    pub brand_name: Option<String>,
    pub category_id: Option<String>,
    pub category_name: Option<String>,
    pub code: Option<String>,
    pub barcode: Option<String>,
    /// Raw upstream type list, e.g. `RETAIL, PROFESSIONAL`.
    pub type_raw: Option<String>,
    pub measurement_qty: Option<f64>,
    pub measurement_unit: Option<String>,
    pub archived: bool,
    pub created_at_upstream: Option<DateTime<Utc>>,
    pub updated_at_upstream: Option<DateTime<Utc>>,
}

/// Per-branch stock and pricing for one product.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductStock {
    pub product_id: String,
    pub branch_id: String,
    pub price: Option<f64>,
    pub min_quantity: Option<f64>,
    pub max_quantity: Option<f64>,
    pub quantity_in_stock: Option<f64>,
    pub reorder_count: Option<f64>,
    pub reorder_cost: Option<f64>,
    pub archived: bool,
    pub created_at_upstream: Option<DateTime<Utc>>,
    pub updated_at_upstream: Option<DateTime<Utc>>,
}

/// Point-in-time stock level, appended whenever quantity moves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductStockHistory {
    pub id: Uuid,
    pub product_id: String,
    pub branch_id: String,
    pub snapshot_time: DateTime<Utc>,
    pub quantity_in_stock: Option<f64>,
    pub price: Option<f64>,
    pub source: String,
}

impl ProductStockHistory {
    pub fn from_stock(stock: &ProductStock, snapshot_time: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            product_id: stock.product_id.clone(),
            branch_id: stock.branch_id.clone(),
            snapshot_time,
            quantity_in_stock: stock.quantity_in_stock,
            price: stock.price,
            source: HISTORY_SOURCE_SYNC.to_owned(),
        }
    }
}

/// One upstream product record split into its master and branch rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductSnapshot {
    pub product: Product,
    pub stock: ProductStock,
}

/// What applying one snapshot changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProductApplied {
    pub product_written: bool,
    pub stock_written: bool,
    pub history_written: bool,
}

/// A history row is due when there was no stock row before or the quantity
/// moved.
pub fn needs_history(previous: Option<&ProductStock>, incoming: &ProductStock) -> bool {
    match previous {
        None => true,
        Some(prev) => prev.quantity_in_stock != incoming.quantity_in_stock,
    }
}
