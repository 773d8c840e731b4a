pub mod branch_sync;
pub mod client;
pub mod client_sync;
pub mod export;
pub mod filters;
pub mod models;
pub mod product_sync;
pub mod review_sync;
pub mod staff_sync;
pub mod transaction_sync;
