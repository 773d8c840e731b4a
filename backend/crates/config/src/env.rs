use datahub_common::error::{DatahubError, DatahubResult};
use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

const DEFAULT_BASE_URL: &str = "https://api-gateway-eu.phorest.com/third-party-api-server/api";

/// One salon branch the sync runs against.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BranchConfig {
    pub name: String,
    pub branch_id: String,
}

/// Per-invocation switches deciding which streams run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct StreamFlags {
    pub bootstrap: bool,
    pub branches: bool,
    pub staff: bool,
    pub clients: bool,
    pub transactions: bool,
    pub reviews: bool,
    pub products: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub phorest_username: String,
    pub phorest_password: String,
    pub phorest_business: String,
    pub phorest_base_url: String,
    pub phorest_timeout_secs: u64,
    pub phorest_max_retries: u32,
    pub branches: Vec<BranchConfig>,
    pub data_dir: PathBuf,
    pub export_dir: PathBuf,
    pub auto_migrate: bool,
    pub streams: StreamFlags,
    pub stream_deadline_secs: u64,
    pub export_max_wait_secs: u64,
    pub reviews_dup_ratio: f64,
    pub reviews_dup_pages: usize,
    pub product_type_filter: Option<String>,
    pub log_level: String,
}

impl AppConfig {
    /// Load configuration from environment variables.
    /// Loads `.env` file if present, then reads required vars.
    pub fn from_env() -> DatahubResult<Self> {
        // Best-effort .env load; ignore if missing
        let _ = dotenvy::dotenv();

        let reviews_dup_ratio: f64 = parse_var_or("REVIEWS_DUP_RATIO", 0.9)?;
        if !(0.0..=1.0).contains(&reviews_dup_ratio) {
            return Err(DatahubError::Config(format!(
                "REVIEWS_DUP_RATIO must be within 0..=1, got {reviews_dup_ratio}"
            )));
        }

        let reviews_dup_pages: usize = parse_var_or("REVIEWS_DUP_PAGES", 3)?;
        if reviews_dup_pages == 0 {
            return Err(DatahubError::Config(
                "REVIEWS_DUP_PAGES must be at least 1".to_owned(),
            ));
        }

        Ok(Self {
            database_url: get_var("DATABASE_URL")?,
            phorest_username: get_var("PHOREST_USERNAME")?,
            phorest_password: get_var("PHOREST_PASSWORD")?,
            phorest_business: get_var("PHOREST_BUSINESS")?,
            phorest_base_url: get_var_or("PHOREST_BASE_URL", DEFAULT_BASE_URL)
                .trim_end_matches('/')
                .to_owned(),
            phorest_timeout_secs: parse_var_or("PHOREST_TIMEOUT_SECS", 30)?,
            phorest_max_retries: parse_var_or("PHOREST_MAX_RETRIES", 3)?,
            branches: parse_branches(&get_var("PHOREST_BRANCHES")?)?,
            data_dir: PathBuf::from(get_var_or("DATA_DIR", "data")),
            export_dir: PathBuf::from(get_var_or("EXPORT_DIR", "exports")),
            auto_migrate: get_flag("AUTO_MIGRATE", false),
            streams: StreamFlags {
                bootstrap: get_flag("RUN_BOOTSTRAP", true),
                branches: get_flag("RUN_BRANCHES_SYNC", true),
                staff: get_flag("RUN_STAFF_SYNC", true),
                clients: get_flag("RUN_CLIENTS_INCREMENTAL", false),
                transactions: get_flag("RUN_TRANSACTIONS_INCREMENTAL", false),
                reviews: get_flag("RUN_REVIEWS_INCREMENTAL", false),
                products: get_flag("RUN_PRODUCTS_SYNC", false),
            },
            stream_deadline_secs: parse_var_or("STREAM_DEADLINE_SECS", 600)?,
            export_max_wait_secs: parse_var_or("EXPORT_MAX_WAIT_SECS", 300)?,
            reviews_dup_ratio,
            reviews_dup_pages,
            product_type_filter: env::var("PRODUCT_TYPE_FILTER")
                .ok()
                .map(|v| v.trim().to_owned())
                .filter(|v| !v.is_empty()),
            log_level: get_var_or("LOG_LEVEL", "info"),
        })
    }
}

/// Parse `Name:branchId,Name:branchId`. A bare entry without a colon is
/// taken as the id and doubles as the name.
pub fn parse_branches(raw: &str) -> DatahubResult<Vec<BranchConfig>> {
    let mut branches = Vec::new();

    for entry in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let (name, branch_id) = match entry.split_once(':') {
            Some((name, id)) => (name.trim(), id.trim()),
            None => (entry, entry),
        };
        if branch_id.is_empty() {
            return Err(DatahubError::Config(format!(
                "PHOREST_BRANCHES entry {entry:?} has an empty branch id"
            )));
        }
        let name = if name.is_empty() { branch_id } else { name };
        branches.push(BranchConfig {
            name: name.to_owned(),
            branch_id: branch_id.to_owned(),
        });
    }

    if branches.is_empty() {
        return Err(DatahubError::Config(
            "PHOREST_BRANCHES is set but contains no branches".to_owned(),
        ));
    }

    Ok(branches)
}

fn get_var(key: &str) -> DatahubResult<String> {
    match env::var(key) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(DatahubError::Config(format!("{key} is required but not set"))),
    }
}

fn get_var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_owned())
}

fn parse_var_or<T>(key: &str, default: T) -> DatahubResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|e| DatahubError::Config(format!("invalid {key}: {e}"))),
        _ => Ok(default),
    }
}

fn get_flag(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(raw) => matches!(
            raw.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        ),
        Err(_) => default,
    }
}
