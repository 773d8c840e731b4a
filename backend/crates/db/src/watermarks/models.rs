use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Branch key for streams that are not partitioned by branch.
pub const ALL_BRANCHES: &str = "ALL";

/// Canonical branch key: blank becomes [`ALL_BRANCHES`].
pub fn normalize_branch(branch: &str) -> &str {
    let trimmed = branch.trim();
    if trimmed.is_empty() {
        ALL_BRANCHES
    } else {
        trimmed
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SyncStream {
    Clients,
    Transactions,
    Reviews,
    Staff,
    Branches,
    Products,
}

/// What a stream's stored timestamp means.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatermarkKind {
    /// Newest upstream modification time fully persisted locally.
    UpstreamChange,
    /// Wall-clock time of the last successful full refresh; the upstream
    /// exposes no change time for these records.
    LastAttempt,
}

impl SyncStream {
    pub const ALL: [SyncStream; 6] = [
        Self::Clients,
        Self::Transactions,
        Self::Reviews,
        Self::Staff,
        Self::Branches,
        Self::Products,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Clients => "clients",
            Self::Transactions => "transactions",
            Self::Reviews => "reviews",
            Self::Staff => "staff",
            Self::Branches => "branches",
            Self::Products => "products",
        }
    }

    pub fn watermark_kind(&self) -> WatermarkKind {
        match self {
            Self::Staff | Self::Branches => WatermarkKind::LastAttempt,
            Self::Clients | Self::Transactions | Self::Reviews | Self::Products => {
                WatermarkKind::UpstreamChange
            }
        }
    }
}

impl fmt::Display for SyncStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncStream {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "clients" => Ok(Self::Clients),
            "transactions" => Ok(Self::Transactions),
            "reviews" => Ok(Self::Reviews),
            "staff" => Ok(Self::Staff),
            "branches" => Ok(Self::Branches),
            "products" => Ok(Self::Products),
            _ => Err(format!("unknown sync stream: {value}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncWatermark {
    pub entity: SyncStream,
    pub branch_id: String,
    pub last_updated_upstream: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A pending forward move of one watermark, applied inside the same
/// transaction as the rows it covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatermarkAdvance {
    pub stream: SyncStream,
    pub branch: String,
    pub candidate: DateTime<Utc>,
}

impl WatermarkAdvance {
    pub fn new(stream: SyncStream, branch: &str, candidate: DateTime<Utc>) -> Self {
        Self {
            stream,
            branch: normalize_branch(branch).to_owned(),
            candidate,
        }
    }
}
