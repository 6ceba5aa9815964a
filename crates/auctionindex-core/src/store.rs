//! The auction table: upsert and read-through queries.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::auction::{AuctionPatch, AuctionRecord};
use crate::error::IndexerError;

/// Largest page a read query may request.
pub const MAX_PAGE_LIMIT: u32 = 100;

/// Which rows a read query returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuctionScope {
    /// Only rows with `active = true`.
    #[default]
    Active,
    /// Every row.
    All,
}

impl std::str::FromStr for AuctionScope {
    type Err = IndexerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "active" => Ok(Self::Active),
            "all" => Ok(Self::All),
            other => Err(IndexerError::Config(format!(
                "scope must be 'active' or 'all', got '{other}'"
            ))),
        }
    }
}

/// A paginated, filtered read of the auction table.
///
/// Results are ordered by most recently updated first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuctionQuery {
    pub scope: AuctionScope,
    pub chain_id: Option<u64>,
    /// 1-based page number.
    pub page: u32,
    pub limit: u32,
}

impl Default for AuctionQuery {
    fn default() -> Self {
        Self {
            scope: AuctionScope::Active,
            chain_id: None,
            page: 1,
            limit: 20,
        }
    }
}

impl AuctionQuery {
    /// Page size clamped to `1..=MAX_PAGE_LIMIT`.
    pub fn effective_limit(&self) -> u32 {
        self.limit.clamp(1, MAX_PAGE_LIMIT)
    }

    /// Rows to skip before the requested page.
    pub fn offset(&self) -> u64 {
        u64::from(self.page.max(1) - 1) * u64::from(self.effective_limit())
    }

    /// Returns `true` if `row` passes the scope and chain filters.
    pub fn matches(&self, row: &AuctionRecord) -> bool {
        let scope_ok = match self.scope {
            AuctionScope::Active => row.active,
            AuctionScope::All => true,
        };
        scope_ok && self.chain_id.map_or(true, |c| c == row.chain_id)
    }
}

/// Storage for materialized auction rows.
///
/// `upsert` must be atomic per `(chain_id, auction_id)` and follow the merge
/// rule of [`AuctionRecord::apply`], which makes it idempotent.
#[async_trait]
pub trait AuctionStore: Send + Sync {
    /// Insert the row, or merge the patch into the existing one.
    async fn upsert(&self, patch: &AuctionPatch) -> Result<(), IndexerError>;

    /// Fetch one row by identity.
    async fn get(&self, chain_id: u64, auction_id: &str) -> Result<Option<AuctionRecord>, IndexerError>;

    /// Run a paginated read query.
    async fn list(&self, query: &AuctionQuery) -> Result<Vec<AuctionRecord>, IndexerError>;
}
