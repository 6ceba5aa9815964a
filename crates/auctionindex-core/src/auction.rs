//! Auction entities and the field-level merge rule.
//!
//! Different event kinds carry different subsets of an auction's fields, so a
//! row is never overwritten wholesale. An [`AuctionPatch`] holds only what one
//! event knows; applying it overwrites the fields it carries, keeps the rest,
//! and always replaces the type and status pair.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::IndexerError;

// ─── AuctionKind ──────────────────────────────────────────────────────────────

/// Lifecycle type of an auction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuctionKind {
    /// Created by a single maker.
    Solo,
    /// Created by a community creator, open to other makers.
    Community,
}

impl AuctionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Solo => "solo",
            Self::Community => "community",
        }
    }
}

impl std::fmt::Display for AuctionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AuctionKind {
    type Err = IndexerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "solo" => Ok(Self::Solo),
            "community" => Ok(Self::Community),
            other => Err(IndexerError::Persistence(format!(
                "unknown auction type '{other}'"
            ))),
        }
    }
}

// ─── AuctionStatus ────────────────────────────────────────────────────────────

/// Status every event assigns to its auction.
///
/// Stored as the `active` / `finalized` column pair; modelling it as one enum
/// keeps the two flags mutually exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuctionStatus {
    /// Accepting liquidity.
    Active,
    /// Finalized or cancelled.
    Closed,
}

impl AuctionStatus {
    pub fn active(&self) -> bool {
        matches!(self, Self::Active)
    }

    pub fn finalized(&self) -> bool {
        matches!(self, Self::Closed)
    }
}

// ─── AuctionPatch ─────────────────────────────────────────────────────────────

/// A partial auction row derived from a single decoded event.
///
/// `None` fields are unknown to the event and leave stored values untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuctionPatch {
    pub chain_id: u64,
    /// Auction id as a decimal string (uint256 on-chain).
    pub auction_id: String,
    pub kind: AuctionKind,
    pub status: AuctionStatus,
    pub maker_position_id: Option<String>,
    pub pool_id_a: Option<String>,
    pub pool_id_b: Option<String>,
    pub token_a: Option<String>,
    pub token_b: Option<String>,
    pub reserve_a: Option<String>,
    pub reserve_b: Option<String>,
    pub start_time: Option<u64>,
    pub end_time: Option<u64>,
    pub fee_bps: Option<u16>,
    pub fee_asset: Option<u8>,
    /// The triggering event, verbatim.
    pub raw_event: serde_json::Value,
    pub block_number: u64,
    pub tx_hash: String,
}

impl AuctionPatch {
    /// A patch carrying only identity, type, status and provenance.
    pub fn new(
        chain_id: u64,
        auction_id: impl Into<String>,
        kind: AuctionKind,
        status: AuctionStatus,
        raw_event: serde_json::Value,
        block_number: u64,
        tx_hash: impl Into<String>,
    ) -> Self {
        Self {
            chain_id,
            auction_id: auction_id.into(),
            kind,
            status,
            maker_position_id: None,
            pool_id_a: None,
            pool_id_b: None,
            token_a: None,
            token_b: None,
            reserve_a: None,
            reserve_b: None,
            start_time: None,
            end_time: None,
            fee_bps: None,
            fee_asset: None,
            raw_event,
            block_number,
            tx_hash: tx_hash.into(),
        }
    }
}

// ─── AuctionRecord ────────────────────────────────────────────────────────────

/// The materialized auction row, unique per `(chain_id, auction_id)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuctionRecord {
    pub chain_id: u64,
    pub auction_id: String,
    #[serde(rename = "type")]
    pub kind: AuctionKind,
    pub maker_position_id: Option<String>,
    pub pool_id_a: Option<String>,
    pub pool_id_b: Option<String>,
    pub token_a: Option<String>,
    pub token_b: Option<String>,
    pub reserve_a: Option<String>,
    pub reserve_b: Option<String>,
    pub start_time: Option<u64>,
    pub end_time: Option<u64>,
    pub fee_bps: Option<u16>,
    pub fee_asset: Option<u8>,
    pub active: bool,
    pub finalized: bool,
    pub raw_event: serde_json::Value,
    pub block_number: u64,
    pub tx_hash: String,
    pub updated_at: DateTime<Utc>,
}

impl AuctionRecord {
    /// Build the first row for an auction from its first patch.
    pub fn from_patch(patch: AuctionPatch, now: DateTime<Utc>) -> Self {
        Self {
            chain_id: patch.chain_id,
            auction_id: patch.auction_id,
            kind: patch.kind,
            maker_position_id: patch.maker_position_id,
            pool_id_a: patch.pool_id_a,
            pool_id_b: patch.pool_id_b,
            token_a: patch.token_a,
            token_b: patch.token_b,
            reserve_a: patch.reserve_a,
            reserve_b: patch.reserve_b,
            start_time: patch.start_time,
            end_time: patch.end_time,
            fee_bps: patch.fee_bps,
            fee_asset: patch.fee_asset,
            active: patch.status.active(),
            finalized: patch.status.finalized(),
            raw_event: patch.raw_event,
            block_number: patch.block_number,
            tx_hash: patch.tx_hash,
            updated_at: now,
        }
    }

    /// Merge a later patch into this row.
    ///
    /// Present fields overwrite, absent fields are kept; type, status and
    /// provenance are always replaced.
    pub fn apply(&mut self, patch: AuctionPatch, now: DateTime<Utc>) {
        debug_assert_eq!(self.chain_id, patch.chain_id);
        debug_assert_eq!(self.auction_id, patch.auction_id);

        overwrite(&mut self.maker_position_id, patch.maker_position_id);
        overwrite(&mut self.pool_id_a, patch.pool_id_a);
        overwrite(&mut self.pool_id_b, patch.pool_id_b);
        overwrite(&mut self.token_a, patch.token_a);
        overwrite(&mut self.token_b, patch.token_b);
        overwrite(&mut self.reserve_a, patch.reserve_a);
        overwrite(&mut self.reserve_b, patch.reserve_b);
        overwrite(&mut self.start_time, patch.start_time);
        overwrite(&mut self.end_time, patch.end_time);
        overwrite(&mut self.fee_bps, patch.fee_bps);
        overwrite(&mut self.fee_asset, patch.fee_asset);

        self.kind = patch.kind;
        self.active = patch.status.active();
        self.finalized = patch.status.finalized();
        self.raw_event = patch.raw_event;
        self.block_number = patch.block_number;
        self.tx_hash = patch.tx_hash;
        self.updated_at = now;
    }
}

fn overwrite<T>(slot: &mut Option<T>, incoming: Option<T>) {
    if incoming.is_some() {
        *slot = incoming;
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
