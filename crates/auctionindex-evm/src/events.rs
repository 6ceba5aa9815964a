//! Auction contract events.
//!
//! Every event's topic0 is the keccak256 of its canonical signature, e.g.:
//!   keccak256("AuctionCancelled(uint256,uint256)")
//!
//! uint256 values are carried as decimal strings and addresses / bytes32 as
//! lowercase `0x` hex, so the serialized form of an [`AuctionEvent`] is safe
//! to store verbatim as JSON.

use alloy_core::dyn_abi::DynSolType;
use serde::{Deserialize, Serialize};
use tiny_keccak::{Hasher, Keccak};

// ─── EventKind ────────────────────────────────────────────────────────────────

/// The auction events the indexer understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    AuctionCreated,
    CommunityAuctionCreated,
    AuctionLiquidityAdded,
    MakerJoined,
    AuctionFinalized,
    CommunityAuctionFinalized,
    AuctionCancelled,
    CommunityAuctionCancelled,
}

const CREATED_SIGNATURE_ARGS: &str =
    "(uint256,uint256,bytes32,bytes32,address,address,uint256,uint256,uint64,uint64,uint16,uint8)";

impl EventKind {
    pub const ALL: [EventKind; 8] = [
        Self::AuctionCreated,
        Self::CommunityAuctionCreated,
        Self::AuctionLiquidityAdded,
        Self::MakerJoined,
        Self::AuctionFinalized,
        Self::CommunityAuctionFinalized,
        Self::AuctionCancelled,
        Self::CommunityAuctionCancelled,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::AuctionCreated => "AuctionCreated",
            Self::CommunityAuctionCreated => "CommunityAuctionCreated",
            Self::AuctionLiquidityAdded => "AuctionLiquidityAdded",
            Self::MakerJoined => "MakerJoined",
            Self::AuctionFinalized => "AuctionFinalized",
            Self::CommunityAuctionFinalized => "CommunityAuctionFinalized",
            Self::AuctionCancelled => "AuctionCancelled",
            Self::CommunityAuctionCancelled => "CommunityAuctionCancelled",
        }
    }

    /// Canonical ABI signature (types only).
    pub fn signature(&self) -> String {
        let args = match self {
            Self::AuctionCreated | Self::CommunityAuctionCreated => CREATED_SIGNATURE_ARGS,
            Self::AuctionLiquidityAdded | Self::MakerJoined => "(uint256,uint256,uint256,uint256)",
            Self::AuctionFinalized | Self::CommunityAuctionFinalized => "(uint256,uint256,uint256)",
            Self::AuctionCancelled | Self::CommunityAuctionCancelled => "(uint256,uint256)",
        };
        format!("{}{}", self.name(), args)
    }

    /// `0x`-prefixed keccak256 of the signature.
    pub fn topic0(&self) -> String {
        keccak256_signature(&self.signature())
    }

    /// Number of indexed parameters (topics after topic0).
    pub fn indexed_params(&self) -> usize {
        match self {
            Self::AuctionFinalized | Self::CommunityAuctionFinalized => 1,
            _ => 2,
        }
    }

    /// ABI types of the non-indexed parameters, in order.
    pub fn data_types(&self) -> Vec<DynSolType> {
        use DynSolType::{Address, FixedBytes, Uint};
        match self {
            Self::AuctionCreated | Self::CommunityAuctionCreated => vec![
                FixedBytes(32),
                FixedBytes(32),
                Address,
                Address,
                Uint(256),
                Uint(256),
                Uint(64),
                Uint(64),
                Uint(16),
                Uint(8),
            ],
            Self::AuctionLiquidityAdded
            | Self::MakerJoined
            | Self::AuctionFinalized
            | Self::CommunityAuctionFinalized => vec![Uint(256), Uint(256)],
            Self::AuctionCancelled | Self::CommunityAuctionCancelled => vec![],
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Compute the keccak256 hash of an event signature string.
pub fn keccak256_signature(signature: &str) -> String {
    let mut hasher = Keccak::v256();
    let mut output = [0u8; 32];
    hasher.update(signature.as_bytes());
    hasher.finalize(&mut output);
    format!("0x{}", hex::encode(output))
}

// ─── Event payloads ───────────────────────────────────────────────────────────

/// Terms shared by both creation events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuctionTerms {
    pub pool_id_a: String,
    pub pool_id_b: String,
    pub token_a: String,
    pub token_b: String,
    pub reserve_a: String,
    pub reserve_b: String,
    pub start_time: u64,
    pub end_time: u64,
    pub fee_bps: u16,
    pub fee_asset: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuctionCreated {
    pub auction_id: String,
    pub maker_position_id: String,
    #[serde(flatten)]
    pub terms: AuctionTerms,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommunityAuctionCreated {
    pub auction_id: String,
    pub creator_position_id: String,
    #[serde(flatten)]
    pub terms: AuctionTerms,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiquidityAdded {
    pub auction_id: String,
    pub maker_position_id: String,
    pub reserve_a: String,
    pub reserve_b: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MakerJoined {
    pub auction_id: String,
    pub participant_position_id: String,
    pub amount_a: String,
    pub amount_b: String,
}

/// Closing reserves reported by either finalization event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Finalized {
    pub auction_id: String,
    pub reserve_a: String,
    pub reserve_b: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuctionCancelled {
    pub auction_id: String,
    pub maker_position_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommunityAuctionCancelled {
    pub auction_id: String,
    pub creator_position_id: String,
}

// ─── AuctionEvent ─────────────────────────────────────────────────────────────

/// A decoded auction event.
///
/// Serializes as `{"event": "<Kind>", "args": {...}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "args")]
pub enum AuctionEvent {
    AuctionCreated(AuctionCreated),
    CommunityAuctionCreated(CommunityAuctionCreated),
    AuctionLiquidityAdded(LiquidityAdded),
    MakerJoined(MakerJoined),
    AuctionFinalized(Finalized),
    CommunityAuctionFinalized(Finalized),
    AuctionCancelled(AuctionCancelled),
    CommunityAuctionCancelled(CommunityAuctionCancelled),
}

impl AuctionEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::AuctionCreated(_) => EventKind::AuctionCreated,
            Self::CommunityAuctionCreated(_) => EventKind::CommunityAuctionCreated,
            Self::AuctionLiquidityAdded(_) => EventKind::AuctionLiquidityAdded,
            Self::MakerJoined(_) => EventKind::MakerJoined,
            Self::AuctionFinalized(_) => EventKind::AuctionFinalized,
            Self::CommunityAuctionFinalized(_) => EventKind::CommunityAuctionFinalized,
            Self::AuctionCancelled(_) => EventKind::AuctionCancelled,
            Self::CommunityAuctionCancelled(_) => EventKind::CommunityAuctionCancelled,
        }
    }

    pub fn auction_id(&self) -> &str {
        match self {
            Self::AuctionCreated(e) => &e.auction_id,
            Self::CommunityAuctionCreated(e) => &e.auction_id,
            Self::AuctionLiquidityAdded(e) => &e.auction_id,
            Self::MakerJoined(e) => &e.auction_id,
            Self::AuctionFinalized(e) | Self::CommunityAuctionFinalized(e) => &e.auction_id,
            Self::AuctionCancelled(e) => &e.auction_id,
            Self::CommunityAuctionCancelled(e) => &e.auction_id,
        }
    }

    pub fn maker_position_id(&self) -> Option<&str> {
        match self {
            Self::AuctionCreated(e) => Some(&e.maker_position_id),
            Self::AuctionLiquidityAdded(e) => Some(&e.maker_position_id),
            Self::AuctionCancelled(e) => Some(&e.maker_position_id),
            _ => None,
        }
    }

    pub fn creator_position_id(&self) -> Option<&str> {
        match self {
            Self::CommunityAuctionCreated(e) => Some(&e.creator_position_id),
            Self::CommunityAuctionCancelled(e) => Some(&e.creator_position_id),
            _ => None,
        }
    }

    pub fn participant_position_id(&self) -> Option<&str> {
        match self {
            Self::MakerJoined(e) => Some(&e.participant_position_id),
            _ => None,
        }
    }

    /// The position id this event names: maker, else creator, else participant.
    pub fn position_id(&self) -> Option<&str> {
        self.maker_position_id()
            .or_else(|| self.creator_position_id())
            .or_else(|| self.participant_position_id())
    }
}

/// An [`AuctionEvent`] with the coordinates of the log that carried it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodedEvent {
    pub event: AuctionEvent,
    pub block_number: u64,
    pub log_index: u64,
    pub tx_hash: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn erc20_transfer_fingerprint() {
        // Well-known hash; guards the keccak wiring.
        assert_eq!(
            keccak256_signature("Transfer(address,address,uint256)"),
            "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef"
        );
    }

    #[test]
    fn topic0_values_are_distinct() {
        let mut topics: Vec<String> = EventKind::ALL.iter().map(|k| k.topic0()).collect();
        topics.sort();
        topics.dedup();
        assert_eq!(topics.len(), EventKind::ALL.len());
    }

    #[test]
    fn signature_layout() {
        assert_eq!(
            EventKind::AuctionCancelled.signature(),
            "AuctionCancelled(uint256,uint256)"
        );
        for kind in EventKind::ALL {
            let params = kind.signature().matches(',').count() + 1;
            assert_eq!(params, kind.indexed_params() + kind.data_types().len(), "{kind}");
        }
    }

    #[test]
    fn position_id_priority() {
        let joined = AuctionEvent::MakerJoined(MakerJoined {
            auction_id: "1".into(),
            participant_position_id: "9".into(),
            amount_a: "0".into(),
            amount_b: "0".into(),
        });
        assert_eq!(joined.position_id(), Some("9"));

        let cancelled = AuctionEvent::CommunityAuctionCancelled(CommunityAuctionCancelled {
            auction_id: "1".into(),
            creator_position_id: "4".into(),
        });
        assert_eq!(cancelled.position_id(), Some("4"));
        assert_eq!(cancelled.maker_position_id(), None);
    }

    #[test]
    fn serializes_tagged_with_camel_case_args() {
        let ev = AuctionEvent::AuctionFinalized(Finalized {
            auction_id: "7".into(),
            reserve_a: "340282366920938463463374607431768211456".into(),
            reserve_b: "0".into(),
        });
        let v = serde_json::to_value(&ev).unwrap();
        assert_eq!(v["event"], "AuctionFinalized");
        assert_eq!(v["args"]["auctionId"], "7");
        assert_eq!(v["args"]["reserveA"], "340282366920938463463374607431768211456");
    }
}
