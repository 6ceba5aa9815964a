//! `EventDecoder`: turns raw auction-contract logs into [`DecodedEvent`]s.
//!
//! A log is matched by topic0, its indexed uint256 parameters are read from
//! the remaining topics, and the data payload is ABI-decoded as a tuple of
//! the event's non-indexed parameters. A failure only ever affects the one
//! log being decoded.

use std::collections::HashMap;

use alloy_core::dyn_abi::{DynSolType, DynSolValue};
use alloy_primitives::{B256, U256};
use thiserror::Error;

use auctionindex_core::error::IndexerError;

use crate::events::{
    AuctionCancelled, AuctionCreated, AuctionEvent, AuctionTerms, CommunityAuctionCancelled,
    CommunityAuctionCreated, DecodedEvent, EventKind, Finalized, LiquidityAdded, MakerJoined,
};
use crate::fetcher::RawLog;

/// Why a single log could not be decoded.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("log has no topics")]
    NoTopics,

    #[error("unknown event signature {topic0}")]
    UnknownSignature { topic0: String },

    #[error("{event}: expected {expected} topics, got {actual}")]
    TopicCount {
        event: EventKind,
        expected: usize,
        actual: usize,
    },

    #[error("invalid hex in {field}: {reason}")]
    InvalidHex { field: String, reason: String },

    #[error("{event}: ABI decode failed: {reason}")]
    AbiDecodeFailed { event: EventKind, reason: String },

    #[error("{event}: field {field} has unexpected type")]
    FieldType { event: EventKind, field: &'static str },

    #[error("{event}: field {field} out of range")]
    OutOfRange { event: EventKind, field: &'static str },

    #[error("log is missing {0}")]
    MissingMetadata(&'static str),
}

impl From<DecodeError> for IndexerError {
    fn from(e: DecodeError) -> Self {
        IndexerError::Decode(e.to_string())
    }
}

/// Decoder for the auction contract's events.
#[derive(Debug, Clone)]
pub struct EventDecoder {
    by_topic0: HashMap<String, EventKind>,
}

impl Default for EventDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl EventDecoder {
    pub fn new() -> Self {
        let by_topic0 = EventKind::ALL.iter().map(|k| (k.topic0(), *k)).collect();
        Self { by_topic0 }
    }

    /// The topic0 values of every known event, for `eth_getLogs` filtering.
    pub fn topic0_filter(&self) -> Vec<String> {
        EventKind::ALL.iter().map(|k| k.topic0()).collect()
    }

    /// Identify the event kind of a log by its topic0.
    pub fn kind_of(&self, log: &RawLog) -> Result<EventKind, DecodeError> {
        let topic0 = log.topics.first().ok_or(DecodeError::NoTopics)?;
        self.by_topic0
            .get(&topic0.to_ascii_lowercase())
            .copied()
            .ok_or_else(|| DecodeError::UnknownSignature { topic0: topic0.clone() })
    }

    /// Decode one log.
    pub fn decode(&self, log: &RawLog) -> Result<DecodedEvent, DecodeError> {
        let kind = self.kind_of(log)?;

        let expected = 1 + kind.indexed_params();
        if log.topics.len() != expected {
            return Err(DecodeError::TopicCount {
                event: kind,
                expected,
                actual: log.topics.len(),
            });
        }

        let block_number = log
            .block_number_u64()
            .ok_or(DecodeError::MissingMetadata("blockNumber"))?;
        let log_index = log
            .log_index_u64()
            .ok_or(DecodeError::MissingMetadata("logIndex"))?;
        let tx_hash = log
            .tx_hash
            .as_ref()
            .map(|h| h.to_ascii_lowercase())
            .ok_or(DecodeError::MissingMetadata("transactionHash"))?;

        let indexed = log.topics[1..]
            .iter()
            .map(String::as_str)
            .map(topic_uint)
            .collect::<Result<Vec<_>, _>>()?;
        let data = decode_data(kind, &log.data)?;
        let fields = Fields { kind, indexed, data };

        let event = match kind {
            EventKind::AuctionCreated => AuctionEvent::AuctionCreated(AuctionCreated {
                auction_id: fields.topic(0),
                maker_position_id: fields.topic(1),
                terms: fields.terms()?,
            }),
            EventKind::CommunityAuctionCreated => {
                AuctionEvent::CommunityAuctionCreated(CommunityAuctionCreated {
                    auction_id: fields.topic(0),
                    creator_position_id: fields.topic(1),
                    terms: fields.terms()?,
                })
            }
            EventKind::AuctionLiquidityAdded => AuctionEvent::AuctionLiquidityAdded(LiquidityAdded {
                auction_id: fields.topic(0),
                maker_position_id: fields.topic(1),
                reserve_a: fields.uint(0, "reserveA")?,
                reserve_b: fields.uint(1, "reserveB")?,
            }),
            EventKind::MakerJoined => AuctionEvent::MakerJoined(MakerJoined {
                auction_id: fields.topic(0),
                participant_position_id: fields.topic(1),
                amount_a: fields.uint(0, "amountA")?,
                amount_b: fields.uint(1, "amountB")?,
            }),
            EventKind::AuctionFinalized => AuctionEvent::AuctionFinalized(fields.finalized()?),
            EventKind::CommunityAuctionFinalized => {
                AuctionEvent::CommunityAuctionFinalized(fields.finalized()?)
            }
            EventKind::AuctionCancelled => AuctionEvent::AuctionCancelled(AuctionCancelled {
                auction_id: fields.topic(0),
                maker_position_id: fields.topic(1),
            }),
            EventKind::CommunityAuctionCancelled => {
                AuctionEvent::CommunityAuctionCancelled(CommunityAuctionCancelled {
                    auction_id: fields.topic(0),
                    creator_position_id: fields.topic(1),
                })
            }
        };

        Ok(DecodedEvent {
            event,
            block_number,
            log_index,
            tx_hash,
        })
    }
}

/// Decode one indexed uint256 topic (32 bytes, big-endian).
fn topic_uint(topic: &str) -> Result<U256, DecodeError> {
    let word: B256 = topic.parse().map_err(|e| DecodeError::InvalidHex {
        field: "topic".into(),
        reason: format!("{e}"),
    })?;
    Ok(U256::from_be_bytes(word.0))
}

/// Decode the non-indexed parameters of `kind` from the hex data payload.
fn decode_data(kind: EventKind, data_hex: &str) -> Result<Vec<DynSolValue>, DecodeError> {
    let types = kind.data_types();
    if types.is_empty() {
        return Ok(vec![]);
    }

    let hex_str = data_hex.strip_prefix("0x").unwrap_or(data_hex);
    let raw = hex::decode(hex_str).map_err(|e| DecodeError::InvalidHex {
        field: "data".into(),
        reason: e.to_string(),
    })?;

    let decoded = DynSolType::Tuple(types)
        .abi_decode(&raw)
        .map_err(|e| DecodeError::AbiDecodeFailed {
            event: kind,
            reason: e.to_string(),
        })?;

    match decoded {
        DynSolValue::Tuple(vals) => Ok(vals),
        other => Ok(vec![other]),
    }
}

/// Positional access to a log's decoded parameters.
struct Fields {
    kind: EventKind,
    indexed: Vec<U256>,
    data: Vec<DynSolValue>,
}

impl Fields {
    /// Indexed uint256 at `i` as a decimal string. Topic count was checked.
    fn topic(&self, i: usize) -> String {
        self.indexed[i].to_string()
    }

    fn value(&self, i: usize, field: &'static str) -> Result<&DynSolValue, DecodeError> {
        self.data.get(i).ok_or(DecodeError::FieldType {
            event: self.kind,
            field,
        })
    }

    fn raw_uint(&self, i: usize, field: &'static str) -> Result<U256, DecodeError> {
        match self.value(i, field)? {
            DynSolValue::Uint(u, _) => Ok(*u),
            _ => Err(DecodeError::FieldType { event: self.kind, field }),
        }
    }

    /// uint256 as a decimal string, never narrowed.
    fn uint(&self, i: usize, field: &'static str) -> Result<String, DecodeError> {
        Ok(self.raw_uint(i, field)?.to_string())
    }

    fn u64(&self, i: usize, field: &'static str) -> Result<u64, DecodeError> {
        u64::try_from(self.raw_uint(i, field)?)
            .map_err(|_| DecodeError::OutOfRange { event: self.kind, field })
    }

    /// Lowercase `0x` hex of an address.
    fn address(&self, i: usize, field: &'static str) -> Result<String, DecodeError> {
        match self.value(i, field)? {
            DynSolValue::Address(a) => Ok(format!("0x{}", hex::encode(a.as_slice()))),
            _ => Err(DecodeError::FieldType { event: self.kind, field }),
        }
    }

    /// Lowercase `0x` hex of a bytes32.
    fn bytes32(&self, i: usize, field: &'static str) -> Result<String, DecodeError> {
        match self.value(i, field)? {
            DynSolValue::FixedBytes(word, 32) => Ok(format!("0x{}", hex::encode(word.as_slice()))),
            _ => Err(DecodeError::FieldType { event: self.kind, field }),
        }
    }

    fn terms(&self) -> Result<AuctionTerms, DecodeError> {
        let out_of_range = |field| DecodeError::OutOfRange { event: self.kind, field };
        Ok(AuctionTerms {
            pool_id_a: self.bytes32(0, "poolIdA")?,
            pool_id_b: self.bytes32(1, "poolIdB")?,
            token_a: self.address(2, "tokenA")?,
            token_b: self.address(3, "tokenB")?,
            reserve_a: self.uint(4, "reserveA")?,
            reserve_b: self.uint(5, "reserveB")?,
            start_time: self.u64(6, "startTime")?,
            end_time: self.u64(7, "endTime")?,
            fee_bps: u16::try_from(self.u64(8, "feeBps")?).map_err(|_| out_of_range("feeBps"))?,
            fee_asset: u8::try_from(self.u64(9, "feeAsset")?)
                .map_err(|_| out_of_range("feeAsset"))?,
        })
    }

    fn finalized(&self) -> Result<Finalized, DecodeError> {
        Ok(Finalized {
            auction_id: self.topic(0),
            reserve_a: self.uint(0, "reserveA")?,
            reserve_b: self.uint(1, "reserveB")?,
        })
    }
}
