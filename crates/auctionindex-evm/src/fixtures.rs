//! Test fixtures: a scripted RPC node and builders for auction logs.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use alloy_core::dyn_abi::DynSolValue;
use alloy_primitives::{Address, FixedBytes, U256};
use async_trait::async_trait;

use auctionindex_core::error::IndexerError;

use crate::events::EventKind;
use crate::fetcher::{LogFilter, RawLog};
use crate::rpc::EvmRpcClient;

pub const CONTRACT: &str = "0x00000000000000000000000000000000000a0c71";
pub const TOKEN_A: &str = "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48";
pub const TOKEN_B: &str = "0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2";

/// In-memory node serving a fixed set of logs.
pub struct MockClient {
    head: AtomicU64,
    logs: Vec<RawLog>,
    fail_logs: AtomicBool,
    ranges: Mutex<Vec<(u64, u64)>>,
}

impl MockClient {
    pub fn new(head: u64, logs: Vec<RawLog>) -> Self {
        Self {
            head: AtomicU64::new(head),
            logs,
            fail_logs: AtomicBool::new(false),
            ranges: Mutex::new(vec![]),
        }
    }

    /// Make every subsequent `eth_getLogs` fail.
    pub fn fail_logs(&self, fail: bool) {
        self.fail_logs.store(fail, Ordering::SeqCst);
    }

    pub fn set_head(&self, head: u64) {
        self.head.store(head, Ordering::SeqCst);
    }

    /// Every `(from, to)` passed to `eth_getLogs` so far.
    pub fn ranges(&self) -> Vec<(u64, u64)> {
        self.ranges.lock().unwrap().clone()
    }
}

#[async_trait]
impl EvmRpcClient for MockClient {
    async fn get_block_number(&self) -> Result<u64, IndexerError> {
        Ok(self.head.load(Ordering::SeqCst))
    }

    async fn get_logs(
        &self,
        from: u64,
        to: u64,
        _filter: &LogFilter,
    ) -> Result<Vec<RawLog>, IndexerError> {
        self.ranges.lock().unwrap().push((from, to));
        if self.fail_logs.load(Ordering::SeqCst) {
            return Err(IndexerError::Network("eth_getLogs: connection reset".into()));
        }
        Ok(self
            .logs
            .iter()
            .filter(|l| {
                l.block_number_u64()
                    .map_or(false, |b| b >= from && b <= to)
            })
            .cloned()
            .collect())
    }
}

// ─── Log builders ─────────────────────────────────────────────────────────────

pub fn uint(v: u64) -> DynSolValue {
    DynSolValue::Uint(U256::from(v), 256)
}

/// ABI-encode a static parameter list as log data.
pub fn encode(values: Vec<DynSolValue>) -> Vec<u8> {
    DynSolValue::Tuple(values).abi_encode()
}

pub fn topic_u64(v: u64) -> String {
    format!("0x{v:064x}")
}

/// A log with the given event's topic0 followed by `topics`.
pub fn raw_log(
    kind: EventKind,
    topics: Vec<String>,
    data: Vec<u8>,
    block: u64,
    log_index: u64,
) -> RawLog {
    let mut all = vec![kind.topic0()];
    all.extend(topics);
    RawLog {
        address: CONTRACT.into(),
        topics: all,
        data: format!("0x{}", hex::encode(data)),
        block_number: Some(format!("0x{block:x}")),
        block_hash: Some(format!("0x{block:064x}")),
        tx_hash: Some(format!("0x{:064x}", block * 1_000 + log_index)),
        log_index: Some(format!("0x{log_index:x}")),
        removed: Some(false),
    }
}

/// A log whose topic0 matches no auction event.
pub fn log_at(block: u64, log_index: u64) -> RawLog {
    let mut log = raw_log(EventKind::AuctionCancelled, vec![topic_u64(1)], vec![], block, log_index);
    log.topics[0] = format!("0x{}", "ee".repeat(32));
    log
}

fn address(s: &str) -> DynSolValue {
    // Fixture constants are well-formed.
    DynSolValue::Address(s.parse::<Address>().unwrap())
}

fn bytes32(fill: u8) -> DynSolValue {
    DynSolValue::FixedBytes(FixedBytes::from([fill; 32]), 32)
}

fn terms(kind: EventKind, auction_id: u64, block: u64) -> RawLog {
    let data = encode(vec![
        bytes32(0x0a),
        bytes32(0x0b),
        address(TOKEN_A),
        address(TOKEN_B),
        uint(1_000_000),
        uint(2_000_000),
        DynSolValue::Uint(U256::from(1_700_000_000u64), 64),
        DynSolValue::Uint(U256::from(1_700_086_400u64), 64),
        DynSolValue::Uint(U256::from(30u64), 16),
        DynSolValue::Uint(U256::from(1u64), 8),
    ]);
    raw_log(kind, vec![topic_u64(auction_id), topic_u64(11)], data, block, 0)
}

/// `AuctionCreated` with maker position 11.
pub fn auction_created_log(auction_id: u64, block: u64) -> RawLog {
    terms(EventKind::AuctionCreated, auction_id, block)
}

/// `CommunityAuctionCreated` with creator position 11.
pub fn community_created_log(auction_id: u64, block: u64) -> RawLog {
    terms(EventKind::CommunityAuctionCreated, auction_id, block)
}

pub fn liquidity_added_log(auction_id: u64, reserve_a: u64, reserve_b: u64, block: u64) -> RawLog {
    raw_log(
        EventKind::AuctionLiquidityAdded,
        vec![topic_u64(auction_id), topic_u64(11)],
        encode(vec![uint(reserve_a), uint(reserve_b)]),
        block,
        0,
    )
}

pub fn maker_joined_log(auction_id: u64, block: u64) -> RawLog {
    raw_log(
        EventKind::MakerJoined,
        vec![topic_u64(auction_id), topic_u64(12)],
        encode(vec![uint(500), uint(600)]),
        block,
        0,
    )
}

/// Finalization with reserves `(2^128, 42)`.
pub fn finalized_log(kind: EventKind, auction_id: u64, block: u64) -> RawLog {
    let wide = DynSolValue::Uint(U256::from(1u64) << 128, 256);
    raw_log(
        kind,
        vec![topic_u64(auction_id)],
        encode(vec![wide, uint(42)]),
        block,
        0,
    )
}

/// Cancellation naming position 11.
pub fn cancelled_log(kind: EventKind, auction_id: u64, block: u64) -> RawLog {
    raw_log(kind, vec![topic_u64(auction_id), topic_u64(11)], vec![], block, 0)
}
