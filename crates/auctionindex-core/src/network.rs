//! Network registry: the static chain list plus environment-derived parameters.
//!
//! Every built-in network reads its runtime settings from variables prefixed
//! with its upper-cased key (`-` becomes `_`):
//!
//! | Variable | Meaning |
//! |---|---|
//! | `<KEY>_RPC_URL` | JSON-RPC endpoint (required) |
//! | `<KEY>_AUCTION_ADDRESS` | auction contract address (required) |
//! | `<KEY>_START_BLOCK` | first block to index when no checkpoint exists |
//! | `<KEY>_CONFIRMATIONS` | override of the built-in confirmation depth |
//! | `<KEY>_LOG_BATCH_SIZE` | max block span of one `eth_getLogs` call |
//!
//! A network with missing or invalid settings is still returned, carrying its
//! problems in [`Network::issues`], so one half-configured chain never stops
//! the others from being indexed.

use serde::{Deserialize, Serialize};

use crate::error::IndexerError;

/// Default block span of one `eth_getLogs` request.
pub const DEFAULT_LOG_BATCH_SIZE: u64 = 2_000;

/// A compiled-in network definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkDefinition {
    /// Human label, also the environment prefix (e.g. `"base-sepolia"`).
    pub key: &'static str,
    /// EIP-155 chain id.
    pub chain_id: u64,
    /// Blocks to stay behind the tip.
    pub confirmations: u64,
    /// Start block used when neither a checkpoint nor an override exists.
    pub start_block: u64,
}

/// Networks the indexer knows about.
pub const BUILTIN_NETWORKS: &[NetworkDefinition] = &[
    NetworkDefinition { key: "ethereum", chain_id: 1, confirmations: 12, start_block: 0 },
    NetworkDefinition { key: "sepolia", chain_id: 11_155_111, confirmations: 3, start_block: 0 },
    NetworkDefinition { key: "base", chain_id: 8453, confirmations: 10, start_block: 0 },
    NetworkDefinition { key: "base-sepolia", chain_id: 84_532, confirmations: 3, start_block: 0 },
    NetworkDefinition { key: "arbitrum", chain_id: 42_161, confirmations: 20, start_block: 0 },
    NetworkDefinition { key: "optimism", chain_id: 10, confirmations: 10, start_block: 0 },
    NetworkDefinition { key: "polygon", chain_id: 137, confirmations: 64, start_block: 0 },
];

/// Which networks a run should index.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum NetworkSelection {
    /// Every built-in network.
    #[default]
    All,
    /// Only the listed keys (lowercase).
    Keys(Vec<String>),
}

impl NetworkSelection {
    /// Parse a comma-separated selection such as `"base, Arbitrum"`.
    ///
    /// Unset, blank, or `"all"` selects every network.
    pub fn parse(raw: Option<&str>) -> Self {
        let Some(raw) = raw else {
            return Self::All;
        };
        let keys: Vec<String> = raw
            .split(',')
            .map(|k| k.trim().to_ascii_lowercase())
            .filter(|k| !k.is_empty())
            .collect();
        if keys.is_empty() || keys.iter().any(|k| k == "all") {
            Self::All
        } else {
            Self::Keys(keys)
        }
    }

    fn includes(&self, key: &str) -> bool {
        match self {
            Self::All => true,
            Self::Keys(keys) => keys.iter().any(|k| k == key),
        }
    }
}

/// A network with its runtime parameters resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Network {
    pub key: String,
    pub chain_id: u64,
    pub rpc_url: Option<String>,
    /// Lowercase `0x…` contract address.
    pub contract_address: Option<String>,
    pub start_block: u64,
    pub confirmations: u64,
    pub batch_size: u64,
    /// Configuration problems; non-empty means the network must be skipped.
    pub issues: Vec<String>,
}

impl Network {
    /// Returns `true` if the network can be indexed.
    pub fn is_configured(&self) -> bool {
        self.issues.is_empty() && self.rpc_url.is_some() && self.contract_address.is_some()
    }

    /// Return `(rpc_url, contract_address)` or a `Config` error naming every problem.
    pub fn endpoint(&self) -> Result<(&str, &str), IndexerError> {
        match (&self.rpc_url, &self.contract_address) {
            (Some(url), Some(addr)) if self.issues.is_empty() => Ok((url, addr)),
            _ => Err(IndexerError::Config(format!(
                "network '{}' is not configured: {}",
                self.key,
                self.issues.join("; ")
            ))),
        }
    }
}

/// Environment variable prefix for a network key.
pub fn env_prefix(key: &str) -> String {
    key.to_ascii_uppercase().replace('-', "_")
}

/// Resolve `base` against `selection`, reading settings through `env`.
///
/// Keys in `selection` that match no definition are logged and ignored.
pub fn resolve<F>(base: &[NetworkDefinition], selection: &NetworkSelection, env: F) -> Vec<Network>
where
    F: Fn(&str) -> Option<String>,
{
    if let NetworkSelection::Keys(keys) = selection {
        for key in keys {
            if !base.iter().any(|d| d.key == key) {
                tracing::warn!(network = %key, "unknown network in selection, ignoring");
            }
        }
    }

    base.iter()
        .filter(|def| selection.includes(def.key))
        .map(|def| resolve_one(def, &env))
        .collect()
}

fn resolve_one<F>(def: &NetworkDefinition, env: &F) -> Network
where
    F: Fn(&str) -> Option<String>,
{
    let prefix = env_prefix(def.key);
    let mut issues = Vec::new();

    let lookup = |suffix: &str| {
        env(&format!("{prefix}_{suffix}"))
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    let rpc_url = lookup("RPC_URL");
    if rpc_url.is_none() {
        issues.push(format!("{prefix}_RPC_URL is not set"));
    }

    let contract_address = lookup("AUCTION_ADDRESS").map(|a| a.to_ascii_lowercase());
    if contract_address.is_none() {
        issues.push(format!("{prefix}_AUCTION_ADDRESS is not set"));
    }

    let mut number = |suffix: &str, default: u64| match lookup(suffix) {
        None => default,
        Some(raw) => raw.parse::<u64>().unwrap_or_else(|_| {
            issues.push(format!("{prefix}_{suffix} is not a block number: '{raw}'"));
            default
        }),
    };

    let start_block = number("START_BLOCK", def.start_block);
    let confirmations = number("CONFIRMATIONS", def.confirmations);
    let batch_size = number("LOG_BATCH_SIZE", DEFAULT_LOG_BATCH_SIZE).max(1);

    Network {
        key: def.key.to_string(),
        chain_id: def.chain_id,
        rpc_url,
        contract_address,
        start_block,
        confirmations,
        batch_size,
        issues,
    }
}
