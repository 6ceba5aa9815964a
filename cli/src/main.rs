//! auctionindex — index auction contract events into Postgres.
//!
//! Usage:
//! ```bash
//! auctionindex                      # same as `run`
//! auctionindex run
//! auctionindex auctions --scope all --chain 8453 --page 2 --limit 50
//! ```

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use auctionindex_core::network::{resolve, Network, NetworkSelection, BUILTIN_NETWORKS};
use auctionindex_core::store::{AuctionQuery, AuctionScope, AuctionStore};
use auctionindex_evm::{HttpRpcClient, IndexLoop};
use auctionindex_storage::PostgresStorage;

mod telemetry;

#[derive(Parser)]
#[command(
    name = "auctionindex",
    about = "Index auction contract events from EVM chains into Postgres",
    long_about = "
AuctionIndex: catch up every configured network from its checkpoint to the
confirmed tip, merging auction events into one row per auction.

ENVIRONMENT VARIABLES:
  DATABASE_URL               Postgres connection string (required)
  INDEXER_NETWORKS           Comma-separated network keys (default: all)
  <NET>_RPC_URL              JSON-RPC endpoint, e.g. BASE_RPC_URL
  <NET>_AUCTION_ADDRESS      Auction contract address
  <NET>_START_BLOCK          First block to index when no checkpoint exists
  <NET>_CONFIRMATIONS        Override the network's confirmation depth
  <NET>_LOG_BATCH_SIZE       Max blocks per eth_getLogs call
  INDEXER_LOG / RUST_LOG     Log filter (default: info)
  INDEXER_LOG_JSON           Emit JSON log lines when set to 1
",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one indexing pass over every selected network
    Run,

    /// Print indexed auctions as JSON, most recently updated first
    Auctions {
        /// `active` or `all`
        #[arg(long, default_value = "active")]
        scope: AuctionScope,
        /// Only auctions on this chain id
        #[arg(long)]
        chain: Option<u64>,
        /// 1-based page number
        #[arg(long, default_value_t = 1)]
        page: u32,
        /// Rows per page (1..=100)
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    telemetry::init(&telemetry::LogConfig::from_env());

    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => cmd_run(plan_run(env_var)?).await,
        Commands::Auctions {
            scope,
            chain,
            page,
            limit,
        } => {
            let query = AuctionQuery {
                scope,
                chain_id: chain,
                page,
                limit,
            };
            cmd_auctions(&database_url(&env_var)?, &query).await
        }
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

fn database_url<F>(env: &F) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    env("DATABASE_URL")
        .filter(|v| !v.trim().is_empty())
        .context("DATABASE_URL is not set")
}

/// What an indexing run needs before touching the store or any node.
#[derive(Debug)]
struct RunPlan {
    database_url: String,
    networks: Vec<Network>,
}

/// Check the store connection string and resolve the network selection.
///
/// Unconfigured networks stay in the plan; the index loop skips them.
fn plan_run<F>(env: F) -> Result<RunPlan>
where
    F: Fn(&str) -> Option<String>,
{
    let database_url = database_url(&env)?;
    let selection = NetworkSelection::parse(env("INDEXER_NETWORKS").as_deref());
    let networks = resolve(BUILTIN_NETWORKS, &selection, &env);
    if networks.is_empty() {
        bail!("no networks selected (INDEXER_NETWORKS = {selection:?})");
    }
    Ok(RunPlan {
        database_url,
        networks,
    })
}

async fn cmd_run(plan: RunPlan) -> Result<()> {
    let RunPlan {
        database_url,
        networks,
    } = plan;

    let storage = Arc::new(
        PostgresStorage::connect(&database_url)
            .await
            .context("failed to open auction store")?,
    );

    tracing::info!(networks = networks.len(), "starting indexing run");
    let indexer = IndexLoop::new(storage.clone(), storage.clone());
    let summary = indexer
        .run(&networks, |_, url| HttpRpcClient::default_for(url))
        .await;

    for report in &summary.reports {
        tracing::debug!(report = %serde_json::to_string(report)?, "pass report");
    }

    storage.close().await;
    Ok(())
}

async fn cmd_auctions(database_url: &str, query: &AuctionQuery) -> Result<()> {
    let storage = PostgresStorage::connect(database_url)
        .await
        .context("failed to open auction store")?;

    let result = storage.list(query).await;
    storage.close().await;

    let rows = result.context("failed to list auctions")?;
    println!("{}", serde_json::to_string_pretty(&rows)?);
    Ok(())
}
