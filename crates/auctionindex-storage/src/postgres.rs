//! PostgreSQL storage backend for AuctionIndex.
//!
//! Persists per-chain checkpoints and the materialized `auctions` table.
//! Uses `sqlx` with connection pooling.
//!
//! # Feature Flag
//! Requires the `postgres` feature:
//! ```toml
//! auctionindex-storage = { version = "0.1", features = ["postgres"] }
//! ```
//!
//! # Schema
//! Created idempotently on connect:
//! - `auction_checkpoints` — last indexed block per chain
//! - `auctions` — one row per (chain_id, auction_id)
//!
//! On-chain integers (auction ids, position ids, reserves) are stored as
//! `NUMERIC(78, 0)` and move through Rust as decimal strings. The uint64
//! start and end times use `NUMERIC(20, 0)` so values above `i64::MAX` stay
//! unsigned in the table.

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use tracing::{debug, info};

use auctionindex_core::auction::{AuctionPatch, AuctionRecord};
use auctionindex_core::checkpoint::{Checkpoint, CheckpointStore};
use auctionindex_core::error::IndexerError;
use auctionindex_core::store::{AuctionQuery, AuctionScope, AuctionStore};

// ─── Connection options ────────────────────────────────────────────────────────

/// Connection options for the Postgres storage backend.
#[derive(Debug, Clone)]
pub struct PostgresOptions {
    /// Maximum number of connections in the pool (default: 5)
    pub max_connections: u32,
    /// Minimum number of idle connections to keep open (default: 0)
    pub min_connections: u32,
    /// Connection timeout in seconds (default: 30)
    pub connect_timeout_secs: u64,
}

impl Default for PostgresOptions {
    fn default() -> Self {
        Self {
            max_connections: 5,
            min_connections: 0,
            connect_timeout_secs: 30,
        }
    }
}

// ─── Schema ───────────────────────────────────────────────────────────────────

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS auction_checkpoints (
        chain_id     BIGINT PRIMARY KEY,
        block_number BIGINT NOT NULL,
        updated_at   BIGINT NOT NULL DEFAULT EXTRACT(EPOCH FROM NOW())::BIGINT
    )",
    "CREATE TABLE IF NOT EXISTS auctions (
        chain_id          BIGINT          NOT NULL,
        auction_id        NUMERIC(78, 0)  NOT NULL,
        type              TEXT            NOT NULL CHECK (type IN ('solo', 'community')),
        maker_position_id NUMERIC(78, 0),
        pool_id_a         TEXT,
        pool_id_b         TEXT,
        token_a           TEXT,
        token_b           TEXT,
        reserve_a         NUMERIC(78, 0),
        reserve_b         NUMERIC(78, 0),
        start_time        NUMERIC(20, 0),
        end_time          NUMERIC(20, 0),
        fee_bps           INTEGER,
        fee_asset         SMALLINT,
        active            BOOLEAN         NOT NULL,
        finalized         BOOLEAN         NOT NULL,
        raw_event         JSONB           NOT NULL,
        block_number      BIGINT          NOT NULL,
        tx_hash           TEXT            NOT NULL,
        updated_at        TIMESTAMPTZ     NOT NULL DEFAULT NOW(),
        PRIMARY KEY (chain_id, auction_id)
    )",
    // Tables created before the times moved off BIGINT.
    "ALTER TABLE auctions
        ALTER COLUMN start_time TYPE NUMERIC(20, 0),
        ALTER COLUMN end_time   TYPE NUMERIC(20, 0)",
    "CREATE INDEX IF NOT EXISTS idx_auctions_active_updated
     ON auctions(active, updated_at DESC)",
    "CREATE INDEX IF NOT EXISTS idx_auctions_chain_updated
     ON auctions(chain_id, updated_at DESC)",
];

const UPSERT_AUCTION: &str = "INSERT INTO auctions
        (chain_id, auction_id, type, maker_position_id, pool_id_a, pool_id_b,
         token_a, token_b, reserve_a, reserve_b, start_time, end_time,
         fee_bps, fee_asset, active, finalized, raw_event, block_number, tx_hash, updated_at)
     VALUES ($1, $2::numeric, $3, $4::numeric, $5, $6,
             $7, $8, $9::numeric, $10::numeric, $11::numeric, $12::numeric,
             $13, $14, $15, $16, $17, $18, $19, NOW())
     ON CONFLICT (chain_id, auction_id) DO UPDATE SET
        type              = EXCLUDED.type,
        maker_position_id = COALESCE(EXCLUDED.maker_position_id, auctions.maker_position_id),
        pool_id_a         = COALESCE(EXCLUDED.pool_id_a, auctions.pool_id_a),
        pool_id_b         = COALESCE(EXCLUDED.pool_id_b, auctions.pool_id_b),
        token_a           = COALESCE(EXCLUDED.token_a, auctions.token_a),
        token_b           = COALESCE(EXCLUDED.token_b, auctions.token_b),
        reserve_a         = COALESCE(EXCLUDED.reserve_a, auctions.reserve_a),
        reserve_b         = COALESCE(EXCLUDED.reserve_b, auctions.reserve_b),
        start_time        = COALESCE(EXCLUDED.start_time, auctions.start_time),
        end_time          = COALESCE(EXCLUDED.end_time, auctions.end_time),
        fee_bps           = COALESCE(EXCLUDED.fee_bps, auctions.fee_bps),
        fee_asset         = COALESCE(EXCLUDED.fee_asset, auctions.fee_asset),
        active            = EXCLUDED.active,
        finalized         = EXCLUDED.finalized,
        raw_event         = EXCLUDED.raw_event,
        block_number      = EXCLUDED.block_number,
        tx_hash           = EXCLUDED.tx_hash,
        updated_at        = NOW()";

const SELECT_AUCTION_COLUMNS: &str = "SELECT chain_id, auction_id::text AS auction_id, type,
        maker_position_id::text AS maker_position_id, pool_id_a, pool_id_b, token_a, token_b,
        reserve_a::text AS reserve_a, reserve_b::text AS reserve_b,
        start_time::text AS start_time, end_time::text AS end_time,
        fee_bps, fee_asset, active, finalized, raw_event, block_number, tx_hash, updated_at
     FROM auctions";

// ─── PostgresStorage ─────────────────────────────────────────────────────────

/// PostgreSQL-backed storage for checkpoints and auction rows.
///
/// Cheaply cloneable; wraps a connection pool.
#[derive(Clone)]
pub struct PostgresStorage {
    pool: PgPool,
}

impl PostgresStorage {
    /// Connect to a PostgreSQL database and apply the schema.
    ///
    /// The URL format follows libpq convention:
    /// `postgresql://[user[:password]@][host][:port][/dbname]`
    pub async fn connect(database_url: &str) -> Result<Self, IndexerError> {
        Self::connect_with_options(database_url, PostgresOptions::default()).await
    }

    /// Connect with custom pool options.
    pub async fn connect_with_options(
        database_url: &str,
        opts: PostgresOptions,
    ) -> Result<Self, IndexerError> {
        let pool = PgPoolOptions::new()
            .max_connections(opts.max_connections)
            .min_connections(opts.min_connections)
            .acquire_timeout(std::time::Duration::from_secs(opts.connect_timeout_secs))
            .connect(database_url)
            .await
            .map_err(|e| IndexerError::Persistence(format!("postgres connect: {e}")))?;

        let storage = Self { pool };
        storage.run_migrations(SCHEMA).await?;
        info!("PostgresStorage connected and schema initialized");
        Ok(storage)
    }

    /// Run SQL statements in order; stops on first error.
    pub async fn run_migrations(&self, sql: &[&str]) -> Result<(), IndexerError> {
        for stmt in sql {
            sqlx::query(stmt)
                .execute(&self.pool)
                .await
                .map_err(|e| {
                    IndexerError::Persistence(format!("migration failed: {e}\nSQL: {stmt}"))
                })?;
        }
        debug!(statements = sql.len(), "migrations applied");
        Ok(())
    }

    /// Close every pooled connection. Call once at the end of a run.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn persistence(e: sqlx::Error) -> IndexerError {
    IndexerError::Persistence(e.to_string())
}

/// Parse a `NUMERIC(20, 0)` column read as text back into a u64.
fn u64_column(name: &str, text: Option<String>) -> Result<Option<u64>, IndexerError> {
    text.map(|t| {
        t.parse::<u64>()
            .map_err(|e| IndexerError::Persistence(format!("column {name} = '{t}': {e}")))
    })
    .transpose()
}

fn row_to_record(row: &PgRow) -> Result<AuctionRecord, IndexerError> {
    let kind: String = row.try_get("type").map_err(persistence)?;
    Ok(AuctionRecord {
        chain_id: row.try_get::<i64, _>("chain_id").map_err(persistence)? as u64,
        auction_id: row.try_get("auction_id").map_err(persistence)?,
        kind: kind.parse()?,
        maker_position_id: row.try_get("maker_position_id").map_err(persistence)?,
        pool_id_a: row.try_get("pool_id_a").map_err(persistence)?,
        pool_id_b: row.try_get("pool_id_b").map_err(persistence)?,
        token_a: row.try_get("token_a").map_err(persistence)?,
        token_b: row.try_get("token_b").map_err(persistence)?,
        reserve_a: row.try_get("reserve_a").map_err(persistence)?,
        reserve_b: row.try_get("reserve_b").map_err(persistence)?,
        start_time: u64_column("start_time", row.try_get("start_time").map_err(persistence)?)?,
        end_time: u64_column("end_time", row.try_get("end_time").map_err(persistence)?)?,
        fee_bps: row
            .try_get::<Option<i32>, _>("fee_bps")
            .map_err(persistence)?
            .map(|v| v as u16),
        fee_asset: row
            .try_get::<Option<i16>, _>("fee_asset")
            .map_err(persistence)?
            .map(|v| v as u8),
        active: row.try_get("active").map_err(persistence)?,
        finalized: row.try_get("finalized").map_err(persistence)?,
        raw_event: row.try_get("raw_event").map_err(persistence)?,
        block_number: row.try_get::<i64, _>("block_number").map_err(persistence)? as u64,
        tx_hash: row.try_get("tx_hash").map_err(persistence)?,
        updated_at: row.try_get("updated_at").map_err(persistence)?,
    })
}

// ─── CheckpointStore impl ─────────────────────────────────────────────────────

#[async_trait]
impl CheckpointStore for PostgresStorage {
    async fn load(&self, chain_id: u64) -> Result<Option<Checkpoint>, IndexerError> {
        let row = sqlx::query(
            "SELECT chain_id, block_number, updated_at
             FROM auction_checkpoints
             WHERE chain_id = $1",
        )
        .bind(chain_id as i64)
        .fetch_optional(&self.pool)
        .await
        .map_err(persistence)?;

        Ok(row.map(|r| Checkpoint {
            chain_id: r.get::<i64, _>("chain_id") as u64,
            block_number: r.get::<i64, _>("block_number") as u64,
            updated_at: r.get::<i64, _>("updated_at"),
        }))
    }

    async fn save(&self, chain_id: u64, block_number: u64) -> Result<(), IndexerError> {
        sqlx::query(
            "INSERT INTO auction_checkpoints (chain_id, block_number, updated_at)
             VALUES ($1, $2, $3)
             ON CONFLICT (chain_id)
             DO UPDATE SET
                block_number = EXCLUDED.block_number,
                updated_at   = EXCLUDED.updated_at",
        )
        .bind(chain_id as i64)
        .bind(block_number as i64)
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await
        .map_err(persistence)?;

        debug!(chain_id, block = block_number, "checkpoint saved");
        Ok(())
    }
}

// ─── AuctionStore impl ────────────────────────────────────────────────────────

#[async_trait]
impl AuctionStore for PostgresStorage {
    async fn upsert(&self, patch: &AuctionPatch) -> Result<(), IndexerError> {
        sqlx::query(UPSERT_AUCTION)
            .bind(patch.chain_id as i64)
            .bind(&patch.auction_id)
            .bind(patch.kind.as_str())
            .bind(&patch.maker_position_id)
            .bind(&patch.pool_id_a)
            .bind(&patch.pool_id_b)
            .bind(&patch.token_a)
            .bind(&patch.token_b)
            .bind(&patch.reserve_a)
            .bind(&patch.reserve_b)
            .bind(patch.start_time.map(|v| v.to_string()))
            .bind(patch.end_time.map(|v| v.to_string()))
            .bind(patch.fee_bps.map(i32::from))
            .bind(patch.fee_asset.map(i16::from))
            .bind(patch.status.active())
            .bind(patch.status.finalized())
            .bind(&patch.raw_event)
            .bind(patch.block_number as i64)
            .bind(&patch.tx_hash)
            .execute(&self.pool)
            .await
            .map_err(persistence)?;
        Ok(())
    }

    async fn get(
        &self,
        chain_id: u64,
        auction_id: &str,
    ) -> Result<Option<AuctionRecord>, IndexerError> {
        let sql = format!("{SELECT_AUCTION_COLUMNS} WHERE chain_id = $1 AND auction_id = $2::numeric");
        let row = sqlx::query(&sql)
            .bind(chain_id as i64)
            .bind(auction_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(persistence)?;
        row.as_ref().map(row_to_record).transpose()
    }

    async fn list(&self, query: &AuctionQuery) -> Result<Vec<AuctionRecord>, IndexerError> {
        let sql = format!(
            "{SELECT_AUCTION_COLUMNS}
             WHERE ($1 = FALSE OR active)
               AND ($2::BIGINT IS NULL OR chain_id = $2)
             ORDER BY updated_at DESC, chain_id ASC, auction_id ASC
             LIMIT $3 OFFSET $4"
        );
        let rows = sqlx::query(&sql)
            .bind(query.scope == AuctionScope::Active)
            .bind(query.chain_id.map(|c| c as i64))
            .bind(i64::from(query.effective_limit()))
            .bind(query.offset() as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(persistence)?;
        rows.iter().map(row_to_record).collect()
    }
}
