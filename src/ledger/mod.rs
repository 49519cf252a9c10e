//! Ledger Core
//!
//! Authoritative, append-only store of assets, custody history, inspection
//! records and role assignments. All writes go through a single ordered
//! transaction gate so every mutation is observed either fully or not at all.

pub mod models;
pub(crate) mod queries;
pub mod schema;

use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

use crate::crypto::Commitment;
use crate::error::CustodyError;
use crate::roles::{self, Role};
use models::*;

/// Handle to the ledger store
#[derive(Clone)]
pub struct Ledger {
    pool: SqlitePool,
    write_order: Arc<Mutex<()>>,
}

/// An open write transaction. Dropping it without `commit` rolls back.
pub(crate) struct WriteTx<'a> {
    tx: Transaction<'static, Sqlite>,
    _order: MutexGuard<'a, ()>,
}

impl WriteTx<'_> {
    pub(crate) fn conn(&mut self) -> &mut SqliteConnection {
        &mut *self.tx
    }

    pub(crate) async fn commit(self) -> Result<(), CustodyError> {
        self.tx.commit().await?;
        Ok(())
    }
}

impl Ledger {
    /// Open (or create) a file-backed ledger
    pub async fn new(database_url: &str) -> Result<Self, CustodyError> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect_with(options)
            .await?;

        info!("Ledger opened at {}", database_url);
        Ok(Self::from_pool(pool))
    }

    /// Private in-memory ledger, used by tests and demos.
    ///
    /// An in-memory SQLite database lives and dies with its connection, so the
    /// pool is pinned to exactly one connection that is never recycled.
    pub async fn new_in_memory() -> Result<Self, CustodyError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let ledger = Self::from_pool(pool);
        ledger.run_migrations().await?;
        Ok(ledger)
    }

    fn from_pool(pool: SqlitePool) -> Self {
        Self {
            pool,
            write_order: Arc::new(Mutex::new(())),
        }
    }

    /// Apply the schema. Idempotent.
    pub async fn run_migrations(&self) -> Result<(), CustodyError> {
        for statement in schema::SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        debug!("Ledger schema applied ({} statements)", schema::SCHEMA.len());
        Ok(())
    }

    /// Underlying connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Begin a write transaction. Writers are totally ordered: the next one
    /// starts only after the previous one committed or rolled back.
    pub(crate) async fn begin_write(&self) -> Result<WriteTx<'_>, CustodyError> {
        let order = self.write_order.lock().await;
        let tx = self.pool.begin().await?;
        Ok(WriteTx { tx, _order: order })
    }

    /// Register a new asset. The caller must hold CREATOR and becomes the
    /// first custodian; history is seeded with the creation event.
    pub async fn create_asset(
        &self,
        caller: &Principal,
        name: &str,
        consumer_commitment: Commitment,
        handover_commitment: Commitment,
        location: &str,
    ) -> Result<Asset, CustodyError> {
        let name = require_non_empty("name", name)?;
        if consumer_commitment == handover_commitment {
            return Err(CustodyError::InvalidInput(
                "Consumer and handover commitments must differ".to_string(),
            ));
        }

        let mut tx = self.begin_write().await?;

        if !roles::has_role_in(tx.conn(), Role::Creator, caller).await? {
            return Err(CustodyError::unauthorized(caller, Role::Creator));
        }

        let now = Utc::now();
        let id = queries::insert_asset(
            tx.conn(),
            &name,
            caller,
            &consumer_commitment,
            &handover_commitment,
            now,
        )
        .await?;

        let genesis = CustodyEvent {
            actor: caller.clone(),
            resulting_state: AssetState::Created,
            timestamp: now,
            location: location.trim().to_string(),
            consumed_commitment: None,
        };
        queries::append_custody_event(tx.conn(), id, &genesis).await?;

        let asset = queries::require_asset(tx.conn(), id).await?;
        tx.commit().await?;

        info!("Created asset {} ({}) by {}", id, asset.name, caller);
        Ok(asset)
    }

    /// Current record of an asset
    pub async fn get_asset(&self, id: AssetId) -> Result<Asset, CustodyError> {
        let mut conn = self.pool.acquire().await?;
        let asset = queries::require_asset(&mut conn, id).await?;
        debug!("Read asset {} (owner {}, state {})", id, asset.current_owner, asset.state);
        Ok(asset)
    }

    /// Custody events of an asset, genesis first
    pub async fn get_history(&self, id: AssetId) -> Result<Vec<CustodyEvent>, CustodyError> {
        let mut conn = self.pool.acquire().await?;
        if !queries::asset_exists(&mut conn, id).await? {
            return Err(CustodyError::NotFound(id));
        }
        queries::fetch_history(&mut conn, id).await
    }

    /// Inspection records of an asset, oldest first
    pub async fn get_verifications(&self, id: AssetId) -> Result<Vec<AuditEvent>, CustodyError> {
        let mut conn = self.pool.acquire().await?;
        if !queries::asset_exists(&mut conn, id).await? {
            return Err(CustodyError::NotFound(id));
        }
        queries::fetch_verifications(&mut conn, id).await
    }

    /// Asset and history read in one snapshot, for integrity checks
    pub async fn get_asset_with_history(
        &self,
        id: AssetId,
    ) -> Result<(Asset, Vec<CustodyEvent>), CustodyError> {
        let mut tx = self.pool.begin().await?;
        let asset = queries::require_asset(&mut *tx, id).await?;
        let history = queries::fetch_history(&mut *tx, id).await?;
        tx.commit().await?;
        Ok((asset, history))
    }
}
