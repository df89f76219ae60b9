//! The adapter facade handed to the owning framework.

use crate::config::{DbBackend, DbConfig};
use crate::db::executor;
use crate::db::handle::DbHandle;
use crate::db::params::SqlParam;
use crate::db::pool::PoolManager;
use crate::db::transaction::{self, IsolationLevel};
use crate::db::types::JsonRow;
use crate::error::DbResult;
use chrono::{DateTime, Utc};

/// Uniform access to connections, statements, transactions and migration
/// bookkeeping for one configured database.
///
/// Each instance owns its pool state; multiple adapters never share hidden
/// state. Typical lifecycle:
///
/// ```ignore
/// let adapter = DbAdapter::new(config);
/// adapter.initialize().await?;
/// let mut client = adapter.get_client().await?;
/// let result = adapter.query(&mut client, "SELECT 1", &[]).await;
/// adapter.release_client(client).await;
/// adapter.shutdown().await;
/// result?;
/// ```
pub struct DbAdapter {
    pool: PoolManager,
}

impl DbAdapter {
    pub fn new(config: DbConfig) -> Self {
        Self {
            pool: PoolManager::new(config),
        }
    }

    /// The backend this adapter is configured for.
    pub fn backend(&self) -> DbBackend {
        self.pool.config().backend
    }

    /// Prepare the adapter for use. With pooling enabled the pool is created
    /// eagerly, so invalid connect parameters fail here.
    pub async fn initialize(&self) -> DbResult<()> {
        self.pool.initialize().await
    }

    /// Destroy the pool if one exists; no-op otherwise.
    pub async fn shutdown(&self) {
        self.pool.shutdown().await
    }

    /// Resolve a usable connection handle: a pool lease (with one-shot
    /// pool-rebuild recovery) when pooling is enabled, a standalone
    /// connection otherwise.
    pub async fn get_client(&self) -> DbResult<DbHandle> {
        self.pool.get_client().await
    }

    /// Give a handle back. Never fails; close errors are logged and
    /// swallowed so cleanup paths cannot mask an original error.
    pub async fn release_client(&self, client: DbHandle) {
        self.pool.release_client(client).await
    }

    /// Number of handles currently out, for diagnostics.
    pub fn active_clients(&self) -> i64 {
        self.pool.active_clients()
    }

    /// Run a parameterized statement, resolving with the result rows
    /// (empty, never null, when nothing matches).
    pub async fn query(
        &self,
        client: &mut DbHandle,
        sql: &str,
        params: &[SqlParam],
    ) -> DbResult<Vec<JsonRow>> {
        executor::query(client, sql, params).await
    }

    /// Run a statement and return the number of rows it produced (for
    /// row-returning statements) or affected (for mutations).
    pub async fn exec(
        &self,
        client: &mut DbHandle,
        sql: &str,
        params: &[SqlParam],
    ) -> DbResult<u64> {
        executor::exec(client, sql, params).await
    }

    /// Open a transaction on the handle at the given isolation level,
    /// addressed by its symbolic code (`"ru"`, `"rc"`, `"rr"`, `"ser"`).
    /// Unknown codes fail before any SQL is issued.
    pub async fn start_transaction(
        &self,
        client: &mut DbHandle,
        isolation_level: &str,
    ) -> DbResult<()> {
        transaction::start(client, isolation_level).await
    }

    /// Commit the open transaction. Equivalent to executing `COMMIT`.
    pub async fn commit(&self, client: &mut DbHandle) -> DbResult<()> {
        transaction::commit(client).await
    }

    /// Roll back the open transaction. Equivalent to executing `ROLLBACK`.
    pub async fn rollback(&self, client: &mut DbHandle) -> DbResult<()> {
        transaction::rollback(client).await
    }

    /// The four symbolic isolation levels.
    pub fn tx_isolation_levels(&self) -> [IsolationLevel; 4] {
        IsolationLevel::ALL
    }

    /// Current time, or the time derived from the supplied epoch
    /// milliseconds. Used for consistent applied-at stamping.
    pub fn timestamp(&self, epoch_millis: Option<i64>) -> DateTime<Utc> {
        match epoch_millis {
            Some(ms) => DateTime::from_timestamp_millis(ms).unwrap_or_else(Utc::now),
            None => Utc::now(),
        }
    }
}
