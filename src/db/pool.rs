//! Connection pool lifecycle and client acquisition.
//!
//! One adapter instance owns at most one pool resource at a time. The pool
//! is created eagerly at initialization (when pooling is enabled), destroyed
//! and recreated wholesale on detected failure, and destroyed permanently at
//! shutdown. The pool itself enforces the upper bound on concurrently leased
//! connections and queues excess requests; none of that is reimplemented
//! here.
//!
//! # Concurrency
//!
//! The pool reference lives behind a `tokio::sync::RwLock` and is cleared
//! *before* a close is awaited, so acquisitions started after a destroy
//! never race against the pool being drained. The active-client count is an
//! atomic: it is diagnostic only, the pool enforces the real limit.

use crate::config::{DbBackend, DbConfig};
use crate::db::handle::{DbHandle, MySqlHandle, PgHandle, SqliteHandle};
use crate::error::{DbError, DbResult};
use sqlx::mysql::MySqlPoolOptions;
use sqlx::postgres::PgPoolOptions;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{ConnectOptions, MySqlPool, PgPool, SqlitePool};
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use tokio::sync::RwLock;
use tracing::{error, info, warn};

/// Database-specific connection pool.
#[derive(Debug, Clone)]
pub enum DbPool {
    MySql(MySqlPool),
    Postgres(PgPool),
    Sqlite(SqlitePool),
}

impl DbPool {
    /// Close the pool, resolving once fully drained.
    pub async fn close(&self) {
        match self {
            DbPool::MySql(pool) => pool.close().await,
            DbPool::Postgres(pool) => pool.close().await,
            DbPool::Sqlite(pool) => pool.close().await,
        }
    }

    /// Lease one connection from the pool.
    pub(crate) async fn acquire(&self) -> DbResult<DbHandle> {
        match self {
            DbPool::MySql(pool) => Ok(DbHandle::MySql(MySqlHandle::Pooled(pool.acquire().await?))),
            DbPool::Postgres(pool) => {
                Ok(DbHandle::Postgres(PgHandle::Pooled(pool.acquire().await?)))
            }
            DbPool::Sqlite(pool) => {
                Ok(DbHandle::Sqlite(SqliteHandle::Pooled(pool.acquire().await?)))
            }
        }
    }
}

/// Owns the pool resource for one adapter instance and hands out
/// connection handles.
pub struct PoolManager {
    config: DbConfig,
    /// The single pool resource. `None` while pooling is disabled, before
    /// initialization and after shutdown.
    pool: RwLock<Option<DbPool>>,
    /// Handles currently out, pooled or standalone. Incremented on every
    /// successful acquisition, decremented on every release attempt.
    active_clients: AtomicI64,
    /// Bumped each time a pool is created; recovery should bump it at most
    /// once per acquisition.
    pool_generation: AtomicU64,
}

impl PoolManager {
    pub fn new(config: DbConfig) -> Self {
        Self {
            config,
            pool: RwLock::new(None),
            active_clients: AtomicI64::new(0),
            pool_generation: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &DbConfig {
        &self.config
    }

    /// Create the pool eagerly when pooling is enabled; otherwise pooling
    /// stays disabled for the adapter's lifetime. Fails when the connect
    /// parameters are invalid.
    pub async fn initialize(&self) -> DbResult<()> {
        if self.config.pooling_enabled() {
            self.create_pool().await?;
        }
        Ok(())
    }

    /// Build a new pool sized to the configured pool size.
    pub(crate) async fn create_pool(&self) -> DbResult<()> {
        let size = self.config.effective_pool_size();
        let pool = match self.config.backend {
            DbBackend::MySql => DbPool::MySql(
                MySqlPoolOptions::new()
                    .max_connections(size)
                    .connect_with(self.config.mysql_connect_options())
                    .await?,
            ),
            DbBackend::Postgres => DbPool::Postgres(
                PgPoolOptions::new()
                    .max_connections(size)
                    .connect_with(self.config.pg_connect_options())
                    .await?,
            ),
            DbBackend::Sqlite => DbPool::Sqlite(
                SqlitePoolOptions::new()
                    .max_connections(size)
                    .connect_with(self.config.sqlite_connect_options())
                    .await?,
            ),
        };

        self.pool_generation.fetch_add(1, Ordering::AcqRel);
        let previous = self.pool.write().await.replace(pool);
        // At most one pool may be live; a leftover would otherwise leak
        if let Some(previous) = previous {
            previous.close().await;
        }

        info!(
            backend = %self.config.backend,
            pool_size = size,
            "created connection pool"
        );
        Ok(())
    }

    /// Destroy the pool. No-op when none exists. The reference is cleared
    /// before the drain is awaited.
    pub async fn destroy_pool(&self) {
        let pool = self.pool.write().await.take();
        if let Some(pool) = pool {
            info!(
                active_clients = self.active_clients(),
                "destroying connection pool"
            );
            pool.close().await;
        }
    }

    /// Destroy-then-create. Used only as a recovery action.
    pub(crate) async fn recreate_pool(&self) -> DbResult<()> {
        self.destroy_pool().await;
        self.create_pool().await
    }

    /// Destroy the pool if one exists. Safe to call even when
    /// initialization never created one.
    pub async fn shutdown(&self) {
        self.destroy_pool().await;
    }

    /// Resolve a usable connection handle, pooled or standalone.
    pub async fn get_client(&self) -> DbResult<DbHandle> {
        let handle = if self.config.pooling_enabled() {
            self.lease_with_recovery().await?
        } else {
            // Unpooled connections get no retry, connect failures propagate
            self.connect_direct().await?
        };
        self.active_clients.fetch_add(1, Ordering::AcqRel);
        Ok(handle)
    }

    /// Release a handle obtained from [`get_client`](Self::get_client).
    ///
    /// Never fails: release runs in cleanup paths where a secondary error
    /// must not mask the original one. The counter is decremented before the
    /// close attempt, whatever its outcome.
    pub async fn release_client(&self, handle: DbHandle) {
        self.active_clients.fetch_sub(1, Ordering::AcqRel);
        if let Err(err) = handle.release().await {
            warn!(error = %err, "error while releasing connection handle");
        }
    }

    /// Number of handles currently out. Diagnostic only.
    pub fn active_clients(&self) -> i64 {
        self.active_clients.load(Ordering::Acquire)
    }

    async fn lease(&self) -> DbResult<DbHandle> {
        let pool = self.pool.read().await.clone();
        match pool {
            Some(pool) => pool.acquire().await,
            None => Err(DbError::connection("connection pool is not initialized")),
        }
    }

    /// A broken pool (say, every connection stale after a network blip) is
    /// cheaper to replace wholesale than to repair connection by connection,
    /// but rebuilding on every failure would mask a real outage: exactly one
    /// recreate-and-retry.
    async fn lease_with_recovery(&self) -> DbResult<DbHandle> {
        match self.lease().await {
            Ok(handle) => Ok(handle),
            Err(err) => {
                warn!(
                    error = %err,
                    "failed to lease a connection, recreating the pool and retrying"
                );
                self.recreate_pool().await?;
                self.lease().await.inspect_err(|err| {
                    error!(error = %err, "failed to lease a connection after pool recreation");
                })
            }
        }
    }

    async fn connect_direct(&self) -> DbResult<DbHandle> {
        let handle = match self.config.backend {
            DbBackend::MySql => DbHandle::MySql(MySqlHandle::Direct(
                self.config.mysql_connect_options().connect().await?,
            )),
            DbBackend::Postgres => DbHandle::Postgres(PgHandle::Direct(
                self.config.pg_connect_options().connect().await?,
            )),
            DbBackend::Sqlite => DbHandle::Sqlite(SqliteHandle::Direct(
                self.config.sqlite_connect_options().connect().await?,
            )),
        };
        Ok(handle)
    }

    #[cfg(test)]
    pub(crate) fn pool_generation(&self) -> u64 {
        self.pool_generation.load(Ordering::Acquire)
    }
}
