//! Transaction isolation levels and start sequencing.

use crate::config::DbBackend;
use crate::db::executor;
use crate::db::handle::DbHandle;
use crate::error::{DbError, DbResult};
use std::str::FromStr;
use tracing::{debug, error};

/// Closed set of transaction isolation levels.
///
/// Callers address levels through the short symbolic codes `"ru"`, `"rc"`,
/// `"rr"` and `"ser"`; the SQL clause text stays internal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IsolationLevel {
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl IsolationLevel {
    /// All levels, in increasing strictness.
    pub const ALL: [IsolationLevel; 4] = [
        IsolationLevel::ReadUncommitted,
        IsolationLevel::ReadCommitted,
        IsolationLevel::RepeatableRead,
        IsolationLevel::Serializable,
    ];

    /// The symbolic code used across the adapter surface.
    pub fn code(self) -> &'static str {
        match self {
            IsolationLevel::ReadUncommitted => "ru",
            IsolationLevel::ReadCommitted => "rc",
            IsolationLevel::RepeatableRead => "rr",
            IsolationLevel::Serializable => "ser",
        }
    }

    /// The SQL isolation clause text.
    pub fn as_sql(self) -> &'static str {
        match self {
            IsolationLevel::ReadUncommitted => "READ UNCOMMITTED",
            IsolationLevel::ReadCommitted => "READ COMMITTED",
            IsolationLevel::RepeatableRead => "REPEATABLE READ",
            IsolationLevel::Serializable => "SERIALIZABLE",
        }
    }
}

impl std::fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for IsolationLevel {
    type Err = DbError;

    fn from_str(code: &str) -> Result<Self, Self::Err> {
        match code {
            "ru" => Ok(IsolationLevel::ReadUncommitted),
            "rc" => Ok(IsolationLevel::ReadCommitted),
            "rr" => Ok(IsolationLevel::RepeatableRead),
            "ser" => Ok(IsolationLevel::Serializable),
            _ => Err(DbError::InvalidIsolationLevel {
                code: code.to_string(),
            }),
        }
    }
}

/// Isolation must be configured before the transaction opens: MySQL's `SET
/// TRANSACTION` only applies to the next transaction, PostgreSQL's only to
/// the transaction it runs inside, and SQLite exposes a single pragma. Two
/// sequential statements per dialect, never combined.
fn begin_statements(backend: DbBackend, level: IsolationLevel) -> [String; 2] {
    match backend {
        DbBackend::MySql => [
            format!("SET TRANSACTION ISOLATION LEVEL {}", level.as_sql()),
            "START TRANSACTION".to_string(),
        ],
        DbBackend::Postgres => [
            "BEGIN".to_string(),
            format!("SET TRANSACTION ISOLATION LEVEL {}", level.as_sql()),
        ],
        DbBackend::Sqlite => [
            format!(
                "PRAGMA read_uncommitted = {}",
                (level == IsolationLevel::ReadUncommitted) as u8
            ),
            "BEGIN".to_string(),
        ],
    }
}

/// Validate the symbolic code and open a transaction on the handle.
///
/// An unrecognized code fails before any SQL is issued.
pub(crate) async fn start(client: &mut DbHandle, isolation_level: &str) -> DbResult<()> {
    let level = isolation_level.parse::<IsolationLevel>().inspect_err(|_| {
        error!(code = isolation_level, "invalid transaction isolation level");
    })?;

    for sql in begin_statements(client.backend(), level) {
        executor::execute(client, &sql, &[]).await?;
    }
    debug!(level = %level, "transaction started");
    Ok(())
}

/// Commit the open transaction with a plain `COMMIT`.
pub(crate) async fn commit(client: &mut DbHandle) -> DbResult<()> {
    executor::execute(client, "COMMIT", &[]).await.map(|_| ())
}

/// Roll back the open transaction with a plain `ROLLBACK`.
pub(crate) async fn rollback(client: &mut DbHandle) -> DbResult<()> {
    executor::execute(client, "ROLLBACK", &[]).await.map(|_| ())
}
