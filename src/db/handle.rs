//! Connection handles.
//!
//! A [`DbHandle`] is one live database session, either leased from the pool
//! or opened standalone. Callers borrow a handle between acquisition and
//! release; it outlives a single statement but never a shutdown.

use crate::config::DbBackend;
use sqlx::pool::PoolConnection;
use sqlx::{Connection, MySql, MySqlConnection, PgConnection, Postgres, Sqlite, SqliteConnection};

/// A live database session for one of the supported backends.
pub enum DbHandle {
    MySql(MySqlHandle),
    Postgres(PgHandle),
    Sqlite(SqliteHandle),
}

pub enum MySqlHandle {
    Pooled(PoolConnection<MySql>),
    Direct(MySqlConnection),
}

pub enum PgHandle {
    Pooled(PoolConnection<Postgres>),
    Direct(PgConnection),
}

pub enum SqliteHandle {
    Pooled(PoolConnection<Sqlite>),
    Direct(SqliteConnection),
}

impl MySqlHandle {
    pub(crate) fn conn(&mut self) -> &mut MySqlConnection {
        match self {
            MySqlHandle::Pooled(conn) => &mut **conn,
            MySqlHandle::Direct(conn) => conn,
        }
    }
}

impl PgHandle {
    pub(crate) fn conn(&mut self) -> &mut PgConnection {
        match self {
            PgHandle::Pooled(conn) => &mut **conn,
            PgHandle::Direct(conn) => conn,
        }
    }
}

impl SqliteHandle {
    pub(crate) fn conn(&mut self) -> &mut SqliteConnection {
        match self {
            SqliteHandle::Pooled(conn) => &mut **conn,
            SqliteHandle::Direct(conn) => conn,
        }
    }
}

impl DbHandle {
    /// The backend this session belongs to.
    pub fn backend(&self) -> DbBackend {
        match self {
            DbHandle::MySql(_) => DbBackend::MySql,
            DbHandle::Postgres(_) => DbBackend::Postgres,
            DbHandle::Sqlite(_) => DbBackend::Sqlite,
        }
    }

    /// True when the session was leased from a pool rather than opened
    /// standalone.
    pub fn is_pooled(&self) -> bool {
        matches!(
            self,
            DbHandle::MySql(MySqlHandle::Pooled(_))
                | DbHandle::Postgres(PgHandle::Pooled(_))
                | DbHandle::Sqlite(SqliteHandle::Pooled(_))
        )
    }

    /// Return the session to its origin: pooled leases go back to the pool
    /// on drop, standalone connections are closed explicitly.
    pub(crate) async fn release(self) -> Result<(), sqlx::Error> {
        match self {
            DbHandle::MySql(MySqlHandle::Pooled(conn)) => {
                drop(conn);
                Ok(())
            }
            DbHandle::MySql(MySqlHandle::Direct(conn)) => conn.close().await,
            DbHandle::Postgres(PgHandle::Pooled(conn)) => {
                drop(conn);
                Ok(())
            }
            DbHandle::Postgres(PgHandle::Direct(conn)) => conn.close().await,
            DbHandle::Sqlite(SqliteHandle::Pooled(conn)) => {
                drop(conn);
                Ok(())
            }
            DbHandle::Sqlite(SqliteHandle::Direct(conn)) => conn.close().await,
        }
    }
}
