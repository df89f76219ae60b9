//! Migration bookkeeping.
//!
//! A caller-named tracking table records which migrations have executed:
//! `(name VARCHAR(128) PRIMARY KEY, updated_at TIMESTAMP NOT NULL)`. Records
//! are append-only; this module never updates or deletes them. Deciding
//! *which* migrations to run is the owning framework's job, only completion
//! state is persisted and reported here.

use crate::adapter::DbAdapter;
use crate::config::DbBackend;
use crate::db::executor;
use crate::db::handle::DbHandle;
use crate::db::params::SqlParam;
use crate::db::transaction::IsolationLevel;
use crate::error::DbResult;
use tracing::debug;

/// Statement execution seam for [`DbAdapter::log_migration_successful`].
///
/// [`DbHandle`] implements it directly; a framework that runs migration
/// bodies inside its own transaction wrapper implements it on that wrapper
/// so the ledger insert joins the same transaction.
#[allow(async_fn_in_trait)]
pub trait StatementExecutor {
    async fn exec(&mut self, sql: &str, params: &[SqlParam]) -> DbResult<u64>;
}

impl StatementExecutor for DbHandle {
    async fn exec(&mut self, sql: &str, params: &[SqlParam]) -> DbResult<u64> {
        executor::exec(self, sql, params).await
    }
}

impl DbAdapter {
    /// Create the tracking table when absent. Idempotent.
    pub async fn ensure_migrations_table(&self, table_name: &str) -> DbResult<()> {
        let mut client = self.get_client().await?;
        let result = self.create_table_if_absent(&mut client, table_name).await;
        self.release_client(client).await;
        result?;
        debug!(table = table_name, "migrations table checked");
        Ok(())
    }

    async fn create_table_if_absent(
        &self,
        client: &mut DbHandle,
        table_name: &str,
    ) -> DbResult<()> {
        self.start_transaction(client, IsolationLevel::RepeatableRead.code())
            .await?;
        self.query(
            client,
            &format!(
                "CREATE TABLE IF NOT EXISTS {table_name}(name VARCHAR(128) NOT NULL, \
                 updated_at TIMESTAMP NOT NULL, PRIMARY KEY(name))"
            ),
            &[],
        )
        .await?;
        self.commit(client).await
    }

    /// Names of all executed migrations, in ascending lexicographic order.
    pub async fn list_executed_migration_names(&self, table_name: &str) -> DbResult<Vec<String>> {
        let mut client = self.get_client().await?;
        let result = self
            .query(
                &mut client,
                &format!("SELECT name FROM {table_name} ORDER BY name"),
                &[],
            )
            .await;
        self.release_client(client).await;

        let rows = result?;
        Ok(rows
            .iter()
            .filter_map(|row| row.get("name").and_then(|v| v.as_str()))
            .map(str::to_string)
            .collect())
    }

    /// Record a completed migration. Fails with a duplicate-key error when
    /// the name was already logged; migrations are logged at most once.
    ///
    /// The insert goes through the supplied executor so it can participate
    /// in a caller-managed transaction.
    pub async fn log_migration_successful<E: StatementExecutor>(
        &self,
        executor: &mut E,
        table_name: &str,
        migration_name: &str,
    ) -> DbResult<()> {
        // PostgreSQL numbers its placeholders; MySQL and SQLite share `?`
        let sql = match self.backend() {
            DbBackend::Postgres => {
                format!("INSERT INTO {table_name}(name, updated_at) VALUES($1, $2)")
            }
            _ => format!("INSERT INTO {table_name}(name, updated_at) VALUES(?, ?)"),
        };
        executor
            .exec(
                &sql,
                &[
                    SqlParam::String(migration_name.to_string()),
                    SqlParam::Timestamp(self.timestamp(None)),
                ],
            )
            .await?;
        debug!(
            table = table_name,
            migration = migration_name,
            "migration logged"
        );
        Ok(())
    }

    /// Fixed isolation policy for running migration bodies.
    pub fn migration_transaction_isolation_level(&self) -> IsolationLevel {
        IsolationLevel::RepeatableRead
    }
}
