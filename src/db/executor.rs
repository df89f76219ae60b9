//! Statement execution over an acquired handle.
//!
//! Two entry points:
//! - [`query`] runs a parameterized statement and resolves with the result
//!   rows as a sequence (empty, never null, when nothing matches).
//! - [`exec`] resolves with a row count for row-returning statements and
//!   with the driver-reported affected-row count for mutations, so callers
//!   can use one method for both.
//!
//! The database-specific implementations are organized in parallel
//! submodules, one per backend, with identical structure.

use crate::config::DbBackend;
use crate::db::handle::DbHandle;
use crate::db::params::{SqlParam, bind_mysql_param, bind_postgres_param, bind_sqlite_param};
use crate::db::types::{JsonRow, RowToJson};
use crate::error::{DbError, DbResult};
use futures_util::TryStreamExt;
use sqlparser::ast::Statement;
use sqlparser::dialect::{Dialect, MySqlDialect, PostgreSqlDialect, SQLiteDialect};
use sqlparser::parser::Parser;
use sqlx::Executor;
use tracing::debug;

/// Execute a parameterized statement and return the result rows.
///
/// Rejects with the underlying driver error, machine-readable code
/// included, on failure.
pub async fn query(
    client: &mut DbHandle,
    sql: &str,
    params: &[SqlParam],
) -> DbResult<Vec<JsonRow>> {
    debug!(sql, params = params.len(), "executing query");
    match client {
        DbHandle::MySql(h) => mysql::fetch_rows(h.conn(), sql, params).await,
        DbHandle::Postgres(h) => postgres::fetch_rows(h.conn(), sql, params).await,
        DbHandle::Sqlite(h) => sqlite::fetch_rows(h.conn(), sql, params).await,
    }
}

/// Execute a statement and return the number of rows it produced or
/// affected.
pub async fn exec(client: &mut DbHandle, sql: &str, params: &[SqlParam]) -> DbResult<u64> {
    // The driver separates fetching from executing, so the statement kind
    // decides which result dimension is reported.
    if returns_rows(client.backend(), sql) {
        let rows = query(client, sql, params).await?;
        Ok(rows.len() as u64)
    } else {
        execute(client, sql, params).await
    }
}

/// Execute a statement for its side effect, returning the affected-row
/// count.
pub(crate) async fn execute(
    client: &mut DbHandle,
    sql: &str,
    params: &[SqlParam],
) -> DbResult<u64> {
    debug!(sql, params = params.len(), "executing statement");
    match client {
        DbHandle::MySql(h) => mysql::execute_write(h.conn(), sql, params).await,
        DbHandle::Postgres(h) => postgres::execute_write(h.conn(), sql, params).await,
        DbHandle::Sqlite(h) => sqlite::execute_write(h.conn(), sql, params).await,
    }
}

fn dialect_for(backend: DbBackend) -> Box<dyn Dialect> {
    match backend {
        DbBackend::MySql => Box::new(MySqlDialect {}),
        DbBackend::Postgres => Box::new(PostgreSqlDialect {}),
        DbBackend::Sqlite => Box::new(SQLiteDialect {}),
    }
}

/// Whether the statement produces a result set. Statements the parser cannot
/// handle take the execute path.
fn returns_rows(backend: DbBackend, sql: &str) -> bool {
    match Parser::parse_sql(dialect_for(backend).as_ref(), sql) {
        Ok(statements) => statements.first().is_some_and(statement_returns_rows),
        Err(_) => false,
    }
}

fn statement_returns_rows(stmt: &Statement) -> bool {
    matches!(
        stmt,
        Statement::Query(_)
            | Statement::Explain { .. }
            | Statement::ExplainTable { .. }
            | Statement::ShowTables { .. }
            | Statement::ShowColumns { .. }
            | Statement::ShowDatabases { .. }
            | Statement::ShowSchemas { .. }
            | Statement::ShowCreate { .. }
            | Statement::ShowFunctions { .. }
            | Statement::ShowVariable { .. }
            | Statement::ShowVariables { .. }
            | Statement::ShowStatus { .. }
            | Statement::ShowCollation { .. }
    )
}

mod mysql {
    use super::*;
    use sqlx::MySqlConnection;
    use sqlx::mysql::MySqlRow;

    pub async fn fetch_rows(
        conn: &mut MySqlConnection,
        sql: &str,
        params: &[SqlParam],
    ) -> DbResult<Vec<JsonRow>> {
        // When params is empty, run raw SQL: statements like START
        // TRANSACTION or CREATE PROCEDURE cannot go through the prepared
        // statement protocol.
        let rows: Vec<MySqlRow> = if params.is_empty() {
            conn.fetch(sql).try_collect().await.map_err(DbError::from)?
        } else {
            let mut query = sqlx::query(sql);
            for param in params {
                query = bind_mysql_param(query, param);
            }
            query
                .fetch(&mut *conn)
                .try_collect()
                .await
                .map_err(DbError::from)?
        };
        Ok(rows.iter().map(RowToJson::to_json_map).collect())
    }

    pub async fn execute_write(
        conn: &mut MySqlConnection,
        sql: &str,
        params: &[SqlParam],
    ) -> DbResult<u64> {
        let result = if params.is_empty() {
            conn.execute(sql).await
        } else {
            let mut query = sqlx::query(sql);
            for param in params {
                query = bind_mysql_param(query, param);
            }
            query.execute(&mut *conn).await
        };
        match result {
            Ok(r) => Ok(r.rows_affected()),
            Err(e) => Err(DbError::from(e)),
        }
    }
}

mod postgres {
    use super::*;
    use sqlx::PgConnection;
    use sqlx::postgres::PgRow;

    pub async fn fetch_rows(
        conn: &mut PgConnection,
        sql: &str,
        params: &[SqlParam],
    ) -> DbResult<Vec<JsonRow>> {
        let rows: Vec<PgRow> = if params.is_empty() {
            conn.fetch(sql).try_collect().await.map_err(DbError::from)?
        } else {
            let mut query = sqlx::query(sql);
            for param in params {
                query = bind_postgres_param(query, param);
            }
            query
                .fetch(&mut *conn)
                .try_collect()
                .await
                .map_err(DbError::from)?
        };
        Ok(rows.iter().map(RowToJson::to_json_map).collect())
    }

    pub async fn execute_write(
        conn: &mut PgConnection,
        sql: &str,
        params: &[SqlParam],
    ) -> DbResult<u64> {
        let result = if params.is_empty() {
            conn.execute(sql).await
        } else {
            let mut query = sqlx::query(sql);
            for param in params {
                query = bind_postgres_param(query, param);
            }
            query.execute(&mut *conn).await
        };
        match result {
            Ok(r) => Ok(r.rows_affected()),
            Err(e) => Err(DbError::from(e)),
        }
    }
}

mod sqlite {
    use super::*;
    use sqlx::SqliteConnection;
    use sqlx::sqlite::SqliteRow;

    pub async fn fetch_rows(
        conn: &mut SqliteConnection,
        sql: &str,
        params: &[SqlParam],
    ) -> DbResult<Vec<JsonRow>> {
        let rows: Vec<SqliteRow> = if params.is_empty() {
            conn.fetch(sql).try_collect().await.map_err(DbError::from)?
        } else {
            let mut query = sqlx::query(sql);
            for param in params {
                query = bind_sqlite_param(query, param);
            }
            query
                .fetch(&mut *conn)
                .try_collect()
                .await
                .map_err(DbError::from)?
        };
        Ok(rows.iter().map(RowToJson::to_json_map).collect())
    }

    pub async fn execute_write(
        conn: &mut SqliteConnection,
        sql: &str,
        params: &[SqlParam],
    ) -> DbResult<u64> {
        let result = if params.is_empty() {
            conn.execute(sql).await
        } else {
            let mut query = sqlx::query(sql);
            for param in params {
                query = bind_sqlite_param(query, param);
            }
            query.execute(&mut *conn).await
        };
        match result {
            Ok(r) => Ok(r.rows_affected()),
            Err(e) => Err(DbError::from(e)),
        }
    }
}
