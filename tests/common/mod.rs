//! Shared helpers for the integration suites.

#![allow(dead_code)]

use db_adapter::{DbAdapter, DbConfig};
use tempfile::TempDir;

/// A temp-file SQLite database with an initialized adapter. The directory
/// lives as long as this struct.
pub struct TestDb {
    pub adapter: DbAdapter,
    pub path: String,
    _dir: TempDir,
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

/// Create a fresh database, initialize an adapter over it and create the
/// given tables.
pub async fn setup(pool_size: Option<u32>, tables: &[&str]) -> TestDb {
    init_tracing();
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("test.db").to_string_lossy().into_owned();
    let adapter = DbAdapter::new(DbConfig {
        pool_size,
        ..DbConfig::sqlite(path.clone())
    });
    adapter.initialize().await.expect("initialize");

    if !tables.is_empty() {
        let mut client = adapter.get_client().await.expect("get client");
        for ddl in tables {
            adapter
                .exec(&mut client, ddl, &[])
                .await
                .expect("create table");
        }
        adapter.release_client(client).await;
    }

    TestDb {
        adapter,
        path,
        _dir: dir,
    }
}

/// Open a second adapter over the same database file, for checks that need
/// a fresh connection.
pub async fn reopen(db: &TestDb, pool_size: Option<u32>) -> DbAdapter {
    let adapter = DbAdapter::new(DbConfig {
        pool_size,
        ..DbConfig::sqlite(db.path.clone())
    });
    adapter.initialize().await.expect("initialize");
    adapter
}
