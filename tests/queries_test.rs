//! Integration tests for query and exec semantics.

mod common;

use db_adapter::SqlParam;
use serde_json::json;

const TEST_TABLE: &str =
    "CREATE TABLE test (id INTEGER PRIMARY KEY, name TEXT NOT NULL, zip INTEGER, city TEXT)";

#[tokio::test]
async fn test_initialize_and_shutdown() {
    let db = common::setup(None, &[]).await;
    db.adapter.shutdown().await;
}

#[tokio::test]
async fn test_exec_and_query() {
    let db = common::setup(Some(0), &[TEST_TABLE]).await;
    let adapter = &db.adapter;
    let mut client = adapter.get_client().await.unwrap();

    assert_eq!(
        adapter
            .exec(
                &mut client,
                "INSERT INTO test(name,zip,city) VALUES('john', 1390, 'Nethen')",
                &[],
            )
            .await
            .unwrap(),
        1
    );
    assert_eq!(
        adapter
            .exec(
                &mut client,
                "INSERT INTO test(name,zip,city) VALUES('mary', 1300, 'Jodoigne')",
                &[],
            )
            .await
            .unwrap(),
        1
    );
    assert_eq!(
        adapter
            .exec(
                &mut client,
                "INSERT INTO test(name,zip,city) VALUES(?,?,?)",
                &[
                    SqlParam::String("grace".to_string()),
                    SqlParam::Int(1390),
                    SqlParam::String("Grez".to_string()),
                ],
            )
            .await
            .unwrap(),
        1
    );

    let rows = adapter
        .query(&mut client, "SELECT * FROM test WHERE zip=1390", &[])
        .await
        .unwrap();
    assert_eq!(
        serde_json::to_value(&rows).unwrap(),
        json!([
            {"id": 1, "name": "john", "zip": 1390, "city": "Nethen"},
            {"id": 3, "name": "grace", "zip": 1390, "city": "Grez"},
        ])
    );

    adapter.release_client(client).await;
    adapter.shutdown().await;
}

#[tokio::test]
async fn test_query_returning_no_data_gives_empty_sequence() {
    let db = common::setup(Some(0), &[TEST_TABLE]).await;
    let adapter = &db.adapter;
    let mut client = adapter.get_client().await.unwrap();

    adapter
        .exec(
            &mut client,
            "INSERT INTO test(name,zip,city) VALUES('john', 1390, 'Nethen')",
            &[],
        )
        .await
        .unwrap();

    let rows = adapter
        .query(&mut client, "SELECT * FROM test WHERE zip=1200", &[])
        .await
        .unwrap();
    assert!(rows.is_empty());

    adapter.release_client(client).await;
    adapter.shutdown().await;
}

#[tokio::test]
async fn test_exec_counts_rows_for_selects() {
    let db = common::setup(Some(0), &[TEST_TABLE]).await;
    let adapter = &db.adapter;
    let mut client = adapter.get_client().await.unwrap();

    adapter
        .exec(
            &mut client,
            "INSERT INTO test(name,zip,city) VALUES('john', 1390, 'Nethen'),('grace', 1390, 'Grez')",
            &[],
        )
        .await
        .unwrap();

    // Row-returning statement: exec reports the row count
    assert_eq!(
        adapter
            .exec(&mut client, "SELECT * FROM test WHERE zip=1390", &[])
            .await
            .unwrap(),
        2
    );
    // Mutation: exec reports the affected-row count
    assert_eq!(
        adapter
            .exec(&mut client, "UPDATE test SET city='Grez' WHERE zip=1390", &[])
            .await
            .unwrap(),
        2
    );

    adapter.release_client(client).await;
    adapter.shutdown().await;
}

#[tokio::test]
async fn test_statement_errors_carry_driver_codes() {
    let db = common::setup(Some(0), &[TEST_TABLE]).await;
    let adapter = &db.adapter;
    let mut client = adapter.get_client().await.unwrap();

    let err = adapter
        .query(&mut client, "SELECT * FROM no_such_table", &[])
        .await
        .unwrap_err();
    assert!(err.to_string().contains("no such table"));

    // The handle stays usable after a failed statement
    let rows = adapter
        .query(&mut client, "SELECT * FROM test", &[])
        .await
        .unwrap();
    assert!(rows.is_empty());

    adapter.release_client(client).await;
    adapter.shutdown().await;
}

#[tokio::test]
async fn test_pooled_clients_share_one_database() {
    let db = common::setup(Some(10), &[TEST_TABLE]).await;
    let adapter = &db.adapter;

    let mut first = adapter.get_client().await.unwrap();
    assert_eq!(
        adapter
            .exec(
                &mut first,
                "INSERT INTO test(name,zip,city) VALUES('john', 1390, 'Nethen')",
                &[],
            )
            .await
            .unwrap(),
        1
    );
    assert_eq!(
        adapter
            .exec(
                &mut first,
                "INSERT INTO test(name,zip,city) VALUES('mary', 1300, 'Jodoigne')",
                &[],
            )
            .await
            .unwrap(),
        1
    );

    let mut second = adapter.get_client().await.unwrap();
    assert_eq!(
        adapter
            .exec(
                &mut second,
                "INSERT INTO test(name,zip,city) VALUES('grace', 1390, 'Grez')",
                &[],
            )
            .await
            .unwrap(),
        1
    );

    let mut third = adapter.get_client().await.unwrap();
    let rows = adapter
        .query(&mut third, "SELECT * FROM test WHERE zip=1300", &[])
        .await
        .unwrap();
    assert_eq!(
        serde_json::to_value(&rows).unwrap(),
        json!([{"id": 2, "name": "mary", "zip": 1300, "city": "Jodoigne"}])
    );

    adapter.release_client(first).await;
    adapter.release_client(second).await;
    adapter.release_client(third).await;
    assert_eq!(adapter.active_clients(), 0);
    adapter.shutdown().await;
}
