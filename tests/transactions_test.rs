//! Integration tests for transaction sequencing.
//!
//! These suites run unpooled: dropping a standalone connection discards any
//! transaction left open, which is exactly what the failure scenarios rely
//! on.

mod common;

use serde_json::json;

const ADDRESS_TABLE: &str = "CREATE TABLE address (id INTEGER PRIMARY KEY, \
     street TEXT NOT NULL, postcode INTEGER NOT NULL, city TEXT NOT NULL)";
const USER_TABLE: &str = "CREATE TABLE user (id INTEGER PRIMARY KEY, \
     name TEXT NOT NULL UNIQUE, address_id INTEGER REFERENCES address(id) ON DELETE CASCADE)";

#[tokio::test]
async fn test_commit_persists_changes() {
    let db = common::setup(Some(0), &[ADDRESS_TABLE, USER_TABLE]).await;
    let adapter = &db.adapter;

    let mut client = adapter.get_client().await.unwrap();
    adapter.start_transaction(&mut client, "rr").await.unwrap();
    assert_eq!(
        adapter
            .exec(
                &mut client,
                "INSERT INTO address(street,postcode,city) VALUES('Red avenue', 1390, 'Nethen')",
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
                "INSERT INTO address(street,postcode,city) \
                 VALUES('Purple avenue', 1300, 'Jodoigne'),('Green road', 1390, 'Grez')",
                &[],
            )
            .await
            .unwrap(),
        2
    );
    assert_eq!(
        adapter
            .exec(
                &mut client,
                "INSERT INTO user(name,address_id) VALUES('John', 2),('Mary', 3)",
                &[],
            )
            .await
            .unwrap(),
        2
    );

    // Uncommitted changes are visible on the transaction's own connection
    let rows = adapter
        .query(&mut client, "SELECT * FROM address WHERE postcode=1390", &[])
        .await
        .unwrap();
    assert_eq!(
        serde_json::to_value(&rows).unwrap(),
        json!([
            {"id": 1, "street": "Red avenue", "postcode": 1390, "city": "Nethen"},
            {"id": 3, "street": "Green road", "postcode": 1390, "city": "Grez"},
        ])
    );

    adapter.exec(&mut client, "COMMIT", &[]).await.unwrap();
    adapter.release_client(client).await;
    adapter.shutdown().await;

    // And still there for a fresh connection
    let fresh = common::reopen(&db, Some(0)).await;
    let mut client = fresh.get_client().await.unwrap();
    let addresses = fresh
        .query(&mut client, "SELECT * FROM address", &[])
        .await
        .unwrap();
    assert_eq!(addresses.len(), 3);
    let users = fresh
        .query(&mut client, "SELECT name FROM user ORDER BY name", &[])
        .await
        .unwrap();
    assert_eq!(
        serde_json::to_value(&users).unwrap(),
        json!([{"name": "John"}, {"name": "Mary"}])
    );
    fresh.release_client(client).await;
    fresh.shutdown().await;
}

#[tokio::test]
async fn test_uniqueness_violation_aborts_transaction() {
    let db = common::setup(Some(0), &[ADDRESS_TABLE, USER_TABLE]).await;
    let adapter = &db.adapter;

    // First transaction commits a user and their address
    let mut client = adapter.get_client().await.unwrap();
    adapter.start_transaction(&mut client, "rr").await.unwrap();
    adapter
        .exec(
            &mut client,
            "INSERT INTO address(street,postcode,city) VALUES('Red avenue', 1390, 'Nethen')",
            &[],
        )
        .await
        .unwrap();
    adapter
        .exec(
            &mut client,
            "INSERT INTO user(name,address_id) VALUES('John', 1)",
            &[],
        )
        .await
        .unwrap();
    adapter.exec(&mut client, "COMMIT", &[]).await.unwrap();
    adapter.release_client(client).await;

    // Second transaction inserts an address, then hits the unique name: the
    // violation surfaces and the commit is never reached
    let mut client = adapter.get_client().await.unwrap();
    adapter.start_transaction(&mut client, "rr").await.unwrap();
    adapter
        .exec(
            &mut client,
            "INSERT INTO address(street,postcode,city) VALUES('Green avenue', 1300, 'Jodoigne')",
            &[],
        )
        .await
        .unwrap();
    let err = adapter
        .exec(
            &mut client,
            "INSERT INTO user(name,address_id) VALUES('John', 2)",
            &[],
        )
        .await
        .unwrap_err();
    assert!(err.is_unique_violation());
    assert!(err.code().is_some());
    adapter.release_client(client).await;
    adapter.shutdown().await;

    // None of the second transaction's rows survived
    let fresh = common::reopen(&db, Some(0)).await;
    let mut client = fresh.get_client().await.unwrap();
    let addresses = fresh
        .query(&mut client, "SELECT * FROM address", &[])
        .await
        .unwrap();
    assert_eq!(
        serde_json::to_value(&addresses).unwrap(),
        json!([{"id": 1, "street": "Red avenue", "postcode": 1390, "city": "Nethen"}])
    );
    let users = fresh
        .query(&mut client, "SELECT * FROM user ORDER BY name", &[])
        .await
        .unwrap();
    assert_eq!(
        serde_json::to_value(&users).unwrap(),
        json!([{"id": 1, "name": "John", "address_id": 1}])
    );
    fresh.release_client(client).await;
    fresh.shutdown().await;
}

#[tokio::test]
async fn test_rollback_discards_changes() {
    let db = common::setup(Some(0), &[ADDRESS_TABLE, USER_TABLE]).await;
    let adapter = &db.adapter;

    let mut client = adapter.get_client().await.unwrap();
    adapter.start_transaction(&mut client, "rr").await.unwrap();
    assert_eq!(
        adapter
            .exec(
                &mut client,
                "INSERT INTO address(street,postcode,city) VALUES('Red avenue', 1390, 'Nethen')",
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
                "INSERT INTO user(name,address_id) VALUES('John', 1)",
                &[],
            )
            .await
            .unwrap(),
        1
    );
    adapter.exec(&mut client, "ROLLBACK", &[]).await.unwrap();
    adapter.release_client(client).await;
    adapter.shutdown().await;

    let fresh = common::reopen(&db, Some(0)).await;
    let mut client = fresh.get_client().await.unwrap();
    assert!(
        fresh
            .query(&mut client, "SELECT * FROM address", &[])
            .await
            .unwrap()
            .is_empty()
    );
    assert!(
        fresh
            .query(&mut client, "SELECT * FROM user", &[])
            .await
            .unwrap()
            .is_empty()
    );
    fresh.release_client(client).await;
    fresh.shutdown().await;
}

#[tokio::test]
async fn test_commit_and_rollback_helpers() {
    let db = common::setup(Some(0), &[ADDRESS_TABLE]).await;
    let adapter = &db.adapter;

    let mut client = adapter.get_client().await.unwrap();
    adapter.start_transaction(&mut client, "ser").await.unwrap();
    adapter
        .exec(
            &mut client,
            "INSERT INTO address(street,postcode,city) VALUES('Red avenue', 1390, 'Nethen')",
            &[],
        )
        .await
        .unwrap();
    adapter.rollback(&mut client).await.unwrap();

    adapter.start_transaction(&mut client, "rc").await.unwrap();
    adapter
        .exec(
            &mut client,
            "INSERT INTO address(street,postcode,city) VALUES('Green road', 1390, 'Grez')",
            &[],
        )
        .await
        .unwrap();
    adapter.commit(&mut client).await.unwrap();
    adapter.release_client(client).await;

    let mut client = adapter.get_client().await.unwrap();
    let rows = adapter
        .query(&mut client, "SELECT street FROM address", &[])
        .await
        .unwrap();
    assert_eq!(
        serde_json::to_value(&rows).unwrap(),
        json!([{"street": "Green road"}])
    );
    adapter.release_client(client).await;
    adapter.shutdown().await;
}

#[tokio::test]
async fn test_invalid_isolation_level_rejected_before_any_sql() {
    let db = common::setup(Some(0), &[ADDRESS_TABLE]).await;
    let adapter = &db.adapter;

    let mut client = adapter.get_client().await.unwrap();
    let err = adapter
        .start_transaction(&mut client, "xx")
        .await
        .unwrap_err();
    assert!(err.is_config_error());
    assert!(err.to_string().contains("isolation level"));

    // No transaction was opened: the next insert autocommits and is
    // immediately visible to a fresh connection
    adapter
        .exec(
            &mut client,
            "INSERT INTO address(street,postcode,city) VALUES('Red avenue', 1390, 'Nethen')",
            &[],
        )
        .await
        .unwrap();

    let fresh = common::reopen(&db, Some(0)).await;
    let mut other = fresh.get_client().await.unwrap();
    assert_eq!(
        fresh
            .query(&mut other, "SELECT * FROM address", &[])
            .await
            .unwrap()
            .len(),
        1
    );
    fresh.release_client(other).await;
    fresh.shutdown().await;

    adapter.release_client(client).await;
    adapter.shutdown().await;
}

#[tokio::test]
async fn test_all_isolation_levels_start() {
    let db = common::setup(Some(0), &[ADDRESS_TABLE]).await;
    let adapter = &db.adapter;

    for level in adapter.tx_isolation_levels() {
        let mut client = adapter.get_client().await.unwrap();
        adapter
            .start_transaction(&mut client, level.code())
            .await
            .unwrap();
        adapter.rollback(&mut client).await.unwrap();
        adapter.release_client(client).await;
    }
    adapter.shutdown().await;
}
