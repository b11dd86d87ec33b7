#![allow(clippy::unwrap_used, clippy::expect_used, dead_code)]

use serde_json::json;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};

use tallybook::remote::{Collection, MemoryRemote};

pub async fn temp_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("connect sqlite::memory:");
    sqlx::query("PRAGMA foreign_keys=ON;")
        .execute(&pool)
        .await
        .unwrap();
    tallybook::migrate::apply_migrations(&pool)
        .await
        .expect("apply migrations");
    pool
}

/// Seed a minimal remote currency doc owned by `owner`.
pub fn seed_currency(remote: &MemoryRemote, id: &str, name: &str, owner: &str) {
    remote.insert_doc(
        Collection::Currencies,
        id,
        json!({
            "currency_id": 1,
            "name": name,
            "createdAt": 1_700_000_000_000i64,
            "updatedAt": 1_700_000_000_000i64,
            "userId": owner,
        }),
    );
}

pub fn seed_client(remote: &MemoryRemote, id: &str, name: &str, owner: &str) {
    remote.insert_doc(
        Collection::Clients,
        id,
        json!({
            "Clients_id": 1,
            "Clients_name": name,
            "Clients_contact": "+000",
            "createdAt": 1_700_000_000_000i64,
            "updatedAt": 1_700_000_000_000i64,
            "userId": owner,
        }),
    );
}

pub fn seed_operation(
    remote: &MemoryRemote,
    id: &str,
    client_id: &str,
    currency_id: &str,
    value: f64,
    owner: &str,
) {
    remote.insert_doc(
        Collection::Operations,
        id,
        json!({
            "client_id": client_id,
            "operation_id": 1,
            "type": "normal",
            "value": value,
            "currency": currency_id,
            "time": 1_700_000_100_000i64,
            "desc": "seeded",
            "createdAt": 1_700_000_000_000i64,
            "updatedAt": 1_700_000_000_000i64,
            "userId": owner,
        }),
    );
}

/// Collect progress values and assert they never decrease.
pub fn assert_monotonic<T: PartialOrd + Copy + std::fmt::Debug>(values: &[T]) {
    for pair in values.windows(2) {
        assert!(
            pair[0] <= pair[1],
            "progress went backwards: {:?} -> {:?}",
            pair[0],
            pair[1]
        );
    }
}
