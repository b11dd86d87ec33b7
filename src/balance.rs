use sqlx::SqlitePool;

use crate::convert::{convert, RateTable};
use crate::model::KIND_CHECK;
use crate::store::{self, NewOperation, StoreError};

/// Live per-client, per-currency balance: the sum of active, non-checkpoint
/// operation values. Always recomputed from the operation set, never cached.
pub async fn client_balance(
    pool: &SqlitePool,
    client_id: &str,
    currency_id: &str,
) -> Result<f64, StoreError> {
    let sum: Option<f64> = sqlx::query_scalar(
        "SELECT SUM(value) FROM operations
         WHERE client_id = ? AND currency_id = ? AND kind != 'check' AND deleted = 0",
    )
    .bind(client_id)
    .bind(currency_id)
    .fetch_one(pool)
    .await?;
    Ok(sum.unwrap_or(0.0))
}

/// Pipe-separated audit snapshot of a client's balances, one segment per
/// active currency that actually has operations: `"{sum:.2} {name} |..."`.
pub async fn balance_snapshot(pool: &SqlitePool, client_id: &str) -> Result<String, StoreError> {
    let mut desc = String::new();
    for currency in store::list_active_currencies(pool).await? {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM operations
             WHERE client_id = ? AND currency_id = ? AND kind != 'check' AND deleted = 0",
        )
        .bind(client_id)
        .bind(&currency.id)
        .fetch_one(pool)
        .await?;
        if count == 0 {
            continue;
        }
        let sum = client_balance(pool, client_id, &currency.id).await?;
        desc.push_str(&format!("{sum:.2} {} |", currency.name));
    }
    Ok(desc)
}

/// Record a checkpoint: a zero-value `check` operation whose description is
/// the balance snapshot at creation time. Write-once; the snapshot is never
/// recomputed retroactively, and the row is excluded from every aggregate.
pub async fn create_checkpoint(
    pool: &SqlitePool,
    client_id: &str,
) -> Result<crate::model::Operation, StoreError> {
    let snapshot = balance_snapshot(pool, client_id).await?;
    let desc = if snapshot.is_empty() {
        "Checkpoint".to_string()
    } else {
        snapshot
    };
    let currencies = store::list_active_currencies(pool).await?;
    let currency_id = currencies.first().map(|c| c.id.as_str());

    store::create_operation(
        pool,
        NewOperation {
            client_id,
            kind: KIND_CHECK,
            value: 0.0,
            currency_id,
            time_ms: None,
            description: Some(&desc),
        },
    )
    .await
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Stats {
    pub income: f64,
    pub expense: f64,
    pub total: f64,
}

/// Income/expense over all active operations, converted into the base
/// currency with the caller's rate table. Operations without a resolvable
/// rate convert to 0 and drop out of both sides, by design.
pub async fn income_expense(
    pool: &SqlitePool,
    base_currency_id: &str,
    rates: &RateTable,
) -> Result<Stats, StoreError> {
    let rows: Vec<(f64, Option<String>)> = sqlx::query_as(
        "SELECT value, currency_id FROM operations WHERE kind != 'check' AND deleted = 0",
    )
    .fetch_all(pool)
    .await?;

    let mut stats = Stats::default();
    for (value, currency_id) in rows {
        let converted = match currency_id {
            Some(cur) => convert(value, &cur, base_currency_id, rates),
            // no currency on the row: nothing to convert against
            None => 0.0,
        };
        if converted > 0.0 {
            stats.income += converted;
        }
        if converted < 0.0 {
            stats.expense += converted;
        }
    }
    stats.total = stats.income + stats.expense;
    Ok(stats)
}
