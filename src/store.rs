use sqlx::SqlitePool;
use thiserror::Error;

use crate::id::new_uuid_v7;
use crate::model::{Balance, Client, Currency, Operation, KIND_NORMAL};
use crate::time::now_ms;

const DOMAIN_TABLES: &[&str] = &["currencies", "clients", "operations", "balances"];

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid table {0}")]
    InvalidTable(String),
    #[error("id not found: {0}")]
    NotFound(String),
    #[error("referenced client {0} is missing or deleted")]
    ClientUnavailable(String),
    #[error("referenced currency {0} is missing or deleted")]
    CurrencyUnavailable(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

fn ensure_table(table: &str) -> Result<(), StoreError> {
    if DOMAIN_TABLES.contains(&table) {
        Ok(())
    } else {
        Err(StoreError::InvalidTable(table.to_string()))
    }
}

/// Tombstone a row. Rows are never physically removed; `deleted = 1` is
/// what the push engine propagates to the remote.
pub async fn set_deleted(pool: &SqlitePool, table: &str, id: &str) -> Result<(), StoreError> {
    ensure_table(table)?;
    let sql = format!("UPDATE {table} SET deleted = 1, updated_at = ? WHERE id = ?");
    let res = sqlx::query(&sql)
        .bind(now_ms())
        .bind(id)
        .execute(pool)
        .await?;
    if res.rows_affected() == 0 {
        return Err(StoreError::NotFound(id.to_string()));
    }
    Ok(())
}

/// Undo a soft delete.
pub async fn clear_deleted(pool: &SqlitePool, table: &str, id: &str) -> Result<(), StoreError> {
    ensure_table(table)?;
    let sql = format!("UPDATE {table} SET deleted = 0, updated_at = ? WHERE id = ?");
    let res = sqlx::query(&sql)
        .bind(now_ms())
        .bind(id)
        .execute(pool)
        .await?;
    if res.rows_affected() == 0 {
        return Err(StoreError::NotFound(id.to_string()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Currencies
// ---------------------------------------------------------------------------

pub async fn create_currency(
    pool: &SqlitePool,
    currency_no: i64,
    name: &str,
) -> Result<Currency, StoreError> {
    let now = now_ms();
    let row = Currency {
        id: new_uuid_v7(),
        currency_no,
        name: name.to_string(),
        created_at: now,
        updated_at: now,
        deleted: false,
    };
    sqlx::query(
        "INSERT INTO currencies (id, currency_no, name, created_at, updated_at, deleted)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&row.id)
    .bind(row.currency_no)
    .bind(&row.name)
    .bind(row.created_at)
    .bind(row.updated_at)
    .bind(row.deleted)
    .execute(pool)
    .await?;
    Ok(row)
}

pub async fn list_currencies(pool: &SqlitePool) -> Result<Vec<Currency>, StoreError> {
    Ok(
        sqlx::query_as::<_, Currency>("SELECT * FROM currencies ORDER BY currency_no, id")
            .fetch_all(pool)
            .await?,
    )
}

/// Active = `deleted` false; remote docs may carry null, but locally the
/// column is always concrete.
pub async fn list_active_currencies(pool: &SqlitePool) -> Result<Vec<Currency>, StoreError> {
    Ok(sqlx::query_as::<_, Currency>(
        "SELECT * FROM currencies WHERE deleted = 0 ORDER BY currency_no, id",
    )
    .fetch_all(pool)
    .await?)
}

pub async fn find_currency(pool: &SqlitePool, id: &str) -> Result<Option<Currency>, StoreError> {
    Ok(
        sqlx::query_as::<_, Currency>("SELECT * FROM currencies WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await?,
    )
}

// ---------------------------------------------------------------------------
// Clients
// ---------------------------------------------------------------------------

pub async fn create_client(
    pool: &SqlitePool,
    client_no: i64,
    name: &str,
    contact: &str,
) -> Result<Client, StoreError> {
    let now = now_ms();
    let row = Client {
        id: new_uuid_v7(),
        client_no,
        name: name.to_string(),
        contact: contact.to_string(),
        created_at: now,
        updated_at: now,
        deleted: false,
    };
    sqlx::query(
        "INSERT INTO clients (id, client_no, name, contact, created_at, updated_at, deleted)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&row.id)
    .bind(row.client_no)
    .bind(&row.name)
    .bind(&row.contact)
    .bind(row.created_at)
    .bind(row.updated_at)
    .bind(row.deleted)
    .execute(pool)
    .await?;
    Ok(row)
}

pub async fn list_clients(pool: &SqlitePool) -> Result<Vec<Client>, StoreError> {
    Ok(
        sqlx::query_as::<_, Client>("SELECT * FROM clients ORDER BY client_no, id")
            .fetch_all(pool)
            .await?,
    )
}

pub async fn list_active_clients(pool: &SqlitePool) -> Result<Vec<Client>, StoreError> {
    Ok(
        sqlx::query_as::<_, Client>(
            "SELECT * FROM clients WHERE deleted = 0 ORDER BY client_no, id",
        )
        .fetch_all(pool)
        .await?,
    )
}

pub async fn find_client(pool: &SqlitePool, id: &str) -> Result<Option<Client>, StoreError> {
    Ok(sqlx::query_as::<_, Client>("SELECT * FROM clients WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?)
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

pub struct NewOperation<'a> {
    pub client_id: &'a str,
    pub kind: &'a str,
    pub value: f64,
    pub currency_id: Option<&'a str>,
    pub time_ms: Option<i64>,
    pub description: Option<&'a str>,
}

impl<'a> NewOperation<'a> {
    pub fn normal(client_id: &'a str, value: f64, currency_id: &'a str) -> Self {
        Self {
            client_id,
            kind: KIND_NORMAL,
            value,
            currency_id: Some(currency_id),
            time_ms: None,
            description: None,
        }
    }
}

/// Create an operation. The parent client must exist and be active; the
/// currency, when given, likewise. Operations are the sole owners of the
/// client link; there is no back-reference list to maintain.
pub async fn create_operation(
    pool: &SqlitePool,
    op: NewOperation<'_>,
) -> Result<Operation, StoreError> {
    let client = find_client(pool, op.client_id).await?;
    match client {
        Some(c) if !c.deleted => {}
        _ => return Err(StoreError::ClientUnavailable(op.client_id.to_string())),
    }
    if let Some(cur_id) = op.currency_id {
        match find_currency(pool, cur_id).await? {
            Some(c) if !c.deleted => {}
            _ => return Err(StoreError::CurrencyUnavailable(cur_id.to_string())),
        }
    }

    let now = now_ms();
    let row = Operation {
        id: new_uuid_v7(),
        client_id: op.client_id.to_string(),
        operation_no: now,
        kind: op.kind.to_string(),
        value: op.value,
        currency_id: op.currency_id.map(str::to_string),
        time_ms: op.time_ms.or(Some(now)),
        description: op.description.map(str::to_string),
        created_at: now,
        updated_at: now,
        deleted: false,
    };
    insert_operation(pool, &row).await?;
    Ok(row)
}

pub(crate) async fn insert_operation(
    pool: &SqlitePool,
    row: &Operation,
) -> Result<(), StoreError> {
    sqlx::query(
        "INSERT INTO operations
           (id, client_id, operation_no, kind, value, currency_id, time_ms, description,
            created_at, updated_at, deleted)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&row.id)
    .bind(&row.client_id)
    .bind(row.operation_no)
    .bind(&row.kind)
    .bind(row.value)
    .bind(&row.currency_id)
    .bind(row.time_ms)
    .bind(&row.description)
    .bind(row.created_at)
    .bind(row.updated_at)
    .bind(row.deleted)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn list_operations(pool: &SqlitePool) -> Result<Vec<Operation>, StoreError> {
    Ok(
        sqlx::query_as::<_, Operation>("SELECT * FROM operations ORDER BY created_at, id")
            .fetch_all(pool)
            .await?,
    )
}

/// A client's operations, newest first. This is a live query; clients do
/// not carry a denormalized operation list.
pub async fn client_operations(
    pool: &SqlitePool,
    client_id: &str,
) -> Result<Vec<Operation>, StoreError> {
    Ok(sqlx::query_as::<_, Operation>(
        "SELECT * FROM operations
         WHERE client_id = ? AND deleted = 0
         ORDER BY time_ms DESC, id DESC",
    )
    .bind(client_id)
    .fetch_all(pool)
    .await?)
}

pub async fn find_operation(pool: &SqlitePool, id: &str) -> Result<Option<Operation>, StoreError> {
    Ok(
        sqlx::query_as::<_, Operation>("SELECT * FROM operations WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await?,
    )
}

// ---------------------------------------------------------------------------
// Balances (legacy)
// ---------------------------------------------------------------------------

pub async fn list_balances(pool: &SqlitePool) -> Result<Vec<Balance>, StoreError> {
    Ok(
        sqlx::query_as::<_, Balance>("SELECT * FROM balances ORDER BY id")
            .fetch_all(pool)
            .await?,
    )
}
