use std::collections::BTreeMap;

use serde_json::Value;
use sqlx::SqlitePool;
use tracing::info;

use crate::auth::User;
use crate::model::{Balance, Client, Currency, Operation};
use crate::remote::{Collection, FieldValue, RemoteStore, WriteBatch};
use crate::store;

use super::{PushProgress, SyncError, BATCH_LIMIT, BATCH_YIELD};

/// Push the entire local store to the remote, tombstones included, so the
/// remote mirrors local deletion state.
///
/// Writes go out in size-bounded batches; each batch commits atomically but
/// the push as a whole is not atomic. A failure mid-way leaves every batch
/// committed so far in place, and retrying from scratch is safe because
/// every write is a merge-upsert keyed by the stable document id. The loop
/// yields briefly after each commit so a UI event loop driving it stays
/// responsive. Every operation is pushed exactly once, as a flat pass with
/// `client_id` stamped as a plain string key.
pub async fn push(
    pool: &SqlitePool,
    remote: &dyn RemoteStore,
    user: Option<&User>,
    on_progress: Option<PushProgress<'_>>,
) -> Result<(), SyncError> {
    let user = user.ok_or(SyncError::NotSignedIn)?;

    let currencies = store::list_currencies(pool).await?;
    let clients = store::list_clients(pool).await?;
    let balances = store::list_balances(pool).await?;
    let operations = store::list_operations(pool).await?;

    let total = currencies.len() + clients.len() + balances.len() + operations.len();
    info!(
        target = "tallybook",
        event = "push_started",
        user = %user.id,
        currencies = currencies.len(),
        clients = clients.len(),
        balances = balances.len(),
        operations = operations.len()
    );

    let mut batcher = Batcher {
        remote,
        batch: WriteBatch::new(),
        processed: 0,
        total,
        commits: 0,
        on_progress,
    };

    for cur in &currencies {
        batcher
            .write(Collection::Currencies, &cur.id, currency_fields(cur, user))
            .await?;
    }
    for client in &clients {
        batcher
            .write(Collection::Clients, &client.id, client_fields(client, user))
            .await?;
    }
    for bal in &balances {
        batcher
            .write(Collection::Balances, &bal.id, balance_fields(bal, user))
            .await?;
    }
    for op in &operations {
        batcher
            .write(Collection::Operations, &op.id, operation_fields(op, user))
            .await?;
    }

    batcher.flush().await?;
    if let Some(cb) = batcher.on_progress.as_deref_mut() {
        cb(100);
    }

    info!(
        target = "tallybook",
        event = "push_complete",
        user = %user.id,
        records = total,
        batches = batcher.commits
    );
    Ok(())
}

struct Batcher<'r, 'p> {
    remote: &'r dyn RemoteStore,
    batch: WriteBatch,
    processed: usize,
    total: usize,
    commits: usize,
    on_progress: Option<PushProgress<'p>>,
}

impl Batcher<'_, '_> {
    async fn write(
        &mut self,
        collection: Collection,
        doc_id: &str,
        fields: BTreeMap<String, FieldValue>,
    ) -> Result<(), SyncError> {
        self.batch.merge(collection, doc_id, fields);
        self.processed += 1;

        if let Some(cb) = self.on_progress.as_deref_mut() {
            let pct = if self.total == 0 {
                100
            } else {
                (self.processed * 100 / self.total) as u8
            };
            cb(pct);
        }

        if self.batch.len() >= BATCH_LIMIT {
            self.flush().await?;
            tokio::time::sleep(BATCH_YIELD).await;
        }
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), SyncError> {
        if self.batch.is_empty() {
            return Ok(());
        }
        let batch = std::mem::take(&mut self.batch);
        let size = batch.len();
        self.remote.commit(batch).await?;
        self.commits += 1;
        info!(
            target = "tallybook",
            event = "push_batch_committed",
            batch = self.commits,
            writes = size
        );
        Ok(())
    }
}

fn currency_fields(cur: &Currency, user: &User) -> BTreeMap<String, FieldValue> {
    let mut f = BTreeMap::new();
    f.insert("currency_id".into(), json(cur.currency_no));
    f.insert("name".into(), json(cur.name.clone()));
    f.insert("createdAt".into(), json(cur.created_at));
    f.insert("deleted".into(), json(cur.deleted));
    f.insert("userId".into(), json(user.id.clone()));
    f.insert("updatedAt".into(), FieldValue::ServerTimestamp);
    f
}

fn client_fields(client: &Client, user: &User) -> BTreeMap<String, FieldValue> {
    let mut f = BTreeMap::new();
    f.insert("Clients_id".into(), json(client.client_no));
    f.insert("Clients_name".into(), json(client.name.clone()));
    f.insert("Clients_contact".into(), json(client.contact.clone()));
    f.insert("userId".into(), json(user.id.clone()));
    f.insert("deleted".into(), json(client.deleted));
    f.insert("updatedAt".into(), FieldValue::ServerTimestamp);
    f
}

fn balance_fields(bal: &Balance, user: &User) -> BTreeMap<String, FieldValue> {
    let mut f = BTreeMap::new();
    f.insert("client_id".into(), json(bal.client_id.clone()));
    f.insert("balance_id".into(), json(bal.balance_no));
    f.insert("value".into(), json(bal.value));
    f.insert("currency".into(), json(bal.currency_id.clone()));
    f.insert("userId".into(), json(user.id.clone()));
    // legacy rows never carry a tombstone on the wire
    f.insert("deleted".into(), json(false));
    f.insert("updatedAt".into(), FieldValue::ServerTimestamp);
    f
}

fn operation_fields(op: &Operation, user: &User) -> BTreeMap<String, FieldValue> {
    let mut f = BTreeMap::new();
    f.insert("client_id".into(), json(op.client_id.clone()));
    f.insert("operation_id".into(), json(op.operation_no));
    f.insert("type".into(), json(op.kind.clone()));
    f.insert("value".into(), json(op.value));
    f.insert("currency".into(), json(op.currency_id.clone()));
    f.insert("time".into(), json(op.time_ms));
    f.insert(
        "desc".into(),
        json(op.description.clone().unwrap_or_default()),
    );
    f.insert("userId".into(), json(user.id.clone()));
    f.insert("deleted".into(), json(op.deleted));
    f.insert("createdAt".into(), json(op.created_at));
    f.insert("updatedAt".into(), FieldValue::ServerTimestamp);
    f
}

fn json(v: impl Into<Value>) -> FieldValue {
    FieldValue::Json(v.into())
}
