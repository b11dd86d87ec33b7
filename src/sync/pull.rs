use futures::try_join;
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::{debug, info, warn};

use crate::auth::User;
use crate::model::{parse_doc, ClientDoc, CurrencyDoc, OperationDoc};
use crate::remote::{Collection, RemoteDocument, RemoteStore};
use crate::time::now_ms;

use super::{PullProgress, SyncError};

/// Pull every remote document owned by `user` into the local store.
///
/// The three collection reads run concurrently and complete before a single
/// local write transaction opens, so a remote failure leaves the local store
/// untouched and a local failure rolls the whole pull back. Upserts are
/// keyed by document id and idempotent: replaying an unchanged pull is a
/// no-op. Operations whose parent client is missing or tombstoned are
/// skipped silently (they still count toward progress).
pub async fn pull(
    pool: &SqlitePool,
    remote: &dyn RemoteStore,
    user: Option<&User>,
    mut on_progress: Option<PullProgress<'_>>,
) -> Result<(), SyncError> {
    let user = user.ok_or(SyncError::NotSignedIn)?;

    let (currencies, clients, operations) = try_join!(
        remote.query_owned(Collection::Currencies, &user.id),
        remote.query_owned(Collection::Clients, &user.id),
        remote.query_owned(Collection::Operations, &user.id),
    )?;

    let total = currencies.len() + clients.len() + operations.len();
    info!(
        target = "tallybook",
        event = "pull_started",
        user = %user.id,
        currencies = currencies.len(),
        clients = clients.len(),
        operations = operations.len()
    );

    let mut processed = 0usize;
    let mut report = |processed: usize| {
        if total > 0 {
            if let Some(cb) = on_progress.as_deref_mut() {
                cb(processed as f64 / total as f64);
            }
        }
    };

    let mut tx = pool.begin().await?;
    let now = now_ms();

    for doc in &currencies {
        upsert_currency(&mut tx, doc, now).await?;
        processed += 1;
        report(processed);
    }

    for doc in &clients {
        upsert_client(&mut tx, doc, now).await?;
        processed += 1;
        report(processed);
    }

    let mut skipped = 0usize;
    for doc in &operations {
        if !upsert_operation(&mut tx, doc, now).await? {
            skipped += 1;
        }
        // skipped records still count toward completion
        processed += 1;
        report(processed);
    }

    tx.commit().await?;

    // The caller must observe completion even when total == 0.
    if let Some(cb) = on_progress.as_deref_mut() {
        cb(1.0);
    }

    info!(
        target = "tallybook",
        event = "pull_complete",
        user = %user.id,
        processed = processed,
        skipped = skipped
    );
    Ok(())
}

async fn upsert_currency(
    tx: &mut Transaction<'_, Sqlite>,
    doc: &RemoteDocument,
    now: i64,
) -> Result<(), SyncError> {
    let parsed: CurrencyDoc = match parse_doc(&doc.fields) {
        Ok(p) => p,
        Err(e) => {
            warn!(target = "tallybook", event = "pull_doc_malformed", collection = "currencies", id = %doc.id, error = %e);
            return Ok(());
        }
    };
    let row = parsed.normalize(&doc.id, now);

    // created_at is immutable post-creation; conflicts keep the local value.
    sqlx::query(
        "INSERT INTO currencies (id, currency_no, name, created_at, updated_at, deleted)
         VALUES (?, ?, ?, ?, ?, ?)
         ON CONFLICT(id) DO UPDATE SET
           currency_no = excluded.currency_no,
           name = excluded.name,
           updated_at = excluded.updated_at,
           deleted = excluded.deleted",
    )
    .bind(&row.id)
    .bind(row.currency_no)
    .bind(&row.name)
    .bind(row.created_at)
    .bind(row.updated_at)
    .bind(row.deleted)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

async fn upsert_client(
    tx: &mut Transaction<'_, Sqlite>,
    doc: &RemoteDocument,
    now: i64,
) -> Result<(), SyncError> {
    let parsed: ClientDoc = match parse_doc(&doc.fields) {
        Ok(p) => p,
        Err(e) => {
            warn!(target = "tallybook", event = "pull_doc_malformed", collection = "clients", id = %doc.id, error = %e);
            return Ok(());
        }
    };
    let row = parsed.normalize(&doc.id, now);

    sqlx::query(
        "INSERT INTO clients (id, client_no, name, contact, created_at, updated_at, deleted)
         VALUES (?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(id) DO UPDATE SET
           client_no = excluded.client_no,
           name = excluded.name,
           contact = excluded.contact,
           updated_at = excluded.updated_at,
           deleted = excluded.deleted",
    )
    .bind(&row.id)
    .bind(row.client_no)
    .bind(&row.name)
    .bind(&row.contact)
    .bind(row.created_at)
    .bind(row.updated_at)
    .bind(row.deleted)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// Returns false when the operation was skipped (orphaned or malformed).
async fn upsert_operation(
    tx: &mut Transaction<'_, Sqlite>,
    doc: &RemoteDocument,
    now: i64,
) -> Result<bool, SyncError> {
    let parsed: OperationDoc = match parse_doc(&doc.fields) {
        Ok(p) => p,
        Err(e) => {
            warn!(target = "tallybook", event = "pull_doc_malformed", collection = "operations", id = %doc.id, error = %e);
            return Ok(false);
        }
    };

    let Some(client_id) = parsed.client_id.clone().filter(|c| !c.is_empty()) else {
        debug!(target = "tallybook", event = "pull_operation_orphan", id = %doc.id, reason = "no client_id");
        return Ok(false);
    };

    let parent: Option<(bool,)> = sqlx::query_as("SELECT deleted FROM clients WHERE id = ?")
        .bind(&client_id)
        .fetch_optional(&mut **tx)
        .await?;
    match parent {
        Some((false,)) => {}
        Some((true,)) => {
            debug!(target = "tallybook", event = "pull_operation_orphan", id = %doc.id, client = %client_id, reason = "client tombstoned");
            return Ok(false);
        }
        None => {
            debug!(target = "tallybook", event = "pull_operation_orphan", id = %doc.id, client = %client_id, reason = "client missing");
            return Ok(false);
        }
    }

    // The currency link degrades to NULL when the referenced currency is
    // unknown locally; conversion then yields 0 on the read side.
    let currency_id = match &parsed.currency {
        Some(cur) => sqlx::query_scalar::<_, String>("SELECT id FROM currencies WHERE id = ?")
            .bind(cur)
            .fetch_optional(&mut **tx)
            .await?,
        None => None,
    };

    let row = parsed.normalize(&doc.id, currency_id, now);

    sqlx::query(
        "INSERT INTO operations
           (id, client_id, operation_no, kind, value, currency_id, time_ms, description,
            created_at, updated_at, deleted)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(id) DO UPDATE SET
           client_id = excluded.client_id,
           operation_no = excluded.operation_no,
           kind = excluded.kind,
           value = excluded.value,
           currency_id = excluded.currency_id,
           time_ms = excluded.time_ms,
           description = excluded.description,
           updated_at = excluded.updated_at,
           deleted = excluded.deleted",
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
    .execute(&mut **tx)
    .await?;
    Ok(true)
}
