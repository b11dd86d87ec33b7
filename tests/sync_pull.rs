mod util;

use anyhow::Result;
use serde_json::json;

use tallybook::remote::{Collection, MemoryRemote};
use tallybook::sync::{pull, SyncError};
use tallybook::{store, User};

#[tokio::test]
async fn pull_requires_sign_in() -> Result<()> {
    let pool = util::temp_pool().await;
    let remote = MemoryRemote::new();
    util::seed_currency(&remote, "cur-1", "USD", "u1");

    let err = pull(&pool, &remote, None, None).await.unwrap_err();
    assert!(matches!(err, SyncError::NotSignedIn));

    // precondition failure happens before any local write
    assert!(store::list_currencies(&pool).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn pull_upserts_all_record_kinds() -> Result<()> {
    let pool = util::temp_pool().await;
    let remote = MemoryRemote::new();
    let user = User::new("u1");

    util::seed_currency(&remote, "cur-1", "USD", "u1");
    util::seed_client(&remote, "cl-1", "Alice", "u1");
    util::seed_operation(&remote, "op-1", "cl-1", "cur-1", 50.0, "u1");

    let mut progress: Vec<f64> = Vec::new();
    pull(&pool, &remote, Some(&user), Some(&mut |f| progress.push(f))).await?;

    let currencies = store::list_currencies(&pool).await?;
    assert_eq!(currencies.len(), 1);
    assert_eq!(currencies[0].id, "cur-1");
    assert_eq!(currencies[0].name, "USD");
    assert!(!currencies[0].deleted);

    let clients = store::list_clients(&pool).await?;
    assert_eq!(clients.len(), 1);
    assert_eq!(clients[0].name, "Alice");
    assert_eq!(clients[0].contact, "+000");

    let ops = store::list_operations(&pool).await?;
    assert_eq!(ops.len(), 1);
    assert_eq!(ops[0].client_id, "cl-1");
    assert_eq!(ops[0].currency_id.as_deref(), Some("cur-1"));
    assert_eq!(ops[0].value, 50.0);
    assert_eq!(ops[0].time_ms, Some(1_700_000_100_000));

    util::assert_monotonic(&progress);
    assert_eq!(progress.last().copied(), Some(1.0));
    Ok(())
}

#[tokio::test]
async fn pull_ignores_other_owners() -> Result<()> {
    let pool = util::temp_pool().await;
    let remote = MemoryRemote::new();
    let user = User::new("u1");

    util::seed_currency(&remote, "cur-mine", "USD", "u1");
    util::seed_currency(&remote, "cur-theirs", "EUR", "u2");

    pull(&pool, &remote, Some(&user), None).await?;

    let currencies = store::list_currencies(&pool).await?;
    assert_eq!(currencies.len(), 1);
    assert_eq!(currencies[0].id, "cur-mine");
    Ok(())
}

#[tokio::test]
async fn pull_twice_is_idempotent() -> Result<()> {
    let pool = util::temp_pool().await;
    let remote = MemoryRemote::new();
    let user = User::new("u1");

    util::seed_currency(&remote, "cur-1", "USD", "u1");
    util::seed_client(&remote, "cl-1", "Alice", "u1");
    util::seed_operation(&remote, "op-1", "cl-1", "cur-1", 50.0, "u1");
    util::seed_operation(&remote, "op-2", "cl-1", "cur-1", -20.0, "u1");

    pull(&pool, &remote, Some(&user), None).await?;
    let first = (
        store::list_currencies(&pool).await?,
        store::list_clients(&pool).await?,
        store::list_operations(&pool).await?,
    );

    pull(&pool, &remote, Some(&user), None).await?;
    let second = (
        store::list_currencies(&pool).await?,
        store::list_clients(&pool).await?,
        store::list_operations(&pool).await?,
    );

    assert_eq!(first, second, "replaying an unchanged pull is a no-op");
    assert_eq!(second.2.len(), 2, "no duplicate operations on re-pull");
    Ok(())
}

#[tokio::test]
async fn orphaned_operation_is_skipped_and_progress_completes() -> Result<()> {
    let pool = util::temp_pool().await;
    let remote = MemoryRemote::new();
    let user = User::new("u1");

    util::seed_operation(&remote, "op-orphan", "cl-ghost", "cur-1", 10.0, "u1");

    let mut progress: Vec<f64> = Vec::new();
    pull(&pool, &remote, Some(&user), Some(&mut |f| progress.push(f))).await?;

    assert!(store::list_operations(&pool).await?.is_empty());
    util::assert_monotonic(&progress);
    assert_eq!(progress.last().copied(), Some(1.0));
    Ok(())
}

#[tokio::test]
async fn operation_of_tombstoned_client_is_skipped() -> Result<()> {
    let pool = util::temp_pool().await;
    let remote = MemoryRemote::new();
    let user = User::new("u1");

    // the client exists locally but is soft-deleted; the remote op is live
    let client = store::create_client(&pool, 1, "Gone", "").await?;
    store::set_deleted(&pool, "clients", &client.id).await?;
    util::seed_operation(&remote, "op-1", &client.id, "cur-1", 10.0, "u1");

    pull(&pool, &remote, Some(&user), None).await?;

    assert!(store::list_operations(&pool).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn unknown_currency_reference_degrades_to_null() -> Result<()> {
    let pool = util::temp_pool().await;
    let remote = MemoryRemote::new();
    let user = User::new("u1");

    util::seed_client(&remote, "cl-1", "Alice", "u1");
    util::seed_operation(&remote, "op-1", "cl-1", "cur-unknown", 10.0, "u1");

    pull(&pool, &remote, Some(&user), None).await?;

    let ops = store::list_operations(&pool).await?;
    assert_eq!(ops.len(), 1);
    assert_eq!(ops[0].currency_id, None);
    Ok(())
}

#[tokio::test]
async fn empty_remote_still_reports_completion() -> Result<()> {
    let pool = util::temp_pool().await;
    let remote = MemoryRemote::new();
    let user = User::new("u1");

    let mut progress: Vec<f64> = Vec::new();
    pull(&pool, &remote, Some(&user), Some(&mut |f| progress.push(f))).await?;

    assert_eq!(progress, vec![1.0]);
    Ok(())
}

#[tokio::test]
async fn heterogeneous_timestamps_normalize() -> Result<()> {
    let pool = util::temp_pool().await;
    let remote = MemoryRemote::new();
    let user = User::new("u1");

    remote.insert_doc(
        Collection::Currencies,
        "cur-iso",
        json!({
            "currency_id": 1,
            "name": "ISO",
            "createdAt": "2024-01-02T03:04:05Z",
            "updatedAt": {"seconds": 1_700_000_000, "nanoseconds": 0},
            "userId": "u1",
        }),
    );
    // no timestamps at all: both fall back to "now"
    remote.insert_doc(
        Collection::Currencies,
        "cur-bare",
        json!({"currency_id": 2, "name": "BARE", "userId": "u1"}),
    );

    let before = tallybook::time::now_ms();
    pull(&pool, &remote, Some(&user), None).await?;

    let iso = store::find_currency(&pool, "cur-iso").await?.unwrap();
    assert_eq!(iso.created_at, 1_704_164_645_000);
    assert_eq!(iso.updated_at, 1_700_000_000_000);

    let bare = store::find_currency(&pool, "cur-bare").await?.unwrap();
    assert!(bare.created_at >= before);
    assert!(bare.updated_at >= before);
    Ok(())
}

#[tokio::test]
async fn created_at_is_immutable_across_pulls() -> Result<()> {
    let pool = util::temp_pool().await;
    let remote = MemoryRemote::new();
    let user = User::new("u1");

    util::seed_currency(&remote, "cur-1", "USD", "u1");
    pull(&pool, &remote, Some(&user), None).await?;

    // remote rewrites both timestamps; only updated_at may move locally
    remote.insert_doc(
        Collection::Currencies,
        "cur-1",
        json!({
            "currency_id": 1,
            "name": "USD",
            "createdAt": 1_800_000_000_000i64,
            "updatedAt": 1_800_000_000_000i64,
            "userId": "u1",
        }),
    );
    pull(&pool, &remote, Some(&user), None).await?;

    let cur = store::find_currency(&pool, "cur-1").await?.unwrap();
    assert_eq!(cur.created_at, 1_700_000_000_000);
    assert_eq!(cur.updated_at, 1_800_000_000_000);
    Ok(())
}

#[tokio::test]
async fn tombstone_travels_through_pull() -> Result<()> {
    let pool = util::temp_pool().await;
    let remote = MemoryRemote::new();
    let user = User::new("u1");

    remote.insert_doc(
        Collection::Currencies,
        "cur-dead",
        json!({"currency_id": 1, "name": "DEAD", "deleted": true, "userId": "u1"}),
    );

    pull(&pool, &remote, Some(&user), None).await?;

    let cur = store::find_currency(&pool, "cur-dead").await?.unwrap();
    assert!(cur.deleted);
    assert!(store::list_active_currencies(&pool).await?.is_empty());
    Ok(())
}
