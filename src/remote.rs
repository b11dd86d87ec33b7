use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::time::now_ms;

/// The four remote collections, keyed by document id. Collection names match
/// what the legacy backend used, so ids survive round-trips untranslated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Currencies,
    Clients,
    Operations,
    Balances,
}

impl Collection {
    pub fn name(self) -> &'static str {
        match self {
            Collection::Currencies => "currencies",
            Collection::Clients => "clients",
            Collection::Operations => "operations",
            Collection::Balances => "balances",
        }
    }
}

/// A document as the remote hands it back: its id plus an untyped field map.
/// Typed parsing happens in `model` so schema drift stays in one place.
#[derive(Debug, Clone)]
pub struct RemoteDocument {
    pub id: String,
    pub fields: Value,
}

/// One field of a pending merge-write. `ServerTimestamp` is the sentinel the
/// backend materializes at commit time, for `updatedAt`-style fields the
/// client must not stamp from its own clock.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Json(Value),
    ServerTimestamp,
}

impl From<Value> for FieldValue {
    fn from(v: Value) -> Self {
        FieldValue::Json(v)
    }
}

/// A single pending merge-upsert: create the document if absent, overwrite
/// exactly the named fields if present, leave every other remote field
/// untouched. Never a full replace.
#[derive(Debug, Clone)]
pub struct MergeWrite {
    pub collection: Collection,
    pub doc_id: String,
    pub fields: BTreeMap<String, FieldValue>,
}

/// Accumulator for one atomic multi-document commit. The caller bounds its
/// size; the store promises all-or-nothing per commit.
#[derive(Debug, Default)]
pub struct WriteBatch {
    writes: Vec<MergeWrite>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn merge(
        &mut self,
        collection: Collection,
        doc_id: impl Into<String>,
        fields: BTreeMap<String, FieldValue>,
    ) {
        self.writes.push(MergeWrite {
            collection,
            doc_id: doc_id.into(),
            fields,
        });
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    pub fn into_writes(self) -> Vec<MergeWrite> {
        self.writes
    }
}

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("remote read failed: {0}")]
    Read(String),
    #[error("remote write failed: {0}")]
    Write(String),
}

/// The remote document store collaborator. Production backends live behind
/// this seam; tests and offline runs use [`MemoryRemote`].
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// All documents in `collection` whose owner field equals `owner_id`.
    async fn query_owned(
        &self,
        collection: Collection,
        owner_id: &str,
    ) -> Result<Vec<RemoteDocument>, RemoteError>;

    /// Commit a batch of merge-writes atomically.
    async fn commit(&self, batch: WriteBatch) -> Result<(), RemoteError>;

    /// Remove a single document. Sync never calls this (deletions travel as
    /// tombstones); it exists for out-of-band cleanup.
    async fn delete(&self, collection: Collection, doc_id: &str) -> Result<(), RemoteError>;
}

// ---------------------------------------------------------------------------
// In-memory backend
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct MemoryState {
    collections: HashMap<Collection, HashMap<String, Map<String, Value>>>,
    fail_commits_after: Option<usize>,
}

/// In-memory remote store. Backs the test suite and offline use; also the
/// reference semantics for merge-writes and the server-timestamp sentinel.
#[derive(Debug, Default)]
pub struct MemoryRemote {
    state: Mutex<MemoryState>,
    commits: AtomicUsize,
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful batch commits so far.
    pub fn commit_count(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    /// Make every commit after the next `n` successful ones fail, to
    /// exercise mid-push failure handling.
    pub fn fail_commits_after(&self, n: usize) {
        self.lock().fail_commits_after = Some(n);
    }

    /// Seed a document directly, bypassing batching. Test setup only.
    pub fn insert_doc(&self, collection: Collection, doc_id: &str, fields: Value) {
        let Value::Object(map) = fields else {
            panic!("document fields must be a JSON object");
        };
        self.lock()
            .collections
            .entry(collection)
            .or_default()
            .insert(doc_id.to_string(), map);
    }

    /// Read a document back verbatim.
    pub fn get_doc(&self, collection: Collection, doc_id: &str) -> Option<Value> {
        self.lock()
            .collections
            .get(&collection)
            .and_then(|docs| docs.get(doc_id))
            .map(|m| Value::Object(m.clone()))
    }

    pub fn doc_count(&self, collection: Collection) -> usize {
        self.lock()
            .collections
            .get(&collection)
            .map(|docs| docs.len())
            .unwrap_or(0)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl RemoteStore for MemoryRemote {
    async fn query_owned(
        &self,
        collection: Collection,
        owner_id: &str,
    ) -> Result<Vec<RemoteDocument>, RemoteError> {
        let state = self.lock();
        let mut out = Vec::new();
        if let Some(docs) = state.collections.get(&collection) {
            for (id, fields) in docs {
                if fields.get("userId").and_then(Value::as_str) == Some(owner_id) {
                    out.push(RemoteDocument {
                        id: id.clone(),
                        fields: Value::Object(fields.clone()),
                    });
                }
            }
        }
        // deterministic order for tests
        out.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(out)
    }

    async fn commit(&self, batch: WriteBatch) -> Result<(), RemoteError> {
        let mut state = self.lock();
        if let Some(remaining) = state.fail_commits_after {
            if remaining == 0 {
                return Err(RemoteError::Write("injected commit failure".into()));
            }
            state.fail_commits_after = Some(remaining - 1);
        }

        let server_now = now_ms();
        for write in batch.into_writes() {
            let doc = state
                .collections
                .entry(write.collection)
                .or_default()
                .entry(write.doc_id)
                .or_default();
            for (key, value) in write.fields {
                let materialized = match value {
                    FieldValue::Json(v) => v,
                    FieldValue::ServerTimestamp => Value::from(server_now),
                };
                doc.insert(key, materialized);
            }
        }
        drop(state);

        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn delete(&self, collection: Collection, doc_id: &str) -> Result<(), RemoteError> {
        let mut state = self.lock();
        if let Some(docs) = state.collections.get_mut(&collection) {
            docs.remove(doc_id);
        }
        Ok(())
    }
}
