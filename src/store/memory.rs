use super::{AccessCondition, StoreClient, token};
use crate::collection::CollectionSpec;
use crate::document::{Document, ID_FIELD, JsonMap};
use crate::errors::DbError;
use crate::query::{FeedResponse, Projection, QueryRequest, eval_filter};
use crate::types::{CollectionLink, DocumentId, ETag};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::sync::Arc;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;
use tokio::sync::{Semaphore, SemaphorePermit};

/// Page size used when a request leaves `max_item_count` unset.
pub const DEFAULT_MAX_ITEM_COUNT: usize = 100;
const DEFAULT_CONNECTIONS: usize = 200;

struct CollectionState {
    spec: CollectionSpec,
    // insertion order; a replace keeps its slot
    docs: BTreeMap<u64, Document>,
    by_id: HashMap<DocumentId, u64>,
    next_seq: u64,
}

impl CollectionState {
    fn new(spec: CollectionSpec) -> Self {
        Self { spec, docs: BTreeMap::new(), by_id: HashMap::new(), next_seq: 1 }
    }

    fn live(&self, id: &DocumentId, now: DateTime<Utc>) -> Option<(u64, &Document)> {
        let seq = *self.by_id.get(id)?;
        let doc = self.docs.get(&seq)?;
        (!doc.is_expired_at(self.spec.default_ttl(), now)).then_some((seq, doc))
    }

    fn purge_expired(&mut self, now: DateTime<Utc>) -> usize {
        let ttl = self.spec.default_ttl();
        let expired: Vec<u64> = self
            .docs
            .iter()
            .filter(|(_, d)| d.is_expired_at(ttl, now))
            .map(|(seq, _)| *seq)
            .collect();
        for seq in &expired {
            if let Some(doc) = self.docs.remove(seq) {
                self.by_id.remove(&doc.id);
            }
        }
        expired.len()
    }
}

#[derive(Default)]
struct MemoryState {
    databases: HashMap<String, HashMap<String, CollectionState>>,
}

impl MemoryState {
    fn collection(&self, link: &CollectionLink) -> Result<&CollectionState, DbError> {
        self.databases
            .get(&link.database)
            .ok_or_else(|| DbError::NoSuchDatabase(link.database.clone()))?
            .get(&link.collection)
            .ok_or_else(|| DbError::NoSuchCollection(link.to_string()))
    }

    fn collection_mut(&mut self, link: &CollectionLink) -> Result<&mut CollectionState, DbError> {
        self.databases
            .get_mut(&link.database)
            .ok_or_else(|| DbError::NoSuchDatabase(link.database.clone()))?
            .get_mut(&link.collection)
            .ok_or_else(|| DbError::NoSuchCollection(link.to_string()))
    }
}

/// In-process document store.
///
/// Clones share the same data. Calls never hold the state lock across an
/// await, and at most `max_connections` calls are in flight at once.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<RwLock<MemoryState>>,
    permits: Arc<Semaphore>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::with_connection_limit(DEFAULT_CONNECTIONS)
    }

    #[must_use]
    pub fn with_connection_limit(max_connections: usize) -> Self {
        Self {
            inner: Arc::new(RwLock::new(MemoryState::default())),
            permits: Arc::new(Semaphore::new(max_connections.max(1))),
        }
    }

    async fn connection(&self) -> Result<SemaphorePermit<'_>, DbError> {
        self.permits.acquire().await.map_err(|_| DbError::Transient("store is shut down".into()))
    }

    /// Settings the collection was created with.
    #[must_use]
    pub fn collection_spec(&self, link: &CollectionLink) -> Option<CollectionSpec> {
        self.inner.read().collection(link).ok().map(|c| c.spec.clone())
    }

    /// Number of live (unexpired) documents.
    #[must_use]
    pub fn document_count(&self, link: &CollectionLink) -> usize {
        let now = Utc::now();
        self.inner.read().collection(link).map_or(0, |c| {
            let ttl = c.spec.default_ttl();
            c.docs.values().filter(|d| !d.is_expired_at(ttl, now)).count()
        })
    }

    /// Drops every document whose TTL has run out at `now`. Returns how many went.
    pub fn purge_expired_at(&self, now: DateTime<Utc>) -> usize {
        let mut state = self.inner.write();
        state
            .databases
            .values_mut()
            .flat_map(HashMap::values_mut)
            .map(|c| c.purge_expired(now))
            .sum()
    }

    /// Spawns a maintenance thread purging expired documents every `every`.
    /// The thread stops when the returned handle is dropped.
    #[must_use]
    pub fn spawn_ttl_sweeper(&self, every: Duration) -> SweeperHandle {
        let (tx, rx) = mpsc::channel::<()>();
        let store = self.clone();
        let thread = thread::Builder::new()
            .name("eventrepo-ttl-sweeper".into())
            .spawn(move || {
                while let Err(mpsc::RecvTimeoutError::Timeout) = rx.recv_timeout(every) {
                    let purged = store.purge_expired_at(Utc::now());
                    if purged > 0 {
                        log::debug!("ttl sweep purged {purged} documents");
                    }
                }
            })
            .map_err(|e| log::error!("failed to spawn ttl sweeper: {e}"))
            .ok();
        SweeperHandle { stop: Some(tx), thread }
    }
}

/// Stops the TTL sweeper thread on drop.
pub struct SweeperHandle {
    stop: Option<mpsc::Sender<()>>,
    thread: Option<thread::JoinHandle<()>>,
}

impl SweeperHandle {
    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.thread.is_some()
    }
}

impl Drop for SweeperHandle {
    fn drop(&mut self) {
        if let Some(tx) = self.stop.take() {
            let _ = tx.send(());
        }
        if let Some(t) = self.thread.take() {
            let _ = t.join();
        }
    }
}

fn project(doc: &Document, projection: Projection) -> Value {
    match projection {
        Projection::Full => Value::Object(doc.body.clone()),
        Projection::Marker => Value::Bool(true),
    }
}

#[async_trait::async_trait]
impl StoreClient for MemoryStore {
    async fn ensure_database(&self, database: &str) -> Result<bool, DbError> {
        let _conn = self.connection().await?;
        let mut state = self.inner.write();
        if state.databases.contains_key(database) {
            return Ok(false);
        }
        state.databases.insert(database.to_string(), HashMap::new());
        Ok(true)
    }

    async fn ensure_collection(
        &self,
        database: &str,
        spec: &CollectionSpec,
    ) -> Result<bool, DbError> {
        let _conn = self.connection().await?;
        let mut state = self.inner.write();
        let db = state
            .databases
            .get_mut(database)
            .ok_or_else(|| DbError::NoSuchDatabase(database.to_string()))?;
        if db.contains_key(&spec.id) {
            return Ok(false);
        }
        db.insert(spec.id.clone(), CollectionState::new(spec.clone()));
        Ok(true)
    }

    async fn create_document(
        &self,
        link: &CollectionLink,
        body: JsonMap,
    ) -> Result<Document, DbError> {
        let _conn = self.connection().await?;
        let id = match body.get(ID_FIELD) {
            Some(Value::String(s)) if !s.is_empty() => DocumentId(s.clone()),
            _ => return Err(DbError::InvalidArgument("document needs a non-empty string `id`".into())),
        };
        let now = Utc::now();
        let mut state = self.inner.write();
        let col = state.collection_mut(link)?;
        if col.live(&id, now).is_some() {
            return Err(DbError::DocumentAlreadyExists(id.0));
        }
        // an expired leftover with the same id is replaced by the new document
        if let Some(old) = col.by_id.remove(&id) {
            col.docs.remove(&old);
        }
        let doc = Document::new(id.clone(), body, ETag::fresh(), now);
        let seq = col.next_seq;
        col.next_seq += 1;
        col.docs.insert(seq, doc.clone());
        col.by_id.insert(id, seq);
        Ok(doc)
    }

    async fn read_document(
        &self,
        link: &CollectionLink,
        id: &DocumentId,
    ) -> Result<Document, DbError> {
        let _conn = self.connection().await?;
        let state = self.inner.read();
        let col = state.collection(link)?;
        col.live(id, Utc::now())
            .map(|(_, d)| d.clone())
            .ok_or_else(|| DbError::NoSuchDocument(id.0.clone()))
    }

    async fn replace_document(
        &self,
        link: &CollectionLink,
        document: &Document,
        condition: AccessCondition,
    ) -> Result<Document, DbError> {
        let _conn = self.connection().await?;
        let now = Utc::now();
        let mut state = self.inner.write();
        let col = state.collection_mut(link)?;
        let (seq, current) = col
            .live(&document.id, now)
            .ok_or_else(|| DbError::NoSuchDocument(document.id.0.clone()))?;
        if let AccessCondition::IfMatch(expected) = &condition
            && current.etag != *expected
        {
            return Err(DbError::Conflict { id: document.id.0.clone(), etag: expected.0.clone() });
        }
        let next = Document::new(document.id.clone(), document.body.clone(), ETag::fresh(), now);
        col.docs.insert(seq, next.clone());
        Ok(next)
    }

    async fn query(
        &self,
        link: &CollectionLink,
        request: &QueryRequest,
    ) -> Result<FeedResponse, DbError> {
        let _conn = self.connection().await?;
        let limit = request.max_item_count.unwrap_or(DEFAULT_MAX_ITEM_COUNT);
        if limit == 0 {
            return Err(DbError::InvalidArgument("max item count must be positive".into()));
        }
        let after = token::decode(&request.continuation)?;
        let state = self.inner.read();
        let col = state.collection(link)?;
        col.spec.indexing_policy.ensure_covers(&request.filter)?;

        let now = Utc::now();
        let ttl = col.spec.default_ttl();
        let lower = after.map_or(Bound::Unbounded, Bound::Excluded);
        let mut items = Vec::with_capacity(limit.min(DEFAULT_MAX_ITEM_COUNT));
        let mut last_seq = None;
        let mut more = false;
        for (seq, doc) in col.docs.range((lower, Bound::Unbounded)) {
            if doc.is_expired_at(ttl, now) || !eval_filter(&doc.body, &request.filter) {
                continue;
            }
            if items.len() == limit {
                more = true;
                break;
            }
            items.push(project(doc, request.projection));
            last_seq = Some(*seq);
        }
        let continuation = if more { last_seq.map(token::encode) } else { None };
        Ok(FeedResponse { items, continuation })
    }

    async fn shutdown(&self) -> Result<(), DbError> {
        self.permits.close();
        Ok(())
    }
}
