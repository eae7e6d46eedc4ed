#![allow(dead_code)]

use eventrepo::collection::CollectionSpec;
use eventrepo::document::{Document, JsonMap};
use eventrepo::errors::DbError;
use eventrepo::geo::GeoPoint;
use eventrepo::model::{Address, Event};
use eventrepo::query::{FeedResponse, Projection, QueryRequest};
use eventrepo::store::{AccessCondition, MemoryStore, SharedStore, StoreClient};
use eventrepo::types::{CollectionLink, DocumentId};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Barrier;

pub const DB: &str = "EventDb";
pub const COLL: &str = "EventCollection";

pub fn link() -> CollectionLink {
    CollectionLink::new(DB, COLL)
}

/// A memory store with the test collection provisioned (index everything, no TTL).
pub async fn provisioned_store() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    store.ensure_database(DB).await.unwrap();
    store.ensure_collection(DB, &CollectionSpec::new(COLL)).await.unwrap();
    store
}

pub fn event(id: &str, lon: f64, lat: f64) -> Event {
    Event {
        id: id.to_string(),
        name: format!("event-{id}"),
        description: String::new(),
        location: GeoPoint::new(lon, lat),
        time: chrono::Utc::now(),
        address: Address {
            city: "Minsk".into(),
            street_name: "Main".into(),
            street_number: "1".into(),
        },
        visitors: None,
    }
}

pub fn body_of(value: serde_json::Value) -> JsonMap {
    value.as_object().cloned().unwrap()
}

/// Inserts `near` events at the centre and `far` events a long way off, interleaved.
pub async fn insert_events(store: &dyn StoreClient, near: usize, far: usize) {
    let total = near.max(far);
    for i in 0..total {
        if i < near {
            let (_, body) = eventrepo::document::to_body(&event(&format!("near-{i:03}"), 28.0, 56.0)).unwrap();
            store.create_document(&link(), body).await.unwrap();
        }
        if i < far {
            let (_, body) = eventrepo::document::to_body(&event(&format!("far-{i:03}"), -70.0, -30.0)).unwrap();
            store.create_document(&link(), body).await.unwrap();
        }
    }
}

/// Counts every call made through it, then delegates.
pub struct RecordingStore {
    pub inner: SharedStore,
    pub marker_queries: AtomicUsize,
    pub content_queries: AtomicUsize,
    pub reads: AtomicUsize,
    pub conditional_writes: AtomicUsize,
    pub unconditional_writes: AtomicUsize,
    pub ensure_calls: AtomicUsize,
    pub page_sizes: Mutex<Vec<Option<usize>>>,
    pub written_etags: Mutex<Vec<String>>,
    // If-Match tags of conditional writes that succeeded
    pub matched_etags: Mutex<Vec<String>>,
}

impl RecordingStore {
    pub fn new(inner: SharedStore) -> Self {
        Self {
            inner,
            marker_queries: AtomicUsize::new(0),
            content_queries: AtomicUsize::new(0),
            reads: AtomicUsize::new(0),
            conditional_writes: AtomicUsize::new(0),
            unconditional_writes: AtomicUsize::new(0),
            ensure_calls: AtomicUsize::new(0),
            page_sizes: Mutex::new(Vec::new()),
            written_etags: Mutex::new(Vec::new()),
            matched_etags: Mutex::new(Vec::new()),
        }
    }

    pub fn hops(&self) -> usize {
        self.marker_queries.load(Ordering::SeqCst)
    }

    pub fn contents(&self) -> usize {
        self.content_queries.load(Ordering::SeqCst)
    }

    pub fn reset_counts(&self) {
        self.marker_queries.store(0, Ordering::SeqCst);
        self.content_queries.store(0, Ordering::SeqCst);
        self.reads.store(0, Ordering::SeqCst);
        self.conditional_writes.store(0, Ordering::SeqCst);
        self.unconditional_writes.store(0, Ordering::SeqCst);
        self.page_sizes.lock().clear();
    }

    /// False when two conditional writes succeeded against the same revision.
    pub fn no_revision_won_twice(&self) -> bool {
        let tags = self.matched_etags.lock();
        tags.iter().collect::<HashSet<_>>().len() == tags.len()
    }
}

#[async_trait::async_trait]
impl StoreClient for RecordingStore {
    async fn ensure_database(&self, database: &str) -> Result<bool, DbError> {
        self.ensure_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.ensure_database(database).await
    }

    async fn ensure_collection(&self, database: &str, spec: &CollectionSpec) -> Result<bool, DbError> {
        self.ensure_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.ensure_collection(database, spec).await
    }

    async fn create_document(&self, link: &CollectionLink, body: JsonMap) -> Result<Document, DbError> {
        self.inner.create_document(link, body).await
    }

    async fn read_document(&self, link: &CollectionLink, id: &DocumentId) -> Result<Document, DbError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.read_document(link, id).await
    }

    async fn replace_document(
        &self,
        link: &CollectionLink,
        document: &Document,
        condition: AccessCondition,
    ) -> Result<Document, DbError> {
        let expected = match &condition {
            AccessCondition::None => {
                self.unconditional_writes.fetch_add(1, Ordering::SeqCst);
                None
            }
            AccessCondition::IfMatch(tag) => {
                self.conditional_writes.fetch_add(1, Ordering::SeqCst);
                Some(tag.0.clone())
            }
        };
        let written = self.inner.replace_document(link, document, condition).await?;
        self.written_etags.lock().push(written.etag.0.clone());
        if let Some(tag) = expected {
            self.matched_etags.lock().push(tag);
        }
        Ok(written)
    }

    async fn query(&self, link: &CollectionLink, request: &QueryRequest) -> Result<FeedResponse, DbError> {
        match request.projection {
            Projection::Marker => self.marker_queries.fetch_add(1, Ordering::SeqCst),
            Projection::Full => self.content_queries.fetch_add(1, Ordering::SeqCst),
        };
        self.page_sizes.lock().push(request.max_item_count);
        self.inner.query(link, request).await
    }

    async fn shutdown(&self) -> Result<(), DbError> {
        self.inner.shutdown().await
    }
}

/// Drops every `If-Match`, turning conditional writes into last-writer-wins.
pub struct IgnoreIfMatchStore {
    pub inner: SharedStore,
}

#[async_trait::async_trait]
impl StoreClient for IgnoreIfMatchStore {
    async fn ensure_database(&self, database: &str) -> Result<bool, DbError> {
        self.inner.ensure_database(database).await
    }

    async fn ensure_collection(&self, database: &str, spec: &CollectionSpec) -> Result<bool, DbError> {
        self.inner.ensure_collection(database, spec).await
    }

    async fn create_document(&self, link: &CollectionLink, body: JsonMap) -> Result<Document, DbError> {
        self.inner.create_document(link, body).await
    }

    async fn read_document(&self, link: &CollectionLink, id: &DocumentId) -> Result<Document, DbError> {
        self.inner.read_document(link, id).await
    }

    async fn replace_document(
        &self,
        link: &CollectionLink,
        document: &Document,
        _condition: AccessCondition,
    ) -> Result<Document, DbError> {
        self.inner.replace_document(link, document, AccessCondition::None).await
    }

    async fn query(&self, link: &CollectionLink, request: &QueryRequest) -> Result<FeedResponse, DbError> {
        self.inner.query(link, request).await
    }
}

/// Bumps the stored document behind the caller's back before each of the
/// first `interfere` conditional writes, so those writes lose the race.
pub struct InterferingStore {
    pub inner: SharedStore,
    pub interfere: usize,
    pub seen: AtomicUsize,
}

impl InterferingStore {
    pub fn new(inner: SharedStore, interfere: usize) -> Self {
        Self { inner, interfere, seen: AtomicUsize::new(0) }
    }
}

#[async_trait::async_trait]
impl StoreClient for InterferingStore {
    async fn ensure_database(&self, database: &str) -> Result<bool, DbError> {
        self.inner.ensure_database(database).await
    }

    async fn ensure_collection(&self, database: &str, spec: &CollectionSpec) -> Result<bool, DbError> {
        self.inner.ensure_collection(database, spec).await
    }

    async fn create_document(&self, link: &CollectionLink, body: JsonMap) -> Result<Document, DbError> {
        self.inner.create_document(link, body).await
    }

    async fn read_document(&self, link: &CollectionLink, id: &DocumentId) -> Result<Document, DbError> {
        self.inner.read_document(link, id).await
    }

    async fn replace_document(
        &self,
        link: &CollectionLink,
        document: &Document,
        condition: AccessCondition,
    ) -> Result<Document, DbError> {
        if matches!(condition, AccessCondition::IfMatch(_))
            && self.seen.fetch_add(1, Ordering::SeqCst) < self.interfere
        {
            // a concurrent writer lands first
            let current = self.inner.read_document(link, &document.id).await?;
            self.inner.replace_document(link, &current, AccessCondition::None).await?;
        }
        self.inner.replace_document(link, document, condition).await
    }

    async fn query(&self, link: &CollectionLink, request: &QueryRequest) -> Result<FeedResponse, DbError> {
        self.inner.query(link, request).await
    }
}

/// Holds the first `gated` reads until that many readers have arrived, so
/// they all see the same revision before anyone writes.
pub struct BarrierStore {
    pub inner: SharedStore,
    pub gated: usize,
    pub barrier: Barrier,
    pub reads: AtomicUsize,
}

impl BarrierStore {
    pub fn new(inner: SharedStore, gated: usize) -> Self {
        Self { inner, gated, barrier: Barrier::new(gated), reads: AtomicUsize::new(0) }
    }
}

#[async_trait::async_trait]
impl StoreClient for BarrierStore {
    async fn ensure_database(&self, database: &str) -> Result<bool, DbError> {
        self.inner.ensure_database(database).await
    }

    async fn ensure_collection(&self, database: &str, spec: &CollectionSpec) -> Result<bool, DbError> {
        self.inner.ensure_collection(database, spec).await
    }

    async fn create_document(&self, link: &CollectionLink, body: JsonMap) -> Result<Document, DbError> {
        self.inner.create_document(link, body).await
    }

    async fn read_document(&self, link: &CollectionLink, id: &DocumentId) -> Result<Document, DbError> {
        let doc = self.inner.read_document(link, id).await?;
        if self.reads.fetch_add(1, Ordering::SeqCst) < self.gated {
            self.barrier.wait().await;
        }
        Ok(doc)
    }

    async fn replace_document(
        &self,
        link: &CollectionLink,
        document: &Document,
        condition: AccessCondition,
    ) -> Result<Document, DbError> {
        self.inner.replace_document(link, document, condition).await
    }

    async fn query(&self, link: &CollectionLink, request: &QueryRequest) -> Result<FeedResponse, DbError> {
        self.inner.query(link, request).await
    }
}
