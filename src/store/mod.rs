//! The store boundary: everything the core needs from a document store.
//!
//! The store offers two capabilities. Paged queries return one page plus an
//! opaque continuation token, and single documents can be read and replaced,
//! optionally conditioned on their current [`ETag`]. [`MemoryStore`] is the
//! in-process implementation used by tests, the CLI and local runs.

mod memory;
mod token;

pub use memory::{DEFAULT_MAX_ITEM_COUNT, MemoryStore, SweeperHandle};

use crate::collection::CollectionSpec;
use crate::config::StoreConfig;
use crate::document::{Document, JsonMap};
use crate::errors::DbError;
use crate::query::{FeedResponse, QueryRequest};
use crate::types::{CollectionLink, DocumentId, ETag};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Process-wide handle to the store; build it once with [`connect`].
pub type SharedStore = Arc<dyn StoreClient>;

/// Precondition attached to a replace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessCondition {
    /// Last writer wins.
    None,
    /// Only replace while the stored revision still carries this tag.
    IfMatch(ETag),
}

#[async_trait::async_trait]
pub trait StoreClient: Send + Sync {
    /// Creates the database if missing. Returns `true` when it was created.
    async fn ensure_database(&self, database: &str) -> Result<bool, DbError>;

    /// Creates the collection if missing. An existing collection keeps its settings.
    async fn ensure_collection(&self, database: &str, spec: &CollectionSpec)
    -> Result<bool, DbError>;

    /// Inserts a new document. `body` must carry a string `id`.
    async fn create_document(&self, link: &CollectionLink, body: JsonMap)
    -> Result<Document, DbError>;

    async fn read_document(&self, link: &CollectionLink, id: &DocumentId)
    -> Result<Document, DbError>;

    /// Replaces the whole document. A failed `IfMatch` yields [`DbError::Conflict`].
    async fn replace_document(
        &self,
        link: &CollectionLink,
        document: &Document,
        condition: AccessCondition,
    ) -> Result<Document, DbError>;

    /// Returns one page of matches for `request`.
    async fn query(&self, link: &CollectionLink, request: &QueryRequest)
    -> Result<FeedResponse, DbError>;

    /// Replace preconditioned on `expected`.
    async fn conditional_replace(
        &self,
        link: &CollectionLink,
        document: &Document,
        expected: &ETag,
    ) -> Result<Document, DbError> {
        self.replace_document(link, document, AccessCondition::IfMatch(expected.clone())).await
    }

    async fn unconditional_replace(
        &self,
        link: &CollectionLink,
        document: &Document,
    ) -> Result<Document, DbError> {
        self.replace_document(link, document, AccessCondition::None).await
    }

    /// Releases connections. Calls made afterwards fail.
    async fn shutdown(&self) -> Result<(), DbError> {
        Ok(())
    }
}

/// Builds the shared store handle described by `config`.
///
/// Only the `memory://` scheme is built in; other backends implement
/// [`StoreClient`] themselves.
pub fn connect(config: &StoreConfig) -> Result<SharedStore, DbError> {
    if config.credential.is_empty() {
        return Err(DbError::Config("store credential must not be empty".into()));
    }
    match config.endpoint.split_once("://") {
        Some(("memory", _)) => {
            log::info!(
                "connecting to in-process store {} (max {} connections)",
                config.endpoint,
                config.max_connections
            );
            Ok(Arc::new(MemoryStore::with_connection_limit(config.max_connections)))
        }
        _ => Err(DbError::Config(format!("unsupported store endpoint: {}", config.endpoint))),
    }
}

/// Runs one store call under an optional deadline.
pub async fn with_timeout<T, F>(timeout: Option<Duration>, call: F) -> Result<T, DbError>
where
    F: Future<Output = Result<T, DbError>>,
{
    match timeout {
        Some(limit) => tokio::time::timeout(limit, call).await.map_err(|_| DbError::Timeout {
            ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
        })?,
        None => call.await,
    }
}
