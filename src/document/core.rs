use crate::errors::DbError;
use crate::types::{DocumentId, ETag};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;

pub type JsonMap = serde_json::Map<String, Value>;

/// Name of the identifier property inside every document body.
pub const ID_FIELD: &str = "id";

/// One revision of a stored document as handed out by the store.
///
/// `body` always carries the `id` property. `etag` and `updated_at` are
/// system metadata and are never written into the body.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: DocumentId,
    pub body: JsonMap,
    pub etag: ETag,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    /// Builds a new revision. Used by store implementations.
    #[must_use]
    pub fn new(id: DocumentId, mut body: JsonMap, etag: ETag, updated_at: DateTime<Utc>) -> Self {
        body.insert(ID_FIELD.to_string(), Value::String(id.0.clone()));
        Self { id, body, etag, updated_at }
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.body.get(field)
    }

    /// Sets a top-level property. The identifier cannot be changed this way.
    pub fn set(&mut self, field: &str, value: Value) -> Result<(), DbError> {
        super::field::check_writable(field)?;
        self.body.insert(field.to_string(), value);
        Ok(())
    }

    /// Deserializes the body into a typed record.
    pub fn to_typed<T: DeserializeOwned>(&self) -> Result<T, DbError> {
        Ok(serde_json::from_value(Value::Object(self.body.clone()))?)
    }

    /// Whether this revision is past `ttl` at `now`.
    #[must_use]
    pub fn is_expired_at(&self, ttl: Option<Duration>, now: DateTime<Utc>) -> bool {
        ttl.is_some_and(|ttl| {
            let elapsed = now.signed_duration_since(self.updated_at);
            chrono::Duration::from_std(ttl).is_ok_and(|d| elapsed >= d)
        })
    }
}

/// Serializes a record into a document body and pulls out its identifier.
///
/// The record must serialize to a JSON object with a non-empty string `id`.
pub fn to_body<T: Serialize>(record: &T) -> Result<(DocumentId, JsonMap), DbError> {
    let Value::Object(body) = serde_json::to_value(record)? else {
        return Err(DbError::InvalidArgument("document must serialize to a JSON object".into()));
    };
    match body.get(ID_FIELD) {
        Some(Value::String(id)) if !id.is_empty() => Ok((DocumentId(id.clone()), body)),
        _ => Err(DbError::InvalidArgument("document needs a non-empty string `id`".into())),
    }
}
