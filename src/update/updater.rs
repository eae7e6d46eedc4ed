use super::retry::RetryPolicy;
use crate::document::Document;
use crate::document::field::{check_writable, read_integer};
use crate::errors::DbError;
use crate::store::{AccessCondition, SharedStore, with_timeout};
use crate::telemetry;
use crate::types::{CollectionLink, DocumentId, ETag};
use serde_json::Value;
use std::time::Duration;

/// Outcome of one logical update.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateReport {
    /// Read-modify-write cycles performed, including the one that won.
    pub attempts: u32,
    /// Cycles lost to a concurrent writer.
    pub conflicts: u32,
    /// Tag of the revision this update wrote.
    pub etag: ETag,
    /// Value the mutated field ended up with, when there is a single one.
    pub value: Option<Value>,
}

/// Read-modify-conditional-write on single documents.
///
/// Every attempt re-reads the document and writes it back preconditioned on
/// the tag it read, so a concurrent write makes the attempt fail instead of
/// being overwritten. Conflicts are retried under the [`RetryPolicy`]; any
/// other error is returned immediately.
#[derive(Clone)]
pub struct OptimisticUpdater {
    store: SharedStore,
    link: CollectionLink,
    policy: RetryPolicy,
    request_timeout: Option<Duration>,
}

impl OptimisticUpdater {
    #[must_use]
    pub fn new(store: SharedStore, link: CollectionLink) -> Self {
        Self { store, link, policy: RetryPolicy::default(), request_timeout: None }
    }

    #[must_use]
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    #[must_use]
    pub const fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Adds `delta` to an integer field. An absent field counts as 0.
    pub async fn increment_field(
        &self,
        id: &DocumentId,
        field: &str,
        delta: i64,
    ) -> Result<UpdateReport, DbError> {
        check_writable(field)?;
        self.update_with(id, |doc| {
            let next = read_integer(&doc.body, field)?.checked_add(delta).ok_or_else(|| {
                DbError::InvalidArgument(format!("incrementing `{field}` by {delta} overflows"))
            })?;
            doc.set(field, Value::from(next))?;
            Ok(Some(Value::from(next)))
        })
        .await
    }

    /// Sets a field under the same conflict protocol as [`Self::increment_field`].
    pub async fn set_field_conditional(
        &self,
        id: &DocumentId,
        field: &str,
        value: Value,
    ) -> Result<UpdateReport, DbError> {
        check_writable(field)?;
        self.update_with(id, |doc| {
            doc.set(field, value.clone())?;
            Ok(Some(value.clone()))
        })
        .await
    }

    /// Sets a field with an unconditional write.
    ///
    /// Last writer wins: an increment that lands between this read and write
    /// is lost. Meant for administrative resets only.
    pub async fn set_field(
        &self,
        id: &DocumentId,
        field: &str,
        value: Value,
    ) -> Result<UpdateReport, DbError> {
        check_writable(field)?;
        let mut doc = self.read(id).await?;
        doc.set(field, value.clone())?;
        let written = self.write(&doc, AccessCondition::None).await?;
        telemetry::log_audit("replace", &self.link.to_string(), id.as_str());
        Ok(UpdateReport { attempts: 1, conflicts: 0, etag: written.etag, value: Some(value) })
    }

    /// Runs `mutate` inside the conflict-retry loop.
    ///
    /// `mutate` sees a freshly read document on every attempt and may run
    /// several times, so it must not have side effects beyond the document.
    /// Its return value is reported back in [`UpdateReport::value`].
    pub async fn update_with<F>(&self, id: &DocumentId, mut mutate: F) -> Result<UpdateReport, DbError>
    where
        F: FnMut(&mut Document) -> Result<Option<Value>, DbError> + Send,
    {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut conflicts = 0;
        for attempt in 1..=max_attempts {
            let mut doc = self.read(id).await?;
            let expected = doc.etag.clone();
            let value = mutate(&mut doc)?;
            match self.write(&doc, AccessCondition::IfMatch(expected)).await {
                Ok(written) => {
                    telemetry::log_audit("replace", &self.link.to_string(), id.as_str());
                    return Ok(UpdateReport { attempts: attempt, conflicts, etag: written.etag, value });
                }
                Err(e) if e.is_conflict() => {
                    conflicts += 1;
                    telemetry::record_conflict();
                    log::warn!("{}: write conflict on {id} (attempt {attempt}/{max_attempts})", self.link);
                    if attempt < max_attempts {
                        self.policy.pause(attempt).await;
                    }
                }
                Err(e) => return Err(e),
            }
        }
        telemetry::record_exhausted();
        log::error!("{}: giving up on {id} after {max_attempts} conflicting attempts", self.link);
        Err(DbError::ExhaustedRetries { id: id.0.clone(), attempts: max_attempts })
    }

    async fn read(&self, id: &DocumentId) -> Result<Document, DbError> {
        with_timeout(self.request_timeout, self.store.read_document(&self.link, id)).await
    }

    async fn write(&self, doc: &Document, condition: AccessCondition) -> Result<Document, DbError> {
        with_timeout(self.request_timeout, self.store.replace_document(&self.link, doc, condition))
            .await
    }
}
