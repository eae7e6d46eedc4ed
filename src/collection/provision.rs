use super::policy::CollectionSpec;
use crate::errors::DbError;
use crate::store::{SharedStore, with_timeout};
use std::time::Duration;

/// What `ensure_collection` had to create.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProvisionReport {
    pub database_created: bool,
    pub collection_created: bool,
}

/// One-time set-up of the backing database and collection.
///
/// Idempotent: safe to run on every process start. An existing collection is
/// left as it is, including its indexing policy, TTL and throughput.
pub struct CollectionProvisioner {
    store: SharedStore,
    request_timeout: Option<Duration>,
}

impl CollectionProvisioner {
    #[must_use]
    pub fn new(store: SharedStore) -> Self {
        Self { store, request_timeout: None }
    }

    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub async fn ensure_collection(
        &self,
        database: &str,
        spec: &CollectionSpec,
    ) -> Result<ProvisionReport, DbError> {
        if database.trim().is_empty() {
            return Err(DbError::InvalidArgument("database name must not be empty".into()));
        }
        spec.validate()?;
        let database_created =
            with_timeout(self.request_timeout, self.store.ensure_database(database)).await?;
        let collection_created =
            with_timeout(self.request_timeout, self.store.ensure_collection(database, spec))
                .await?;
        if collection_created {
            log::info!(
                "created collection {database}/{} (ttl={:?}s, throughput={:?}, {} indexed paths)",
                spec.id,
                spec.default_ttl_secs,
                spec.throughput,
                spec.indexing_policy.included_paths.len()
            );
        } else {
            log::debug!("collection {database}/{} already provisioned", spec.id);
        }
        Ok(ProvisionReport { database_created, collection_created })
    }
}
