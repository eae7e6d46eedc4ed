//! Event operations on top of the store: create, read, nearby search, visitor counting.

use crate::collection::{CollectionProvisioner, ProvisionReport};
use crate::config::StoreConfig;
use crate::document::to_body;
use crate::errors::DbError;
use crate::geo::GeoPoint;
use crate::model::Event;
use crate::query::{ContinuationCursor, Filter, Page, QueryRequest};
use crate::store::{SharedStore, with_timeout};
use crate::telemetry;
use crate::types::{CollectionLink, ContinuationToken, DocumentId};
use crate::update::{OptimisticUpdater, UpdateReport};
use serde_json::Value;
use std::time::{Duration, Instant};

pub const LOCATION_FIELD: &str = "Location";
pub const VISITORS_FIELD: &str = "Visitors";

pub struct EventRepository {
    store: SharedStore,
    link: CollectionLink,
    cursor: ContinuationCursor,
    updater: OptimisticUpdater,
    request_timeout: Option<Duration>,
    provisioned: ProvisionReport,
}

impl EventRepository {
    /// Provisions the configured database and collection, then builds the repository.
    pub async fn open(store: SharedStore, config: &StoreConfig) -> Result<Self, DbError> {
        let timeout = config.request_timeout();
        let provisioned = CollectionProvisioner::new(store.clone())
            .with_request_timeout(timeout)
            .ensure_collection(&config.database, &config.collection_spec())
            .await?;
        telemetry::set_db_name(&config.database);
        let link = config.link();
        let cursor = ContinuationCursor::new(store.clone(), link.clone()).with_request_timeout(timeout);
        let updater = OptimisticUpdater::new(store.clone(), link.clone())
            .with_policy(config.retry_policy())
            .with_request_timeout(timeout);
        Ok(Self { store, link, cursor, updater, request_timeout: timeout, provisioned })
    }

    #[must_use]
    pub const fn link(&self) -> &CollectionLink {
        &self.link
    }

    /// What `open` had to create.
    #[must_use]
    pub const fn provisioned(&self) -> ProvisionReport {
        self.provisioned
    }

    #[must_use]
    pub const fn cursor(&self) -> &ContinuationCursor {
        &self.cursor
    }

    #[must_use]
    pub const fn updater(&self) -> &OptimisticUpdater {
        &self.updater
    }

    /// Stores a new event. An empty id is replaced by a fresh uuid.
    pub async fn create_event(&self, mut event: Event) -> Result<Event, DbError> {
        if event.id.is_empty() {
            event.id = DocumentId::new().0;
        }
        let (id, body) = to_body(&event)?;
        let doc =
            with_timeout(self.request_timeout, self.store.create_document(&self.link, body)).await?;
        telemetry::log_audit("create", &self.link.to_string(), id.as_str());
        doc.to_typed()
    }

    pub async fn get_event(&self, id: &DocumentId) -> Result<Event, DbError> {
        with_timeout(self.request_timeout, self.store.read_document(&self.link, id))
            .await?
            .to_typed()
    }

    /// Every event strictly closer than `distance` metres to `point`.
    pub async fn find_nearby(&self, point: GeoPoint, distance: f64) -> Result<Vec<Event>, DbError> {
        let filter = nearby_filter(point, distance)?;
        let started = Instant::now();
        let mut events = Vec::new();
        let mut token = ContinuationToken::start();
        loop {
            let request = QueryRequest::new(filter.clone()).after(token);
            let response =
                with_timeout(self.request_timeout, self.store.query(&self.link, &request)).await?;
            for item in response.items {
                events.push(serde_json::from_value(item)?);
            }
            match response.continuation {
                Some(next) if !next.is_empty() => token = next,
                _ => break,
            }
        }
        telemetry::log_query(
            &self.link.to_string(),
            &format!("{filter:?}"),
            started.elapsed().as_millis(),
            None,
            None,
        );
        Ok(events)
    }

    /// Page `page_number` (1-based) of the nearby events, `page_size` per page.
    pub async fn find_nearby_page(
        &self,
        point: GeoPoint,
        distance: f64,
        page_size: usize,
        page_number: usize,
    ) -> Result<Page<Event>, DbError> {
        let filter = nearby_filter(point, distance)?;
        self.cursor.fetch_page(&filter, page_size, page_number).await
    }

    pub async fn increment_visitor_count(&self, id: &DocumentId) -> Result<UpdateReport, DbError> {
        self.updater.increment_field(id, VISITORS_FIELD, 1).await
    }

    /// Sets the counter back to 0 with an unconditional write.
    ///
    /// Increments that commit between the read and the write are lost. Use
    /// [`Self::reset_visitor_count_checked`] when that matters.
    pub async fn reset_visitor_count(&self, id: &DocumentId) -> Result<UpdateReport, DbError> {
        self.updater.set_field(id, VISITORS_FIELD, Value::from(0)).await
    }

    pub async fn reset_visitor_count_checked(
        &self,
        id: &DocumentId,
    ) -> Result<UpdateReport, DbError> {
        self.updater.set_field_conditional(id, VISITORS_FIELD, Value::from(0)).await
    }

    pub async fn shutdown(&self) -> Result<(), DbError> {
        log::info!("{}: shutting down store connection", self.link);
        self.store.shutdown().await
    }
}

fn nearby_filter(point: GeoPoint, distance: f64) -> Result<Filter, DbError> {
    if !distance.is_finite() || distance < 0.0 {
        return Err(DbError::InvalidArgument(format!("distance {distance} must be a non-negative number")));
    }
    Ok(Filter::within(LOCATION_FIELD, point, distance))
}
