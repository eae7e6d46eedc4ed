//! Geo-searchable event storage on top of a paged, etag-versioned document store.
//!
//! The three core pieces are [`query::ContinuationCursor`] (page-number
//! addressing over continuation tokens), [`update::OptimisticUpdater`]
//! (conflict-retried conditional writes) and
//! [`collection::CollectionProvisioner`] (idempotent database/collection
//! set-up). [`repository::EventRepository`] wires them together for events.

pub mod cli;
pub mod collection;
pub mod config;
pub mod document;
pub mod errors;
pub mod geo;
pub mod logger;
pub mod model;
pub mod query;
pub mod repository;
pub mod seed;
pub mod store;
pub mod telemetry;
pub mod types;
pub mod update;

pub use config::StoreConfig;
pub use errors::DbError;
pub use repository::EventRepository;
pub use store::{SharedStore, StoreClient};

