use super::types::{FeedResponse, Filter, Page, Projection, QueryRequest};
use crate::errors::DbError;
use crate::store::{SharedStore, with_timeout};
use crate::telemetry;
use crate::types::{CollectionLink, ContinuationToken};
use serde::de::DeserializeOwned;
use std::time::{Duration, Instant};

/// Page-number addressing over a store that only knows "next page after token".
///
/// Reaching page `n` walks the continuation chain forward `n - 1` times with a
/// marker projection, so the skipped pages cost one round trip each but carry
/// no document bodies. Page `n` itself is then fetched with the same size and
/// the token that starts it.
///
/// Each call owns its own walk state; a cursor can be shared across tasks.
#[derive(Clone)]
pub struct ContinuationCursor {
    store: SharedStore,
    link: CollectionLink,
    request_timeout: Option<Duration>,
}

impl ContinuationCursor {
    #[must_use]
    pub fn new(store: SharedStore, link: CollectionLink) -> Self {
        Self { store, link, request_timeout: None }
    }

    /// Deadline applied to each store round trip.
    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    #[must_use]
    pub const fn link(&self) -> &CollectionLink {
        &self.link
    }

    /// Returns page `page_number` (1-based) of `filter`'s results.
    ///
    /// A page past the end of the data comes back empty rather than as an error.
    pub async fn fetch_page<T: DeserializeOwned>(
        &self,
        filter: &Filter,
        page_size: usize,
        page_number: usize,
    ) -> Result<Page<T>, DbError> {
        check_page_args(page_size, page_number)?;
        let started = Instant::now();
        let Some(token) = self.resolve_continuation(filter, page_size, page_number).await? else {
            log::debug!("{}: page {page_number} (size {page_size}) is past the end", self.link);
            return Ok(Page::empty());
        };
        let request = QueryRequest::new(filter.clone()).max_items(page_size).after(token);
        let response = self.run(&request).await?;
        let items = response
            .items
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<T>, _>>()?;
        telemetry::log_query(
            &self.link.to_string(),
            &format!("{filter:?}"),
            started.elapsed().as_millis(),
            Some(page_size),
            Some(page_number),
        );
        Ok(Page { items, continuation: response.continuation })
    }

    /// Finds the token that starts page `page_number`.
    ///
    /// `Some(empty token)` is the start of the result set, `None` means the
    /// data runs out before that page.
    pub async fn resolve_continuation(
        &self,
        filter: &Filter,
        page_size: usize,
        page_number: usize,
    ) -> Result<Option<ContinuationToken>, DbError> {
        check_page_args(page_size, page_number)?;
        let mut token = ContinuationToken::start();
        let mut current_page = 1;
        while current_page < page_number {
            let request = QueryRequest::new(filter.clone())
                .max_items(page_size)
                .after(token)
                .projection(Projection::Marker);
            let response = self.run(&request).await?;
            telemetry::record_hop();
            log::debug!(
                "{}: hop over page {current_page} returned {} items",
                self.link,
                response.len()
            );
            // only a full page with a token can be followed by another page
            match response.continuation {
                Some(next) if response.items.len() == page_size && !next.is_empty() => {
                    token = next;
                }
                _ => return Ok(None),
            }
            current_page += 1;
        }
        Ok(Some(token))
    }

    async fn run(&self, request: &QueryRequest) -> Result<FeedResponse, DbError> {
        with_timeout(self.request_timeout, self.store.query(&self.link, request)).await
    }
}

fn check_page_args(page_size: usize, page_number: usize) -> Result<(), DbError> {
    if page_size == 0 {
        return Err(DbError::InvalidArgument("page size must be positive".into()));
    }
    if page_number == 0 {
        return Err(DbError::InvalidArgument("page numbers start at 1".into()));
    }
    Ok(())
}
