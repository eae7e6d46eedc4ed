mod support;

use eventrepo::errors::DbError;
use eventrepo::geo::GeoPoint;
use eventrepo::model::Event;
use eventrepo::query::{ContinuationCursor, Filter, Page};
use eventrepo::store::SharedStore;
use std::sync::Arc;
use support::{RecordingStore, insert_events, link, provisioned_store};

fn nearby() -> Filter {
    Filter::within("Location", GeoPoint::new(28.0, 56.0), 20_000.0)
}

async fn recording(near: usize, far: usize) -> (Arc<RecordingStore>, ContinuationCursor) {
    let memory = provisioned_store().await;
    insert_events(memory.as_ref(), near, far).await;
    let inner: SharedStore = memory;
    let rec = Arc::new(RecordingStore::new(inner));
    let shared: SharedStore = rec.clone();
    (rec, ContinuationCursor::new(shared, link()))
}

fn ids(page: &Page<Event>) -> Vec<String> {
    page.items.iter().map(|e| e.id.clone()).collect()
}

#[tokio::test]
async fn first_page_needs_no_hops() {
    let (rec, cursor) = recording(25, 25).await;
    let page: Page<Event> = cursor.fetch_page(&nearby(), 10, 1).await.unwrap();
    assert_eq!(page.len(), 10);
    assert_eq!(ids(&page)[0], "near-000");
    assert_eq!(rec.hops(), 0);
    assert_eq!(rec.contents(), 1);
}

#[tokio::test]
async fn last_partial_page_and_past_the_end() {
    let (rec, cursor) = recording(25, 25).await;

    let third: Page<Event> = cursor.fetch_page(&nearby(), 10, 3).await.unwrap();
    assert_eq!(ids(&third), (20..25).map(|i| format!("near-{i:03}")).collect::<Vec<_>>());
    assert_eq!(rec.hops(), 2);
    assert_eq!(rec.contents(), 1);

    rec.reset_counts();
    let fourth: Page<Event> = cursor.fetch_page(&nearby(), 10, 4).await.unwrap();
    assert!(fourth.is_empty());
    assert_eq!(rec.hops(), 3);
    assert_eq!(rec.contents(), 0);
}

#[tokio::test]
async fn page_k_walks_k_minus_one_hops() {
    let (rec, cursor) = recording(40, 5).await;
    for k in 1..=4 {
        rec.reset_counts();
        let page: Page<Event> = cursor.fetch_page(&nearby(), 10, k).await.unwrap();
        assert_eq!(page.len(), 10, "page {k}");
        assert_eq!(rec.hops(), k - 1, "page {k}");
        assert_eq!(rec.contents(), 1);
        assert!(rec.page_sizes.lock().iter().all(|s| *s == Some(10)));
    }
}

#[tokio::test]
async fn pages_concatenate_to_the_full_result() {
    let (_rec, cursor) = recording(23, 11).await;
    let mut all = Vec::new();
    for k in 1..=5 {
        let page: Page<Event> = cursor.fetch_page(&nearby(), 4, k).await.unwrap();
        all.extend(ids(&page));
    }
    let whole: Page<Event> = cursor.fetch_page(&nearby(), 100, 1).await.unwrap();
    assert_eq!(all[..20], ids(&whole)[..20]);
    let rest: Page<Event> = cursor.fetch_page(&nearby(), 4, 6).await.unwrap();
    all.extend(ids(&rest));
    assert_eq!(all, ids(&whole));
}

#[tokio::test]
async fn repeated_fetches_agree() {
    let (_rec, cursor) = recording(25, 3).await;
    let a: Page<Event> = cursor.fetch_page(&nearby(), 10, 2).await.unwrap();
    let b: Page<Event> = cursor.fetch_page(&nearby(), 10, 2).await.unwrap();
    assert_eq!(ids(&a), ids(&b));
    assert_eq!(ids(&a)[0], "near-010");
}

#[tokio::test]
async fn exact_multiple_ends_cleanly() {
    let (rec, cursor) = recording(20, 0).await;
    let second: Page<Event> = cursor.fetch_page(&nearby(), 10, 2).await.unwrap();
    assert_eq!(second.len(), 10);
    assert!(second.continuation.is_none());

    rec.reset_counts();
    let third: Page<Event> = cursor.fetch_page(&nearby(), 10, 3).await.unwrap();
    assert!(third.is_empty());
    assert_eq!(rec.hops(), 2);
    assert_eq!(rec.contents(), 0);
}

#[tokio::test]
async fn no_matches_gives_empty_pages() {
    let (rec, cursor) = recording(0, 12).await;
    let first: Page<Event> = cursor.fetch_page(&nearby(), 5, 1).await.unwrap();
    assert!(first.is_empty());
    assert_eq!(rec.contents(), 1);

    rec.reset_counts();
    let second: Page<Event> = cursor.fetch_page(&nearby(), 5, 2).await.unwrap();
    assert!(second.is_empty());
    assert_eq!(rec.hops(), 1);
    assert_eq!(rec.contents(), 0);
}

#[tokio::test]
async fn resolve_returns_start_token_for_page_one() {
    let (rec, cursor) = recording(3, 0).await;
    let token = cursor.resolve_continuation(&nearby(), 2, 1).await.unwrap().unwrap();
    assert!(token.is_empty());
    assert_eq!(rec.hops(), 0);
    assert!(cursor.resolve_continuation(&nearby(), 2, 3).await.unwrap().is_none());
}

#[tokio::test]
async fn zero_size_or_page_is_rejected() {
    let (rec, cursor) = recording(5, 0).await;
    let err = cursor.fetch_page::<Event>(&nearby(), 0, 1).await.unwrap_err();
    assert!(matches!(err, DbError::InvalidArgument(_)));
    let err = cursor.fetch_page::<Event>(&nearby(), 10, 0).await.unwrap_err();
    assert!(matches!(err, DbError::InvalidArgument(_)));
    assert_eq!(rec.hops() + rec.contents(), 0);
}

#[tokio::test]
async fn concurrent_fetches_do_not_share_state() {
    let (_rec, cursor) = recording(30, 0).await;
    let mut handles = Vec::new();
    for k in 1..=3 {
        let c = cursor.clone();
        handles.push(tokio::spawn(async move {
            let page: Page<Event> = c.fetch_page(&nearby(), 10, k).await.unwrap();
            (k, page.items.first().map(|e| e.id.clone()))
        }));
    }
    for h in handles {
        let (k, first) = h.await.unwrap();
        assert_eq!(first, Some(format!("near-{:03}", (k - 1) * 10)));
    }
}
