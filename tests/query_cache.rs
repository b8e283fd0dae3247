//! Integration tests for the query cache on its own and wired to the HTTP
//! client against a mock server.

use futures::FutureExt;
use futures::StreamExt;
use shelf::api::{ApiClient, ApiError, ApiOptions, FilterCriteria};
use shelf::list::BookmarkList;
use shelf::query::{CacheOptions, Invalidator, Namespace, QueryCache, QueryClient, SubscriptionState};
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Cache whose fetcher returns `key` plus the call number.
fn numbered_cache(options: CacheOptions) -> (QueryCache<String, String>, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let cache = QueryCache::new(
        Namespace::GetBookmark,
        move |key: String| {
            let call = counter.fetch_add(1, Ordering::SeqCst) + 1;
            async move { Ok::<_, ApiError>(format!("{key}#{call}")) }.boxed()
        },
        options,
    );
    (cache, calls)
}

fn data(state: &SubscriptionState<String>) -> Option<&str> {
    state.data().map(|d| d.as_str())
}

// ============================================================================
// Freshness
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_fresh_entry_served_without_refetch_until_stale() {
    let (cache, calls) = numbered_cache(CacheOptions {
        stale_time: Duration::from_secs(30),
        ..CacheOptions::default()
    });

    let mut first = cache.subscribe("a".to_string());
    assert!(first.next().await.unwrap().is_pending());
    assert_eq!(data(&first.next().await.unwrap()), Some("a#1"));
    drop(first);

    // Within stale_time: straight to Settled, no fetch
    tokio::time::advance(Duration::from_secs(10)).await;
    let mut second = cache.subscribe("a".to_string());
    let state = second.try_next().unwrap();
    assert!(state.is_settled());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    drop(second);

    // Past stale_time: placeholder with the old value, then the refetch
    tokio::time::advance(Duration::from_secs(30)).await;
    let mut third = cache.subscribe("a".to_string());
    let state = third.try_next().unwrap();
    assert!(state.is_placeholder_data());
    assert_eq!(data(&state), Some("a#1"));
    assert_eq!(data(&third.next().await.unwrap()), Some("a#2"));
}

#[tokio::test(start_paused = true)]
async fn test_invalidation_overrides_freshness() {
    let (cache, calls) = numbered_cache(CacheOptions {
        stale_time: Duration::from_secs(300),
        ..CacheOptions::default()
    });
    let mut sub = cache.subscribe("a".to_string());
    sub.next().await;
    sub.next().await;

    cache.invalidate_all();
    assert!(sub.try_next().unwrap().is_placeholder_data());
    assert_eq!(data(&sub.next().await.unwrap()), Some("a#2"));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

// ============================================================================
// Superseded fetches
// ============================================================================

#[tokio::test]
async fn test_result_of_superseded_fetch_is_never_delivered() {
    let gate = Arc::new(Notify::new());
    let calls = Arc::new(AtomicUsize::new(0));
    let (gate_in, counter) = (Arc::clone(&gate), Arc::clone(&calls));
    let cache: QueryCache<String, String> = QueryCache::new(
        Namespace::GetBookmarks,
        move |_key: String| {
            let call = counter.fetch_add(1, Ordering::SeqCst) + 1;
            let gate = Arc::clone(&gate_in);
            async move {
                // Only the first call blocks
                if call == 1 {
                    gate.notified().await;
                }
                Ok::<_, ApiError>(format!("call {call}"))
            }
            .boxed()
        },
        CacheOptions::default(),
    );

    let mut sub = cache.subscribe("k".to_string());
    assert!(sub.try_next().unwrap().is_pending());
    // Let the first fetch reach its gate
    tokio::task::yield_now().await;

    cache.invalidate_all();
    assert_eq!(data(&sub.next().await.unwrap()), Some("call 2"));

    gate.notify_one();
    for _ in 0..5 {
        tokio::task::yield_now().await;
    }
    assert!(sub.try_next().is_none());
    assert_eq!(cache.peek(&"k".to_string()).as_deref().map(String::as_str), Some("call 2"));
}

// ============================================================================
// Capacity and teardown
// ============================================================================

#[tokio::test]
async fn test_unobserved_entries_evicted_past_capacity() {
    let (cache, _) = numbered_cache(CacheOptions {
        capacity: NonZeroUsize::new(2).unwrap(),
        ..CacheOptions::default()
    });
    for key in ["a", "b", "c"] {
        let mut sub = cache.subscribe(key.to_string());
        while !sub.next().await.unwrap().is_settled() {}
    }
    assert_eq!(cache.len(), 2);
    assert!(cache.peek(&"a".to_string()).is_none());
    assert!(cache.peek(&"c".to_string()).is_some());
}

#[tokio::test]
async fn test_subscription_as_stream() {
    let (cache, _) = numbered_cache(CacheOptions::default());
    let sub = cache.subscribe("s".to_string());
    let states: Vec<_> = sub.take(2).collect().await;
    assert!(states[0].is_pending());
    assert_eq!(data(&states[1]), Some("s#1"));
    assert_eq!(cache.subscriber_count(), 0);
}

// ============================================================================
// Full stack over HTTP
// ============================================================================

fn bookmarks_body(ids: &[&str]) -> String {
    let items: Vec<String> = ids
        .iter()
        .map(|id| format!(r#"{{"id":"{id}","title":"Title {id}"}}"#))
        .collect();
    format!(r#"{{"bookmarks":[{}]}}"#, items.join(","))
}

#[tokio::test]
async fn test_list_over_http_sends_filter_and_refreshes() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/bookmarks"))
        .and(query_param("favourited", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_string(bookmarks_body(&["x", "y"])))
        .expect(2)
        .mount(&server)
        .await;

    let api = ApiClient::new(
        &server.uri(),
        None,
        ApiOptions {
            max_retries: 0,
            ..ApiOptions::default()
        },
    )
    .unwrap();
    let client = Arc::new(QueryClient::new(Arc::new(api), CacheOptions::default()));
    let criteria = FilterCriteria {
        favourited: Some(true),
        ..FilterCriteria::default()
    };
    let mut list = BookmarkList::mount(
        client.bookmarks(),
        Arc::clone(&client) as Arc<dyn Invalidator>,
        criteria,
    );

    while !list.state().is_settled() {
        let state = list.next_state().await.unwrap();
        list.apply(state);
    }
    let titles: Vec<&str> = list.bookmarks().iter().map(|b| b.display_title()).collect();
    assert_eq!(titles, vec!["Title x", "Title y"]);

    list.on_refresh();
    list.poll_states();
    assert!(list.refreshing());
    while !list.state().is_settled() {
        let state = list.next_state().await.unwrap();
        list.apply(state);
    }
    assert!(!list.refreshing());
    // MockServer verifies the two expected calls on drop
}

#[tokio::test]
async fn test_server_error_on_first_load_leaves_list_loading() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/bookmarks"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let api = ApiClient::new(
        &server.uri(),
        None,
        ApiOptions {
            max_retries: 0,
            ..ApiOptions::default()
        },
    )
    .unwrap();
    let client = Arc::new(QueryClient::new(Arc::new(api), CacheOptions::default()));
    let list = BookmarkList::mount(
        client.bookmarks(),
        Arc::clone(&client) as Arc<dyn Invalidator>,
        FilterCriteria::default(),
    );

    // Wait for the failed fetch to finish
    for _ in 0..100 {
        if !client.bookmarks().is_fetching(&FilterCriteria::default()) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(!client.bookmarks().is_fetching(&FilterCriteria::default()));
    assert!(list.is_pending());
    assert!(list.refreshing());
}

#[tokio::test]
async fn test_empty_id_set_settles_empty_without_contacting_server() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(bookmarks_body(&["a", "b"])))
        .expect(0)
        .mount(&server)
        .await;

    let api = ApiClient::new(&server.uri(), None, ApiOptions::default()).unwrap();
    let client = Arc::new(QueryClient::new(Arc::new(api), CacheOptions::default()));
    let mut list = BookmarkList::mount(
        client.bookmarks(),
        Arc::clone(&client) as Arc<dyn Invalidator>,
        FilterCriteria::with_ids(Vec::<String>::new()),
    );

    while !list.state().is_settled() {
        let state = list.next_state().await.unwrap();
        list.apply(state);
    }
    assert!(list.bookmarks().is_empty());
    assert!(!list.refreshing());
}
