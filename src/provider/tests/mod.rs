use super::*;
use crate::config::ApiConfig;
use crate::error::Error;
use crate::models::decode_photos;
use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn photo_json(id: &str) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "width": 400,
        "height": 300,
        "color": "#A0B0C0",
        "created_at": "2020-01-02T03:04:05Z",
        "user": {"id": "u", "username": "owner", "name": "Owner"},
        "urls": {"small": format!("https://images.example.com/{}?w=400", id)}
    })
}

fn page_json(prefix: &str, count: usize) -> serde_json::Value {
    serde_json::Value::Array(
        (0..count)
            .map(|i| photo_json(&format!("{}-{}", prefix, i)))
            .collect(),
    )
}

fn records(prefix: &str, count: usize) -> Vec<PhotoRecord> {
    let body = serde_json::to_vec(&page_json(prefix, count)).unwrap();
    decode_photos(&body).unwrap()
}

fn ids(items: &[PhotoRecord]) -> Vec<&str> {
    items.iter().map(|p| p.id.as_str()).collect()
}

fn provider_for(server: &MockServer, source: SourceKind, page_size: u32) -> PageProvider {
    let factory = RequestFactory::new(&ApiConfig {
        base_url: server.uri(),
        access_key: "test-key".to_string(),
        timeout: Duration::from_secs(5),
        ..Default::default()
    })
    .unwrap();
    let queue = ExecutionQueue::with_client(reqwest::Client::new(), 4).unwrap();
    PageProvider::new(source, factory, queue, page_size)
}

async fn mount_page(server: &MockServer, page: u32, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/photos/"))
        .and(query_param("page", page.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

/// Skip the dispatch notification and return the completion event
async fn completion(provider: &mut PageProvider) -> ProviderEvent {
    loop {
        let event = tokio::time::timeout(Duration::from_secs(5), provider.next_event())
            .await
            .expect("completion should arrive")
            .expect("a request should be in flight");
        if !matches!(event, ProviderEvent::WillStartFetching { .. }) {
            return event;
        }
    }
}

// State machine

#[test]
fn fresh_state() {
    let state = ProviderState::new(30);
    assert!(state.items().is_empty());
    assert_eq!(state.cursor(), PageCursor::first(30));
    assert!(!state.is_fetching());
    assert!(!state.is_refreshing());
    assert!(!state.can_fetch_more());
    assert_eq!(state.page_size(), 30);
}

#[test]
fn second_begin_is_dropped_while_fetching() {
    let mut state = ProviderState::new(30);
    assert_eq!(state.begin_fetch(), Ok(PageCursor::first(30)));
    assert_eq!(state.begin_fetch(), Err(FetchStart::AlreadyFetching));
    assert_eq!(state.begin_fetch(), Err(FetchStart::AlreadyFetching));
    assert!(state.is_fetching());
}

#[test]
fn full_pages_advance_cursor_one_page_at_a_time() {
    let mut state = ProviderState::new(3);
    for page in 1..=4 {
        let cursor = state.begin_fetch().unwrap();
        assert_eq!(cursor.page(), page);
        let merged = state.complete(records(&format!("p{}", page), 3));
        assert!(merged.can_fetch_more);
        assert_eq!(state.cursor().page(), page + 1);
        assert_eq!(state.cursor().per_page(), 3);
    }
    assert_eq!(state.items().len(), 12);
}

#[test]
fn short_page_ends_pagination_without_advancing() {
    let mut state = ProviderState::new(5);
    state.begin_fetch().unwrap();
    let merged = state.complete(records("a", 2));

    assert!(!merged.can_fetch_more);
    assert!(!state.can_fetch_more());
    assert!(state.is_exhausted());
    assert_eq!(state.cursor().page(), 1);
    assert_eq!(state.begin_fetch(), Err(FetchStart::Exhausted));
}

#[test]
fn empty_page_ends_pagination() {
    let mut state = ProviderState::new(5);
    state.begin_fetch().unwrap();
    let merged = state.complete(Vec::new());
    assert!(merged.items.is_empty());
    assert!(!state.can_fetch_more());
    assert!(state.items().is_empty());
}

#[test]
fn refresh_replaces_items_and_reopens_pagination() {
    let mut state = ProviderState::new(2);
    state.begin_fetch().unwrap();
    state.complete(records("old", 2));
    state.begin_fetch().unwrap();
    state.complete(records("older", 1));
    assert!(state.is_exhausted());

    assert_eq!(state.begin_refresh(), Ok(PageCursor::first(2)));
    assert!(state.is_refreshing());
    let merged = state.complete(records("new", 2));

    assert!(merged.refreshed);
    assert_eq!(ids(state.items()), vec!["new-0", "new-1"]);
    assert_eq!(state.cursor().page(), 2);
    assert!(!state.is_refreshing());
    assert!(!state.is_exhausted());
}

#[test]
fn refresh_during_fetch_is_applied_to_the_in_flight_result() {
    let mut state = ProviderState::new(2);
    state.begin_fetch().unwrap();
    state.complete(records("a", 2));
    state.begin_fetch().unwrap();
    assert_eq!(state.cursor().page(), 2);

    assert_eq!(state.begin_refresh(), Err(FetchStart::AlreadyFetching));
    assert_eq!(state.cursor().page(), 1);

    let merged = state.complete(records("fresh", 2));
    assert!(merged.refreshed);
    assert_eq!(ids(state.items()), vec!["fresh-0", "fresh-1"]);
    assert_eq!(state.cursor().page(), 2);
}

#[test]
fn failure_restores_pre_dispatch_values() {
    let mut state = ProviderState::new(2);
    state.begin_fetch().unwrap();
    state.complete(records("a", 2));
    let before_items = state.items().to_vec();
    let before_cursor = state.cursor();

    state.begin_fetch().unwrap();
    state.fail();
    assert_eq!(state.items(), before_items.as_slice());
    assert_eq!(state.cursor(), before_cursor);
    assert!(!state.is_fetching());

    // A refresh that failed mid-flight leaves the old page in place
    state.begin_fetch().unwrap();
    let _ = state.begin_refresh();
    state.fail();
    assert_eq!(state.items(), before_items.as_slice());
    assert_eq!(state.cursor(), before_cursor);
    assert!(!state.is_refreshing());
    assert!(state.begin_fetch().is_ok());
}

#[test]
fn cancel_restores_refresh_flag_and_cursor() {
    let mut state = ProviderState::new(2);
    state.begin_fetch().unwrap();
    state.complete(records("a", 2));

    state.begin_refresh().unwrap();
    state.cancel();
    assert!(!state.is_refreshing());
    assert!(!state.is_fetching());
    assert_eq!(state.cursor().page(), 2);
    assert_eq!(state.items().len(), 2);
}

// Provider against a mock server

#[tokio::test]
async fn pagination_scenario_full_short_refresh() {
    let mock_server = MockServer::start().await;
    mount_page(&mock_server, 1, page_json("first", 30)).await;
    mount_page(&mock_server, 2, page_json("second", 10)).await;

    let mut provider = provider_for(&mock_server, SourceKind::Trending, 30);

    // Full first page
    assert_eq!(provider.fetch_next_page(), FetchStart::Started);
    let event = completion(&mut provider).await;
    assert!(matches!(
        event,
        ProviderEvent::DidFetch { ref items, refreshed: false, can_fetch_more: true, .. } if items.len() == 30
    ));
    assert_eq!(provider.items().len(), 30);
    assert!(provider.can_fetch_more());
    assert_eq!(provider.cursor().page(), 2);

    // Short second page
    assert_eq!(provider.fetch_next_page(), FetchStart::Started);
    completion(&mut provider).await;
    assert_eq!(provider.items().len(), 40);
    assert!(!provider.can_fetch_more());
    assert_eq!(provider.cursor().page(), 2);
    assert_eq!(provider.fetch_next_page(), FetchStart::Exhausted);

    // Refresh brings back exactly the first page
    mock_server.reset().await;
    mount_page(&mock_server, 1, page_json("fresh", 30)).await;
    assert_eq!(provider.refresh(), FetchStart::Started);
    assert!(provider.is_refreshing());
    let event = completion(&mut provider).await;
    assert!(matches!(event, ProviderEvent::DidFetch { refreshed: true, .. }));
    assert_eq!(provider.items().len(), 30);
    assert_eq!(provider.items()[0].id, "fresh-0");
    assert_eq!(provider.cursor().page(), 2);
    assert!(!provider.is_refreshing());
}

#[tokio::test]
async fn only_one_request_while_in_flight() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/photos/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(page_json("a", 5))
                .set_delay(Duration::from_millis(200)),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut provider = provider_for(&mock_server, SourceKind::Trending, 5);
    assert_eq!(provider.fetch_next_page(), FetchStart::Started);
    assert_eq!(provider.fetch_next_page(), FetchStart::AlreadyFetching);
    assert_eq!(provider.refresh(), FetchStart::AlreadyFetching);
    assert_eq!(provider.fetch_next_page(), FetchStart::AlreadyFetching);

    let event = completion(&mut provider).await;
    assert!(matches!(event, ProviderEvent::DidFetch { refreshed: true, .. }));
    assert_eq!(provider.items().len(), 5);
    assert!(provider.next_event().await.is_none());
}

#[tokio::test]
async fn transport_failure_leaves_items_and_allows_retry() {
    let mock_server = MockServer::start().await;
    mount_page(&mock_server, 1, page_json("a", 3)).await;

    let mut provider = provider_for(&mock_server, SourceKind::Trending, 3);
    provider.fetch_next_page();
    completion(&mut provider).await;
    let before = provider.items().to_vec();

    // Take the server away so the second page fails at the transport level
    let factory = RequestFactory::new(&ApiConfig {
        base_url: "http://127.0.0.1:9/".to_string(),
        access_key: "k".to_string(),
        timeout: Duration::from_secs(2),
        ..Default::default()
    })
    .unwrap();
    provider.factory = factory;

    assert_eq!(provider.fetch_next_page(), FetchStart::Started);
    let event = completion(&mut provider).await;
    match event {
        ProviderEvent::FetchFailed { error, source } => {
            assert_eq!(source, SourceKind::Trending);
            assert!(matches!(error, Error::Transport { .. }));
        }
        other => panic!("expected failure, got {:?}", other),
    }
    assert_eq!(provider.items(), before.as_slice());
    assert_eq!(provider.cursor().page(), 2);
    assert!(!provider.is_fetching());
    assert_eq!(provider.fetch_next_page(), FetchStart::Started);
    provider.cancel();
}

#[tokio::test]
async fn client_error_is_reported_once() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(403).set_body_string("Rate Limit Exceeded"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut provider = provider_for(&mock_server, SourceKind::Random, 10);
    let mut events = provider.subscribe();
    provider.fetch_next_page();

    let event = completion(&mut provider).await;
    assert!(matches!(
        event,
        ProviderEvent::FetchFailed { error: Error::Http { status: 403 }, .. }
    ));
    assert!(provider.next_event().await.is_none());

    assert!(matches!(
        events.try_recv().unwrap(),
        ProviderEvent::WillStartFetching { refreshing: false, .. }
    ));
    assert!(matches!(
        events.try_recv().unwrap(),
        ProviderEvent::FetchFailed { .. }
    ));
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn will_start_fetching_reports_cursor() {
    let mock_server = MockServer::start().await;
    mount_page(&mock_server, 1, page_json("a", 2)).await;

    let mut provider = provider_for(&mock_server, SourceKind::Trending, 2);
    provider.fetch_next_page();

    let first = provider.next_event().await.unwrap();
    match first {
        ProviderEvent::WillStartFetching {
            cursor, refreshing, ..
        } => {
            assert_eq!(cursor, PageCursor::first(2));
            assert!(!refreshing);
        }
        other => panic!("expected dispatch notification, got {:?}", other),
    }
    assert!(matches!(
        provider.next_event().await.unwrap(),
        ProviderEvent::DidFetch { .. }
    ));
}

#[tokio::test]
async fn cancel_suppresses_completion_and_restores_state() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(page_json("slow", 2))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&mock_server)
        .await;

    let mut provider = provider_for(&mock_server, SourceKind::Random, 2);
    let mut events = provider.subscribe();
    provider.fetch_next_page();
    assert!(provider.is_fetching());

    assert!(provider.cancel());
    assert!(!provider.cancel());
    assert!(!provider.is_fetching());
    assert_eq!(provider.cursor(), PageCursor::first(2));
    assert!(provider.next_event().await.is_none());

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(matches!(
        events.try_recv().unwrap(),
        ProviderEvent::WillStartFetching { .. }
    ));
    assert!(events.try_recv().is_err());
    assert!(provider.items().is_empty());
}

#[tokio::test]
async fn dropping_the_provider_cancels_its_request() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(page_json("slow", 2))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&mock_server)
        .await;

    let queue = ExecutionQueue::with_client(reqwest::Client::new(), 1).unwrap();
    let factory = RequestFactory::new(&ApiConfig {
        base_url: mock_server.uri(),
        access_key: "k".to_string(),
        ..Default::default()
    })
    .unwrap();

    let mut provider = PageProvider::new(SourceKind::Trending, factory, queue.clone(), 2);
    provider.fetch_next_page();
    tokio::time::sleep(Duration::from_millis(50)).await;
    drop(provider);

    tokio::time::sleep(Duration::from_millis(200)).await;
    let stats = queue.stats();
    assert_eq!(stats.cancelled, 1);
    assert_eq!(stats.in_flight, 0);
}

#[tokio::test]
async fn abandoned_wait_keeps_request_in_flight() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(page_json("a", 2))
                .set_delay(Duration::from_millis(300)),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut provider = provider_for(&mock_server, SourceKind::Trending, 2);
    provider.fetch_next_page();
    provider.next_event().await.unwrap();

    let early = tokio::time::timeout(Duration::from_millis(50), provider.next_event()).await;
    assert!(early.is_err());
    assert!(provider.is_fetching());

    let event = completion(&mut provider).await;
    assert!(matches!(event, ProviderEvent::DidFetch { .. }));
    assert_eq!(provider.items().len(), 2);
}

#[test]
fn from_config_uses_page_size() {
    let config = Config::from_json_str(
        r#"{"api": {"access_key": "k"}, "paging": {"page_size": 12}}"#,
    )
    .unwrap();
    let queue = ExecutionQueue::with_client(reqwest::Client::new(), 1).unwrap();
    let provider = PageProvider::from_config(SourceKind::Random, &config, queue).unwrap();
    assert_eq!(provider.cursor(), PageCursor::first(12));
    assert_eq!(provider.source(), SourceKind::Random);
}

#[tokio::test]
async fn subscribers_see_completions_only_once_the_owner_drives() {
    let mock_server = MockServer::start().await;
    mount_page(&mock_server, 1, page_json("a", 2)).await;

    let mut provider = provider_for(&mock_server, SourceKind::Trending, 2);
    let mut events = provider.subscribe();
    provider.fetch_next_page();

    assert!(matches!(
        events.recv().await.unwrap(),
        ProviderEvent::WillStartFetching { .. }
    ));

    // The response has long arrived, but nothing applies it yet
    let undriven = tokio::time::timeout(Duration::from_millis(300), events.recv()).await;
    assert!(undriven.is_err());
    assert!(provider.is_fetching());
    assert!(provider.items().is_empty());

    let event = completion(&mut provider).await;
    assert!(matches!(event, ProviderEvent::DidFetch { .. }));
    assert!(matches!(
        events.recv().await.unwrap(),
        ProviderEvent::DidFetch { ref items, .. } if items.len() == 2
    ));
    assert!(!provider.is_fetching());
}
