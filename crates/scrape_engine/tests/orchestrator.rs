use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use pretty_assertions::assert_eq;
use scrape_core::{Environment, InputError, Pagination, ScrapeRequest, User, ValidatedUrl};
use scrape_engine::{
    AdminError, FailureKind, FetchError, FetchSettings, FetchedPage, Fetcher, HistoryError,
    HistoryEntry, HistoryPage, HistorySink, HistorySummary, HtmlImageExtractor,
    InMemoryHistorySink, ManualClock, Orchestrator, ReqwestFetcher, ResultCache,
};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Serves canned pages keyed by URL and counts calls.
#[derive(Default)]
struct StubFetcher {
    pages: HashMap<String, Result<FetchedPage, FetchError>>,
    calls: AtomicUsize,
}

impl StubFetcher {
    fn page(mut self, url: &str, html: &str) -> Self {
        self.pages.insert(
            url.to_string(),
            Ok(FetchedPage {
                body: html.as_bytes().to_vec(),
                final_url: url.to_string(),
                content_type: Some("text/html; charset=utf-8".to_string()),
                redirect_count: 0,
            }),
        );
        self
    }

    fn raw(mut self, url: &str, page: FetchedPage) -> Self {
        self.pages.insert(url.to_string(), Ok(page));
        self
    }

    fn failure(mut self, url: &str, kind: FailureKind, message: &str) -> Self {
        self.pages.insert(
            url.to_string(),
            Err(FetchError {
                kind,
                message: message.to_string(),
            }),
        );
        self
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Fetcher for StubFetcher {
    async fn fetch(&self, url: &ValidatedUrl) -> Result<FetchedPage, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if url.as_str().contains("panic") {
            panic!("fetcher blew up for {url}");
        }
        self.pages.get(url.as_str()).cloned().unwrap_or_else(|| {
            Err(FetchError {
                kind: FailureKind::Connection,
                message: format!("no route to {url}"),
            })
        })
    }
}

struct FailingSink;

#[async_trait::async_trait]
impl HistorySink for FailingSink {
    async fn write(&self, _summary: HistorySummary) -> Result<HistoryEntry, HistoryError> {
        Err(HistoryError::Unavailable("database down".to_string()))
    }

    async fn read(&self, _user_id: &str, _page: Pagination) -> Result<HistoryPage, HistoryError> {
        Err(HistoryError::Unavailable("database down".to_string()))
    }
}

fn init_logging() {
    scrape_logging::initialize_for_tests();
}

fn alice() -> User {
    User {
        id: "alice".to_string(),
        email: "alice@example.com".to_string(),
    }
}

fn orchestrator_with(fetcher: Arc<StubFetcher>, ttl: Duration) -> (Orchestrator, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new());
    let cache = Arc::new(ResultCache::with_clock(ttl, clock.clone()));
    let orchestrator =
        Orchestrator::from_parts(fetcher, Arc::new(HtmlImageExtractor::new()), cache);
    (orchestrator, clock)
}

async fn wait_for_history(sink: &InMemoryHistorySink, expected: usize) {
    for _ in 0..100 {
        if sink.len() >= expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn empty_and_oversized_requests_never_touch_the_network() {
    init_logging();
    let fetcher = Arc::new(StubFetcher::default());
    let (orchestrator, _) = orchestrator_with(fetcher.clone(), Duration::from_secs(60));

    let empty = orchestrator
        .scrape(&ScrapeRequest::new(Vec::<String>::new()), None)
        .await;
    assert_eq!(empty, Err(InputError::Empty));

    let urls = (0..11).map(|i| format!("https://example.com/{i}"));
    let too_many = orchestrator.scrape(&ScrapeRequest::new(urls), None).await;
    assert_eq!(too_many, Err(InputError::TooMany { count: 11, max: 10 }));

    assert_eq!(fetcher.calls(), 0);
    assert!(orchestrator.cache().is_empty());
}

#[tokio::test]
async fn invalid_urls_become_errors_alongside_results() {
    init_logging();
    let fetcher = Arc::new(
        StubFetcher::default().page(
            "https://example.com/a",
            r#"<img src="/logo.png"><img src="pics/cat.jpg"><img src="/logo.png">"#,
        ),
    );
    let (orchestrator, _) = orchestrator_with(fetcher.clone(), Duration::from_secs(60));

    let request = ScrapeRequest::new(["https://example.com/a", "not a url"]);
    let response = orchestrator.scrape(&request, None).await.unwrap();

    assert_eq!(
        response.results.get("https://example.com/a").unwrap(),
        &[
            "https://example.com/logo.png".to_string(),
            "https://example.com/pics/cat.jpg".to_string(),
        ]
    );
    assert_eq!(response.errors.len(), 1);
    assert_eq!(response.errors[0].url, "not a url");
    assert_eq!(response.errors[0].error, "Invalid URL format");
    assert_eq!(fetcher.calls(), 1);
}

#[tokio::test]
async fn each_failure_is_contained_to_its_url() {
    init_logging();
    let fetcher = Arc::new(
        StubFetcher::default()
            .page("https://ok.example/", r#"<img src="a.png">"#)
            .failure(
                "https://missing.example/",
                FailureKind::HttpStatus(404),
                "404 Not Found for url 'https://missing.example/'",
            )
            .failure(
                "https://refused.example/",
                FailureKind::Connection,
                "connection refused",
            )
            .raw(
                "https://stray-byte.example/",
                FetchedPage {
                    body: b"<html><img src='/a.png'>caf\xe9</html>".to_vec(),
                    final_url: "https://stray-byte.example/".to_string(),
                    content_type: Some("text/html; charset=utf-8".to_string()),
                    redirect_count: 0,
                },
            )
            .raw(
                "https://relative-base.example/",
                FetchedPage {
                    body: b"<img src='a.png'>".to_vec(),
                    final_url: "/relative".to_string(),
                    content_type: None,
                    redirect_count: 0,
                },
            ),
    );
    let (orchestrator, _) = orchestrator_with(fetcher, Duration::from_secs(60));

    let request = ScrapeRequest::new([
        "https://missing.example/",
        "https://panic.example/",
        "https://ok.example/",
        "https://refused.example/",
        "https://stray-byte.example/",
        "https://relative-base.example/",
    ]);
    let response = orchestrator.scrape(&request, None).await.unwrap();

    assert_eq!(
        response.results.urls().collect::<Vec<_>>(),
        vec!["https://ok.example/", "https://stray-byte.example/"]
    );
    assert_eq!(
        response.results.get("https://stray-byte.example/").unwrap(),
        &["https://stray-byte.example/a.png".to_string()]
    );
    let errors: Vec<_> = response
        .errors
        .iter()
        .map(|e| (e.url.as_str(), e.error.as_str()))
        .collect();
    assert_eq!(
        errors,
        vec![
            (
                "https://missing.example/",
                "Failed to scrape: 404 Not Found for url 'https://missing.example/'"
            ),
            (
                "https://panic.example/",
                "Failed to scrape: unit aborted unexpectedly"
            ),
            (
                "https://refused.example/",
                "Failed to scrape: connection error: connection refused"
            ),
            (
                "https://relative-base.example/",
                "Failed to extract images: base url '/relative' is not absolute: relative URL without a base"
            ),
        ]
    );
}

#[tokio::test]
async fn identical_requests_within_ttl_are_served_from_cache() {
    init_logging();
    let fetcher = Arc::new(
        StubFetcher::default()
            .page("https://a.example/", "<img src='x.png'>")
            .page("https://b.example/", "<img src='y.png'>"),
    );
    let (orchestrator, clock) = orchestrator_with(fetcher.clone(), Duration::from_secs(60));
    let request = ScrapeRequest::new(["https://a.example/", "https://b.example/"]);

    let first = orchestrator.scrape(&request, None).await.unwrap();
    clock.advance(Duration::from_secs(30));
    let second = orchestrator.scrape(&request, None).await.unwrap();

    assert_eq!(fetcher.calls(), 2);
    assert_eq!(
        serde_json::to_vec(&first).unwrap(),
        serde_json::to_vec(&second).unwrap()
    );

    // Same URLs in a different order are a different batch.
    let reordered = ScrapeRequest::new(["https://b.example/", "https://a.example/"]);
    let response = orchestrator.scrape(&reordered, None).await.unwrap();
    assert_eq!(fetcher.calls(), 4);
    assert_eq!(
        response.results.urls().collect::<Vec<_>>(),
        vec!["https://b.example/", "https://a.example/"]
    );
}

#[tokio::test]
async fn expired_entries_trigger_a_fresh_fetch() {
    init_logging();
    let fetcher = Arc::new(StubFetcher::default().page("https://a.example/", "<img src='x.png'>"));
    let (orchestrator, clock) = orchestrator_with(fetcher.clone(), Duration::from_secs(60));
    let request = ScrapeRequest::new(["https://a.example/"]);

    orchestrator.scrape(&request, None).await.unwrap();
    clock.advance(Duration::from_secs(60));
    orchestrator.scrape(&request, None).await.unwrap();
    assert_eq!(fetcher.calls(), 2);

    // The refetch wrote a new entry, so the next call is a hit again.
    orchestrator.scrape(&request, None).await.unwrap();
    assert_eq!(fetcher.calls(), 2);
}

#[tokio::test]
async fn disabled_cache_always_fetches() {
    init_logging();
    let fetcher = Arc::new(StubFetcher::default().page("https://a.example/", ""));
    let (orchestrator, _) = orchestrator_with(fetcher.clone(), Duration::from_secs(60));
    let orchestrator = orchestrator.with_cache_enabled(false);
    let request = ScrapeRequest::new(["https://a.example/"]);

    orchestrator.scrape(&request, None).await.unwrap();
    orchestrator.scrape(&request, None).await.unwrap();
    assert_eq!(fetcher.calls(), 2);
    assert!(orchestrator.cache().is_empty());
}

#[tokio::test]
async fn history_is_written_once_for_authenticated_callers() {
    init_logging();
    let fetcher = Arc::new(
        StubFetcher::default()
            .page("https://a.example/", "<img src='1.png'><img src='2.png'>")
            .page("https://b.example/", "<img src='3.png'>"),
    );
    let sink = Arc::new(InMemoryHistorySink::new());
    let (orchestrator, _) = orchestrator_with(fetcher, Duration::from_secs(60));
    let orchestrator = orchestrator.with_history(sink.clone());

    let request = ScrapeRequest::new(["https://a.example/", "https://b.example/", "bad"]);
    orchestrator.scrape(&request, Some(&alice())).await.unwrap();
    wait_for_history(&sink, 1).await;

    // Cache hit: no second history write.
    orchestrator.scrape(&request, Some(&alice())).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let page = sink.read("alice", Pagination::default()).await.unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].image_count, 3);
    assert_eq!(
        page.items[0].urls,
        vec!["https://a.example/", "https://b.example/", "bad"]
    );
}

#[tokio::test]
async fn history_is_skipped_for_anonymous_or_empty_batches() {
    init_logging();
    let fetcher = Arc::new(StubFetcher::default().page("https://a.example/", ""));
    let sink = Arc::new(InMemoryHistorySink::new());
    let (orchestrator, _) = orchestrator_with(fetcher, Duration::from_secs(60));
    let orchestrator = orchestrator.with_history(sink.clone());

    orchestrator
        .scrape(&ScrapeRequest::new(["https://a.example/"]), None)
        .await
        .unwrap();
    orchestrator
        .scrape(&ScrapeRequest::new(["nope", "https://down.example/"]), Some(&alice()))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(sink.is_empty());
}

#[tokio::test]
async fn history_failures_do_not_affect_the_response() {
    init_logging();
    let fetcher = Arc::new(StubFetcher::default().page("https://a.example/", "<img src='x.png'>"));
    let (orchestrator, _) = orchestrator_with(fetcher, Duration::from_secs(60));
    let orchestrator = orchestrator.with_history(Arc::new(FailingSink));

    let response = orchestrator
        .scrape(&ScrapeRequest::new(["https://a.example/"]), Some(&alice()))
        .await
        .unwrap();
    assert_eq!(response.results.image_count(), 1);
    assert!(response.errors.is_empty());
}

#[tokio::test]
async fn clearing_the_cache_is_refused_in_production() {
    init_logging();
    let fetcher = Arc::new(StubFetcher::default().page("https://a.example/", ""));
    let (orchestrator, _) = orchestrator_with(fetcher, Duration::from_secs(60));
    orchestrator
        .scrape(&ScrapeRequest::new(["https://a.example/"]), None)
        .await
        .unwrap();

    assert_eq!(
        orchestrator.clear_cache(Environment::Production),
        Err(AdminError::NotAllowed(Environment::Production))
    );
    assert_eq!(orchestrator.cache().len(), 1);

    orchestrator.clear_cache(Environment::Development).unwrap();
    assert!(orchestrator.cache().is_empty());
}

#[tokio::test]
async fn live_fetch_resolves_against_post_redirect_url() {
    init_logging();
    let server = MockServer::start().await;
    let landing = format!("{}/gallery/index.html", server.uri());
    Mock::given(method("GET"))
        .and(path("/start"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", landing.as_str()))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/gallery/index.html"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(r#"<img src="thumb.png"><img src="/abs.png">"#, "text/html"),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let orchestrator = Orchestrator::from_parts(
        Arc::new(ReqwestFetcher::new(FetchSettings::default())),
        Arc::new(HtmlImageExtractor::new()),
        Arc::new(ResultCache::new(Duration::from_secs(60))),
    );
    let start = format!("{}/start", server.uri());
    let missing = format!("{}/missing", server.uri());
    let request = ScrapeRequest::new([start.clone(), missing.clone()]);

    let response = orchestrator.scrape(&request, None).await.unwrap();
    // Second call is answered by the cache; the mocks' `expect(1)` checks this on drop.
    let again = orchestrator.scrape(&request, None).await.unwrap();
    assert_eq!(response, again);

    assert_eq!(
        response.results.get(&start).unwrap(),
        &[
            format!("{}/gallery/thumb.png", server.uri()),
            format!("{}/abs.png", server.uri()),
        ]
    );
    assert_eq!(response.errors.len(), 1);
    assert_eq!(response.errors[0].url, missing);
    assert!(response.errors[0].error.contains("404"));
}

#[tokio::test]
async fn slow_unit_times_out_without_blocking_siblings() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/fast1"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("<img src='1.png'>", "text/html"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/fast2"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("<img src='2.png'>", "text/html"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_secs(5))
                .set_body_raw("<img src='3.png'>", "text/html"),
        )
        .mount(&server)
        .await;

    let settings = FetchSettings {
        request_timeout: Duration::from_millis(200),
        ..FetchSettings::default()
    };
    let orchestrator = Orchestrator::from_parts(
        Arc::new(ReqwestFetcher::new(settings)),
        Arc::new(HtmlImageExtractor::new()),
        Arc::new(ResultCache::new(Duration::from_secs(60))),
    );
    let request = ScrapeRequest::new([
        format!("{}/fast1", server.uri()),
        format!("{}/slow", server.uri()),
        format!("{}/fast2", server.uri()),
    ]);

    let started = Instant::now();
    let response = orchestrator.scrape(&request, None).await.unwrap();
    assert!(started.elapsed() < Duration::from_secs(3));

    assert_eq!(response.results.len(), 2);
    assert_eq!(response.errors.len(), 1);
    assert_eq!(response.errors[0].url, request.urls[1]);
    let error = &response.errors[0].error;
    assert!(error.starts_with("Failed to scrape: timeout: "), "{error}");
    assert_eq!(error.matches(request.urls[1].as_str()).count(), 1, "{error}");
}
