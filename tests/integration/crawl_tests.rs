//! Integration tests for the crawler
//!
//! Most tests drive the coordinator with stub transports and analyzers. The
//! last one uses wiremock to run the bundled HTTP transport, HTML analyzer
//! and SQLite sink end-to-end.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use sumi_relay::config::{load_config, CrawlSettings};
use sumi_relay::crawler::{Coordinator, FetchResponse, HttpTransport, TransportError};
use sumi_relay::frontier::{Frontier, FrontierError, FrontierResult, FrontierStats};
use sumi_relay::pipeline::{
    AnalyzeError, Analyzer, Extraction, HtmlAnalyzer, ResponseBody, Sink, SinkError, SqliteSink,
};
use sumi_relay::{CrawlState, MemoryFrontier, RelayError};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const POLL: Duration = Duration::from_millis(10);
const IDLE_TIMEOUT: Duration = Duration::from_secs(10);

/// Serves fixed bodies for known URLs and fails every other request
#[derive(Default)]
struct StubTransport {
    bodies: HashMap<String, String>,
    requests: Mutex<Vec<String>>,
}

impl StubTransport {
    fn new(bodies: &[(&str, &str)]) -> Self {
        Self {
            bodies: bodies
                .iter()
                .map(|(url, body)| (url.to_string(), body.to_string()))
                .collect(),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn requests_for(&self, url: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|u| *u == url)
            .count()
    }
}

#[async_trait]
impl HttpTransport for StubTransport {
    async fn fetch(&self, url: &str) -> Result<FetchResponse, TransportError> {
        self.requests.lock().unwrap().push(url.to_string());
        match self.bodies.get(url) {
            Some(body) => Ok(FetchResponse {
                url: url.to_string(),
                status: 200,
                body: body.clone(),
            }),
            None => Err(TransportError::Connect {
                url: url.to_string(),
                message: "no route to host".to_string(),
            }),
        }
    }
}

/// Maps body text to a canned extraction
#[derive(Default)]
struct ScriptedAnalyzer {
    script: HashMap<String, (Vec<String>, Vec<String>)>,
    delay: Duration,
}

impl ScriptedAnalyzer {
    fn new(script: &[(&str, &[&str], &[&str])]) -> Self {
        Self {
            script: script
                .iter()
                .map(|(body, urls, records)| {
                    (
                        body.to_string(),
                        (
                            urls.iter().map(|u| u.to_string()).collect(),
                            records.iter().map(|r| r.to_string()).collect(),
                        ),
                    )
                })
                .collect(),
            delay: Duration::ZERO,
        }
    }
}

impl Analyzer for ScriptedAnalyzer {
    type Record = String;

    fn analyze(&self, body: &ResponseBody) -> Result<Extraction<String>, AnalyzeError> {
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        match self.script.get(&body.body) {
            Some((urls, records)) => Ok(Extraction::new(urls.clone(), records.clone())),
            None => Ok(Extraction::new(Vec::new(), vec![body.body.clone()])),
        }
    }
}

#[derive(Default)]
struct RecordingSink {
    records: Mutex<Vec<String>>,
}

impl RecordingSink {
    fn records(&self) -> Vec<String> {
        self.records.lock().unwrap().clone()
    }
}

impl Sink<String> for RecordingSink {
    fn store(&self, records: Vec<String>) -> Result<(), SinkError> {
        self.records.lock().unwrap().extend(records);
        Ok(())
    }
}

struct FailingSink;

impl Sink<String> for FailingSink {
    fn store(&self, _records: Vec<String>) -> Result<(), SinkError> {
        Err(SinkError::Rejected("storage offline".to_string()))
    }
}

struct PanickingSink;

impl Sink<String> for PanickingSink {
    fn store(&self, _records: Vec<String>) -> Result<(), SinkError> {
        panic!("sink driver crashed");
    }
}

/// Memory frontier that records every discover call and can be made to fail
#[derive(Default)]
struct SpyFrontier {
    inner: MemoryFrontier,
    discovered: Mutex<Vec<String>>,
    broken: AtomicBool,
}

impl SpyFrontier {
    fn broken_error(&self) -> FrontierResult<()> {
        if self.broken.load(Ordering::SeqCst) {
            return Err(FrontierError::Unavailable("disk detached".to_string()));
        }
        Ok(())
    }
}

impl Frontier for SpyFrontier {
    fn discover(&self, urls: &[String]) -> FrontierResult<usize> {
        self.broken_error()?;
        self.discovered.lock().unwrap().extend_from_slice(urls);
        self.inner.discover(urls)
    }

    fn next(&self) -> FrontierResult<Option<String>> {
        self.broken_error()?;
        self.inner.next()
    }

    fn stats(&self) -> FrontierResult<FrontierStats> {
        self.inner.stats()
    }

    fn clear(&self) -> FrontierResult<()> {
        self.inner.clear()
    }
}

fn settings(fetch_workers: usize, analyze_workers: usize) -> CrawlSettings {
    CrawlSettings {
        fetch_workers,
        analyze_workers,
        politeness_delay: Duration::ZERO,
        idle_backoff: Duration::from_millis(5),
        stats_interval: Duration::from_secs(60),
        ..CrawlSettings::default()
    }
}

fn urls(list: &[&str]) -> Vec<String> {
    list.iter().map(|u| u.to_string()).collect()
}

async fn crawl_until_idle<A: Analyzer>(coordinator: &mut Coordinator<A>) {
    coordinator.start().expect("start failed");
    tokio::time::timeout(IDLE_TIMEOUT, coordinator.wait_until_idle(POLL))
        .await
        .expect("crawl never went idle")
        .expect("crawl failed");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_end_to_end_scenario() {
    let frontier = Arc::new(MemoryFrontier::new());
    let transport = Arc::new(StubTransport::new(&[("https://a", "B1")]));
    let analyzer = Arc::new(ScriptedAnalyzer::new(&[("B1", &["https://c"], &["R1"])]));
    let sink = Arc::new(RecordingSink::default());

    let mut coordinator = Coordinator::<ScriptedAnalyzer>::new(
        frontier.clone(),
        transport.clone(),
        analyzer,
        sink.clone(),
        settings(2, 2),
    )
    .unwrap();
    coordinator
        .seed(&urls(&["https://a", "https://b"]), false)
        .unwrap();

    crawl_until_idle(&mut coordinator).await;
    let stats = coordinator.stop().await.unwrap();

    assert_eq!(stats.urls_seen, 3);
    assert_eq!(stats.urls_pending, 0);
    assert_eq!(stats.responses_fetched, 1);
    assert_eq!(stats.fetch_failures, 2);
    assert_eq!(stats.urls_discovered, 1);
    assert_eq!(sink.records(), vec!["R1"]);

    // c was admitted and fetched once, b was never retried
    assert_eq!(transport.requests_for("https://b"), 1);
    assert_eq!(transport.requests_for("https://c"), 1);
    assert_eq!(frontier.discover(&urls(&["https://a", "https://b", "https://c"])).unwrap(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_stop_drains_buffered_responses() {
    let pages: Vec<(String, String)> = (0..30)
        .map(|n| (format!("https://site/{}", n), format!("page-{}", n)))
        .collect();
    let bodies: Vec<(&str, &str)> = pages
        .iter()
        .map(|(url, body)| (url.as_str(), body.as_str()))
        .collect();
    let seeds: Vec<String> = pages.iter().map(|(url, _)| url.clone()).collect();

    let analyzer = ScriptedAnalyzer {
        delay: Duration::from_millis(15),
        ..ScriptedAnalyzer::default()
    };
    let sink = Arc::new(RecordingSink::default());
    let mut coordinator = Coordinator::<ScriptedAnalyzer>::new(
        Arc::new(MemoryFrontier::new()),
        Arc::new(StubTransport::new(&bodies)),
        Arc::new(analyzer),
        sink.clone(),
        settings(4, 1),
    )
    .unwrap();
    coordinator.seed(&seeds, false).unwrap();

    coordinator.start().unwrap();
    // Fetching outpaces the single slow analyzer, so the buffer backs up
    let mut backlog = 0;
    for _ in 0..400 {
        backlog = coordinator.statistics().unwrap().responses_pending_analysis;
        if backlog >= 5 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(backlog >= 5, "buffer never backed up (backlog {})", backlog);
    let stats = coordinator.stop().await.unwrap();

    assert!(stats.responses_fetched > 0);
    assert_eq!(stats.responses_pending_analysis, 0);
    assert_eq!(stats.responses_analyzed, stats.responses_fetched);
    assert_eq!(sink.records().len() as u64, stats.responses_fetched);
    assert_eq!(coordinator.state(), CrawlState::Stopped);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_sink_failure_does_not_block_forwarding() {
    let frontier = Arc::new(SpyFrontier::default());
    let transport = Arc::new(StubTransport::new(&[
        ("https://a", "hub"),
        ("https://next", "leaf"),
    ]));
    let analyzer = Arc::new(ScriptedAnalyzer::new(&[
        ("hub", &["https://next"], &["hub-record"]),
        ("leaf", &[], &["leaf-record"]),
    ]));

    let mut coordinator = Coordinator::<ScriptedAnalyzer>::new(
        frontier.clone(),
        transport.clone(),
        analyzer,
        Arc::new(FailingSink),
        settings(1, 1),
    )
    .unwrap();
    coordinator.seed(&urls(&["https://a"]), false).unwrap();

    crawl_until_idle(&mut coordinator).await;
    let stats = coordinator.stop().await.unwrap();

    assert_eq!(*frontier.discovered.lock().unwrap(), urls(&["https://next"]));
    assert_eq!(transport.requests_for("https://next"), 1);
    assert_eq!(stats.sink_failures, 2);
    assert_eq!(stats.records_extracted, 2);
    assert_eq!(stats.records_stored, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_restart_with_reset_treats_urls_as_new() {
    let transport = Arc::new(StubTransport::new(&[("https://a", "A")]));
    let sink = Arc::new(RecordingSink::default());
    let mut coordinator = Coordinator::<ScriptedAnalyzer>::new(
        Arc::new(MemoryFrontier::new()),
        transport.clone(),
        Arc::new(ScriptedAnalyzer::default()),
        sink.clone(),
        settings(1, 1),
    )
    .unwrap();

    assert_eq!(coordinator.seed(&urls(&["https://a"]), false).unwrap(), 1);
    crawl_until_idle(&mut coordinator).await;
    coordinator.stop().await.unwrap();

    // Without a reset the seen set still holds the URL
    assert_eq!(coordinator.seed(&urls(&["https://a"]), false).unwrap(), 0);

    assert_eq!(coordinator.seed(&urls(&["https://a"]), true).unwrap(), 1);
    crawl_until_idle(&mut coordinator).await;
    let stats = coordinator.stop().await.unwrap();

    assert_eq!(transport.requests_for("https://a"), 2);
    assert_eq!(sink.records(), vec!["A", "A"]);
    assert_eq!(stats.urls_seen, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_discovery_fetches_once() {
    let transport = Arc::new(StubTransport::new(&[
        ("https://p1", "links-to-x"),
        ("https://p2", "links-to-x"),
        ("https://p3", "links-to-x"),
        ("https://x", "x"),
    ]));
    let analyzer = Arc::new(ScriptedAnalyzer::new(&[(
        "links-to-x",
        &["https://x"],
        &[],
    )]));

    let mut coordinator = Coordinator::<ScriptedAnalyzer>::new(
        Arc::new(MemoryFrontier::new()),
        transport.clone(),
        analyzer,
        Arc::new(RecordingSink::default()),
        settings(3, 3),
    )
    .unwrap();
    coordinator
        .seed(&urls(&["https://p1", "https://p2", "https://p3"]), false)
        .unwrap();

    crawl_until_idle(&mut coordinator).await;
    let stats = coordinator.stop().await.unwrap();

    assert_eq!(transport.requests_for("https://x"), 1);
    assert_eq!(stats.urls_seen, 4);
    assert_eq!(stats.urls_discovered, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_sink_panic_does_not_stall_the_crawl() {
    let pages: Vec<(String, String)> = (0..5)
        .map(|n| (format!("https://site/{}", n), format!("page-{}", n)))
        .collect();
    let bodies: Vec<(&str, &str)> = pages
        .iter()
        .map(|(url, body)| (url.as_str(), body.as_str()))
        .collect();
    let seeds: Vec<String> = pages.iter().map(|(url, _)| url.clone()).collect();

    let mut coordinator = Coordinator::<ScriptedAnalyzer>::new(
        Arc::new(MemoryFrontier::new()),
        Arc::new(StubTransport::new(&bodies)),
        // Unscripted bodies each yield one record
        Arc::new(ScriptedAnalyzer::default()),
        Arc::new(PanickingSink),
        settings(2, 1),
    )
    .unwrap();
    coordinator.seed(&seeds, false).unwrap();

    crawl_until_idle(&mut coordinator).await;
    let stats = tokio::time::timeout(Duration::from_secs(3), coordinator.stop())
        .await
        .expect("stop hung after the sink panicked")
        .unwrap();

    assert_eq!(stats.responses_analyzed, 5);
    assert_eq!(stats.sink_failures, 5);
    assert_eq!(stats.records_stored, 0);
    assert_eq!(stats.responses_pending_analysis, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_frontier_failure_stops_the_crawl() {
    let frontier = Arc::new(SpyFrontier::default());
    frontier.broken.store(true, Ordering::SeqCst);

    let mut coordinator = Coordinator::<ScriptedAnalyzer>::new(
        frontier,
        Arc::new(StubTransport::default()),
        Arc::new(ScriptedAnalyzer::default()),
        Arc::new(RecordingSink::default()),
        settings(2, 1),
    )
    .unwrap();

    let result = tokio::time::timeout(
        IDLE_TIMEOUT,
        coordinator.run_until(std::future::pending::<()>()),
    )
    .await
    .expect("fatal error was not escalated");

    match result {
        Err(RelayError::FrontierFatal(message)) => assert!(message.contains("disk detached")),
        other => panic!("expected a fatal frontier error, got {:?}", other.map(|_| ())),
    }
    assert_eq!(coordinator.state(), CrawlState::Stopped);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_full_crawl_with_http_and_sqlite() {
    // Start a mock server
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(
                    r#"<html><head><title>Home</title></head><body>
                    <a href="/page1">Page 1</a>
                    <a href="/page2#top">Page 2</a>
                    <a href="https://elsewhere.example/">Elsewhere</a>
                    <a href="mailto:someone@example.com">Mail</a>
                    </body></html>"#,
                )
                .insert_header("content-type", "text/html"),
        )
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/page1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(
                    r#"<html><head><title>Page 1</title></head><body><a href="/">Home</a></body></html>"#,
                )
                .insert_header("content-type", "text/html"),
        )
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/page2"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(
                    r#"<html><head><title>Page 2</title></head><body><a href="/missing">Gone</a></body></html>"#,
                )
                .insert_header("content-type", "text/html"),
        )
        .mount(&mock_server)
        .await;

    // Anything else is a 404 from wiremock

    let dir = TempDir::new().unwrap();
    let frontier_path = dir.path().join("frontier.db");
    let items_path = dir.path().join("items.db");
    let config_path = dir.path().join("config.toml");
    std::fs::write(
        &config_path,
        format!(
            r#"
[fetch]
pool-size = 2
politeness-delay = 0.0
request-timeout = 5
idle-backoff-ms = 5

[analyze]
pool-size = 2

[user-agent]
crawler-name = "TestBot"
crawler-version = "1.0.0"
contact-url = "https://example.com/contact"
contact-email = "test@example.com"

[frontier]
backend = "sqlite"
database-path = "{}"

[output]
database-path = "{}"

[analyzer]
same-host-only = true

[seeds]
urls = ["{}/"]
"#,
            frontier_path.display(),
            items_path.display(),
            base_url
        ),
    )
    .unwrap();

    let config = load_config(&config_path).expect("Failed to load config");
    let analyzer = HtmlAnalyzer::new(&config.analyzer).unwrap();
    let sink = Arc::new(SqliteSink::open(&items_path).unwrap());

    let mut coordinator =
        Coordinator::<HtmlAnalyzer>::from_config(&config, Arc::new(analyzer), sink.clone())
            .expect("Failed to create coordinator");
    coordinator.seed(&config.seeds.urls, true).unwrap();

    crawl_until_idle(&mut coordinator).await;
    let stats = coordinator.stop().await.unwrap();

    // /, /page1, /page2 and /missing; the external link is off-host
    assert_eq!(stats.urls_seen, 4);
    assert_eq!(stats.responses_fetched, 3);
    assert_eq!(stats.fetch_failures, 1);

    let mut titles: Vec<String> = sink
        .load_all()
        .unwrap()
        .into_iter()
        .filter_map(|item| item.title)
        .collect();
    titles.sort();
    assert_eq!(titles, vec!["Home", "Page 1", "Page 2"]);

    // The durable frontier keeps the seen set across a reopen
    drop(coordinator);
    let reopened = sumi_relay::SqliteFrontier::open(&frontier_path).unwrap();
    assert_eq!(
        reopened.stats().unwrap(),
        FrontierStats {
            seen: 4,
            pending: 0
        }
    );
}
