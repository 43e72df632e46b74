//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and test
//! the full crawl cycle end-to-end.

use ripple_harvest::config::{
    load_config, Config, CrawlerConfig, DiscoveryMode, FieldRule, FieldsConfig, OutputConfig,
    OutputFormat, SourceConfig, UserAgentConfig,
};
use ripple_harvest::crawler::{
    run_crawl, Coordinator, Extractor, ExtractorRegistry, FetchResult, StopReason, VisitedStore,
};
use ripple_harvest::output::open_writer;
use ripple_harvest::{HarvestError, PatternSet, Record, TargetKind, UrlScope};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn value(text: &str) -> FieldRule {
    FieldRule {
        value: Some(text.to_string()),
        ..FieldRule::default()
    }
}

fn selector(css: &str) -> FieldRule {
    FieldRule {
        selector: Some(css.to_string()),
        ..FieldRule::default()
    }
}

/// Creates a test configuration crawling the mock server
fn create_test_config(base_url: &str, seeds: &[&str], seed_kind: TargetKind) -> Config {
    Config {
        crawler: CrawlerConfig {
            max_depth: 2,
            max_containers: 20,
            max_items: 100,
            worker_count: 4,
            requests_per_second: 100.0,
            fetch_timeout_secs: 5,
            max_fetch_attempts: 3,
            backoff_base_ms: 1,
            backoff_max_ms: 5,
            respect_robots: false,
        },
        user_agent: UserAgentConfig {
            crawler_name: "TestBot".to_string(),
            crawler_version: "1.0.0".to_string(),
            contact_url: "https://example.com/contact".to_string(),
            contact_email: "test@example.com".to_string(),
        },
        headers: BTreeMap::new(),
        output: OutputConfig {
            path: "unused.csv".to_string(),
            format: OutputFormat::Csv,
        },
        sources: vec![SourceConfig {
            name: "mock".to_string(),
            domain: "127.0.0.1".to_string(),
            seeds: seeds.iter().map(|s| format!("{}{}", base_url, s)).collect(),
            seed_kind,
            discovery: DiscoveryMode::Markup,
            container_patterns: vec!["/category/".to_string()],
            item_patterns: vec!["/item/".to_string()],
            exclude_patterns: vec![],
            link_selector: "a[href]".to_string(),
            next_page_selector: None,
            next_page_text: None,
            fields: Some(FieldsConfig {
                title: selector("h1"),
                content: selector("p"),
                date: value("2024-05-01"),
                author: value("Staff"),
                categories: value("Test"),
            }),
        }],
    }
}

fn listing_page(links: &[String]) -> String {
    let anchors: String = links
        .iter()
        .map(|href| format!(r#"<a href="{}">{}</a>"#, href, href))
        .collect();
    format!("<html><body>{}</body></html>", anchors)
}

fn item_page(title: &str) -> String {
    format!(
        "<html><body><h1>{}</h1><p>Body of {}</p></body></html>",
        title, title
    )
}

async fn mount_html(server: &MockServer, at: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(at))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body)
                .insert_header("content-type", "text/html"),
        )
        .mount(server)
        .await;
}

async fn mount_item(server: &MockServer, at: &str, title: &str) {
    mount_html(server, at, item_page(title)).await;
}

async fn mount_unreachable(server: &MockServer, at: &str) {
    Mock::given(method("GET"))
        .and(path(at))
        .respond_with(ResponseTemplate::new(200).set_body_string(item_page("never")))
        .expect(0)
        .mount(server)
        .await;
}

fn titles(records: &[Record]) -> Vec<String> {
    let mut titles: Vec<String> = records.iter().map(|r| r.title.clone()).collect();
    titles.sort();
    titles
}

#[tokio::test]
async fn test_depth_budget_stops_discovery() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_html(
        &mock_server,
        "/category/root",
        listing_page(&[
            format!("{}/item/1", base_url),
            format!("{}/item/2", base_url),
            format!("{}/item/3", base_url),
            format!("{}/category/sub", base_url),
        ]),
    )
    .await;
    mount_html(
        &mock_server,
        "/category/sub",
        listing_page(&[format!("{}/item/4", base_url), format!("{}/item/5", base_url)]),
    )
    .await;
    for i in 1..=3 {
        mount_item(&mock_server, &format!("/item/{}", i), &format!("Item {}", i)).await;
    }
    mount_unreachable(&mock_server, "/item/4").await;
    mount_unreachable(&mock_server, "/item/5").await;

    let mut config = create_test_config(&base_url, &["/category/root"], TargetKind::Container);
    config.crawler.max_depth = 1;

    let report = run_crawl(config).await.expect("Crawl failed");

    assert_eq!(titles(&report.records), vec!["Item 1", "Item 2", "Item 3"]);
    assert_eq!(report.statistics.containers_fetched, 2);
    assert_eq!(report.statistics.targets_too_deep, 2);
    assert_eq!(report.stop_reason, None);
}

struct CanonicalExtractor {
    name: &'static str,
}

impl Extractor for CanonicalExtractor {
    fn name(&self) -> &str {
        self.name
    }

    fn extract(&self, _page: &FetchResult, url: &Url) -> Option<Record> {
        Some(Record {
            title: "Shared Story".to_string(),
            content: format!("Rendered by {}", self.name),
            date: "2024-05-01".to_string(),
            url: "https://news.example.com/shared-story".to_string(),
            author: "Desk".to_string(),
            domain: url.host_str()?.to_string(),
            categories: "World".to_string(),
        })
    }
}

#[tokio::test]
async fn test_records_deduplicated_across_extractors() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_item(&mock_server, "/a/story", "A").await;
    mount_item(&mock_server, "/b/story", "B").await;

    let config = create_test_config(&base_url, &["/a/story", "/b/story"], TargetKind::Item);

    let mut extractors = ExtractorRegistry::new();
    extractors.register(
        UrlScope::new("127.0.0.1", PatternSet::new(vec!["/a/".to_string()], vec![])),
        Arc::new(CanonicalExtractor { name: "edition-a" }),
    );
    extractors.register(
        UrlScope::new("127.0.0.1", PatternSet::new(vec!["/b/".to_string()], vec![])),
        Arc::new(CanonicalExtractor { name: "edition-b" }),
    );

    let report = Coordinator::with_extractors(config, extractors)
        .expect("Failed to create coordinator")
        .run()
        .await
        .expect("Crawl failed");

    assert_eq!(report.statistics.items_fetched, 2);
    assert_eq!(report.records.len(), 1);
    assert_eq!(report.records[0].title, "Shared Story");
    assert_eq!(report.statistics.records_duplicate, 1);
}

#[tokio::test]
async fn test_record_cap_terminates_crawl() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(item_page("Capped"))
                .set_delay(Duration::from_millis(50)),
        )
        .mount(&mock_server)
        .await;

    let seeds: Vec<String> = (0..10).map(|i| format!("/item/{}", i)).collect();
    let seed_refs: Vec<&str> = seeds.iter().map(String::as_str).collect();
    let mut config = create_test_config(&base_url, &seed_refs, TargetKind::Item);
    config.crawler.max_items = 2;
    config.crawler.worker_count = 2;

    let report = run_crawl(config).await.expect("Crawl failed");

    assert_eq!(report.records.len(), 2);
    assert_eq!(report.statistics.records_accepted, 2);
    assert_eq!(report.stop_reason, Some(StopReason::MaxItems));
    assert!(report.statistics.items_fetched < 10);
}

#[tokio::test]
async fn test_transient_failure_retried_then_dropped() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/item/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&mock_server)
        .await;

    let config = create_test_config(&base_url, &["/item/flaky"], TargetKind::Item);

    match run_crawl(config).await {
        Err(HarvestError::AllSeedsFailed { seeds }) => assert_eq!(seeds, 1),
        other => panic!("Expected AllSeedsFailed, got {:?}", other.map(|r| r.records)),
    }
}

#[tokio::test]
async fn test_failed_seed_is_not_fatal() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/item/missing"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&mock_server)
        .await;
    mount_item(&mock_server, "/item/present", "Present").await;

    let config = create_test_config(
        &base_url,
        &["/item/missing", "/item/present"],
        TargetKind::Item,
    );

    let report = run_crawl(config).await.expect("Crawl failed");

    assert_eq!(titles(&report.records), vec!["Present"]);
    assert_eq!(report.statistics.fetch_failures, 1);
}

#[tokio::test]
async fn test_pagination_keeps_depth() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_html(
        &mock_server,
        "/category/news",
        format!(
            r#"<html><body>
            <a href="{base}/item/1">One</a>
            <a rel="next" href="{base}/category/news/page2">Older</a>
            </body></html>"#,
            base = base_url
        ),
    )
    .await;
    mount_html(
        &mock_server,
        "/category/news/page2",
        format!(
            r#"<html><body>
            <a href="{base}/item/2">Two</a>
            <a rel="next" href="{base}/category/news/page3">Older</a>
            </body></html>"#,
            base = base_url
        ),
    )
    .await;
    mount_html(
        &mock_server,
        "/category/news/page3",
        listing_page(&[format!("{}/item/3", base_url)]),
    )
    .await;
    for i in 1..=3 {
        mount_item(&mock_server, &format!("/item/{}", i), &format!("Page item {}", i)).await;
    }

    let mut config = create_test_config(&base_url, &["/category/news"], TargetKind::Container);
    config.crawler.max_depth = 1;

    let report = run_crawl(config).await.expect("Crawl failed");

    // Items behind two pagination hops are still at depth 1
    assert_eq!(
        titles(&report.records),
        vec!["Page item 1", "Page item 2", "Page item 3"]
    );
    assert_eq!(report.statistics.containers_fetched, 3);
    assert_eq!(report.statistics.targets_too_deep, 0);
}

#[tokio::test]
async fn test_cycles_terminate() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_html(
        &mock_server,
        "/category/a",
        listing_page(&[
            format!("{}/category/b", base_url),
            format!("{}/item/1", base_url),
        ]),
    )
    .await;
    mount_html(
        &mock_server,
        "/category/b",
        listing_page(&[
            format!("{}/category/a", base_url),
            format!("{}/item/1#comments", base_url),
        ]),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/item/1"))
        .respond_with(ResponseTemplate::new(200).set_body_string(item_page("Looped")))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut config = create_test_config(&base_url, &["/category/a"], TargetKind::Container);
    config.crawler.max_depth = 5;

    let report = run_crawl(config).await.expect("Crawl failed");

    assert_eq!(titles(&report.records), vec!["Looped"]);
    assert_eq!(report.statistics.containers_fetched, 2);
}

#[tokio::test]
async fn test_robots_txt_respect() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("User-agent: *\nDisallow: /item/private\nAllow: /"),
        )
        .expect(1)
        .mount(&mock_server)
        .await;
    mount_html(
        &mock_server,
        "/category/root",
        listing_page(&[
            format!("{}/item/public", base_url),
            format!("{}/item/private", base_url),
        ]),
    )
    .await;
    mount_item(&mock_server, "/item/public", "Public").await;
    mount_unreachable(&mock_server, "/item/private").await;

    let mut config = create_test_config(&base_url, &["/category/root"], TargetKind::Container);
    config.crawler.respect_robots = true;

    let report = run_crawl(config).await.expect("Crawl failed");

    assert_eq!(titles(&report.records), vec!["Public"]);
    assert_eq!(report.statistics.robots_denied, 1);
}

#[tokio::test]
async fn test_sitemap_discovery() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/sitemap.xml"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(format!(
                    r#"<?xml version="1.0" encoding="UTF-8"?>
                    <sitemapindex xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
                      <sitemap><loc>{}/sitemap-articles.xml</loc></sitemap>
                    </sitemapindex>"#,
                    base_url
                ))
                .insert_header("content-type", "application/xml"),
        )
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/sitemap-articles.xml"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(format!(
                    r#"<?xml version="1.0" encoding="UTF-8"?>
                    <urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
                      <url><loc>{base}/item/first</loc></url>
                      <url><loc>{base}/item/second</loc></url>
                      <url><loc>{base}/tag/ignored</loc></url>
                    </urlset>"#,
                    base = base_url
                ))
                .insert_header("content-type", "application/xml"),
        )
        .mount(&mock_server)
        .await;
    mount_item(&mock_server, "/item/first", "First").await;
    mount_item(&mock_server, "/item/second", "Second").await;
    mount_unreachable(&mock_server, "/tag/ignored").await;

    let mut config = create_test_config(&base_url, &["/sitemap.xml"], TargetKind::Container);
    config.sources[0].discovery = DiscoveryMode::Auto;

    let report = run_crawl(config).await.expect("Crawl failed");

    assert_eq!(titles(&report.records), vec!["First", "Second"]);
    assert!(report
        .records
        .iter()
        .all(|r| r.url.starts_with(&base_url) && r.domain.starts_with("127.0.0.1")));
}

#[tokio::test]
async fn test_incomplete_records_rejected() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_html(
        &mock_server,
        "/item/empty",
        "<html><body><h1>No body</h1></body></html>".to_string(),
    )
    .await;
    mount_item(&mock_server, "/item/full", "Full").await;

    let config = create_test_config(&base_url, &["/item/empty", "/item/full"], TargetKind::Item);

    let report = run_crawl(config).await.expect("Crawl failed");

    assert_eq!(titles(&report.records), vec!["Full"]);
    assert_eq!(report.statistics.extraction_failures, 1);
    assert_eq!(report.statistics.records_incomplete, 0);
}

#[tokio::test]
async fn test_placeholder_author_is_extraction_failure() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_html(
        &mock_server,
        "/item/anon",
        r#"<html><body><h1>Anon</h1><p>Text</p><span class="by">n/a</span></body></html>"#
            .to_string(),
    )
    .await;
    mount_html(
        &mock_server,
        "/item/signed",
        r#"<html><body><h1>Signed</h1><p>Text</p><span class="by">Jo Park</span></body></html>"#
            .to_string(),
    )
    .await;

    let mut config =
        create_test_config(&base_url, &["/item/anon", "/item/signed"], TargetKind::Item);
    if let Some(fields) = config.sources[0].fields.as_mut() {
        fields.author = selector("span.by");
    }

    let report = run_crawl(config).await.expect("Crawl failed");

    assert_eq!(titles(&report.records), vec!["Signed"]);
    assert_eq!(report.records[0].author, "Jo Park");
    assert_eq!(report.statistics.extraction_failures, 1);
    assert_eq!(report.statistics.records_incomplete, 0);
}

#[tokio::test]
async fn test_unusable_crawl_delay_keeps_crawl_running() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "User-agent: *\nCrawl-delay: 1e30\nDisallow: /item/private\n",
        ))
        .expect(1)
        .mount(&mock_server)
        .await;
    mount_item(&mock_server, "/item/a", "A").await;
    mount_item(&mock_server, "/item/b", "B").await;
    mount_unreachable(&mock_server, "/item/private").await;

    let mut config = create_test_config(
        &base_url,
        &["/item/a", "/item/b", "/item/private"],
        TargetKind::Item,
    );
    config.crawler.respect_robots = true;

    let report = tokio::time::timeout(Duration::from_secs(10), run_crawl(config))
        .await
        .expect("Crawl did not finish")
        .expect("Crawl failed");

    assert_eq!(titles(&report.records), vec!["A", "B"]);
    assert_eq!(report.statistics.robots_denied, 1);
    assert_eq!(report.statistics.task_failures, 0);
}

struct PanickyExtractor;

impl Extractor for PanickyExtractor {
    fn name(&self) -> &str {
        "panicky"
    }

    fn extract(&self, _page: &FetchResult, url: &Url) -> Option<Record> {
        if url.path().ends_with("/boom") {
            panic!("extractor blew up on {}", url);
        }
        Some(Record {
            title: url.path().to_string(),
            content: "Body".to_string(),
            date: "2024-05-01".to_string(),
            url: url.to_string(),
            author: "Desk".to_string(),
            domain: url.host_str()?.to_string(),
            categories: "World".to_string(),
        })
    }
}

#[tokio::test]
async fn test_panicking_extractor_does_not_stall_crawl() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    for name in ["one", "boom", "two", "three"] {
        mount_item(&mock_server, &format!("/item/{}", name), name).await;
    }

    let mut config = create_test_config(
        &base_url,
        &["/item/one", "/item/boom", "/item/two", "/item/three"],
        TargetKind::Item,
    );
    config.crawler.worker_count = 1;

    let mut extractors = ExtractorRegistry::new();
    extractors.register(
        UrlScope::new("127.0.0.1", PatternSet::new(vec![], vec![])),
        Arc::new(PanickyExtractor),
    );

    let coordinator =
        Coordinator::with_extractors(config, extractors).expect("Failed to create coordinator");
    let report = tokio::time::timeout(Duration::from_secs(10), coordinator.run())
        .await
        .expect("Crawl did not finish")
        .expect("Crawl failed");

    assert_eq!(
        titles(&report.records),
        vec!["/item/one", "/item/three", "/item/two"]
    );
    assert_eq!(report.statistics.task_failures, 1);
    assert_eq!(report.stop_reason, None);
}

#[tokio::test]
async fn test_abort_during_robots_lookup_skips_fetch() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("User-agent: *\nAllow: /\n")
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&mock_server)
        .await;
    mount_unreachable(&mock_server, "/item/late").await;

    let mut config = create_test_config(&base_url, &["/item/late"], TargetKind::Item);
    config.crawler.respect_robots = true;

    let coordinator = Coordinator::new(config).expect("Failed to create coordinator");
    let abort = coordinator.abort_handle();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        abort.abort();
    });

    let report = coordinator.run().await.expect("Crawl failed");

    assert!(report.records.is_empty());
    assert_eq!(report.stop_reason, Some(StopReason::Aborted));
    assert_eq!(report.statistics.targets_fetched(), 0);
}

#[tokio::test]
async fn test_container_cap_refuses_new_containers_only() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_html(
        &mock_server,
        "/category/root",
        listing_page(&[
            format!("{}/category/sub", base_url),
            format!("{}/item/1", base_url),
            format!("{}/item/2", base_url),
        ]),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/category/sub"))
        .respond_with(ResponseTemplate::new(200).set_body_string(listing_page(&[])))
        .expect(0)
        .mount(&mock_server)
        .await;
    mount_item(&mock_server, "/item/1", "Item 1").await;
    mount_item(&mock_server, "/item/2", "Item 2").await;

    let mut config = create_test_config(&base_url, &["/category/root"], TargetKind::Container);
    config.crawler.max_containers = 1;

    let report = run_crawl(config).await.expect("Crawl failed");

    assert_eq!(titles(&report.records), vec!["Item 1", "Item 2"]);
    assert_eq!(report.statistics.containers_fetched, 1);
    assert_eq!(report.statistics.targets_capped, 1);
    assert_eq!(report.stop_reason, None);
}

#[test]
fn test_concurrent_claims_are_exclusive() {
    let store = Arc::new(VisitedStore::new());
    let keys: Vec<String> = (0..200)
        .map(|i| format!("https://example.com/item/{}", i))
        .collect();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let store = store.clone();
            let keys = keys.clone();
            std::thread::spawn(move || keys.iter().filter(|k| store.try_claim(k)).count())
        })
        .collect();

    let claimed: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
    assert_eq!(claimed, keys.len());
    assert_eq!(store.len(), keys.len());
}

#[tokio::test]
async fn test_config_file_to_csv_output() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_html(
        &mock_server,
        "/category/root",
        listing_page(&[format!("{}/item/1", base_url), format!("{}/item/2", base_url)]),
    )
    .await;
    mount_item(&mock_server, "/item/1", "Alpha").await;
    mount_item(&mock_server, "/item/2", "Beta").await;

    let dir = tempfile::tempdir().unwrap();
    let output_path = dir.path().join("out/records.csv");
    let config_path = dir.path().join("harvest.toml");
    std::fs::write(
        &config_path,
        format!(
            r#"
[crawler]
max-depth = 1
worker-count = 2
requests-per-second = 100.0
respect-robots = false

[user-agent]
crawler-name = "TestBot"
crawler-version = "1.0"
contact-url = "https://example.com/bot"
contact-email = "bot@example.com"

[output]
path = "{output}"
format = "csv"

[[source]]
name = "mock"
domain = "127.0.0.1"
seeds = ["{base}/category/root"]
discovery = "markup"
item-patterns = ["/item/"]

[source.fields]
title = {{ selector = "h1" }}
content = {{ selector = "p" }}
date = {{ value = "2024-05-01" }}
author = {{ value = "Staff" }}
categories = {{ value = "Test" }}
"#,
            output = output_path.display(),
            base = base_url
        ),
    )
    .unwrap();

    let config = load_config(&config_path).expect("Failed to load config");
    let report = run_crawl(config.clone()).await.expect("Crawl failed");

    let mut writer = open_writer(&config.output, "test-hash").unwrap();
    writer.write_records(&report.records).unwrap();
    writer.finish(&report.statistics).unwrap();

    let csv = std::fs::read_to_string(&output_path).unwrap();
    let mut lines = csv.lines();
    assert_eq!(
        lines.next(),
        Some("title,content,date,url,author,domain,categories")
    );
    assert_eq!(lines.count(), 2);
    assert!(csv.contains("Body of Alpha"));
}
