//! Integration tests for the built-in parsers against a local HTTP server.
//!
//! Uses `wiremock` so no real network traffic is made.

use chrono::Utc;
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use aiwatch_feeds::{transform_all, FeedError, HttpConfig, ParserFactory};

const RSS_BODY: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>AI News</title>
    <item>
      <title>OpenAI releases GPT-4o update</title>
      <link>https://openai.com/index/gpt-4o</link>
      <guid>https://openai.com/index/gpt-4o</guid>
      <pubDate>Mon, 13 May 2024 10:00:00 GMT</pubDate>
    </item>
    <item>
      <title>Cursor ships agent mode</title>
      <link>https://cursor.com/changelog/agent</link>
      <pubDate>Tue, 14 May 2024 09:30:00 GMT</pubDate>
    </item>
  </channel>
</rss>"#;

fn test_factory() -> ParserFactory {
    ParserFactory::with_defaults(&HttpConfig {
        timeout_secs: 5,
        user_agent: "aiwatch-test/0.1".to_string(),
    })
    .expect("failed to build test ParserFactory")
}

#[tokio::test]
async fn rss_parser_fetches_and_decodes_items() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/feed.xml"))
        .and(header("user-agent", "aiwatch-test/0.1"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/rss+xml")
                .set_body_string(RSS_BODY),
        )
        .expect(1)
        .mount(&server)
        .await;

    let parser = test_factory().create_parser("rss").unwrap();
    let entries = parser
        .fetch(&format!("{}/feed.xml", server.uri()))
        .await
        .expect("fetch should succeed");

    let output = transform_all(entries, "ai-news", Utc::now()).unwrap();
    assert_eq!(output.items.len(), 2);
    assert_eq!(output.items[0].title, "OpenAI releases GPT-4o update");
    assert_eq!(
        output.items[1].url.as_deref(),
        Some("https://cursor.com/changelog/agent")
    );
    assert_eq!(output.warnings, 0);
}

#[tokio::test]
async fn api_parser_reads_enveloped_json() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/releases"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                {
                    "id": "rel-1",
                    "title": "Claude 3.5 Sonnet now available",
                    "summary": "A new model",
                    "published_at": "2024-06-20T14:00:00Z",
                    "tags": ["models"]
                },
                {
                    "id": "rel-2",
                    "title": "Maintenance notice",
                    "published_at": "not a date"
                }
            ]
        })))
        .mount(&server)
        .await;

    let parser = test_factory().create_parser("api").unwrap();
    let entries = parser
        .fetch(&format!("{}/api/releases", server.uri()))
        .await
        .unwrap();

    let output = transform_all(entries, "vendor-api", Utc::now()).unwrap();
    assert_eq!(output.items.len(), 2);
    assert!(output.items[0].raw_categories.contains("models"));
    assert_eq!(output.items[1].warnings.len(), 1);
    assert_eq!(output.warnings, 1);
}

#[tokio::test]
async fn not_found_is_typed() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/missing.xml"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let parser = test_factory().create_parser("rss").unwrap();
    let result = parser
        .fetch(&format!("{}/missing.xml", server.uri()))
        .await;

    assert!(
        matches!(result, Err(FeedError::NotFound { .. })),
        "expected NotFound"
    );
}

#[tokio::test]
async fn server_error_is_unexpected_status_and_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/feed.xml"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let parser = test_factory().create_parser("rss").unwrap();
    let result = parser.fetch(&format!("{}/feed.xml", server.uri())).await;

    match result {
        Err(FeedError::UnexpectedStatus { status, .. }) => assert_eq!(status, 503),
        Err(other) => panic!("expected UnexpectedStatus, got {other}"),
        Ok(_) => panic!("expected UnexpectedStatus, got entries"),
    }
}

#[tokio::test]
async fn slow_server_times_out() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/slow.xml"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(RSS_BODY)
                .set_delay(std::time::Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let factory = ParserFactory::with_defaults(&HttpConfig {
        timeout_secs: 1,
        user_agent: "aiwatch-test/0.1".to_string(),
    })
    .unwrap();
    let parser = factory.create_parser("rss").unwrap();
    let result = parser.fetch(&format!("{}/slow.xml", server.uri())).await;

    assert!(matches!(result, Err(FeedError::Timeout { after_secs: 1, .. })));
}

#[tokio::test]
async fn rss_parser_reads_local_files() {
    let dir = std::env::temp_dir().join(format!("aiwatch-feeds-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let file = dir.join("feed.xml");
    std::fs::write(&file, RSS_BODY).unwrap();

    let parser = test_factory().create_parser("rss").unwrap();
    let url = format!("file://{}", file.display());
    let count = parser.fetch(&url).await.unwrap().count();

    assert_eq!(count, 2);
    std::fs::remove_dir_all(&dir).ok();
}
