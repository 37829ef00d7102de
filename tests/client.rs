//! End-to-end tests driving a [`Client`] against a mock definitions service.

use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use clearlydefined::{
    Client, ClientBuilder, Component, ContentHandler, DiskCache, ErrorKind, MemoryCache, Status,
    LICENSE_PROPERTY,
};
use url::Url;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Debug, Default)]
struct TestComponent {
    properties: Vec<(String, String)>,
}

impl TestComponent {
    fn property(&self, name: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}

impl Component for TestComponent {
    fn add_property(&mut self, name: &str, value: &str) {
        self.properties.push((name.to_owned(), value.to_owned()));
    }
}

fn client(content: Arc<dyn ContentHandler>) -> Client<TestComponent> {
    ClientBuilder::builder()
        .content_handler(content)
        .build()
        .client()
        .expect("client should build")
}

fn get() -> wiremock::MockBuilder {
    Mock::given(method("GET"))
}

#[tokio::test]
async fn test_preloaded_store_answers_synchronously() {
    let content = Arc::new(MemoryCache::new());
    let url = Url::parse("https://api.example/test").unwrap();
    content
        .store(&url, Some(r#"{"licensed":{"declared":"Apache-2.0"}}"#))
        .unwrap();

    let client = client(content);
    let enrichment = client.submit(TestComponent::default(), url);
    assert!(enrichment.is_ready());

    let response = enrichment.await.unwrap();
    assert!(matches!(response.status(), Status::Found));
    assert_eq!(
        response.component().property(LICENSE_PROPERTY),
        Some("Apache-2.0")
    );
    client.shutdown().await;
}

#[tokio::test]
async fn test_network_fetch_annotates_and_tracks_quota() {
    let server = MockServer::start().await;
    get()
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("x-ratelimit-limit", "100")
                .insert_header("x-ratelimit-remaining", "99")
                .set_body_string(r#"{"licensed":{"declared":"MIT"}}"#),
        )
        .expect(1)
        .mount(&server)
        .await;

    let content = Arc::new(MemoryCache::new());
    let client = client(content.clone());
    let url = Url::parse(&server.uri()).unwrap();

    let response = client
        .submit(TestComponent::default(), url.clone())
        .await
        .unwrap();
    assert!(matches!(response.status(), Status::Found));
    assert_eq!(response.component().property(LICENSE_PROPERTY), Some("MIT"));

    assert_eq!(client.rate_limit().limit(), Some(100));
    assert_eq!(client.rate_limit().remaining(), Some(99));
    assert_eq!(
        content.content(&url).unwrap(),
        r#"{"licensed":{"declared":"MIT"}}"#
    );
    client.shutdown().await;
}

#[tokio::test]
async fn test_dispatch_holds_until_declared_reset() {
    let server = MockServer::start().await;
    let reset_epoch = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs()
        + 1;
    // First answer spends the whole budget; everything after is healthy.
    get()
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("x-ratelimit-remaining", "0")
                .insert_header("x-ratelimit-reset", reset_epoch.to_string().as_str())
                .set_body_string(r#"{"licensed":{"declared":"MIT"}}"#),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;
    get()
        .respond_with(
            ResponseTemplate::new(200).set_body_string(r#"{"licensed":{"declared":"MIT"}}"#),
        )
        .mount(&server)
        .await;

    let client = client(Arc::new(MemoryCache::new()));

    let mut first_url = Url::parse(&server.uri()).unwrap();
    first_url.set_path("/first");
    let response = client
        .submit(TestComponent::default(), first_url)
        .await
        .unwrap();
    assert!(matches!(response.status(), Status::Found));
    assert_eq!(client.rate_limit().remaining(), Some(0));
    let reset_at = client.rate_limit().reset_at().expect("reset tracked");

    let mut second_url = Url::parse(&server.uri()).unwrap();
    second_url.set_path("/second");
    let response = client
        .submit(TestComponent::default(), second_url)
        .await
        .unwrap();
    assert!(matches!(response.status(), Status::Found));
    // The admission loop must not have raced the declared window
    assert!(SystemTime::now() >= reset_at);
    client.shutdown().await;
}

#[tokio::test]
async fn test_too_many_requests_honors_retry_after() {
    let server = MockServer::start().await;
    get()
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "2"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    get()
        .respond_with(
            ResponseTemplate::new(200).set_body_string(r#"{"licensed":{"declared":"MIT"}}"#),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = client(Arc::new(MemoryCache::new()));
    let url = Url::parse(&server.uri()).unwrap();

    let started = Instant::now();
    let response = client
        .submit(TestComponent::default(), url)
        .await
        .unwrap();

    assert!(matches!(response.status(), Status::Found));
    assert_eq!(response.component().property(LICENSE_PROPERTY), Some("MIT"));
    // Requeued once and not retried before the server's comeback time
    assert!(started.elapsed() >= Duration::from_millis(1800));
    client.shutdown().await;
}

#[tokio::test]
async fn test_absent_definition_is_cached_negatively() {
    let server = MockServer::start().await;
    get()
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let content = Arc::new(MemoryCache::new());
    let client = client(content);
    let url = Url::parse(&server.uri()).unwrap();

    let response = client
        .submit(TestComponent::default(), url.clone())
        .await
        .unwrap();
    assert!(matches!(response.status(), Status::Absent));
    assert!(response.component().properties.is_empty());

    // The negative entry answers the repeat submission without the network
    let enrichment = client.submit(TestComponent::default(), url);
    assert!(enrichment.is_ready());
    let response = enrichment.await.unwrap();
    assert!(matches!(response.status(), Status::Absent));
    client.shutdown().await;
}

#[tokio::test]
async fn test_malformed_declared_license_still_succeeds() {
    let server = MockServer::start().await;
    get()
        .respond_with(
            ResponseTemplate::new(200).set_body_string(r#"{"licensed":{"declared":42}}"#),
        )
        .expect(1)
        .mount(&server)
        .await;

    let content = Arc::new(MemoryCache::new());
    let client = client(content.clone());
    let url = Url::parse(&server.uri()).unwrap();

    let response = client
        .submit(TestComponent::default(), url.clone())
        .await
        .unwrap();
    assert!(matches!(response.status(), Status::Found));
    assert!(response.component().properties.is_empty());
    // The body is cached regardless and answers the next submission
    assert!(content.content(&url).is_ok());
    assert!(client.submit(TestComponent::default(), url).is_ready());
    client.shutdown().await;
}

#[tokio::test]
async fn test_repeat_submission_takes_the_store_path() {
    let server = MockServer::start().await;
    get()
        .respond_with(
            ResponseTemplate::new(200).set_body_string(r#"{"licensed":{"declared":"MIT"}}"#),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = client(Arc::new(MemoryCache::new()));
    let url = Url::parse(&server.uri()).unwrap();

    let first = client
        .submit(TestComponent::default(), url.clone())
        .await
        .unwrap();
    assert!(first.status().is_success());

    let second = client.submit(TestComponent::default(), url);
    assert!(second.is_ready());
    let second = second.await.unwrap();
    assert!(second.status().is_success());
    assert_eq!(second.component().property(LICENSE_PROPERTY), Some("MIT"));
    client.shutdown().await;
}

#[tokio::test]
async fn test_wait_for_completion_reaches_quiescence() {
    let server = MockServer::start().await;
    get()
        .respond_with(
            ResponseTemplate::new(200).set_body_string(r#"{"licensed":{"declared":"MIT"}}"#),
        )
        .mount(&server)
        .await;

    let client = client(Arc::new(MemoryCache::new()));

    let mut enrichments = Vec::new();
    for i in 0..12 {
        let mut url = Url::parse(&server.uri()).unwrap();
        url.set_path(&format!("/definitions/{i}"));
        enrichments.push(client.submit(TestComponent::default(), url));
    }

    tokio::time::timeout(Duration::from_secs(10), client.wait_for_completion())
        .await
        .expect("should reach quiescence");

    for enrichment in enrichments {
        let response = enrichment.await.unwrap();
        assert!(response.status().is_success());
    }
    client.shutdown().await;
}

#[tokio::test]
async fn test_persistent_store_survives_client_restart() {
    let server = MockServer::start().await;
    get()
        .respond_with(
            ResponseTemplate::new(200).set_body_string(r#"{"licensed":{"declared":"EPL-2.0"}}"#),
        )
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let url = Url::parse(&server.uri()).unwrap();

    let first = client(Arc::new(DiskCache::new(dir.path()).unwrap()));
    let response = first
        .submit(TestComponent::default(), url.clone())
        .await
        .unwrap();
    assert!(matches!(response.status(), Status::Found));
    first.shutdown().await;

    // A fresh client over the same directory never touches the network
    let second = client(Arc::new(DiskCache::new(dir.path()).unwrap()));
    let enrichment = second.submit(TestComponent::default(), url);
    assert!(enrichment.is_ready());
    let response = enrichment.await.unwrap();
    assert_eq!(
        response.component().property(LICENSE_PROPERTY),
        Some("EPL-2.0")
    );
    second.shutdown().await;
}

#[tokio::test]
async fn test_persistent_failure_settles_with_last_cause() {
    let server = MockServer::start().await;
    get()
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let client: Client<TestComponent> = ClientBuilder::builder()
        .content_handler(Arc::new(MemoryCache::new()) as Arc<dyn ContentHandler>)
        .max_retries(1u64)
        .build()
        .client()
        .expect("client should build");
    let url = Url::parse(&server.uri()).unwrap();

    let response = client
        .submit(TestComponent::default(), url)
        .await
        .unwrap();
    assert!(matches!(
        response.status(),
        Status::Failed(ErrorKind::RejectedStatusCode(code)) if code.as_u16() == 500
    ));
    assert!(response.component().properties.is_empty());
    client.shutdown().await;
}
