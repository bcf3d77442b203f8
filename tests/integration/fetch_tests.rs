use crate::common::test_fetcher;
use catalog_sweep::FetchError;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_transient_status_retried_until_success() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/p/1"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/p/1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<h1>ok</h1>"))
        .mount(&server)
        .await;

    let fetcher = test_fetcher(3, Duration::from_secs(5));
    let page = fetcher
        .fetch_page(&format!("{}/p/1", server.uri()))
        .await
        .unwrap();

    assert_eq!(page.html, "<h1>ok</h1>");
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_non_retry_status_fails_immediately() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/p/1"))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = test_fetcher(3, Duration::from_secs(5));
    let err = fetcher
        .fetch_page(&format!("{}/p/1", server.uri()))
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::Status { status: 403, .. }));
}

#[tokio::test]
async fn test_retry_status_exhausted() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/p/gone"))
        .respond_with(ResponseTemplate::new(404))
        .expect(3)
        .mount(&server)
        .await;

    let fetcher = test_fetcher(2, Duration::from_secs(5));
    let url = format!("{}/p/gone", server.uri());
    let err = fetcher.fetch_page(&url).await.unwrap_err();

    assert!(matches!(err, FetchError::Status { status: 404, .. }));
    assert_eq!(err.url(), url);
}

#[tokio::test]
async fn test_timeout_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .expect(2)
        .mount(&server)
        .await;

    let fetcher = test_fetcher(1, Duration::from_millis(200));
    let err = fetcher
        .fetch_page(&format!("{}/slow", server.uri()))
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::Timeout { .. }));
}

#[tokio::test]
async fn test_final_url_after_redirect() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(
            ResponseTemplate::new(301).insert_header("location", format!("{}/new", server.uri())),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/new"))
        .respond_with(ResponseTemplate::new(200).set_body_string("moved"))
        .mount(&server)
        .await;

    let fetcher = test_fetcher(0, Duration::from_secs(5));
    let url = format!("{}/old", server.uri());
    let page = fetcher.fetch_page(&url).await.unwrap();

    assert_eq!(page.url, url);
    assert_eq!(page.final_url, format!("{}/new", server.uri()));
    assert_eq!(page.html, "moved");
}
