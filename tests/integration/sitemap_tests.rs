use crate::common::{sitemap_index, test_fetcher, urlset};
use catalog_sweep::{SitemapError, SitemapLoader};
use flate2::write::GzEncoder;
use flate2::Compression;
use futures::StreamExt;
use regex::Regex;
use std::io::Write;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn loader(filter: Option<&str>) -> SitemapLoader {
    SitemapLoader::new(
        test_fetcher(0, Duration::from_secs(5)),
        filter.map(|f| Regex::new(f).unwrap()),
    )
}

async fn mount_xml(server: &MockServer, at: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(at))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_urlset_entries_in_order() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_xml(
        &server,
        "/sitemap.xml",
        urlset(&[format!("{}/p/1", base), format!("{}/p/2", base)]),
    )
    .await;

    let loader = loader(None);
    let entries: Vec<_> = loader
        .open(&format!("{}/sitemap.xml", base))
        .await
        .unwrap()
        .collect()
        .await;

    assert_eq!(entries.len(), 2);
    let first = entries[0].as_ref().unwrap();
    assert_eq!(first.loc, format!("{}/p/1", base));
    assert!(first.lastmod.is_some());
}

#[tokio::test]
async fn test_index_with_broken_nested_document() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_xml(
        &server,
        "/sitemap.xml",
        sitemap_index(&[
            format!("{}/sm1.xml", base),
            format!("{}/sm2.xml", base),
            format!("{}/sm3.xml", base),
            format!("{}/sm4.xml", base),
        ]),
    )
    .await;
    mount_xml(
        &server,
        "/sm1.xml",
        urlset(&[format!("{}/p/1", base), format!("{}/p/2", base)]),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/sm2.xml"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    mount_xml(&server, "/sm3.xml", "<urlset><url><loc>broken".to_string()).await;
    mount_xml(&server, "/sm4.xml", urlset(&[format!("{}/p/4", base)])).await;

    let loader = loader(None);
    let items: Vec<_> = loader
        .open(&format!("{}/sitemap.xml", base))
        .await
        .unwrap()
        .collect()
        .await;

    let locs: Vec<String> = items
        .iter()
        .filter_map(|item| item.as_ref().ok())
        .map(|entry| entry.loc.clone())
        .collect();
    assert_eq!(
        locs,
        vec![
            format!("{}/p/1", base),
            format!("{}/p/2", base),
            format!("{}/p/4", base)
        ]
    );

    let errors: Vec<&SitemapError> = items.iter().filter_map(|item| item.as_ref().err()).collect();
    assert_eq!(errors.len(), 2);
    assert!(matches!(errors[0], SitemapError::Fetch(_)));
    assert!(matches!(errors[1], SitemapError::Parse { .. }));
}

#[tokio::test]
async fn test_nested_documents_fetched_lazily() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_xml(
        &server,
        "/sitemap.xml",
        sitemap_index(&[format!("{}/sm1.xml", base)]),
    )
    .await;
    mount_xml(&server, "/sm1.xml", urlset(&[format!("{}/p/1", base)])).await;

    let loader = loader(None);
    let mut stream = loader.open(&format!("{}/sitemap.xml", base)).await.unwrap();
    assert_eq!(server.received_requests().await.unwrap().len(), 1);

    let first = stream.next().await.unwrap().unwrap();
    assert_eq!(first.loc, format!("{}/p/1", base));
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
    assert!(stream.next().await.is_none());
}

#[tokio::test]
async fn test_nested_filter_skips_other_documents() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_xml(
        &server,
        "/sitemap.xml",
        sitemap_index(&[
            format!("{}/sitemap_pages_1.xml", base),
            format!("{}/sitemap_products_1.xml", base),
        ]),
    )
    .await;
    mount_xml(
        &server,
        "/sitemap_products_1.xml",
        urlset(&[format!("{}/products/linen-shirt-300123", base)]),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/sitemap_pages_1.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(urlset(&[])))
        .expect(0)
        .mount(&server)
        .await;

    let loader = loader(Some("sitemap_products_"));
    let entries: Vec<_> = loader
        .open(&format!("{}/sitemap.xml", base))
        .await
        .unwrap()
        .collect()
        .await;

    assert_eq!(entries.len(), 1);
    assert!(entries[0].as_ref().unwrap().loc.ends_with("-300123"));
}

#[tokio::test]
async fn test_gzip_sitemap() {
    let server = MockServer::start().await;
    let base = server.uri();

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(urlset(&[format!("{}/p/9", base)]).as_bytes())
        .unwrap();
    let compressed = encoder.finish().unwrap();

    Mock::given(method("GET"))
        .and(path("/sitemap.xml.gz"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/x-gzip")
                .set_body_bytes(compressed),
        )
        .mount(&server)
        .await;

    let loader = loader(None);
    let entries: Vec<_> = loader
        .open(&format!("{}/sitemap.xml.gz", base))
        .await
        .unwrap()
        .collect()
        .await;

    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].as_ref().unwrap().loc, format!("{}/p/9", base));
}

#[tokio::test]
async fn test_unusable_root() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing.xml"))
        .respond_with(ResponseTemplate::new(410))
        .mount(&server)
        .await;
    mount_xml(&server, "/page.xml", "<html><body/></html>".to_string()).await;

    let loader = loader(None);
    let missing = loader.open(&format!("{}/missing.xml", server.uri())).await;
    assert!(matches!(missing, Err(SitemapError::Fetch(_))));

    let not_a_sitemap = loader.open(&format!("{}/page.xml", server.uri())).await;
    assert!(matches!(not_a_sitemap, Err(SitemapError::Parse { .. })));
}

#[tokio::test]
async fn test_reopen_restarts_sequence() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_xml(
        &server,
        "/sitemap.xml",
        urlset(&[format!("{}/p/1", base), format!("{}/p/2", base)]),
    )
    .await;

    let loader = loader(None);
    let url = format!("{}/sitemap.xml", base);

    let mut first = loader.open(&url).await.unwrap();
    let head = first.next().await.unwrap().unwrap();
    drop(first);

    let again: Vec<_> = loader.open(&url).await.unwrap().collect().await;
    assert_eq!(again.len(), 2);
    assert_eq!(again[0].as_ref().unwrap(), &head);
}
