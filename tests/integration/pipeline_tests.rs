use crate::common::{product_page, store_config, test_fetcher, urlset};
use catalog_sweep::config::{Config, OutputConfig, OutputFormat};
use catalog_sweep::crawler::Coordinator;
use catalog_sweep::output::{create_sink, read_csv_records, StatsSnapshot};
use catalog_sweep::{Extractor, ProductRecord, RequiredField, RunStats, SitemapError, SweepError};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use wiremock::matchers::{method, path, path_regex, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const VARIANTS_IN_PLACE: &str = r#"
[brand.variants]
item = "ul.colors li"
code = { attr = "data-code" }
name = [{ attr = "title" }]
url = { mode = "query", param = "color", value = "{code}" }
images = { markers = ["_{code}_"] }
"#;

const VARIANTS_REFETCH: &str = r#"
[brand.variants]
item = "ul.colors li"
code = { attr = "data-code" }
name = [{ attr = "title" }]
url = { mode = "query", param = "color", value = "{code}" }
images = { refetch = true }
"#;

async fn mount_page(server: &MockServer, at: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(at))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .expect(1)
        .mount(server)
        .await;
}

async fn mount_sitemap(server: &MockServer, paths: &[&str]) {
    let locs: Vec<String> = paths
        .iter()
        .map(|p| format!("{}{}", server.uri(), p))
        .collect();
    Mock::given(method("GET"))
        .and(path("/sitemap.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(urlset(&locs)))
        .mount(server)
        .await;
}

fn output_config(dir: &Path, name: &str, format: OutputFormat) -> OutputConfig {
    OutputConfig {
        path: dir.join(name),
        format,
        image_separator: "|".to_string(),
    }
}

/// Runs the pipeline without a browser and returns its statistics
async fn run(
    config: Config,
    output: &OutputConfig,
    max_retries: u32,
    timeout: Duration,
) -> Result<StatsSnapshot, SweepError> {
    let coordinator =
        Coordinator::with_parts(config, test_fetcher(max_retries, timeout), None).unwrap();
    coordinator.run(create_sink(output).unwrap()).await
}

fn read_json(path: &PathBuf) -> Vec<ProductRecord> {
    let file = File::open(path).unwrap();
    let mut records: Vec<ProductRecord> = serde_json::from_reader(file).unwrap();
    records.sort_by(|a, b| a.product_id().cmp(b.product_id()));
    records
}

#[tokio::test]
async fn test_products_extracted_and_category_never_fetched() {
    let server = MockServer::start().await;
    mount_sitemap(&server, &["/p/1", "/p/2", "/c/shirts"]).await;
    mount_page(
        &server,
        "/p/1",
        product_page("Linen Shirt", "₹ 1,999", &["/img/1a.jpg", "/img/1b.jpg", "/img/1a.jpg"]),
    )
    .await;
    mount_page(&server, "/p/2", product_page("Denim Jacket", "MRP 3,499.00", &[])).await;
    Mock::given(method("GET"))
        .and(path("/c/shirts"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let output = output_config(dir.path(), "products.json", OutputFormat::Json);
    let stats = run(store_config(&server.uri(), ""), &output, 0, Duration::from_secs(5))
        .await
        .unwrap();

    assert_eq!(stats.discovered, 3);
    assert_eq!(stats.products, 2);
    assert_eq!(stats.categories, 1);
    assert_eq!(stats.fetched, 2);
    assert_eq!(stats.records_emitted, 2);
    assert_eq!(stats.failure_rate(), 0.0);

    let records = read_json(&output.path);
    assert_eq!(records.len(), 2);

    assert_eq!(records[0].name(), "Linen Shirt");
    assert_eq!(records[0].price(), "1999");
    assert_eq!(records[0].product_id(), "1");
    assert_eq!(records[0].url(), format!("{}/p/1", server.uri()));
    assert_eq!(records[0].image_count(), 2);
    assert_eq!(records[0].image_url(), format!("{}/img/1a.jpg", server.uri()));

    assert_eq!(records[1].price(), "3499.00");
    assert_eq!(records[1].image_count(), 0);
    assert_eq!(records[1].image_url(), "");
}

#[tokio::test]
async fn test_timing_out_page_recorded_as_one_failure() {
    let server = MockServer::start().await;
    mount_sitemap(&server, &["/p/1"]).await;
    Mock::given(method("GET"))
        .and(path("/p/1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(product_page("Slow", "1", &[]))
                .set_delay(Duration::from_secs(5)),
        )
        .expect(4)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let output = output_config(dir.path(), "products.jsonl", OutputFormat::Jsonl);
    let stats = run(
        store_config(&server.uri(), ""),
        &output,
        3,
        Duration::from_millis(300),
    )
    .await
    .unwrap();

    assert_eq!(stats.products, 1);
    assert_eq!(stats.fetch_failed, 1);
    assert_eq!(stats.fetched, 0);
    assert_eq!(stats.records_emitted, 0);
    assert_eq!(stats.failure_rate(), 1.0);
    assert_eq!(
        stats.failures["timeout"],
        vec![format!("{}/p/1", server.uri())]
    );
    assert_eq!(std::fs::read_to_string(&output.path).unwrap(), "");
}

#[tokio::test]
async fn test_missing_name_and_id_is_one_failure() {
    let server = MockServer::start().await;
    mount_sitemap(&server, &["/p/special-offer", "/p/5"]).await;
    mount_page(
        &server,
        "/p/special-offer",
        "<html><body><div>Coming soon</div></body></html>".to_string(),
    )
    .await;
    mount_page(&server, "/p/5", product_page("Tee", "499", &["/t.jpg"])).await;

    let config = store_config(&server.uri(), "");
    let extractor = Extractor::from_brand(&config.brands[0]).unwrap();
    let failure = extractor
        .extract(
            "<html><body><div>Coming soon</div></body></html>",
            &format!("{}/p/special-offer", server.uri()),
        )
        .unwrap_err();
    assert_eq!(
        failure.missing,
        vec![RequiredField::Name, RequiredField::ProductId]
    );

    let dir = TempDir::new().unwrap();
    let output = output_config(dir.path(), "products.json", OutputFormat::Json);
    let stats = run(config, &output, 0, Duration::from_secs(5)).await.unwrap();

    assert_eq!(stats.fetched, 2);
    assert_eq!(stats.extracted, 1);
    assert_eq!(stats.extraction_failed, 1);
    assert_eq!(stats.records_emitted, 1);
    assert_eq!(
        stats.failures["missing name, product_id"],
        vec![format!("{}/p/special-offer", server.uri())]
    );
    assert_eq!(read_json(&output.path)[0].product_id(), "5");
}

#[tokio::test]
async fn test_variants_expanded_from_base_gallery() {
    let server = MockServer::start().await;
    mount_sitemap(&server, &["/p/7"]).await;

    let page = product_page(
        "Oxford Shirt",
        "2,499",
        &[
            "/img/7_BLU_1.jpg",
            "/img/7_BLU_2.jpg",
            "/img/7_RED_1.jpg",
            "/img/7_detail.jpg",
            "/img/7_size.jpg",
        ],
    )
    .replace(
        "</body>",
        r#"<ul class="colors">
             <li data-code="BLU" title="Blue"></li>
             <li data-code="RED" title="Red"></li>
             <li data-code="GRN" title="Green"></li>
           </ul></body>"#,
    );
    mount_page(&server, "/p/7", page).await;

    let dir = TempDir::new().unwrap();
    let output = output_config(dir.path(), "products.csv", OutputFormat::Csv);
    let stats = run(
        store_config(&server.uri(), VARIANTS_IN_PLACE),
        &output,
        0,
        Duration::from_secs(5),
    )
    .await
    .unwrap();

    assert_eq!(stats.variant_pages, 1);
    assert_eq!(stats.records_emitted, 3);

    let mut records = read_csv_records(File::open(&output.path).unwrap(), "|").unwrap();
    records.sort_by(|a, b| a.product_id().cmp(b.product_id()));
    let ids: Vec<&str> = records.iter().map(|r| r.product_id()).collect();
    assert_eq!(ids, vec!["7-BLU", "7-GRN", "7-RED"]);

    assert_eq!(records[0].name(), "Oxford Shirt - Blue");
    assert_eq!(records[0].price(), "2499");
    assert_eq!(records[0].url(), format!("{}/p/7?color=BLU", server.uri()));
    assert_eq!(records[0].image_count(), 2);

    // Green has no images of its own and keeps the whole gallery
    assert_eq!(records[1].image_count(), 5);
    assert_eq!(records[2].image_count(), 1);
    assert_eq!(
        records[2].image_url(),
        format!("{}/img/7_RED_1.jpg", server.uri())
    );
}

#[tokio::test]
async fn test_variant_refetch_continues_after_failure() {
    let server = MockServer::start().await;
    mount_sitemap(&server, &["/p/8"]).await;

    Mock::given(method("GET"))
        .and(path("/p/8"))
        .and(query_param("color", "BLK"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(product_page("Hoodie", "1,299", &["/img/8_black.jpg"])),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/p/8"))
        .and(query_param("color", "GRY"))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&server)
        .await;

    let base = product_page("Hoodie", "1,299", &["/img/8_base.jpg"]).replace(
        "</body>",
        r#"<ul class="colors">
             <li data-code="BLK" title="Black"></li>
             <li data-code="GRY" title="Grey"></li>
           </ul></body>"#,
    );
    mount_page(&server, "/p/8", base).await;

    let dir = TempDir::new().unwrap();
    let output = output_config(dir.path(), "products.json", OutputFormat::Json);
    let stats = run(
        store_config(&server.uri(), VARIANTS_REFETCH),
        &output,
        0,
        Duration::from_secs(5),
    )
    .await
    .unwrap();

    assert_eq!(stats.variant_failures, 1);
    assert_eq!(stats.records_emitted, 1);
    assert_eq!(
        stats.failures["variant: HTTP 403"],
        vec![format!("{}/p/8?color=GRY", server.uri())]
    );

    let records = read_json(&output.path);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].product_id(), "8-BLK");
    assert_eq!(records[0].name(), "Hoodie - Black");
    assert_eq!(
        records[0].image_urls(),
        &[format!("{}/img/8_black.jpg", server.uri())][..]
    );
}

#[tokio::test]
async fn test_item_limit_stops_run() {
    let server = MockServer::start().await;
    mount_sitemap(&server, &["/p/1", "/p/2", "/p/3", "/p/4", "/p/5", "/p/6"]).await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/p/\d+$"))
        .respond_with(ResponseTemplate::new(200).set_body_string(product_page("Tee", "1", &[])))
        .mount(&server)
        .await;

    let mut config = store_config(&server.uri(), "");
    config.crawler.max_items = Some(2);
    config.crawler.max_concurrent_requests = 1;
    config.crawler.max_concurrent_per_domain = 1;

    let dir = TempDir::new().unwrap();
    let output = output_config(dir.path(), "products.json", OutputFormat::Json);
    let stats = run(config, &output, 0, Duration::from_secs(5)).await.unwrap();

    assert_eq!(stats.records_emitted, 2);
    assert_eq!(read_json(&output.path).len(), 2);
}

#[tokio::test]
async fn test_malformed_root_skipped_for_next_root() {
    let server = MockServer::start().await;
    mount_sitemap(&server, &["/p/3"]).await;
    Mock::given(method("GET"))
        .and(path("/broken.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<urlset><url><loc>x"))
        .expect(1)
        .mount(&server)
        .await;
    mount_page(&server, "/p/3", product_page("Kurta", "899", &[])).await;

    let mut config = store_config(&server.uri(), "");
    config.brands[0].sitemaps = vec![
        format!("{}/broken.xml", server.uri()),
        format!("{}/sitemap.xml", server.uri()),
    ];

    let dir = TempDir::new().unwrap();
    let output = output_config(dir.path(), "products.json", OutputFormat::Json);
    let stats = run(config, &output, 0, Duration::from_secs(5)).await.unwrap();

    assert_eq!(stats.sitemap_failures, 1);
    assert_eq!(
        stats.failures["malformed sitemap"],
        vec![format!("{}/broken.xml", server.uri())]
    );
    assert_eq!(stats.records_emitted, 1);
    assert_eq!(read_json(&output.path)[0].product_id(), "3");
}

#[tokio::test]
async fn test_unreachable_root_keeps_counters() {
    let server = MockServer::start().await;
    mount_sitemap(&server, &["/p/4"]).await;
    Mock::given(method("GET"))
        .and(path("/gone.xml"))
        .respond_with(ResponseTemplate::new(410))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/p/4"))
        .respond_with(ResponseTemplate::new(200).set_body_string(product_page("Tee", "1", &[])))
        .mount(&server)
        .await;

    let mut config = store_config(&server.uri(), "");
    config.brands[0].sitemaps = vec![
        format!("{}/sitemap.xml", server.uri()),
        format!("{}/gone.xml", server.uri()),
    ];

    let dir = TempDir::new().unwrap();
    let output = output_config(dir.path(), "products.json", OutputFormat::Json);
    let counters = Arc::new(RunStats::new());
    let coordinator = Coordinator::with_parts(config, test_fetcher(0, Duration::from_secs(5)), None)
        .unwrap()
        .with_stats(Arc::clone(&counters));

    let result = coordinator.run(create_sink(&output).unwrap()).await;
    assert!(matches!(
        result,
        Err(SweepError::SitemapRoot {
            source: SitemapError::Fetch(_),
            ..
        })
    ));

    let snapshot = counters.snapshot();
    assert_eq!(snapshot.discovered, 1);
    assert_eq!(snapshot.products, 1);
}

#[tokio::test]
async fn test_download_delay_applies_to_variant_fetches() {
    let server = MockServer::start().await;
    mount_sitemap(&server, &["/p/9"]).await;

    for code in ["BLK", "WHT"] {
        Mock::given(method("GET"))
            .and(path("/p/9"))
            .and(query_param("color", code))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(product_page("Cap", "599", &["/img/9.jpg"])),
            )
            .expect(1)
            .mount(&server)
            .await;
    }
    let base = product_page("Cap", "599", &["/img/9.jpg"]).replace(
        "</body>",
        r#"<ul class="colors">
             <li data-code="BLK" title="Black"></li>
             <li data-code="WHT" title="White"></li>
           </ul></body>"#,
    );
    mount_page(&server, "/p/9", base).await;

    let mut config = store_config(&server.uri(), VARIANTS_REFETCH);
    config.crawler.download_delay_ms = 300;
    config.crawler.randomize_delay = false;

    let dir = TempDir::new().unwrap();
    let output = output_config(dir.path(), "products.json", OutputFormat::Json);
    let started = Instant::now();
    let stats = run(config, &output, 0, Duration::from_secs(5)).await.unwrap();

    assert_eq!(stats.records_emitted, 2);
    // One pause before each of the two color pages, one after the product
    assert!(started.elapsed() >= Duration::from_millis(900));
}
