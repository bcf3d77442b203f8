//! Shared fixtures for the integration tests

use catalog_sweep::config::{parse_config, Config};
use catalog_sweep::crawler::{build_http_client, HttpFetcher, RetryPolicy};
use std::time::Duration;

/// A single static brand served from `{base}`
pub const STORE: &str = r#"
[crawler]
max-concurrent-requests = 4
max-concurrent-per-domain = 2
download-delay-ms = 0

[[brand]]
name = "teststore"
sitemaps = ["{base}/sitemap.xml"]
product-id-pattern = '/p/(\d+)$'
route = [
    { pattern = '/p/', class = "product" },
    { pattern = '/c/', class = "category" },
]

[brand.fields]
name = [{ selector = "h1.title" }]
price = [{ selector = ".price" }]

[brand.images]
selectors = [{ selector = ".gallery img", attr = "src" }]
"#;

/// Builds the test store configuration pointing at a mock server
pub fn store_config(base: &str, extra: &str) -> Config {
    let content = format!("{}{}", STORE.replace("{base}", base), extra);
    parse_config(&content).unwrap()
}

/// A fetcher that never sleeps between retries
pub fn test_fetcher(max_retries: u32, timeout: Duration) -> HttpFetcher {
    let client = build_http_client("catalog-sweep-tests/1.0", timeout).unwrap();
    HttpFetcher::new(client, RetryPolicy::immediate(max_retries))
}

/// A `<urlset>` document listing `locs`
pub fn urlset(locs: &[String]) -> String {
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">"#,
    );
    for loc in locs {
        xml.push_str(&format!(
            "<url><loc>{}</loc><lastmod>2024-05-01</lastmod></url>",
            loc
        ));
    }
    xml.push_str("</urlset>");
    xml
}

/// A `<sitemapindex>` document listing `locs`
pub fn sitemap_index(locs: &[String]) -> String {
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<sitemapindex xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">"#,
    );
    for loc in locs {
        xml.push_str(&format!("<sitemap><loc>{}</loc></sitemap>", loc));
    }
    xml.push_str("</sitemapindex>");
    xml
}

/// A product page of the test store
pub fn product_page(name: &str, price: &str, images: &[&str]) -> String {
    let gallery: String = images
        .iter()
        .map(|src| format!(r#"<img src="{}">"#, src))
        .collect();
    format!(
        r#"<html><head><title>{name}</title></head><body>
             <h1 class="title">{name}</h1>
             <span class="price">{price}</span>
             <div class="gallery">{gallery}</div>
           </body></html>"#
    )
}
