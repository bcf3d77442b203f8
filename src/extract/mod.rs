//! Field extraction
//!
//! Applies a brand's ordered selector chains to a fetched page and builds a
//! [`ProductRecord`], or reports which required fields were missing.

mod images;
mod price;
mod record;
mod rules;
mod variants;

pub use images::{split_srcset, ImageExtractor};
pub use price::PriceNormalizer;
pub use record::ProductRecord;
pub use rules::{capture, compile_rules, first_match, CompiledRule};
pub use variants::{ColorVariant, VariantDetection, VariantDetector};

use crate::config::BrandConfig;
use crate::url::strip_query;
use crate::{ConfigError, ExtractionFailure, RequiredField};
use regex::Regex;
use scraper::Html;
use url::Url;

/// Everything extracted from one page
#[derive(Debug, Clone)]
pub struct PageExtraction {
    /// The base (non-variant) record
    pub record: ProductRecord,
    pub variants: VariantDetection,
}

/// Compiled extraction rules of a brand
#[derive(Debug, Clone)]
pub struct Extractor {
    name: Vec<CompiledRule>,
    subtitle: Vec<CompiledRule>,
    price: Vec<CompiledRule>,
    price_fallback: Option<Regex>,
    normalizer: PriceNormalizer,
    product_id: Regex,
    images: ImageExtractor,
    variants: Option<VariantDetector>,
}

impl Extractor {
    /// Compiles the extraction rules of a brand
    ///
    /// # Returns
    ///
    /// * `Ok(Extractor)` - All selectors and patterns compiled
    /// * `Err(ConfigError)` - A selector or pattern is invalid
    pub fn from_brand(brand: &BrandConfig) -> Result<Self, ConfigError> {
        let compile_regex = |p: &str| {
            Regex::new(p).map_err(|e| ConfigError::InvalidPattern(format!("'{}': {}", p, e)))
        };

        Ok(Self {
            name: compile_rules(&brand.fields.name)?,
            subtitle: compile_rules(&brand.fields.subtitle)?,
            price: compile_rules(&brand.fields.price)?,
            price_fallback: brand
                .price
                .fallback_pattern
                .as_deref()
                .map(compile_regex)
                .transpose()?,
            normalizer: PriceNormalizer::from_rules(&brand.price)?,
            product_id: compile_regex(&brand.product_id_pattern)?,
            images: ImageExtractor::from_rules(&brand.images)?,
            variants: brand
                .variants
                .as_ref()
                .map(VariantDetector::from_rules)
                .transpose()?,
        })
    }

    /// Extracts the base record of a page
    ///
    /// Deterministic: the same HTML and URL always give the same result.
    ///
    /// # Arguments
    ///
    /// * `html` - The page body
    /// * `url` - The URL the page was requested from
    ///
    /// # Returns
    ///
    /// * `Ok(ProductRecord)` - Name and identifier were found
    /// * `Err(ExtractionFailure)` - Lists every missing required field
    pub fn extract(&self, html: &str, url: &str) -> Result<ProductRecord, ExtractionFailure> {
        self.extract_page(html, url).map(|page| page.record)
    }

    /// Extracts the base record and detects color variants
    pub fn extract_page(&self, html: &str, url: &str) -> Result<PageExtraction, ExtractionFailure> {
        let doc = Html::parse_document(html);
        let page_url = Url::parse(url).ok();
        let root = doc.root_element();

        let name = first_match(&self.name, root).map(|name| {
            match first_match(&self.subtitle, root) {
                Some(subtitle) => format!("{} {}", name, subtitle),
                None => name,
            }
        });
        let product_id = self.product_id(url);

        let mut missing = Vec::new();
        if name.is_none() {
            missing.push(RequiredField::Name);
        }
        if product_id.is_none() {
            missing.push(RequiredField::ProductId);
        }
        let (name, product_id) = match (name, product_id) {
            (Some(name), Some(product_id)) => (name, product_id),
            _ => {
                return Err(ExtractionFailure {
                    url: url.to_string(),
                    missing,
                })
            }
        };

        let price = self.price(&doc, html).unwrap_or_else(|| {
            tracing::warn!("No price found for {} at {}", product_id, url);
            String::new()
        });

        let (images, variants) = match &page_url {
            Some(page_url) => {
                let images = self.images.gallery(&doc, page_url);
                let variants = match &self.variants {
                    Some(detector) => detector.detect(&doc, page_url, &product_id),
                    None => VariantDetection::None,
                };
                (images, variants)
            }
            None => (Vec::new(), VariantDetection::None),
        };

        if images.is_empty() {
            tracing::warn!("No images found for {} at {}", product_id, url);
        }

        Ok(PageExtraction {
            record: ProductRecord::new(name, price, url, product_id, images),
            variants,
        })
    }

    /// Extracts only the gallery of a page; used for re-fetched variant pages
    pub fn gallery(&self, html: &str, url: &str) -> Vec<String> {
        match Url::parse(url) {
            Ok(page_url) => self.images.gallery(&Html::parse_document(html), &page_url),
            Err(_) => Vec::new(),
        }
    }

    /// Reads the product identifier from a URL path; the query string is ignored
    pub fn product_id(&self, url: &str) -> Option<String> {
        let path = match Url::parse(url) {
            Ok(parsed) => parsed.path().to_string(),
            Err(_) => strip_query(url).to_string(),
        };
        capture(&self.product_id, &path).filter(|id| !id.is_empty())
    }

    /// First price rule whose value survives normalization, then the raw
    /// HTML pattern
    fn price(&self, doc: &Html, html: &str) -> Option<String> {
        let root = doc.root_element();
        let normalized = |raw: String| {
            let price = self.normalizer.normalize(&raw);
            (!price.is_empty()).then_some(price)
        };

        self.price
            .iter()
            .filter_map(|rule| rule.first(root))
            .find_map(normalized)
            .or_else(|| {
                self.price_fallback
                    .as_ref()
                    .and_then(|pattern| capture(pattern, html))
                    .and_then(normalized)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        FetchStrategy, FieldRules, ImageRules, PriceRules, RouteConfig, SelectorRule,
    };
    use crate::url::UrlClass;

    fn text_rule(selector: &str) -> SelectorRule {
        SelectorRule {
            selector: Some(selector.to_string()),
            ..Default::default()
        }
    }

    fn attr_rule(selector: &str, attr: &str) -> SelectorRule {
        SelectorRule {
            selector: Some(selector.to_string()),
            attr: Some(attr.to_string()),
            pattern: None,
        }
    }

    fn create_test_brand() -> BrandConfig {
        BrandConfig {
            name: "marksandspencer".to_string(),
            sitemaps: vec!["https://www.marksandspencer.in/sitemap_0.xml".to_string()],
            strategy: FetchStrategy::Static,
            nested_sitemap_pattern: None,
            routes: vec![RouteConfig {
                pattern: r"/p/P\w+\.html".to_string(),
                class: UrlClass::Product,
            }],
            product_id_pattern: r"/p/(P\w+)\.html".to_string(),
            wait_for: None,
            block: Default::default(),
            fields: FieldRules {
                name: vec![text_rule("h1.product-name"), text_rule("h1")],
                subtitle: vec![],
                price: vec![
                    attr_rule(".list-pricecolour .value", "content"),
                    text_rule(".price .sales .value"),
                ],
            },
            price: PriceRules {
                fallback_pattern: Some(r"₹[\d,]+(?:\.\d{2})?".to_string()),
                ..Default::default()
            },
            images: ImageRules {
                selectors: vec![attr_rule(".swiper-slide img", "src")],
                ..Default::default()
            },
            variants: None,
        }
    }

    const URL: &str = "https://www.marksandspencer.in/p/P60712345.html?color=NAVY";

    #[test]
    fn test_extract_full_record() {
        let extractor = Extractor::from_brand(&create_test_brand()).unwrap();
        let html = r#"<html><body>
            <h1 class="product-name"> Pure Cotton Shirt </h1>
            <div class="list-pricecolour"><span class="value" content="₹ 1,999.00">₹ 1,999</span></div>
            <div class="swiper-slide"><img src="//assets.test/a.jpg"></div>
            <div class="swiper-slide"><img src="//assets.test/b.jpg"></div>
            <div class="swiper-slide"><img src="//assets.test/a.jpg"></div>
        </body></html>"#;

        let record = extractor.extract(html, URL).unwrap();
        assert_eq!(record.name(), "Pure Cotton Shirt");
        assert_eq!(record.price(), "1999.00");
        assert_eq!(record.product_id(), "P60712345");
        assert_eq!(record.url(), URL);
        assert_eq!(record.image_count(), 2);
        assert_eq!(record.image_url(), "https://assets.test/a.jpg");
    }

    #[test]
    fn test_missing_name_and_id_listed_together() {
        let extractor = Extractor::from_brand(&create_test_brand()).unwrap();
        let html = "<html><body><div>nothing here</div></body></html>";
        let url = "https://www.marksandspencer.in/c/women";

        let failure = extractor.extract(html, url).unwrap_err();
        assert_eq!(failure.url, url);
        assert_eq!(
            failure.missing,
            vec![RequiredField::Name, RequiredField::ProductId]
        );
        assert!(failure.to_string().contains("name, product_id"));
    }

    #[test]
    fn test_price_from_raw_html_fallback() {
        let extractor = Extractor::from_brand(&create_test_brand()).unwrap();
        let html = r#"<html><body><h1>Shirt</h1>
            <script>window.price = "₹2,299.00";</script></body></html>"#;

        let record = extractor.extract(html, URL).unwrap();
        assert_eq!(record.price(), "2299.00");
    }

    #[test]
    fn test_price_chain_skips_bare_currency() {
        let extractor = Extractor::from_brand(&create_test_brand()).unwrap();
        let html = r#"<html><body><h1>Shirt</h1>
            <div class="list-pricecolour"><span class="value" content="₹"></span></div>
            <div class="price"><span class="sales"><span class="value">₹ 1,499</span></span></div>
        </body></html>"#;

        let record = extractor.extract(html, URL).unwrap();
        assert_eq!(record.price(), "1499");
    }

    #[test]
    fn test_missing_price_is_empty() {
        let extractor = Extractor::from_brand(&create_test_brand()).unwrap();
        let record = extractor
            .extract("<html><body><h1>Shirt</h1></body></html>", URL)
            .unwrap();
        assert_eq!(record.price(), "");
        assert_eq!(record.image_count(), 0);
    }

    #[test]
    fn test_subtitle_appended() {
        let mut brand = create_test_brand();
        brand.fields.subtitle = vec![text_rule("h2.subtitle")];
        let extractor = Extractor::from_brand(&brand).unwrap();
        let record = extractor
            .extract(
                r#"<html><body><h1>Air Max 90</h1><h2 class="subtitle">Men's Shoes</h2></body></html>"#,
                URL,
            )
            .unwrap();
        assert_eq!(record.name(), "Air Max 90 Men's Shoes");
    }

    #[test]
    fn test_extraction_is_idempotent() {
        let extractor = Extractor::from_brand(&create_test_brand()).unwrap();
        let html = r#"<html><body><h1>Shirt</h1>
            <div class="swiper-slide"><img src="/x.jpg"></div></body></html>"#;

        let first = extractor.extract(html, URL).unwrap();
        let second = extractor.extract(html, URL).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_product_id_ignores_query() {
        let extractor = Extractor::from_brand(&create_test_brand()).unwrap();
        assert_eq!(
            extractor.product_id("https://www.marksandspencer.in/p/P1.html?ref=/p/P2.html"),
            Some("P1".to_string())
        );
        assert_eq!(extractor.product_id("https://www.marksandspencer.in/c/men"), None);
    }
}
