use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One emitted product (or product color variant)
///
/// The constructor is the only way to build a record, so `image_count`
/// always equals the number of image URLs, `image_url` is always the first
/// of them (or empty), and the image list never holds duplicates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RecordFields")]
pub struct ProductRecord {
    name: String,
    price: String,
    url: String,
    product_id: String,
    image_urls: Vec<String>,
    image_count: usize,
    image_url: String,
}

/// Wire shape accepted when reading records back; derived fields are recomputed
#[derive(Deserialize)]
struct RecordFields {
    name: String,
    #[serde(default)]
    price: String,
    url: String,
    product_id: String,
    #[serde(default)]
    image_urls: Vec<String>,
}

impl From<RecordFields> for ProductRecord {
    fn from(fields: RecordFields) -> Self {
        Self::new(
            fields.name,
            fields.price,
            fields.url,
            fields.product_id,
            fields.image_urls,
        )
    }
}

impl ProductRecord {
    /// Creates a record, deduplicating images while keeping first-seen order
    pub fn new(
        name: impl Into<String>,
        price: impl Into<String>,
        url: impl Into<String>,
        product_id: impl Into<String>,
        image_urls: Vec<String>,
    ) -> Self {
        let mut seen = HashSet::new();
        let image_urls: Vec<String> = image_urls
            .into_iter()
            .filter(|image| !image.is_empty() && seen.insert(image.clone()))
            .collect();
        let image_url = image_urls.first().cloned().unwrap_or_default();

        Self {
            name: name.into(),
            price: price.into(),
            url: url.into(),
            product_id: product_id.into(),
            image_count: image_urls.len(),
            image_urls,
            image_url,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Formatted price text; empty when the page showed none
    pub fn price(&self) -> &str {
        &self.price
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn product_id(&self) -> &str {
        &self.product_id
    }

    pub fn image_urls(&self) -> &[String] {
        &self.image_urls
    }

    pub fn image_count(&self) -> usize {
        self.image_count
    }

    /// First gallery image, or an empty string
    pub fn image_url(&self) -> &str {
        &self.image_url
    }
}
