use crate::extract::{ColorVariant, ProductRecord};
use crate::variant::fill_template;

/// Builds the record of one color variant
///
/// # Arguments
///
/// * `base` - The record extracted from the product page
/// * `variant` - The detected color
/// * `images` - The gallery already narrowed to this color
pub fn variant_record(
    base: &ProductRecord,
    variant: &ColorVariant,
    images: Vec<String>,
) -> ProductRecord {
    ProductRecord::new(
        format!("{} - {}", base.name(), variant.color_name),
        base.price(),
        variant.variant_url.as_str(),
        format!("{}-{}", base.product_id(), variant.color_code),
        images,
    )
}

/// Keeps the gallery images that belong to one color
///
/// An image belongs to the color if it contains any filled marker template.
/// Without markers, or when no image matches, the whole gallery is kept.
pub fn filter_gallery(
    gallery: &[String],
    markers: &[String],
    variant: &ColorVariant,
    base_id: &str,
) -> Vec<String> {
    if markers.is_empty() {
        return gallery.to_vec();
    }

    let needles: Vec<String> = markers
        .iter()
        .map(|m| fill_template(m, &variant.color_code, &variant.raw_code, base_id))
        .collect();

    let matched: Vec<String> = gallery
        .iter()
        .filter(|image| needles.iter().any(|needle| image.contains(needle.as_str())))
        .cloned()
        .collect();

    if matched.is_empty() {
        tracing::debug!(
            "No gallery image matched color {} of {}; keeping full gallery",
            variant.color_code,
            base_id
        );
        gallery.to_vec()
    } else {
        matched
    }
}

/// Expands a base record using the gallery of the base page only
///
/// Zero variants returns the base record unchanged.
pub fn expand_in_place(
    base: &ProductRecord,
    variants: &[ColorVariant],
    markers: &[String],
) -> Vec<ProductRecord> {
    if variants.is_empty() {
        return vec![base.clone()];
    }

    variants
        .iter()
        .map(|variant| {
            let images = filter_gallery(base.image_urls(), markers, variant, base.product_id());
            variant_record(base, variant, images)
        })
        .collect()
}
