//! Variant expansion
//!
//! Turns one base product record plus its detected color variants into one
//! record per color, with the identifier, name, URL and gallery recomputed.

mod expander;

pub use expander::{expand_in_place, filter_gallery, variant_record};

/// Fills a marker or URL template
///
/// `{code}` is the public color code, `{raw}` the value read from the swatch
/// and `{id}` the base product identifier.
///
/// # Examples
///
/// ```
/// use catalog_sweep::variant::fill_template;
///
/// assert_eq!(
///     fill_template("goods_{raw}_{id}", "COL09", "09", "465185"),
///     "goods_09_465185"
/// );
/// ```
pub fn fill_template(template: &str, code: &str, raw: &str, id: &str) -> String {
    template
        .replace("{code}", code)
        .replace("{raw}", raw)
        .replace("{id}", id)
}
