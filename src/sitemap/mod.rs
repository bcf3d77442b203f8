//! Sitemap loading
//!
//! Fetches `urlset` and `sitemapindex` documents (plain or gzip) and exposes
//! their entries as a lazy stream.

mod loader;
mod parser;

pub use loader::SitemapLoader;
pub use parser::{parse_lastmod, parse_sitemap, SitemapDocument, SitemapEntry, SitemapKind};
