//! Integration tests for catalog-sweep
//!
//! These tests use wiremock to serve sitemaps and product pages and drive
//! the loader, the fetcher and the full pipeline end-to-end.

mod common;
mod fetch_tests;
mod pipeline_tests;
mod sitemap_tests;
