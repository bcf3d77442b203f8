//! Configuration module for Catalog-Sweep
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use catalog_sweep::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("catalog.toml")).unwrap();
//! println!("Brands configured: {}", config.brands.len());
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    BlockConfig, BrandConfig, Config, CrawlerConfig, FetchStrategy, FieldRules, ImageRules,
    OutputConfig, OutputFormat, PriceRules, RendererConfig, RouteConfig, SelectorRule,
    UserAgentConfig, VariantImageRules, VariantRules, VariantUrlRule,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
