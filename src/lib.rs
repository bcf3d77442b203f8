//! Catalog-Sweep: a sitemap-driven product catalog extractor
//!
//! This crate crawls brand sitemaps, classifies the discovered URLs, fetches
//! product pages (directly or through a headless browser) and extracts
//! product records with per-brand selector tables.

pub mod config;
pub mod crawler;
pub mod extract;
pub mod output;
pub mod sitemap;
pub mod state;
pub mod url;
pub mod variant;

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Main error type for Catalog-Sweep operations
#[derive(Debug, Error)]
pub enum SweepError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Sitemap root {url} is unusable: {source}")]
    SitemapRoot {
        url: String,
        #[source]
        source: SitemapError,
    },

    #[error("Failed to launch headless browser: {0}")]
    BrowserLaunch(String),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Output error: {0}")]
    Output(#[from] output::OutputError),

    #[error("Invalid state transition: {from} -> {to}")]
    InvalidTransition {
        from: state::UrlState,
        to: state::UrlState,
    },

    #[error("Worker task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid regex pattern: {0}")]
    InvalidPattern(String),

    #[error("Invalid CSS selector: {0}")]
    InvalidSelector(String),
}

/// Errors raised while fetching a single page or sitemap document
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Request to {url} failed: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Request to {url} timed out")]
    Timeout { url: String },

    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("Failed to decode body of {url}: {message}")]
    Decode { url: String, message: String },

    #[error("Rendering {url} timed out after {waited:?} waiting for `{selector}`")]
    RenderTimeout {
        url: String,
        selector: String,
        waited: Duration,
    },

    #[error("Browser error while rendering {url}: {message}")]
    Browser { url: String, message: String },

    #[error("Fetch of {url} cancelled")]
    Cancelled { url: String },
}

impl FetchError {
    /// Returns the URL the failed request was addressed to
    pub fn url(&self) -> &str {
        match self {
            Self::Network { url, .. }
            | Self::Timeout { url }
            | Self::Status { url, .. }
            | Self::Decode { url, .. }
            | Self::RenderTimeout { url, .. }
            | Self::Browser { url, .. }
            | Self::Cancelled { url } => url,
        }
    }

    /// Returns true if the rendering strategy gave up waiting for its selector
    pub fn is_render_timeout(&self) -> bool {
        matches!(self, Self::RenderTimeout { .. })
    }

    /// Short failure reason used to group failed pages in the run summary
    pub fn reason(&self) -> String {
        match self {
            Self::Network { .. } => "network error".to_string(),
            Self::Timeout { .. } => "timeout".to_string(),
            Self::Status { status, .. } => format!("HTTP {}", status),
            Self::Decode { .. } => "undecodable body".to_string(),
            Self::RenderTimeout { .. } => "render timeout".to_string(),
            Self::Browser { .. } => "browser error".to_string(),
            Self::Cancelled { .. } => "cancelled".to_string(),
        }
    }
}

/// Sitemap loading errors
#[derive(Debug, Error)]
pub enum SitemapError {
    #[error("Failed to fetch sitemap: {0}")]
    Fetch(#[from] FetchError),

    #[error("Malformed sitemap {url}: {message}")]
    Parse { url: String, message: String },
}

/// A field that must be present for a product record to be emitted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequiredField {
    Name,
    ProductId,
}

impl fmt::Display for RequiredField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name => write!(f, "name"),
            Self::ProductId => write!(f, "product_id"),
        }
    }
}

/// Extraction failed because required fields were missing after every fallback
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Missing required fields [{}] at {url}", join_fields(.missing))]
pub struct ExtractionFailure {
    /// The page URL the extraction ran against
    pub url: String,

    /// Every required field that could not be found
    pub missing: Vec<RequiredField>,
}

impl ExtractionFailure {
    /// Short failure reason used to group failed pages in the run summary
    pub fn reason(&self) -> String {
        format!("missing {}", join_fields(&self.missing))
    }
}

fn join_fields(fields: &[RequiredField]) -> String {
    fields
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Result type alias for Catalog-Sweep operations
pub type Result<T> = std::result::Result<T, SweepError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use extract::{ColorVariant, Extractor, ProductRecord};
pub use output::RunStats;
pub use sitemap::{SitemapEntry, SitemapLoader};
pub use state::UrlState;
pub use url::{UrlClass, UrlClassifier};
