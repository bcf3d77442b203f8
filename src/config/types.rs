use crate::crawler::blocking::ResourceKind;
use crate::url::UrlClass;
use crate::ConfigError;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure for Catalog-Sweep
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent", default)]
    pub user_agent: UserAgentConfig,
    #[serde(default)]
    pub renderer: RendererConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(rename = "brand", default)]
    pub brands: Vec<BrandConfig>,
}

impl Config {
    /// Keeps only the named brands, in configuration order
    ///
    /// An empty list keeps every brand. Unknown names are an error.
    pub fn retain_brands(&mut self, names: &[String]) -> Result<(), ConfigError> {
        if names.is_empty() {
            return Ok(());
        }
        if let Some(unknown) = names
            .iter()
            .find(|name| !self.brands.iter().any(|b| &b.name == *name))
        {
            return Err(ConfigError::Validation(format!("Unknown brand '{}'", unknown)));
        }
        self.brands.retain(|b| names.contains(&b.name));
        Ok(())
    }

    /// Returns true if any brand renders its pages in a browser
    pub fn uses_renderer(&self) -> bool {
        self.brands
            .iter()
            .any(|b| b.strategy == FetchStrategy::Rendered)
    }
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Maximum number of fetches in flight across all brands
    #[serde(rename = "max-concurrent-requests", default = "default_max_concurrent")]
    pub max_concurrent_requests: usize,

    /// Maximum number of fetches in flight against a single host
    #[serde(
        rename = "max-concurrent-per-domain",
        default = "default_max_concurrent_per_domain"
    )]
    pub max_concurrent_per_domain: usize,

    /// Delay between two fetches issued by the same worker (milliseconds)
    #[serde(rename = "download-delay-ms", default = "default_download_delay")]
    pub download_delay_ms: u64,

    /// Scale each delay by a random factor in 0.5..1.5
    #[serde(rename = "randomize-delay", default = "default_true")]
    pub randomize_delay: bool,

    /// Stop after this many product records have been emitted
    #[serde(rename = "max-items", default)]
    pub max_items: Option<u64>,

    /// Timeout for a single static HTTP request (seconds)
    #[serde(rename = "request-timeout-secs", default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Extra attempts after the first failed one
    #[serde(rename = "max-retries", default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(rename = "backoff-initial-ms", default = "default_backoff_initial")]
    pub backoff_initial_ms: u64,

    #[serde(rename = "backoff-factor", default = "default_backoff_factor")]
    pub backoff_factor: f64,

    #[serde(rename = "backoff-max-ms", default = "default_backoff_max")]
    pub backoff_max_ms: u64,

    /// HTTP statuses that are retried instead of failing immediately
    #[serde(rename = "retry-http-codes", default = "default_retry_codes")]
    pub retry_http_codes: Vec<u16>,

    /// Exit non-zero when failed / attempted exceeds this fraction
    #[serde(rename = "max-failure-rate", default)]
    pub max_failure_rate: Option<f64>,
}

impl CrawlerConfig {
    pub fn download_delay(&self) -> Duration {
        Duration::from_millis(self.download_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_requests: default_max_concurrent(),
            max_concurrent_per_domain: default_max_concurrent_per_domain(),
            download_delay_ms: default_download_delay(),
            randomize_delay: true,
            max_items: None,
            request_timeout_secs: default_request_timeout(),
            max_retries: default_max_retries(),
            backoff_initial_ms: default_backoff_initial(),
            backoff_factor: default_backoff_factor(),
            backoff_max_ms: default_backoff_max(),
            retry_http_codes: default_retry_codes(),
            max_failure_rate: None,
        }
    }
}

/// User agent sent with every static request and by the browser
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    #[serde(default = "default_user_agent")]
    pub value: String,
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            value: default_user_agent(),
        }
    }
}

/// Headless browser configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RendererConfig {
    #[serde(default = "default_true")]
    pub headless: bool,

    /// Explicit Chrome/Chromium binary; auto-detected when absent
    #[serde(rename = "chrome-path", default)]
    pub chrome_path: Option<PathBuf>,

    /// How long to wait for a brand's `wait-for` selector (seconds)
    #[serde(rename = "wait-timeout-secs", default = "default_wait_timeout")]
    pub wait_timeout_secs: u64,

    /// Upper bound for a single navigation (seconds)
    #[serde(
        rename = "navigation-timeout-secs",
        default = "default_navigation_timeout"
    )]
    pub navigation_timeout_secs: u64,
}

impl RendererConfig {
    pub fn wait_timeout(&self) -> Duration {
        Duration::from_secs(self.wait_timeout_secs)
    }

    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.navigation_timeout_secs)
    }
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            headless: true,
            chrome_path: None,
            wait_timeout_secs: default_wait_timeout(),
            navigation_timeout_secs: default_navigation_timeout(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path of the file records are written to
    #[serde(default = "default_output_path")]
    pub path: PathBuf,

    #[serde(default)]
    pub format: OutputFormat,

    /// Separator used to join image URLs into a single CSV cell
    #[serde(rename = "image-separator", default = "default_image_separator")]
    pub image_separator: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: default_output_path(),
            format: OutputFormat::default(),
            image_separator: default_image_separator(),
        }
    }
}

/// Serialization format of the output file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// A single JSON array
    #[default]
    Json,
    /// One JSON object per line
    Jsonl,
    /// Comma separated values with a header row
    Csv,
}

/// How product pages of a brand are retrieved
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchStrategy {
    /// Plain HTTP GET
    #[default]
    Static,
    /// Headless browser with resource blocking and a wait selector
    Rendered,
}

/// One brand ("spider"): everything the generic engine needs to crawl a site
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BrandConfig {
    pub name: String,

    /// Root sitemap documents
    pub sitemaps: Vec<String>,

    #[serde(default)]
    pub strategy: FetchStrategy,

    /// Only nested sitemaps of an index whose URL matches are followed
    #[serde(default)]
    pub nested_sitemap_pattern: Option<String>,

    /// Ordered classification routes; first match wins
    #[serde(rename = "route", default)]
    pub routes: Vec<RouteConfig>,

    /// Regex applied to the URL path; first capture group is the identifier
    pub product_id_pattern: String,

    /// Selector the renderer waits for before reading the page
    #[serde(default)]
    pub wait_for: Option<String>,

    #[serde(default)]
    pub block: BlockConfig,

    pub fields: FieldRules,

    #[serde(default)]
    pub price: PriceRules,

    #[serde(default)]
    pub images: ImageRules,

    #[serde(default)]
    pub variants: Option<VariantRules>,
}

/// A classification route
#[derive(Debug, Clone, Deserialize)]
pub struct RouteConfig {
    pub pattern: String,
    pub class: UrlClass,
}

/// Declarative resource block set evaluated by the renderer
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BlockConfig {
    /// Always aborted
    #[serde(default)]
    pub resource_types: Vec<ResourceKind>,

    /// Aborted unless the request host is first-party
    #[serde(default)]
    pub third_party_types: Vec<ResourceKind>,

    /// Host suffixes treated as first-party
    #[serde(default)]
    pub first_party_hosts: Vec<String>,

    /// Host suffixes aborted regardless of resource type
    #[serde(default)]
    pub blocked_domains: Vec<String>,
}

/// A single extraction rule
///
/// A missing `selector` targets the context element itself, a missing `attr`
/// reads the element text, and `pattern` keeps the first capture group.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SelectorRule {
    #[serde(default)]
    pub selector: Option<String>,
    #[serde(default)]
    pub attr: Option<String>,
    #[serde(default)]
    pub pattern: Option<String>,
}

/// Selector chains of the scalar fields
#[derive(Debug, Clone, Deserialize)]
pub struct FieldRules {
    pub name: Vec<SelectorRule>,
    #[serde(default)]
    pub subtitle: Vec<SelectorRule>,
    #[serde(default)]
    pub price: Vec<SelectorRule>,
}

/// Price normalization rules
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PriceRules {
    /// Leading labels removed case-insensitively, with an optional `:`
    #[serde(default = "default_price_prefixes")]
    pub strip_prefixes: Vec<String>,

    #[serde(default)]
    pub strip_suffix_pattern: Option<String>,

    #[serde(default = "default_currency_symbols")]
    pub currency_symbols: Vec<String>,

    #[serde(default = "default_thousands_separator")]
    pub thousands_separator: Option<String>,

    /// Searched over the raw HTML when no price rule matches
    #[serde(default)]
    pub fallback_pattern: Option<String>,
}

impl Default for PriceRules {
    fn default() -> Self {
        Self {
            strip_prefixes: default_price_prefixes(),
            strip_suffix_pattern: None,
            currency_symbols: default_currency_symbols(),
            thousands_separator: default_thousands_separator(),
            fallback_pattern: None,
        }
    }
}

/// Gallery image rules
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ImageRules {
    /// Primary gallery rules, unioned
    #[serde(default)]
    pub selectors: Vec<SelectorRule>,

    /// Used only when the primary rules find nothing
    #[serde(default)]
    pub fallback: Vec<SelectorRule>,

    /// Keep only images whose host contains one of these
    #[serde(default)]
    pub hosts: Vec<String>,

    #[serde(default)]
    pub exclude_pattern: Option<String>,

    /// Replaces the query string of every image URL
    #[serde(default)]
    pub width_query: Option<String>,

    /// Read `image` from JSON-LD blocks when nothing else matched
    #[serde(default)]
    pub json_ld: bool,
}

/// Color variant detection and expansion rules
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct VariantRules {
    /// Enumerates swatches
    pub item: String,

    /// Swatches without a match for this child selector are skipped
    #[serde(default)]
    pub require: Option<String>,

    /// Reads the raw color code, relative to the swatch
    pub code: SelectorRule,

    /// Reads the color name; falls back to the code
    #[serde(default)]
    pub name: Vec<SelectorRule>,

    /// Prepended to the raw code to form the public color code
    #[serde(default)]
    pub code_prefix: String,

    #[serde(default)]
    pub url: VariantUrlRule,

    #[serde(default)]
    pub images: VariantImageRules,
}

/// How the URL of a variant is derived
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(tag = "mode", rename_all = "kebab-case")]
pub enum VariantUrlRule {
    /// Substitute query parameters on the base URL
    Query {
        param: String,
        /// Template for the value; supports `{code}`, `{raw}` and `{id}`
        #[serde(default = "default_code_template")]
        value: String,
        /// Fixed parameters added alongside, e.g. a default size
        #[serde(default)]
        extra: BTreeMap<String, String>,
    },
    /// Read the link from an attribute of the swatch
    Link {
        #[serde(default = "default_href")]
        attr: String,
    },
    /// Every variant keeps the base URL
    #[default]
    Unchanged,
}

/// How the images of a variant are computed
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct VariantImageRules {
    /// Fetch the variant URL and extract its own gallery
    #[serde(default)]
    pub refetch: bool,

    /// Substring templates an image must contain to belong to a variant
    #[serde(default)]
    pub markers: Vec<String>,
}

fn default_max_concurrent() -> usize {
    10
}

fn default_max_concurrent_per_domain() -> usize {
    5
}

fn default_download_delay() -> u64 {
    1000
}

fn default_true() -> bool {
    true
}

fn default_request_timeout() -> u64 {
    60
}

fn default_max_retries() -> u32 {
    3
}

fn default_backoff_initial() -> u64 {
    500
}

fn default_backoff_factor() -> f64 {
    2.0
}

fn default_backoff_max() -> u64 {
    30_000
}

fn default_retry_codes() -> Vec<u16> {
    vec![408, 429, 500, 502, 503, 504, 404]
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
        .to_string()
}

fn default_wait_timeout() -> u64 {
    30
}

fn default_navigation_timeout() -> u64 {
    60
}

fn default_output_path() -> PathBuf {
    PathBuf::from("products.json")
}

fn default_image_separator() -> String {
    "|".to_string()
}

fn default_price_prefixes() -> Vec<String> {
    vec![
        "MRP".to_string(),
        "Regular price".to_string(),
        "Sale price".to_string(),
        "Price".to_string(),
    ]
}

fn default_currency_symbols() -> Vec<String> {
    vec!["₹".to_string(), "Rs.".to_string(), "INR".to_string()]
}

fn default_thousands_separator() -> Option<String> {
    Some(",".to_string())
}

fn default_code_template() -> String {
    "{code}".to_string()
}

fn default_href() -> String {
    "href".to_string()
}
