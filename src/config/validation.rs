use crate::config::types::{
    BrandConfig, Config, CrawlerConfig, FetchStrategy, ImageRules, OutputConfig, PriceRules,
    SelectorRule, VariantRules,
};
use crate::ConfigError;
use regex::Regex;
use scraper::Selector;
use std::collections::HashSet;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_output_config(&config.output)?;

    if config.user_agent.value.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent value cannot be empty".to_string(),
        ));
    }

    if config.brands.is_empty() {
        return Err(ConfigError::Validation(
            "at least one [[brand]] must be configured".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for brand in &config.brands {
        if !seen.insert(brand.name.as_str()) {
            return Err(ConfigError::Validation(format!(
                "brand '{}' is configured more than once",
                brand.name
            )));
        }
        validate_brand(brand)?;
    }

    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.max_concurrent_requests < 1 || config.max_concurrent_requests > 256 {
        return Err(ConfigError::Validation(format!(
            "max-concurrent-requests must be between 1 and 256, got {}",
            config.max_concurrent_requests
        )));
    }

    if config.max_concurrent_per_domain < 1
        || config.max_concurrent_per_domain > config.max_concurrent_requests
    {
        return Err(ConfigError::Validation(format!(
            "max-concurrent-per-domain must be between 1 and max-concurrent-requests ({}), got {}",
            config.max_concurrent_requests, config.max_concurrent_per_domain
        )));
    }

    if config.request_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "request-timeout-secs must be >= 1".to_string(),
        ));
    }

    if config.backoff_factor < 1.0 {
        return Err(ConfigError::Validation(format!(
            "backoff-factor must be >= 1.0, got {}",
            config.backoff_factor
        )));
    }

    if config.backoff_max_ms < config.backoff_initial_ms {
        return Err(ConfigError::Validation(format!(
            "backoff-max-ms ({}) must be >= backoff-initial-ms ({})",
            config.backoff_max_ms, config.backoff_initial_ms
        )));
    }

    if let Some(rate) = config.max_failure_rate {
        if !(0.0..=1.0).contains(&rate) {
            return Err(ConfigError::Validation(format!(
                "max-failure-rate must be between 0.0 and 1.0, got {}",
                rate
            )));
        }
    }

    if config.max_items == Some(0) {
        return Err(ConfigError::Validation(
            "max-items must be >= 1 when set".to_string(),
        ));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.path.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "output path cannot be empty".to_string(),
        ));
    }

    if config.image_separator.is_empty() {
        return Err(ConfigError::Validation(
            "image-separator cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates a brand table: URLs, patterns, selectors and strategy requirements
fn validate_brand(brand: &BrandConfig) -> Result<(), ConfigError> {
    if brand.name.trim().is_empty() {
        return Err(ConfigError::Validation("brand name cannot be empty".to_string()));
    }

    if brand.sitemaps.is_empty() {
        return Err(ConfigError::Validation(format!(
            "brand '{}' must have at least one sitemap URL",
            brand.name
        )));
    }

    for sitemap in &brand.sitemaps {
        let url = Url::parse(sitemap).map_err(|e| {
            ConfigError::InvalidUrl(format!("Invalid sitemap URL '{}': {}", sitemap, e))
        })?;

        if url.scheme() != "https" && url.scheme() != "http" {
            return Err(ConfigError::Validation(format!(
                "Sitemap URL '{}' must use HTTP(S)",
                sitemap
            )));
        }
    }

    if let Some(pattern) = &brand.nested_sitemap_pattern {
        validate_regex(pattern)?;
    }

    if brand.routes.is_empty() {
        return Err(ConfigError::Validation(format!(
            "brand '{}' must define at least one route",
            brand.name
        )));
    }
    for route in &brand.routes {
        validate_regex(&route.pattern)?;
    }

    let id_regex = validate_regex(&brand.product_id_pattern)?;
    if id_regex.captures_len() < 2 {
        return Err(ConfigError::InvalidPattern(format!(
            "product-id-pattern '{}' of brand '{}' needs a capture group",
            brand.product_id_pattern, brand.name
        )));
    }

    match (&brand.strategy, &brand.wait_for) {
        (FetchStrategy::Rendered, None) => {
            return Err(ConfigError::Validation(format!(
                "brand '{}' uses the rendered strategy and needs wait-for",
                brand.name
            )));
        }
        (_, Some(selector)) => validate_selector(selector)?,
        _ => {}
    }

    if brand.fields.name.is_empty() {
        return Err(ConfigError::Validation(format!(
            "brand '{}' must define at least one name rule",
            brand.name
        )));
    }

    validate_rules(&brand.fields.name)?;
    validate_rules(&brand.fields.subtitle)?;
    validate_rules(&brand.fields.price)?;
    validate_price_rules(&brand.price)?;
    validate_image_rules(&brand.images)?;

    if let Some(variants) = &brand.variants {
        validate_variant_rules(variants)?;
    }

    Ok(())
}

fn validate_price_rules(rules: &PriceRules) -> Result<(), ConfigError> {
    if let Some(pattern) = &rules.strip_suffix_pattern {
        validate_regex(pattern)?;
    }
    if let Some(pattern) = &rules.fallback_pattern {
        validate_regex(pattern)?;
    }
    Ok(())
}

fn validate_image_rules(rules: &ImageRules) -> Result<(), ConfigError> {
    validate_rules(&rules.selectors)?;
    validate_rules(&rules.fallback)?;
    if let Some(pattern) = &rules.exclude_pattern {
        validate_regex(pattern)?;
    }
    Ok(())
}

fn validate_variant_rules(rules: &VariantRules) -> Result<(), ConfigError> {
    validate_selector(&rules.item)?;
    if let Some(require) = &rules.require {
        validate_selector(require)?;
    }
    validate_rules(std::slice::from_ref(&rules.code))?;
    validate_rules(&rules.name)?;

    for marker in &rules.images.markers {
        if marker.trim().is_empty() {
            return Err(ConfigError::Validation(
                "variant image markers cannot be empty".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_rules(rules: &[SelectorRule]) -> Result<(), ConfigError> {
    for rule in rules {
        if let Some(selector) = &rule.selector {
            validate_selector(selector)?;
        }
        if let Some(pattern) = &rule.pattern {
            validate_regex(pattern)?;
        }
    }
    Ok(())
}

fn validate_regex(pattern: &str) -> Result<Regex, ConfigError> {
    Regex::new(pattern)
        .map_err(|e| ConfigError::InvalidPattern(format!("'{}': {}", pattern, e)))
}

fn validate_selector(selector: &str) -> Result<(), ConfigError> {
    Selector::parse(selector)
        .map(|_| ())
        .map_err(|e| ConfigError::InvalidSelector(format!("'{}': {}", selector, e)))
}
