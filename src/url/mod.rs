//! URL handling module for Catalog-Sweep
//!
//! This module provides URL classification, domain extraction, host suffix
//! matching, and the query-string rewrites used by the extractor and the
//! variant expander.

mod domain;
mod matcher;
mod query;

use crate::config::RouteConfig;
use crate::ConfigError;
use regex::Regex;
use serde::Deserialize;
use std::fmt;

// Re-export main functions
pub use domain::{domain_of, extract_domain};
pub use matcher::host_matches;
pub use query::{absolutize, replace_query, set_query_params, strip_query};

/// What a sitemap URL points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UrlClass {
    /// A product detail page; fetched and extracted
    Product,
    /// A category or listing page; counted, never fetched
    Category,
    /// Anything else
    Ignored,
}

impl fmt::Display for UrlClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Product => write!(f, "product"),
            Self::Category => write!(f, "category"),
            Self::Ignored => write!(f, "ignored"),
        }
    }
}

/// Ordered regex routes of a single brand
///
/// Routes are tried in order with search semantics (the pattern may match
/// anywhere in the URL); the first match decides the class. A URL no route
/// matches is [`UrlClass::Ignored`].
#[derive(Debug, Clone)]
pub struct UrlClassifier {
    routes: Vec<(Regex, UrlClass)>,
}

impl UrlClassifier {
    /// Builds a classifier from already-compiled routes
    pub fn new(routes: Vec<(Regex, UrlClass)>) -> Self {
        Self { routes }
    }

    /// Compiles the routes of a brand configuration
    ///
    /// # Arguments
    ///
    /// * `routes` - The brand's routes in priority order
    ///
    /// # Returns
    ///
    /// * `Ok(UrlClassifier)` - All patterns compiled
    /// * `Err(ConfigError::InvalidPattern)` - A pattern failed to compile
    pub fn from_routes(routes: &[RouteConfig]) -> Result<Self, ConfigError> {
        let compiled = routes
            .iter()
            .map(|route| {
                Regex::new(&route.pattern)
                    .map(|regex| (regex, route.class))
                    .map_err(|e| ConfigError::InvalidPattern(format!("'{}': {}", route.pattern, e)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self::new(compiled))
    }

    /// Classifies a URL; pure and deterministic
    ///
    /// # Examples
    ///
    /// ```
    /// use catalog_sweep::url::{UrlClass, UrlClassifier};
    /// use regex::Regex;
    ///
    /// let classifier = UrlClassifier::new(vec![
    ///     (Regex::new(r"/products/E\d{6}-\d{3}").unwrap(), UrlClass::Product),
    ///     (Regex::new(r"/(men|women)/").unwrap(), UrlClass::Category),
    /// ]);
    ///
    /// assert_eq!(
    ///     classifier.classify("https://www.uniqlo.com/in/en/products/E123456-000"),
    ///     UrlClass::Product
    /// );
    /// assert_eq!(classifier.classify("https://www.uniqlo.com/in/en/men/tops"), UrlClass::Category);
    /// assert_eq!(classifier.classify("https://www.uniqlo.com/in/en/stores"), UrlClass::Ignored);
    /// ```
    pub fn classify(&self, url: &str) -> UrlClass {
        self.routes
            .iter()
            .find(|(regex, _)| regex.is_match(url))
            .map(|(_, class)| *class)
            .unwrap_or(UrlClass::Ignored)
    }
}
