use crate::config::ImageRules;
use crate::extract::rules::{compile_rules, compile_selector, CompiledRule};
use crate::url::{absolutize, domain_of, replace_query};
use crate::ConfigError;
use regex::Regex;
use scraper::{Html, Selector};
use serde_json::Value;
use std::collections::HashSet;
use url::Url;

/// Collects and canonicalises the product gallery of a page
#[derive(Debug, Clone)]
pub struct ImageExtractor {
    primary: Vec<CompiledRule>,
    fallback: Vec<CompiledRule>,
    hosts: Vec<String>,
    exclude: Option<Regex>,
    width_query: Option<String>,
    json_ld: Option<Selector>,
}

impl ImageExtractor {
    pub fn from_rules(rules: &ImageRules) -> Result<Self, ConfigError> {
        let exclude = rules
            .exclude_pattern
            .as_deref()
            .map(|p| {
                Regex::new(p).map_err(|e| ConfigError::InvalidPattern(format!("'{}': {}", p, e)))
            })
            .transpose()?;

        let json_ld = if rules.json_ld {
            Some(compile_selector(r#"script[type="application/ld+json"]"#)?)
        } else {
            None
        };

        Ok(Self {
            primary: compile_rules(&rules.selectors)?,
            fallback: compile_rules(&rules.fallback)?,
            hosts: rules.hosts.clone(),
            exclude,
            width_query: rules.width_query.clone(),
            json_ld,
        })
    }

    /// Extracts the gallery: primary rules, then fallback rules, then JSON-LD
    ///
    /// The result is absolute, filtered, rewritten and free of duplicates,
    /// in first-seen order.
    pub fn gallery(&self, doc: &Html, page_url: &Url) -> Vec<String> {
        let primary = self.collect(&self.primary, doc, page_url);
        if !primary.is_empty() {
            return primary;
        }

        let fallback = self.collect(&self.fallback, doc, page_url);
        if !fallback.is_empty() {
            return fallback;
        }

        match &self.json_ld {
            Some(selector) => {
                let mut raw = Vec::new();
                for script in doc.select(selector) {
                    let text = script.text().collect::<String>();
                    match serde_json::from_str::<Value>(&text) {
                        Ok(value) => collect_json_ld_images(&value, &mut raw),
                        Err(e) => tracing::debug!("Skipping malformed JSON-LD on {}: {}", page_url, e),
                    }
                }
                self.canonicalize(raw, page_url)
            }
            None => Vec::new(),
        }
    }

    fn collect(&self, rules: &[CompiledRule], doc: &Html, page_url: &Url) -> Vec<String> {
        let mut raw = Vec::new();
        for rule in rules {
            let is_srcset = rule.attr().map_or(false, |attr| attr.ends_with("srcset"));
            for value in rule.all(doc.root_element()) {
                if is_srcset {
                    raw.extend(split_srcset(&value));
                } else {
                    raw.push(value);
                }
            }
        }
        self.canonicalize(raw, page_url)
    }

    fn canonicalize(&self, raw: Vec<String>, page_url: &Url) -> Vec<String> {
        let mut seen = HashSet::new();
        raw.into_iter()
            .filter_map(|value| absolutize(&value, page_url))
            .filter(|url| self.host_allowed(url))
            .filter(|url| !self.exclude.as_ref().map_or(false, |re| re.is_match(url)))
            .map(|url| match &self.width_query {
                Some(query) => replace_query(&url, query),
                None => url,
            })
            .filter(|url| seen.insert(url.clone()))
            .collect()
    }

    fn host_allowed(&self, url: &str) -> bool {
        if self.hosts.is_empty() {
            return true;
        }
        let host = domain_of(url).unwrap_or_default();
        self.hosts.iter().any(|allowed| host.contains(allowed.as_str()))
    }
}

/// Splits a `srcset` value into its URLs, dropping width/density descriptors
pub fn split_srcset(srcset: &str) -> Vec<String> {
    srcset
        .split(", ")
        .flat_map(|candidate| candidate.split(','))
        .filter_map(|candidate| candidate.split_whitespace().next())
        .filter(|url| !url.is_empty())
        .map(str::to_string)
        .collect()
}

/// Pulls `image` values out of a JSON-LD document, including `@graph` members
fn collect_json_ld_images(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::Array(items) => {
            for item in items {
                collect_json_ld_images(item, out);
            }
        }
        Value::Object(map) => {
            if let Some(image) = map.get("image") {
                push_image_value(image, out);
            }
            if let Some(graph) = map.get("@graph") {
                collect_json_ld_images(graph, out);
            }
        }
        _ => {}
    }
}

fn push_image_value(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::String(url) => out.push(url.clone()),
        Value::Array(items) => {
            for item in items {
                push_image_value(item, out);
            }
        }
        Value::Object(map) => {
            if let Some(Value::String(url)) = map.get("url").or_else(|| map.get("contentUrl")) {
                out.push(url.clone());
            }
        }
        _ => {}
    }
}
