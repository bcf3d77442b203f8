use crate::config::{VariantRules, VariantUrlRule};
use crate::extract::rules::{compile_rules, compile_selector, first_match, CompiledRule};
use crate::url::{absolutize, set_query_params};
use crate::variant::fill_template;
use crate::ConfigError;
use scraper::{ElementRef, Html, Selector};
use std::collections::{BTreeMap, HashSet};
use url::Url;

/// A color option detected on a product page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColorVariant {
    pub color_name: String,
    /// Public code: the configured prefix followed by the raw swatch value
    pub color_code: String,
    /// The value read from the swatch, used in image markers
    pub raw_code: String,
    pub variant_url: String,
}

/// Outcome of variant detection on one page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VariantDetection {
    /// The page shows no color swatches
    None,
    /// Readable swatches, in page order, unique by color code
    Found(Vec<ColorVariant>),
    /// Swatches are present but none could be read
    Failed { swatches: usize },
}

#[derive(Debug, Clone)]
enum UrlRule {
    Query {
        param: String,
        value: String,
        extra: BTreeMap<String, String>,
    },
    Link {
        attr: String,
    },
    Unchanged,
}

/// Compiled variant detection rules of a brand
#[derive(Debug, Clone)]
pub struct VariantDetector {
    item: Selector,
    require: Option<Selector>,
    code: CompiledRule,
    name: Vec<CompiledRule>,
    code_prefix: String,
    url: UrlRule,
}

impl VariantDetector {
    pub fn from_rules(rules: &VariantRules) -> Result<Self, ConfigError> {
        let url = match &rules.url {
            VariantUrlRule::Query { param, value, extra } => UrlRule::Query {
                param: param.clone(),
                value: value.clone(),
                extra: extra.clone(),
            },
            VariantUrlRule::Link { attr } => UrlRule::Link { attr: attr.clone() },
            VariantUrlRule::Unchanged => UrlRule::Unchanged,
        };

        Ok(Self {
            item: compile_selector(&rules.item)?,
            require: rules.require.as_deref().map(compile_selector).transpose()?,
            code: CompiledRule::compile(&rules.code)?,
            name: compile_rules(&rules.name)?,
            code_prefix: rules.code_prefix.clone(),
            url,
        })
    }

    /// Enumerates the color swatches of a page
    ///
    /// # Arguments
    ///
    /// * `doc` - The parsed page
    /// * `page_url` - URL the page was fetched from
    /// * `base_id` - Product identifier of the page, available to URL templates
    pub fn detect(&self, doc: &Html, page_url: &Url, base_id: &str) -> VariantDetection {
        let swatches: Vec<ElementRef<'_>> = doc
            .select(&self.item)
            .filter(|item| match &self.require {
                Some(require) => item.select(require).next().is_some(),
                None => true,
            })
            .collect();

        if swatches.is_empty() {
            return VariantDetection::None;
        }

        let mut seen = HashSet::new();
        let mut variants = Vec::new();
        for swatch in &swatches {
            let raw_code = match self.code.first(*swatch) {
                Some(code) => code,
                None => {
                    tracing::debug!("Unreadable color swatch on {}", page_url);
                    continue;
                }
            };

            let color_code = format!("{}{}", self.code_prefix, raw_code);
            if !seen.insert(color_code.clone()) {
                continue;
            }

            let color_name = first_match(&self.name, *swatch).unwrap_or_else(|| raw_code.clone());
            let variant_url = self.variant_url(*swatch, page_url, &color_code, &raw_code, base_id);

            variants.push(ColorVariant {
                color_name,
                color_code,
                raw_code,
                variant_url,
            });
        }

        if variants.is_empty() {
            VariantDetection::Failed {
                swatches: swatches.len(),
            }
        } else {
            VariantDetection::Found(variants)
        }
    }

    fn variant_url(
        &self,
        swatch: ElementRef<'_>,
        page_url: &Url,
        code: &str,
        raw: &str,
        base_id: &str,
    ) -> String {
        match &self.url {
            UrlRule::Query { param, value, extra } => {
                let value = fill_template(value, code, raw, base_id);
                let mut params: Vec<(&str, &str)> = vec![(param.as_str(), value.as_str())];
                params.extend(extra.iter().map(|(k, v)| (k.as_str(), v.as_str())));
                set_query_params(page_url.as_str(), &params)
                    .unwrap_or_else(|_| page_url.to_string())
            }
            UrlRule::Link { attr } => swatch
                .value()
                .attr(attr)
                .and_then(|href| absolutize(href, page_url))
                .unwrap_or_else(|| page_url.to_string()),
            UrlRule::Unchanged => page_url.to_string(),
        }
    }
}
