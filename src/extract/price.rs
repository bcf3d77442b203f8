use crate::config::PriceRules;
use crate::ConfigError;
use regex::Regex;

/// Turns displayed price text into a bare formatted number
///
/// Leading labels, an optional trailing pattern, currency symbols, the
/// thousands separator and all whitespace are removed. Decimal digits are
/// kept as text; the result is never parsed.
#[derive(Debug, Clone)]
pub struct PriceNormalizer {
    prefixes: Vec<String>,
    suffix: Option<Regex>,
    symbols: Vec<String>,
    separator: Option<String>,
}

impl PriceNormalizer {
    pub fn from_rules(rules: &PriceRules) -> Result<Self, ConfigError> {
        let suffix = rules
            .strip_suffix_pattern
            .as_deref()
            .map(|p| {
                Regex::new(p).map_err(|e| ConfigError::InvalidPattern(format!("'{}': {}", p, e)))
            })
            .transpose()?;

        // Longer labels first so "Regular price" is not cut down to "Regular"
        let mut prefixes = rules.strip_prefixes.clone();
        prefixes.sort_by_key(|p| std::cmp::Reverse(p.len()));

        Ok(Self {
            prefixes,
            suffix,
            symbols: rules.currency_symbols.clone(),
            separator: rules.thousands_separator.clone().filter(|s| !s.is_empty()),
        })
    }

    /// Normalizes one price string
    ///
    /// # Examples
    ///
    /// ```
    /// use catalog_sweep::config::PriceRules;
    /// use catalog_sweep::extract::PriceNormalizer;
    ///
    /// let normalizer = PriceNormalizer::from_rules(&PriceRules::default()).unwrap();
    /// assert_eq!(normalizer.normalize("MRP: ₹ 2,499.00"), "2499.00");
    /// assert_eq!(normalizer.normalize("Rs. 12,990"), "12990");
    /// ```
    pub fn normalize(&self, raw: &str) -> String {
        let mut text = raw.trim();

        // Labels may be stacked ("Sale price MRP ₹ 999") and may follow the symbol
        loop {
            let before = text;
            for symbol in &self.symbols {
                if let Some(rest) = text.strip_prefix(symbol.as_str()) {
                    if self.starts_with_label(rest.trim_start()) {
                        text = rest.trim_start();
                    }
                }
            }
            for prefix in &self.prefixes {
                if let Some(rest) = strip_prefix_ignore_case(text, prefix) {
                    text = rest.trim_start().trim_start_matches(':').trim_start();
                }
            }
            if text == before {
                break;
            }
        }

        let mut value = match &self.suffix {
            Some(suffix) => suffix.replace_all(text, "").into_owned(),
            None => text.to_string(),
        };

        for symbol in &self.symbols {
            value = value.replace(symbol.as_str(), "");
        }
        if let Some(separator) = &self.separator {
            value = value.replace(separator.as_str(), "");
        }

        value.chars().filter(|c| !c.is_whitespace()).collect()
    }

    fn starts_with_label(&self, text: &str) -> bool {
        self.prefixes
            .iter()
            .any(|prefix| strip_prefix_ignore_case(text, prefix).is_some())
    }
}

fn strip_prefix_ignore_case<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    if prefix.is_empty() {
        return None;
    }
    let head = text.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix)
        .then(|| &text[prefix.len()..])
}
