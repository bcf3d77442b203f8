use crate::config::SelectorRule;
use crate::ConfigError;
use regex::Regex;
use scraper::{ElementRef, Selector};

/// A selector rule with its selector and pattern compiled
#[derive(Debug, Clone)]
pub struct CompiledRule {
    selector: Option<Selector>,
    attr: Option<String>,
    pattern: Option<Regex>,
}

impl CompiledRule {
    pub fn compile(rule: &SelectorRule) -> Result<Self, ConfigError> {
        let selector = rule
            .selector
            .as_deref()
            .map(compile_selector)
            .transpose()?;
        let pattern = rule
            .pattern
            .as_deref()
            .map(|p| {
                Regex::new(p).map_err(|e| ConfigError::InvalidPattern(format!("'{}': {}", p, e)))
            })
            .transpose()?;

        Ok(Self {
            selector,
            attr: rule.attr.clone(),
            pattern,
        })
    }

    /// The attribute this rule reads, if any
    pub fn attr(&self) -> Option<&str> {
        self.attr.as_deref()
    }

    /// First non-empty value under `scope`
    pub fn first(&self, scope: ElementRef<'_>) -> Option<String> {
        self.targets(scope)
            .into_iter()
            .find_map(|element| self.value_of(element))
    }

    /// Every non-empty value under `scope`, in document order
    pub fn all(&self, scope: ElementRef<'_>) -> Vec<String> {
        self.targets(scope)
            .into_iter()
            .filter_map(|element| self.value_of(element))
            .collect()
    }

    fn targets<'a>(&self, scope: ElementRef<'a>) -> Vec<ElementRef<'a>> {
        match &self.selector {
            Some(selector) => scope.select(selector).collect(),
            None => vec![scope],
        }
    }

    fn value_of(&self, element: ElementRef<'_>) -> Option<String> {
        let raw = match &self.attr {
            Some(attr) => element.value().attr(attr)?.trim().to_string(),
            None => collapse_whitespace(&element.text().collect::<String>()),
        };

        let value = match &self.pattern {
            Some(pattern) => capture(pattern, &raw)?,
            None => raw,
        };

        let value = value.trim();
        (!value.is_empty()).then(|| value.to_string())
    }
}

/// Compiles a list of rules
pub fn compile_rules(rules: &[SelectorRule]) -> Result<Vec<CompiledRule>, ConfigError> {
    rules.iter().map(CompiledRule::compile).collect()
}

/// Walks a fallback chain; the first rule producing a value wins
pub fn first_match(rules: &[CompiledRule], scope: ElementRef<'_>) -> Option<String> {
    rules.iter().find_map(|rule| rule.first(scope))
}

pub fn compile_selector(selector: &str) -> Result<Selector, ConfigError> {
    Selector::parse(selector)
        .map_err(|e| ConfigError::InvalidSelector(format!("'{}': {}", selector, e)))
}

/// First capture group of `pattern` in `text`, or the whole match when the
/// pattern has no groups
pub fn capture(pattern: &Regex, text: &str) -> Option<String> {
    let captures = pattern.captures(text)?;
    captures
        .get(1)
        .or_else(|| captures.get(0))
        .map(|m| m.as_str().to_string())
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
