//! Inbound resource filtering for the rendered fetch strategy

use crate::config::BlockConfig;
use crate::url::{domain_of, host_matches};
use serde::Deserialize;
use std::collections::HashSet;

/// Resource categories a rendered page loads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Document,
    Stylesheet,
    Image,
    Media,
    Font,
    Script,
    Other,
}

/// Declarative predicate deciding which browser requests are aborted
///
/// A request is blocked when its kind is always blocked, when its host is a
/// blocked domain, or when its kind is third-party-only and the host is not
/// one of the first-party hosts.
#[derive(Debug, Clone, Default)]
pub struct BlockRule {
    always: HashSet<ResourceKind>,
    third_party: HashSet<ResourceKind>,
    first_party_hosts: Vec<String>,
    blocked_domains: Vec<String>,
}

impl BlockRule {
    pub fn from_config(config: &BlockConfig) -> Self {
        Self {
            always: config.resource_types.iter().copied().collect(),
            third_party: config.third_party_types.iter().copied().collect(),
            first_party_hosts: config.first_party_hosts.clone(),
            blocked_domains: config.blocked_domains.clone(),
        }
    }

    /// Returns true if nothing would ever be blocked
    pub fn is_empty(&self) -> bool {
        self.always.is_empty() && self.third_party.is_empty() && self.blocked_domains.is_empty()
    }

    /// Decides whether a request of `kind` to `url` is aborted
    pub fn blocks(&self, kind: ResourceKind, url: &str) -> bool {
        if self.always.contains(&kind) {
            return true;
        }

        let host = domain_of(url);
        let host = host.as_deref().unwrap_or("");

        if self
            .blocked_domains
            .iter()
            .any(|domain| host_matches(domain, host))
        {
            return true;
        }

        self.third_party.contains(&kind)
            && !self
                .first_party_hosts
                .iter()
                .any(|domain| host_matches(domain, host))
    }
}
