//! Product URL lifecycle
//!
//! A product URL moves through
//! `Discovered → Classified → Fetching → {Fetched, FetchFailed}` and, once
//! fetched, `Extracting → {Emitted(n), ExtractionFailed}`.

use crate::SweepError;
use std::fmt;

/// Represents the current state of a product URL in the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UrlState {
    // ===== Active States =====
    /// Read from a sitemap
    Discovered,

    /// Classified as a product page and queued for a worker
    Classified,

    /// A worker is fetching the page
    Fetching,

    /// The page body is available
    Fetched,

    /// Fields are being extracted and variants expanded
    Extracting,

    // ===== Terminal States =====
    /// Records were written; carries how many
    Emitted(usize),

    /// Every fetch attempt failed
    FetchFailed,

    /// Required fields were missing
    ExtractionFailed,
}

impl UrlState {
    /// Returns true if this is a terminal state (no further processing needed)
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Emitted(_) | Self::FetchFailed | Self::ExtractionFailed
        )
    }

    /// Returns true if this represents a successful completion
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Emitted(_))
    }

    /// Returns true if this represents an error state
    pub fn is_error(&self) -> bool {
        matches!(self, Self::FetchFailed | Self::ExtractionFailed)
    }

    /// Returns true if moving from `self` to `next` is a legal transition
    pub fn can_transition_to(&self, next: UrlState) -> bool {
        matches!(
            (self, next),
            (Self::Discovered, Self::Classified)
                | (Self::Classified, Self::Fetching)
                | (Self::Fetching, Self::Fetched)
                | (Self::Fetching, Self::FetchFailed)
                | (Self::Fetched, Self::Extracting)
                | (Self::Extracting, Self::Emitted(_))
                | (Self::Extracting, Self::ExtractionFailed)
        )
    }

    /// Performs a transition
    ///
    /// # Returns
    ///
    /// * `Ok(UrlState)` - The new state
    /// * `Err(SweepError::InvalidTransition)` - The transition is not allowed
    pub fn transition(self, next: UrlState) -> Result<UrlState, SweepError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(SweepError::InvalidTransition {
                from: self,
                to: next,
            })
        }
    }
}

impl fmt::Display for UrlState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Discovered => write!(f, "discovered"),
            Self::Classified => write!(f, "classified"),
            Self::Fetching => write!(f, "fetching"),
            Self::Fetched => write!(f, "fetched"),
            Self::Extracting => write!(f, "extracting"),
            Self::Emitted(n) => write!(f, "emitted({})", n),
            Self::FetchFailed => write!(f, "fetch_failed"),
            Self::ExtractionFailed => write!(f, "extraction_failed"),
        }
    }
}
