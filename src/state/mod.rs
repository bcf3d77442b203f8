//! State module for tracking pipeline progress
//!
//! This module provides the lifecycle state of each product URL as it moves
//! through fetching and extraction.

mod url_state;

// Re-export main types
pub use url_state::UrlState;
