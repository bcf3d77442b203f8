//! Crawler module for page fetching and pipeline coordination
//!
//! This module contains the core sweeping logic, including:
//! - HTTP fetching with retry and exponential backoff
//! - Headless browser rendering with request blocking
//! - Request scheduling and rate limiting
//! - Overall sweep coordination

mod backoff;
pub mod blocking;
mod coordinator;
mod fetcher;
mod renderer;
mod scheduler;

pub use backoff::{retry_with_backoff, RetryPolicy};
pub use blocking::{BlockRule, ResourceKind};
pub use coordinator::{run_sweep, BrandProfile, Coordinator};
pub use fetcher::{build_http_client, FetchedPage, HttpFetcher, RawResponse};
pub use renderer::{render_page, RenderPlan, Renderer};
pub use scheduler::{FetchPermit, Scheduler};
