//! Headless browser fetch strategy
//!
//! Pages are opened in a shared Chromium instance. Every tab installs a
//! request interceptor driven by the brand's [`BlockRule`], navigates
//! without waiting for the full load event, and then waits for a brand
//! selector before the DOM is serialized.
//!
//! `headless_chrome` is a blocking API, so async callers go through
//! [`render_page`], which moves the work onto the blocking thread pool.

use crate::config::RendererConfig;
use crate::crawler::blocking::{BlockRule, ResourceKind};
use crate::crawler::fetcher::FetchedPage;
use crate::{FetchError, SweepError};
use headless_chrome::browser::tab::RequestPausedDecision;
use headless_chrome::browser::transport::{SessionId, Transport};
use headless_chrome::protocol::cdp::Fetch::events::RequestPausedEvent;
use headless_chrome::protocol::cdp::Fetch::{FailRequest, RequestPattern, RequestStage};
use headless_chrome::protocol::cdp::Network::{ErrorReason, ResourceType};
use headless_chrome::{Browser, LaunchOptions, Tab};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// What a single render waits for and which requests it aborts
#[derive(Debug, Clone)]
pub struct RenderPlan {
    /// Selector that marks the page as ready
    pub wait_for: String,
    pub block: Arc<BlockRule>,
    /// Upper bound for the wait
    pub timeout: Duration,
}

/// A launched headless browser shared by all workers
pub struct Renderer {
    browser: Browser,
    user_agent: String,
    navigation_timeout: Duration,
}

impl std::fmt::Debug for Renderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Renderer")
            .field("user_agent", &self.user_agent)
            .field("navigation_timeout", &self.navigation_timeout)
            .finish()
    }
}

impl Renderer {
    /// Launches Chromium
    ///
    /// # Returns
    ///
    /// * `Ok(Renderer)` - The browser is running
    /// * `Err(SweepError::BrowserLaunch)` - No usable browser binary, or it failed to start
    pub fn launch(config: &RendererConfig, user_agent: &str) -> Result<Self, SweepError> {
        let options = LaunchOptions {
            headless: config.headless,
            path: config.chrome_path.clone(),
            idle_browser_timeout: config.navigation_timeout() * 4,
            ..Default::default()
        };

        let browser =
            Browser::new(options).map_err(|e| SweepError::BrowserLaunch(e.to_string()))?;
        tracing::info!("Headless browser launched (headless: {})", config.headless);

        Ok(Self {
            browser,
            user_agent: user_agent.to_string(),
            navigation_timeout: config.navigation_timeout(),
        })
    }

    /// Renders one page; blocks the calling thread
    ///
    /// # Returns
    ///
    /// * `Ok(FetchedPage)` - The serialized DOM after the wait selector appeared
    /// * `Err(FetchError::RenderTimeout)` - The selector did not appear in time
    /// * `Err(FetchError::Browser)` - Any other browser failure
    pub fn render(&self, url: &str, plan: &RenderPlan) -> Result<FetchedPage, FetchError> {
        let browser_error = |err: anyhow::Error| FetchError::Browser {
            url: url.to_string(),
            message: err.to_string(),
        };

        let tab = TabGuard(self.browser.new_tab().map_err(browser_error)?);
        tab.0.set_default_timeout(self.navigation_timeout);
        tab.0
            .set_user_agent(&self.user_agent, None, None)
            .map_err(browser_error)?;

        if !plan.block.is_empty() {
            install_blocking(&tab.0, Arc::clone(&plan.block)).map_err(browser_error)?;
        }

        // Step 1: start navigation; DOM readiness is decided by the selector wait
        tab.0.navigate_to(url).map_err(browser_error)?;

        // Step 2: wait for the brand's ready marker
        let started = Instant::now();
        if let Err(err) = tab
            .0
            .wait_for_element_with_custom_timeout(&plan.wait_for, plan.timeout)
        {
            let waited = started.elapsed();
            return Err(if waited >= plan.timeout {
                FetchError::RenderTimeout {
                    url: url.to_string(),
                    selector: plan.wait_for.clone(),
                    waited,
                }
            } else {
                browser_error(err)
            });
        }

        // Step 3: serialize the rendered DOM
        let html = tab.0.get_content().map_err(browser_error)?;
        let final_url = tab.0.get_url();

        Ok(FetchedPage {
            url: url.to_string(),
            final_url,
            html,
        })
    }
}

/// Renders a page on the blocking pool
pub async fn render_page(
    renderer: Arc<Renderer>,
    url: String,
    plan: Arc<RenderPlan>,
) -> Result<FetchedPage, FetchError> {
    let target = url.clone();
    tokio::task::spawn_blocking(move || renderer.render(&target, &plan))
        .await
        .map_err(|e| FetchError::Browser {
            url,
            message: format!("render task failed: {}", e),
        })?
}

/// Closes its tab when dropped, including on early returns
struct TabGuard(Arc<Tab>);

impl Drop for TabGuard {
    fn drop(&mut self) {
        if let Err(e) = self.0.close(false) {
            tracing::debug!("Failed to close tab: {}", e);
        }
    }
}

fn install_blocking(tab: &Arc<Tab>, block: Arc<BlockRule>) -> anyhow::Result<()> {
    let patterns = [RequestPattern {
        url_pattern: Some("*".to_string()),
        resource_Type: None,
        request_stage: Some(RequestStage::Request),
    }];
    tab.enable_fetch(Some(&patterns), None)?;

    tab.enable_request_interception(Arc::new(
        move |_transport: Arc<Transport>, _session: SessionId, event: RequestPausedEvent| {
            let kind = resource_kind(&event.params.resource_Type);
            if block.blocks(kind, &event.params.request.url) {
                RequestPausedDecision::Fail(FailRequest {
                    request_id: event.params.request_id,
                    error_reason: ErrorReason::BlockedByClient,
                })
            } else {
                RequestPausedDecision::Continue(None)
            }
        },
    ))?;

    Ok(())
}

/// Maps the DevTools resource type onto the categories block rules use
fn resource_kind(resource_type: &ResourceType) -> ResourceKind {
    match resource_type {
        ResourceType::Document => ResourceKind::Document,
        ResourceType::Stylesheet => ResourceKind::Stylesheet,
        ResourceType::Image => ResourceKind::Image,
        ResourceType::Media => ResourceKind::Media,
        ResourceType::Font => ResourceKind::Font,
        ResourceType::Script => ResourceKind::Script,
        _ => ResourceKind::Other,
    }
}
