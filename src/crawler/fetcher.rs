//! HTTP fetcher implementation
//!
//! This module handles all plain HTTP requests, including:
//! - Building the HTTP client with the configured user agent
//! - GET requests for product pages and sitemap documents
//! - Retry with backoff for transient failures
//! - Error classification into [`FetchError`]

use crate::config::CrawlerConfig;
use crate::crawler::backoff::{retry_with_backoff, RetryPolicy};
use crate::FetchError;
use reqwest::Client;
use std::time::Duration;

/// A successful response, body still undecoded
#[derive(Debug, Clone)]
pub struct RawResponse {
    /// Final URL after redirects
    pub final_url: String,
    pub status: u16,
    pub body: Vec<u8>,
}

/// A product page ready for extraction
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// The URL that was requested
    pub url: String,
    /// Where the page was actually served from
    pub final_url: String,
    pub html: String,
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `user_agent` - The user agent string sent with every request
/// * `timeout` - Timeout applied to each individual request
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(user_agent: &str, timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .gzip(true)
        .brotli(true)
        .build()
}

/// The static fetch strategy: HTTP GET with retries
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    policy: RetryPolicy,
}

impl HttpFetcher {
    pub fn new(client: Client, policy: RetryPolicy) -> Self {
        Self { client, policy }
    }

    /// Builds a fetcher from the crawler section of the configuration
    pub fn from_config(config: &CrawlerConfig, user_agent: &str) -> Result<Self, reqwest::Error> {
        let client = build_http_client(user_agent, config.request_timeout())?;
        Ok(Self::new(client, RetryPolicy::from_config(config)))
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Sends a single GET request
    ///
    /// Statuses >= 400 are reported as [`FetchError::Status`]; whether they
    /// are retried is up to the caller's policy.
    pub async fn get_once(&self, url: &str) -> Result<RawResponse, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| classify_error(url, e))?;

        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let final_url = response.url().to_string();

        let body = response
            .bytes()
            .await
            .map_err(|e| classify_error(url, e))?
            .to_vec();

        Ok(RawResponse {
            final_url,
            status: status.as_u16(),
            body,
        })
    }

    /// Sends a GET request, retrying transient failures
    pub async fn get(&self, url: &str) -> Result<RawResponse, FetchError> {
        retry_with_backoff(&self.policy, || self.get_once(url)).await
    }

    /// Fetches a product page and decodes its body as text
    pub async fn fetch_page(&self, url: &str) -> Result<FetchedPage, FetchError> {
        let raw = self.get(url).await?;
        tracing::debug!("Fetched {} ({} bytes, HTTP {})", url, raw.body.len(), raw.status);
        if raw.final_url != url {
            tracing::debug!("{} redirected to {}", url, raw.final_url);
        }

        Ok(FetchedPage {
            url: url.to_string(),
            final_url: raw.final_url,
            html: String::from_utf8_lossy(&raw.body).into_owned(),
        })
    }
}

/// Maps a transport error onto the fetch error taxonomy
fn classify_error(url: &str, err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else {
        FetchError::Network {
            url: url.to_string(),
            source: err,
        }
    }
}
