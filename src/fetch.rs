//! Rate-limited page fetcher.
//!
//! FBref throttles aggressive clients, so every fetch through one
//! [`Fetcher`] instance waits out a minimum inter-request interval.

use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tracing::debug;

/// Minimum seconds between requests. FBref is sensitive to frequent requests.
pub const MIN_REQUEST_INTERVAL: Duration = Duration::from_secs(3);

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

pub struct Fetcher {
    client: reqwest::blocking::Client,
    min_interval: Duration,
    last_request: Option<Instant>,
}

impl Fetcher {
    pub fn new() -> Result<Self> {
        Self::with_interval(MIN_REQUEST_INTERVAL)
    }

    pub fn with_interval(min_interval: Duration) -> Result<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
            ),
        );
        headers.insert(
            reqwest::header::ACCEPT_LANGUAGE,
            reqwest::header::HeaderValue::from_static("en-US,en;q=0.5"),
        );
        let client = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .build()?;
        Ok(Self {
            client,
            min_interval,
            last_request: None,
        })
    }

    /// Fetch raw markup for a URL, sleeping first if the previous request
    /// was less than the minimum interval ago.
    pub fn fetch(&mut self, url: &str) -> Result<String> {
        self.respect_rate_limit();

        let response = self
            .client
            .get(url)
            .send()
            .with_context(|| format!("Failed to fetch: {}", url))?
            .error_for_status()
            .with_context(|| format!("Request rejected: {}", url))?;

        self.last_request = Some(Instant::now());

        response
            .text()
            .with_context(|| format!("Failed to read response body: {}", url))
    }

    fn respect_rate_limit(&self) {
        if let Some(last) = self.last_request {
            let elapsed = last.elapsed();
            if elapsed < self.min_interval {
                let wait = self.min_interval - elapsed;
                debug!(?wait, "rate limit: sleeping before next request");
                thread::sleep(wait);
            }
        }
    }
}
