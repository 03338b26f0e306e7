//! HTTP client for review crawling with rate limiting
//!
//! A single client is shared by every category worker, so the governor
//! quota bounds the request rate of the whole run.

use std::num::NonZeroU32;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use governor::{
    Quota, RateLimiter,
    clock::DefaultClock,
    state::{InMemoryState, direct::NotKeyed},
};
use reqwest::{
    Client,
    header::{ACCEPT_LANGUAGE, HeaderMap, HeaderValue, USER_AGENT},
};
use tracing::{debug, warn};

use crate::domain::errors::{HarvestError, HarvestResult};
use crate::domain::services::DocumentFetcher;
use crate::infrastructure::config::HttpConfig;

pub struct HttpClient {
    client: Client,
    rate_limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
    config: HttpConfig,
}

impl HttpClient {
    pub fn new(config: HttpConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent).context("Invalid user agent")?,
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("cs,en;q=0.5"));

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .default_headers(headers)
            .cookie_store(true)
            .gzip(true)
            .brotli(true)
            .redirect(if config.follow_redirects {
                reqwest::redirect::Policy::limited(config.max_redirects)
            } else {
                reqwest::redirect::Policy::none()
            })
            .build()
            .context("Failed to create HTTP client")?;

        let quota = Quota::per_second(
            NonZeroU32::new(config.requests_per_second)
                .context("Rate limit must be greater than 0")?,
        );

        Ok(Self {
            client,
            rate_limiter: RateLimiter::direct(quota),
            config,
        })
    }

    pub fn config(&self) -> &HttpConfig {
        &self.config
    }
}

#[async_trait]
impl DocumentFetcher for HttpClient {
    async fn fetch_html(&self, url: &str) -> HarvestResult<String> {
        self.rate_limiter.until_ready().await;
        debug!("[HttpClient] GET {}", url);

        let response = self.client.get(url).send().await.map_err(|e| {
            warn!("[HttpClient] Request to {} failed: {}", url, e);
            HarvestError::fetch_failure(url, e.to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            warn!("[HttpClient] {} answered {}", url, status);
            return Err(HarvestError::http_status(url, status.as_u16()));
        }

        let body = response
            .text()
            .await
            .map_err(|e| HarvestError::fetch_failure(url, format!("Failed to read body: {e}")))?;
        debug!("[HttpClient] {} ({} bytes)", url, body.len());
        Ok(body)
    }
}
