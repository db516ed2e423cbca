//! HTTP client adapter: rate limiting, retries and user-agent policy.
//!
//! Every source gets one [`HttpClient`], built once at registration from its
//! [`SourceConfig`] and shared by all of its operations. Clients of the same
//! registry share one [`RateLimiter`], which keeps a separate token bucket per
//! source id.
//!
//! - [`HttpClient::fetch`] performs exactly one rate-limited attempt.
//! - [`HttpClient::send`] retries transient failures (transport errors, `429`,
//!   `5xx`) with exponential backoff and jitter, honoring `Retry-After`.
//! - [`HttpClient::fire_and_forget`] detaches a request whose outcome nobody
//!   waits for.
//!
//! # Examples
//!
//! ```rust,no_run
//! use hondana::config::SourceConfig;
//! use hondana::net::{HttpClient, RateLimiter, Request};
//! use std::sync::Arc;
//! use url::Url;
//!
//! # async fn example() -> hondana::Result<()> {
//! let config = SourceConfig::new("example", "Example", "https://example.com");
//! let base = Url::parse("https://example.com/").unwrap();
//! let client = HttpClient::new(&config, &base, Arc::new(RateLimiter::new()))?;
//!
//! let response = client.send(&Request::get("/manga/page/1/")).await?;
//! println!("{} bytes from {}", response.body.len(), response.url);
//! # Ok(())
//! # }
//! ```

use bytes::Bytes;
use rand::Rng;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue, REFERER, RETRY_AFTER, USER_AGENT};
use reqwest::{Client, Method};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use crate::config::{DEFAULT_USER_AGENT, HttpMethod, RateLimit, SourceConfig, UserAgentPolicy};
use crate::error::{Error, Result};

pub mod html;
pub mod json;
pub mod rate_limit;

pub use rate_limit::RateLimiter;

/// Desktop browser strings used by [`UserAgentPolicy::Random`].
pub const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:125.0) Gecko/20100101 Firefox/125.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36 Edg/124.0.0.0",
];

const BASE_BACKOFF: Duration = Duration::from_millis(500);
const MAX_RETRY_AFTER: Duration = Duration::from_secs(60);

/// An outgoing request. `url` may be absolute or relative to the source base.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    /// `application/x-www-form-urlencoded` body
    pub form: Option<String>,
}

impl Request {
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, url)
    }

    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            form: None,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_form(mut self, body: impl Into<String>) -> Self {
        self.form = Some(body.into());
        self
    }
}

/// A successful (2xx) response.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    /// Final URL after redirects
    pub url: String,
    pub content_type: Option<String>,
    pub body: Bytes,
}

impl RawResponse {
    /// Body decoded as UTF-8, replacing invalid sequences.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

struct Failure {
    error: Error,
    retry_after: Option<Duration>,
}

impl From<Error> for Failure {
    fn from(error: Error) -> Self {
        Self {
            error,
            retry_after: None,
        }
    }
}

/// Per-source HTTP client.
#[derive(Clone, Debug)]
pub struct HttpClient {
    source_id: Arc<str>,
    client: Client,
    base: Url,
    limiter: Arc<RateLimiter>,
    rate_limit: RateLimit,
    headers: HeaderMap,
    user_agent: UserAgentPolicy,
    max_retries: u32,
}

impl HttpClient {
    /// Builds the client of one source.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidConfig`] for header names or values that are not
    /// valid HTTP, or when the underlying client cannot be built.
    pub fn new(config: &SourceConfig, base: &Url, limiter: Arc<RateLimiter>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        for (name, value) in &config.headers {
            let name = name
                .parse::<HeaderName>()
                .map_err(|e| Error::invalid_config(&config.id, format!("header `{name}`: {e}")))?;
            let value = value
                .parse::<HeaderValue>()
                .map_err(|e| Error::invalid_config(&config.id, format!("header `{name}` value: {e}")))?;
            headers.insert(name, value);
        }
        if !headers.contains_key(REFERER) {
            if let Ok(value) = HeaderValue::from_str(base.as_str()) {
                headers.insert(REFERER, value);
            }
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .pool_max_idle_per_host(10)
            .gzip(true)
            .brotli(true)
            .build()
            .map_err(|e| Error::invalid_config(&config.id, format!("HTTP client: {e}")))?;

        Ok(Self {
            source_id: Arc::from(config.id.as_str()),
            client,
            base: base.clone(),
            limiter,
            rate_limit: config.rate_limit,
            headers,
            user_agent: config.user_agent.clone(),
            max_retries: config.max_retries,
        })
    }

    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    /// Resolves a request URL against the source base.
    pub fn resolve(&self, url: &str) -> Result<Url> {
        self.base
            .join(url.trim())
            .map_err(|e| Error::fetch(url, None, format!("invalid URL: {e}")).non_retriable())
    }

    /// User agent for the next request.
    pub fn user_agent(&self) -> &str {
        match &self.user_agent {
            UserAgentPolicy::Fixed => DEFAULT_USER_AGENT,
            UserAgentPolicy::Custom(ua) => ua,
            UserAgentPolicy::Random => random_user_agent(),
        }
    }

    /// Performs one rate-limited attempt.
    ///
    /// # Errors
    ///
    /// [`Error::Fetch`] on transport failure or non-2xx status, with
    /// `retriable` set for timeouts, connection errors, `429` and `5xx`.
    pub async fn fetch(&self, request: &Request) -> Result<RawResponse> {
        self.attempt(request).await.map_err(|f| f.error)
    }

    /// Sends a request, retrying transient failures.
    ///
    /// Backoff is `500ms * 2^attempt` with ±25% jitter; a `Retry-After` on a
    /// `429` response replaces it (capped at one minute). Non-retriable
    /// errors are returned at once.
    pub async fn send(&self, request: &Request) -> Result<RawResponse> {
        let mut attempt = 0;

        loop {
            match self.attempt(request).await {
                Ok(response) => return Ok(response),
                Err(failure) if failure.error.is_retriable() && attempt < self.max_retries => {
                    let delay = failure
                        .retry_after
                        .map(|d| d.min(MAX_RETRY_AFTER))
                        .unwrap_or_else(|| backoff(attempt));
                    attempt += 1;
                    tracing::warn!(
                        source = %self.source_id,
                        url = %request.url,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %failure.error,
                        "retrying request"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(failure) => return Err(failure.error),
            }
        }
    }

    /// Convenience GET returning the body as text.
    pub async fn get_text(&self, url: &str) -> Result<String> {
        Ok(self.send(&Request::get(url)).await?.text())
    }

    /// Spawns a request nobody waits for; its failure is logged and dropped.
    pub fn fire_and_forget(&self, request: Request) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::debug!(source = %self.source_id, url = %request.url, "no runtime, side request skipped");
            return;
        };

        let client = self.clone();
        runtime.spawn(async move {
            if let Err(error) = client.fetch(&request).await {
                tracing::debug!(source = %client.source_id, url = %request.url, %error, "side request failed");
            }
        });
    }

    async fn attempt(&self, request: &Request) -> std::result::Result<RawResponse, Failure> {
        let url = self.resolve(&request.url)?;
        self.limiter.acquire(&self.source_id, self.rate_limit).await;

        tracing::debug!(source = %self.source_id, method = ?request.method, %url, "fetching");

        let method = match request.method {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
        };
        let mut headers = self.headers.clone();
        for (name, value) in &request.headers {
            let invalid = |e: &dyn std::fmt::Display| {
                Error::fetch(url.as_str(), None, format!("header `{name}`: {e}")).non_retriable()
            };
            let header = HeaderName::from_bytes(name.as_bytes()).map_err(|e| invalid(&e))?;
            let value = HeaderValue::from_str(value).map_err(|e| invalid(&e))?;
            headers.insert(header, value);
        }
        let mut builder = self
            .client
            .request(method, url.clone())
            .header(USER_AGENT, self.user_agent())
            .headers(headers);
        if let Some(form) = &request.form {
            builder = builder
                .header(CONTENT_TYPE, "application/x-www-form-urlencoded; charset=UTF-8")
                .body(form.clone());
        }

        let response = builder.send().await.map_err(Error::from)?;
        let status = response.status();
        let final_url = response.url().to_string();

        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs);
            return Err(Failure {
                error: Error::fetch(final_url, Some(status.as_u16()), format!("HTTP {status}")),
                retry_after,
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        let body = response.bytes().await.map_err(Error::from)?;

        Ok(RawResponse {
            status: status.as_u16(),
            url: final_url,
            content_type,
            body,
        })
    }
}

/// One of [`USER_AGENTS`], chosen at random.
pub fn random_user_agent() -> &'static str {
    let mut rng = rand::thread_rng();
    USER_AGENTS[rng.gen_range(0..USER_AGENTS.len())]
}

/// Delay before retry number `attempt + 1`.
fn backoff(attempt: u32) -> Duration {
    let base = BASE_BACKOFF * 2u32.saturating_pow(attempt.min(10));
    let jitter = rand::thread_rng().gen_range(0.75..=1.25);
    base.mul_f64(jitter)
}
