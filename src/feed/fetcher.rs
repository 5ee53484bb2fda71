use crate::util::validate_url;
use futures::StreamExt;
use reqwest::header::{ACCEPT, CONTENT_TYPE, USER_AGENT};
use reqwest::{Method, StatusCode};
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use url::Url;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_MAX_BODY_BYTES: usize = 10 * 1024 * 1024; // 10MB

/// Accept header favoring feed documents over HTML.
pub const FEED_ACCEPT: &str =
    "application/rss+xml, application/atom+xml, application/xml, text/xml;q=0.9, */*;q=0.8";

pub fn default_user_agent() -> String {
    format!(
        "feedscout/{} (+https://github.com/feedscout/feedscout)",
        env!("CARGO_PKG_VERSION")
    )
}

/// Errors that can occur while fetching a URL.
///
/// `Timeout` is a fetch timeout; `HttpStatus` and `EmptyBody` are the two ways a
/// fetch can fail after the server answered. There are no retries: every variant
/// reaches the caller on the first failed attempt.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The deadline passed before the response body was fully read
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// 2xx response whose body is empty or whitespace only
    #[error("Empty response body")]
    EmptyBody,
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// The URL failed validation (unparseable, bad scheme, private host)
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    /// Response body exceeded the configured size limit
    #[error("Response too large (exceeds {0} bytes)")]
    TooLarge(usize),
}

impl FetchError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, FetchError::Timeout(_))
    }

    /// True for failures where the server answered but gave nothing usable.
    pub fn is_failed(&self) -> bool {
        matches!(self, FetchError::HttpStatus(_) | FetchError::EmptyBody)
    }
}

/// Point in time after which a fetch is abandoned.
///
/// Each call gets its own deadline value, so concurrent fetches never share a
/// timer. A deadline bounds the whole exchange: connect, headers and body.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    at: Instant,
    budget: Duration,
}

impl Deadline {
    pub fn after(budget: Duration) -> Self {
        Self {
            at: Instant::now() + budget,
            budget,
        }
    }

    fn instant(&self) -> Instant {
        self.at
    }

    fn timed_out(&self) -> FetchError {
        FetchError::Timeout(self.budget)
    }
}

/// Knobs for [`Fetcher`]; usually built from [`crate::config::Config::fetch_settings`].
#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub timeout: Duration,
    pub user_agent: String,
    pub max_body_bytes: usize,
    /// Skip SSRF validation (local development and tests only)
    pub allow_private_hosts: bool,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            user_agent: default_user_agent(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            allow_private_hosts: false,
        }
    }
}

/// Result of a lightweight existence check.
#[derive(Debug, Clone)]
pub struct Probe {
    pub url: String,
    pub status: u16,
    /// Lowercased `Content-Type`, empty when the header is missing
    pub content_type: String,
}

impl Probe {
    /// True when the URL answered 2xx with an XML/RSS/Atom content type.
    pub fn is_feed(&self) -> bool {
        (200..300).contains(&self.status)
            && ["xml", "rss", "atom"]
                .iter()
                .any(|kind| self.content_type.contains(kind))
    }
}

/// Retrieves raw text (XML or HTML) for a URL.
///
/// Stateless apart from the shared `reqwest::Client` connection pool; every
/// call is independent and safe to run concurrently with any other.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: reqwest::Client,
    settings: FetchSettings,
}

impl Fetcher {
    /// Creates a fetcher around a caller-configured HTTP client.
    pub fn new(client: reqwest::Client, settings: FetchSettings) -> Self {
        Self { client, settings }
    }

    /// Fetches `url` as text within the configured timeout.
    ///
    /// # Errors
    ///
    /// - [`FetchError::Timeout`] - no complete response within the timeout
    /// - [`FetchError::HttpStatus`] - non-2xx response
    /// - [`FetchError::EmptyBody`] - body is empty after trimming whitespace
    /// - [`FetchError::InvalidUrl`] - URL rejected before any request was made
    /// - [`FetchError::TooLarge`] - body exceeded `max_body_bytes`
    /// - [`FetchError::Network`] - connection-level failure
    pub async fn fetch_text(&self, url: &str) -> Result<String, FetchError> {
        self.fetch_text_with_deadline(url, Deadline::after(self.settings.timeout))
            .await
    }

    /// Same as [`Fetcher::fetch_text`] with an explicit deadline.
    pub async fn fetch_text_with_deadline(
        &self,
        url: &str,
        deadline: Deadline,
    ) -> Result<String, FetchError> {
        let url = self.check_url(url)?;

        let bytes = tokio::time::timeout_at(deadline.instant(), self.get_bytes(url.clone()))
            .await
            .map_err(|_| deadline.timed_out())??;

        let text = String::from_utf8_lossy(&bytes);
        if text.trim().is_empty() {
            return Err(FetchError::EmptyBody);
        }

        tracing::debug!(url = %url, bytes = bytes.len(), "Fetched");
        Ok(text.into_owned())
    }

    /// Checks whether `url` exists without downloading its body.
    ///
    /// Sends HEAD first and falls back to GET when the server rejects HEAD
    /// (405/501) or drops the connection. Both attempts share one deadline.
    pub async fn probe(&self, url: &str) -> Result<Probe, FetchError> {
        let url = self.check_url(url)?;
        let deadline = Deadline::after(self.settings.timeout);

        match self.send_probe(Method::HEAD, &url, deadline).await {
            Ok(probe)
                if probe.status != StatusCode::METHOD_NOT_ALLOWED.as_u16()
                    && probe.status != StatusCode::NOT_IMPLEMENTED.as_u16() =>
            {
                return Ok(probe);
            }
            Ok(probe) => {
                tracing::debug!(url = %url, status = probe.status, "HEAD unsupported, retrying with GET");
            }
            Err(FetchError::Network(e)) => {
                tracing::debug!(url = %url, error = %e, "HEAD failed, retrying with GET");
            }
            Err(e) => return Err(e),
        }

        self.send_probe(Method::GET, &url, deadline).await
    }

    fn check_url(&self, url: &str) -> Result<Url, FetchError> {
        if self.settings.allow_private_hosts {
            let parsed = Url::parse(url).map_err(|e| FetchError::InvalidUrl(e.to_string()))?;
            return match parsed.scheme() {
                "http" | "https" => Ok(parsed),
                scheme => Err(FetchError::InvalidUrl(format!(
                    "unsupported scheme: {scheme}"
                ))),
            };
        }
        validate_url(url).map_err(|e| FetchError::InvalidUrl(e.to_string()))
    }

    fn request(&self, method: Method, url: Url) -> reqwest::RequestBuilder {
        self.client
            .request(method, url)
            .header(ACCEPT, FEED_ACCEPT)
            .header(USER_AGENT, self.settings.user_agent.as_str())
    }

    async fn get_bytes(&self, url: Url) -> Result<Vec<u8>, FetchError> {
        let response = self.request(Method::GET, url).send().await?;

        if !response.status().is_success() {
            return Err(FetchError::HttpStatus(response.status().as_u16()));
        }

        read_limited_bytes(response, self.settings.max_body_bytes).await
    }

    async fn send_probe(
        &self,
        method: Method,
        url: &Url,
        deadline: Deadline,
    ) -> Result<Probe, FetchError> {
        let response =
            tokio::time::timeout_at(deadline.instant(), self.request(method, url.clone()).send())
                .await
                .map_err(|_| deadline.timed_out())??;

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_ascii_lowercase();

        Ok(Probe {
            url: url.to_string(),
            status: response.status().as_u16(),
            content_type,
        })
    }
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    // Fast path: check Content-Length header
    if let Some(len) = response.content_length() {
        if len > limit as u64 {
            return Err(FetchError::TooLarge(limit));
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::TooLarge(limit));
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(bytes)
}
