use futures::StreamExt;
use reqwest::redirect::Policy;
use std::time::Duration;
use thiserror::Error;

use crate::config::Config;
use crate::util::{validate_scheme, validate_url, UrlValidationError};

const MAX_RETRIES: u32 = 3;
const MAX_REDIRECTS: usize = 3;

/// Errors that can occur while downloading a feed.
#[derive(Debug, Error)]
pub enum FetchError {
    /// URL failed validation (scheme, localhost, private network)
    #[error("Invalid feed URL: {0}")]
    InvalidUrl(#[from] UrlValidationError),
    /// A redirect pointed at a URL that fails validation
    #[error("Redirect refused: {0}")]
    RedirectRefused(String),
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Request exceeded the configured timeout
    #[error("Request timed out")]
    Timeout,
    /// Server returned 429 Too Many Requests after max retries
    #[error("Rate limited after {0} retries")]
    RateLimited(u32),
    /// Response body exceeded the configured size limit
    #[error("Response too large")]
    ResponseTooLarge,
    /// Response was incomplete (received fewer bytes than Content-Length)
    #[error("Incomplete response: expected {expected} bytes, received {received}")]
    IncompleteResponse { expected: u64, received: usize },
}

/// Downloads feed documents on behalf of the `load_feed` endpoint.
///
/// Cloning is cheap; the inner `reqwest::Client` is reference counted.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: reqwest::Client,
    timeout: Duration,
    max_bytes: usize,
    allow_private_hosts: bool,
    retry_base: Duration,
}

impl Fetcher {
    pub fn new(client: reqwest::Client, config: &Config) -> Self {
        Self {
            client,
            timeout: Duration::from_secs(config.fetch_timeout_secs),
            max_bytes: config.max_feed_bytes,
            allow_private_hosts: config.allow_private_hosts,
            retry_base: Duration::from_secs(1),
        }
    }

    /// Overrides the first backoff delay (1s by default). Later retries
    /// double it.
    pub fn with_retry_base(mut self, retry_base: Duration) -> Self {
        self.retry_base = retry_base;
        self
    }

    /// Fetches `url` and returns the response body.
    ///
    /// # Behavior
    ///
    /// - Only http/https URLs are accepted; localhost and private addresses
    ///   are refused unless `allow_private_hosts` is set
    /// - Each attempt is bounded by the configured timeout
    /// - HTTP 429 and 5xx responses are retried up to 3 times with
    ///   exponential backoff; other non-2xx statuses fail immediately
    /// - Bodies larger than `max_feed_bytes` are rejected, and truncated
    ///   bodies (shorter than `Content-Length`) are retried
    pub async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        if self.allow_private_hosts {
            validate_scheme(url)?;
        } else {
            validate_url(url)?;
        }

        let mut retry_count = 0;

        loop {
            let response = tokio::time::timeout(self.timeout, self.client.get(url).send())
                .await
                .map_err(|_| FetchError::Timeout)?
                .map_err(classify_send_error)?;

            let status = response.status();

            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                if retry_count >= MAX_RETRIES {
                    return Err(FetchError::RateLimited(MAX_RETRIES));
                }
                let delay = self.backoff(retry_count);
                tracing::warn!(
                    url = %url,
                    retry = retry_count,
                    delay_ms = delay.as_millis() as u64,
                    "Rate limited, backing off"
                );
                tokio::time::sleep(delay).await;
                retry_count += 1;
                continue;
            }

            if status.is_server_error() {
                if retry_count >= MAX_RETRIES {
                    return Err(FetchError::HttpStatus(status.as_u16()));
                }
                let delay = self.backoff(retry_count);
                tracing::warn!(
                    url = %url,
                    status = %status,
                    retry = retry_count,
                    delay_ms = delay.as_millis() as u64,
                    "Server error, retrying after delay"
                );
                tokio::time::sleep(delay).await;
                retry_count += 1;
                continue;
            }

            if !status.is_success() {
                return Err(FetchError::HttpStatus(status.as_u16()));
            }

            match read_limited_bytes(response, self.max_bytes).await {
                Ok(bytes) => {
                    tracing::debug!(url = %url, bytes = bytes.len(), "Fetched feed");
                    return Ok(bytes);
                }
                Err(FetchError::IncompleteResponse { expected, received }) => {
                    if retry_count >= MAX_RETRIES {
                        return Err(FetchError::IncompleteResponse { expected, received });
                    }
                    let delay = self.backoff(retry_count);
                    tracing::debug!(
                        url = %url,
                        expected = expected,
                        received = received,
                        attempt = retry_count + 1,
                        "Retrying incomplete download"
                    );
                    tokio::time::sleep(delay).await;
                    retry_count += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn backoff(&self, retry_count: u32) -> Duration {
        self.retry_base.saturating_mul(2u32.saturating_pow(retry_count))
    }
}

/// HTTP client used for feed downloads: bounded redirects, pooled
/// connections, identifying user agent.
///
/// Every redirect target goes through the same URL check as the initial
/// request, so a public feed cannot bounce the server onto a private address
/// unless `allow_private_hosts` is set.
pub fn build_client(allow_private_hosts: bool) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(concat!("podcast-feed-editor/", env!("CARGO_PKG_VERSION")))
        .redirect(redirect_policy(allow_private_hosts))
        .pool_max_idle_per_host(4)
        .pool_idle_timeout(Duration::from_secs(30))
        .tcp_keepalive(Duration::from_secs(60))
        .build()
}

fn redirect_policy(allow_private_hosts: bool) -> Policy {
    Policy::custom(move |attempt| {
        if attempt.previous().len() >= MAX_REDIRECTS {
            return attempt.error("Too many redirects (max 3)");
        }

        let url = attempt.url();
        if attempt.previous().iter().any(|prev| prev.as_str() == url.as_str()) {
            return attempt.error("Redirect loop detected");
        }

        let checked = if allow_private_hosts {
            validate_scheme(url.as_str())
        } else {
            validate_url(url.as_str())
        };
        if let Err(e) = checked {
            tracing::warn!(to = %url, error = %e, "Refusing redirect");
            return attempt.error(e);
        }

        tracing::debug!(
            from = %attempt.previous().last().map(|u| u.as_str()).unwrap_or("initial"),
            to = %url,
            hop = attempt.previous().len() + 1,
            "Following redirect"
        );

        attempt.follow()
    })
}

/// Surfaces a redirect refused by the URL check as its own error instead of
/// a generic network failure.
fn classify_send_error(e: reqwest::Error) -> FetchError {
    if e.is_redirect() {
        let mut source = std::error::Error::source(&e);
        while let Some(err) = source {
            if let Some(refused) = err.downcast_ref::<UrlValidationError>() {
                return FetchError::RedirectRefused(refused.to_string());
            }
            source = err.source();
        }
    }
    FetchError::Network(e)
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    let expected_length = response.content_length();

    // Fast path: check Content-Length header
    if let Some(len) = expected_length {
        if len as usize > limit {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(FetchError::Network)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    if let Some(expected) = expected_length {
        if (bytes.len() as u64) < expected {
            return Err(FetchError::IncompleteResponse {
                expected,
                received: bytes.len(),
            });
        }
    }

    Ok(bytes)
}
