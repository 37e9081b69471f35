use bytes::Bytes;
use reqwest::{Client, ClientBuilder, RequestBuilder};
use serde::{Deserialize, Serialize};
use std::{sync::Arc, time::Duration};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use super::errors::GatewayError;

/// Concurrency and retry settings of the shared HTTP client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpClientConfig {
    /// Maximum number of in-flight HTTP requests
    pub concurrent_limit: usize,
    /// Permit acquisition timeout in milliseconds under normal load
    pub permit_timeout_ms: u64,
    /// Permit acquisition timeout in milliseconds when permits are scarce
    pub permit_timeout_scarce_ms: u64,
    /// Number of available permits below which they are considered scarce
    pub scarce_permit_threshold: usize,
    /// Retries after a connection could not be established. Requests that reached the
    /// server are never retried because gateway calls are not idempotent.
    pub connect_retries: u32,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            concurrent_limit: 256,
            permit_timeout_ms: 500,
            permit_timeout_scarce_ms: 200,
            scarce_permit_threshold: 16,
            connect_retries: 1,
        }
    }
}

/// HTTP client with semaphore-based concurrency control, shared by every gateway and
/// chain client of a discovery run.
pub struct HttpClient {
    client: Client,
    concurrent_limit: Arc<Semaphore>,
    config: HttpClientConfig,
}

/// RAII guard ensuring semaphore permits are always released.
struct PermitGuard {
    _permit: OwnedSemaphorePermit,
    semaphore: Arc<Semaphore>,
}

impl PermitGuard {
    fn new(permit: OwnedSemaphorePermit, semaphore: Arc<Semaphore>) -> Self {
        Self { _permit: permit, semaphore }
    }

    fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }
}

impl Drop for PermitGuard {
    fn drop(&mut self) {
        tracing::trace!(
            available_permits = self.semaphore.available_permits(),
            "permit guard dropped"
        );
    }
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("available_permits", &self.concurrent_limit.available_permits())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl HttpClient {
    /// Creates a new HTTP client with default configuration.
    pub fn new() -> Result<Self, GatewayError> {
        Self::with_config(HttpClientConfig::default())
    }

    /// Maps a reqwest error to a message that does not leak URLs.
    fn sanitize_network_error(error: &reqwest::Error) -> String {
        if error.is_connect() {
            "connection refused or unreachable".to_string()
        } else if error.is_timeout() {
            "connection timed out".to_string()
        } else if error.is_request() {
            "request failed".to_string()
        } else if error.is_body() {
            "response body error".to_string()
        } else if error.is_decode() {
            "response decode error".to_string()
        } else if error.is_redirect() {
            "too many redirects".to_string()
        } else {
            "network error".to_string()
        }
    }

    pub fn with_config(config: HttpClientConfig) -> Result<Self, GatewayError> {
        let client = ClientBuilder::new()
            .pool_idle_timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(8)
            .connect_timeout(Duration::from_secs(5))
            .use_rustls_tls()
            .redirect(reqwest::redirect::Policy::limited(3))
            .user_agent(concat!("dvote-core/", env!("CARGO_PKG_VERSION")))
            .tcp_nodelay(true)
            .build()
            .map_err(|e| {
                tracing::error!(error = %e, "failed to build http client");
                GatewayError::ConnectionFailed(format!("HTTP client build failed: {e}"))
            })?;

        Ok(Self {
            client,
            concurrent_limit: Arc::new(Semaphore::new(config.concurrent_limit)),
            config,
        })
    }

    /// POSTs a JSON body and returns the raw response bytes.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::Timeout`] if permit acquisition or the request times out
    /// - [`GatewayError::ConcurrencyLimit`] if the semaphore is closed
    /// - [`GatewayError::HttpError`] for non-success HTTP status codes
    /// - [`GatewayError::ConnectionFailed`] for network failures
    pub async fn post(&self, url: &str, body: Bytes, timeout: Duration) -> Result<Bytes, GatewayError> {
        self.execute(url, timeout, || {
            self.client
                .post(url)
                .header("content-type", "application/json")
                .body(body.clone())
        })
        .await
    }

    /// GETs a document and returns the raw response bytes.
    pub async fn get(&self, url: &str, timeout: Duration) -> Result<Bytes, GatewayError> {
        self.execute(url, timeout, || self.client.get(url)).await
    }

    /// GETs a document as UTF-8 text.
    pub async fn fetch_string(&self, url: &str, timeout: Duration) -> Result<String, GatewayError> {
        let bytes = self.get(url, timeout).await?;
        String::from_utf8(bytes.to_vec())
            .map_err(|_| GatewayError::InvalidResponse("response is not valid UTF-8".to_string()))
    }

    async fn execute<F>(&self, url: &str, timeout: Duration, build: F) -> Result<Bytes, GatewayError>
    where
        F: Fn() -> RequestBuilder,
    {
        let permit_guard = self.acquire(url).await?;

        tracing::trace!(
            available_permits = permit_guard.available_permits(),
            "http request started"
        );

        let mut retries = 0;

        loop {
            match build().timeout(timeout).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        let result = response.bytes().await.map_err(|e| {
                            if e.is_timeout() {
                                GatewayError::Timeout
                            } else {
                                GatewayError::ConnectionFailed(Self::sanitize_network_error(&e))
                            }
                        });
                        tracing::trace!(
                            available_permits = permit_guard.available_permits(),
                            "http request completed"
                        );
                        return result;
                    }

                    let raw_text = response.text().await.unwrap_or_default();
                    let sanitized_text = if raw_text.len() > 256 {
                        let cut = (0..=256).rev().find(|i| raw_text.is_char_boundary(*i)).unwrap_or(0);
                        format!("{}... (truncated)", &raw_text[..cut])
                    } else {
                        raw_text
                    };
                    tracing::trace!(status = status.as_u16(), "http request failed");
                    return Err(GatewayError::HttpError(status.as_u16(), sanitized_text));
                }
                Err(e) if e.is_connect() && retries < self.config.connect_retries => {
                    retries += 1;
                    tokio::time::sleep(Duration::from_millis(50 * (1 << retries))).await;
                }
                Err(e) => {
                    tracing::trace!(
                        available_permits = permit_guard.available_permits(),
                        "http request error"
                    );
                    if e.is_timeout() {
                        return Err(GatewayError::Timeout);
                    }
                    return Err(GatewayError::ConnectionFailed(Self::sanitize_network_error(&e)));
                }
            }
        }
    }

    async fn acquire(&self, url: &str) -> Result<PermitGuard, GatewayError> {
        let permit_timeout =
            if self.concurrent_limit.available_permits() < self.config.scarce_permit_threshold {
                Duration::from_millis(self.config.permit_timeout_scarce_ms)
            } else {
                Duration::from_millis(self.config.permit_timeout_ms)
            };

        let permit = tokio::time::timeout(
            permit_timeout,
            Arc::clone(&self.concurrent_limit).acquire_owned(),
        )
        .await
        .map_err(|_| {
            tracing::warn!(
                url = url,
                available_permits = self.concurrent_limit.available_permits(),
                "http client semaphore acquisition timeout"
            );
            GatewayError::Timeout
        })?
        .map_err(|_| {
            tracing::warn!(url = url, "http client concurrency limit reached");
            GatewayError::ConcurrencyLimit(url.to_string())
        })?;

        Ok(PermitGuard::new(permit, Arc::clone(&self.concurrent_limit)))
    }

    #[cfg(test)]
    #[must_use]
    pub fn available_permits(&self) -> usize {
        self.concurrent_limit.available_permits()
    }
}
