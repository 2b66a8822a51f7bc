//! HTTP client utilities.
//!
//! Providers never talk to `reqwest` directly: they go through [`HttpFetch`], a
//! parameterized GET returning status + body. [`HttpClient`] is the production
//! implementation; tests substitute canned responses.

use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;

use crate::config::HttpConfig;
use crate::sources::SourceError;
use crate::utils::retry::{with_retry, RetryConfig};

/// Raw response of a GET request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// A 200 response carrying `body`
    pub fn ok(body: impl Into<String>) -> Self {
        Self::new(200, body)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// The request capability providers depend on
#[async_trait]
pub trait HttpFetch: Send + Sync + std::fmt::Debug {
    /// Issue a GET to `url` and return status + body
    async fn get(&self, url: &str) -> Result<HttpResponse, SourceError>;

    /// GET with extra request headers (API keys)
    async fn get_with_headers(
        &self,
        url: &str,
        headers: &[(&'static str, String)],
    ) -> Result<HttpResponse, SourceError> {
        let _ = headers;
        self.get(url).await
    }
}

/// Shared HTTP client with per-request timeouts and retry
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Arc<Client>,
    retry: RetryConfig,
}

impl HttpClient {
    /// Create a new HTTP client with default settings
    pub fn new() -> Result<Self, SourceError> {
        Self::from_config(&HttpConfig::default(), RetryConfig::default())
    }

    /// Create a client from configuration
    pub fn from_config(config: &HttpConfig, retry: RetryConfig) -> Result<Self, SourceError> {
        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| SourceError::Other(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client: Arc::new(client),
            retry,
        })
    }

    /// Create from an existing reqwest Client
    pub fn from_client(client: Arc<Client>, retry: RetryConfig) -> Self {
        Self { client, retry }
    }

    /// Get the underlying client
    pub fn client(&self) -> &Client {
        &self.client
    }

    async fn get_once(
        client: &Client,
        url: &str,
        headers: &[(&'static str, String)],
    ) -> Result<HttpResponse, SourceError> {
        let mut request = client.get(url);
        for (name, value) in headers {
            request = request.header(*name, value.as_str());
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                SourceError::Timeout(format!("GET {}", url))
            } else {
                SourceError::Network(format!("GET {} failed: {}", url, e))
            }
        })?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(SourceError::RateLimit);
        }
        if status.is_server_error() {
            return Err(SourceError::Api(format!(
                "{} returned server error status {}",
                url, status
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| SourceError::Network(format!("Failed to read response: {}", e)))?;

        Ok(HttpResponse::new(status.as_u16(), body))
    }
}

#[async_trait]
impl HttpFetch for HttpClient {
    async fn get(&self, url: &str) -> Result<HttpResponse, SourceError> {
        self.get_with_headers(url, &[]).await
    }

    async fn get_with_headers(
        &self,
        url: &str,
        headers: &[(&'static str, String)],
    ) -> Result<HttpResponse, SourceError> {
        let client = Arc::clone(&self.client);
        with_retry(self.retry, || {
            let client = Arc::clone(&client);
            async move { Self::get_once(&client, url, headers).await }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_success_range() {
        assert!(HttpResponse::ok("x").is_success());
        assert!(HttpResponse::new(204, "").is_success());
        assert!(!HttpResponse::new(404, "").is_success());
        assert!(!HttpResponse::new(301, "").is_success());
    }

    #[test]
    fn test_client_builds_from_default_config() {
        assert!(HttpClient::new().is_ok());
    }
}
