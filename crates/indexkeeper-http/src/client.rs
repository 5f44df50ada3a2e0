//! HTTP client implementation

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Method, Response, StatusCode};
use serde_json::Value;
use tracing::debug;

use crate::{
    config::HttpConfig,
    error::{HttpError, Result},
    retry::RetryPolicy,
};

/// Mockable JSON-over-HTTP client trait
///
/// Paths are relative to the configured base URL and may carry a query string.
#[async_trait]
pub trait HttpClientTrait: Send + Sync {
    /// Execute a GET request and decode the JSON body
    async fn get_json(&self, path: &str) -> Result<Value>;

    /// Execute a HEAD request; `Ok(false)` on 404
    async fn head(&self, path: &str) -> Result<bool>;

    /// Execute a request with an optional JSON body and decode the JSON response
    async fn send_json(&self, method: Method, path: &str, body: Option<&Value>) -> Result<Value>;
}

/// Production HTTP client
pub struct HttpClient {
    inner: reqwest::Client,
    config: HttpConfig,
    retry: RetryPolicy,
}

impl HttpClient {
    /// Create a new HTTP client with configuration
    pub fn new(config: HttpConfig) -> Result<Self> {
        // Reject malformed endpoints before any request is attempted
        config
            .base_url
            .parse::<url::Url>()
            .map_err(|e| HttpError::InvalidUrl(format!("{}: {}", config.base_url, e)))?;

        let mut builder = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(&config.user_agent);

        if let Some(proxy_url) = &config.proxy {
            let proxy = reqwest::Proxy::all(proxy_url)
                .map_err(|e| HttpError::InvalidProxy(e.to_string()))?;
            builder = builder.proxy(proxy);
        }

        let inner = builder
            .build()
            .map_err(|e| HttpError::BuildError(e.to_string()))?;

        Ok(Self {
            inner,
            retry: RetryPolicy::from(&config),
            config,
        })
    }

    /// Create HTTP client with default configuration
    pub fn with_defaults() -> Result<Self> {
        Self::new(HttpConfig::default())
    }

    /// Get configuration
    pub fn config(&self) -> &HttpConfig {
        &self.config
    }

    fn url_for(&self, path: &str) -> Result<url::Url> {
        let joined = format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        joined
            .parse::<url::Url>()
            .map_err(|e| HttpError::InvalidUrl(format!("{}: {}", joined, e)))
    }

    async fn execute(&self, method: Method, path: &str, body: Option<&Value>) -> Result<Response> {
        let url = self.url_for(path)?;
        let mut request = self.inner.request(method, url);
        if let Some(body) = body {
            request = request.json(body);
        }

        request.send().await.map_err(|e| {
            if e.is_timeout() {
                HttpError::Timeout(self.config.timeout)
            } else {
                HttpError::RequestFailed(e)
            }
        })
    }

    async fn decode(response: Response) -> Result<Value> {
        let status = response.status();
        if !status.is_success() {
            return Err(HttpError::HttpStatus {
                status,
                message: response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unknown error".to_string()),
            });
        }

        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&bytes).map_err(|e| HttpError::Decode(e.to_string()))
    }
}

#[async_trait]
impl HttpClientTrait for HttpClient {
    async fn get_json(&self, path: &str) -> Result<Value> {
        debug!("HTTP GET: {}", path);
        self.retry
            .run(&format!("GET {}", path), || async move {
                let response = self.execute(Method::GET, path, None).await?;
                Self::decode(response).await
            })
            .await
    }

    async fn head(&self, path: &str) -> Result<bool> {
        debug!("HTTP HEAD: {}", path);
        self.retry
            .run(&format!("HEAD {}", path), || async move {
                let response = self.execute(Method::HEAD, path, None).await?;
                match response.status() {
                    StatusCode::NOT_FOUND => Ok(false),
                    status if status.is_success() => Ok(true),
                    status => Err(HttpError::HttpStatus {
                        status,
                        message: format!("HEAD {} failed", path),
                    }),
                }
            })
            .await
    }

    async fn send_json(&self, method: Method, path: &str, body: Option<&Value>) -> Result<Value> {
        debug!("HTTP {}: {}", method, path);
        // Mutating calls are not idempotent on the cluster side, so they are never retried
        let response = self.execute(method, path, body).await?;
        Self::decode(response).await
    }
}

/// Create a shared HTTP client (Arc-wrapped for cloning)
pub fn shared_client(config: HttpConfig) -> Result<Arc<dyn HttpClientTrait>> {
    Ok(Arc::new(HttpClient::new(config)?))
}
