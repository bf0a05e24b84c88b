//! reqwest-backed [`Fetcher`].

use std::time::Duration;

use async_trait::async_trait;
use http::header::{CACHE_CONTROL, PRAGMA};
use http::HeaderValue;
use reqwest::Client;
use tracing::{debug, info, trace};

use crate::{Fetcher, NetError, Request, Response};

/// Resource loader configuration.
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// User agent string.
    pub user_agent: String,
    /// Timeout applied when a request does not carry its own.
    pub default_timeout: Duration,
    /// Maximum redirects.
    pub max_redirects: usize,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            user_agent: format!("pwa-sw/{}", env!("CARGO_PKG_VERSION")),
            default_timeout: Duration::from_secs(30),
            max_redirects: 10,
        }
    }
}

/// Fetches over real HTTP.
pub struct HttpFetcher {
    client: Client,
    config: LoaderConfig,
}

impl HttpFetcher {
    /// Create a new fetcher.
    pub fn new(config: LoaderConfig) -> Result<Self, NetError> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.default_timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .build()
            .map_err(|e| NetError::RequestFailed(e.to_string()))?;

        info!(user_agent = %config.user_agent, "HttpFetcher initialized");

        Ok(Self { client, config })
    }

    fn map_error(&self, err: reqwest::Error, timeout: Duration) -> NetError {
        if err.is_timeout() {
            NetError::Timeout(timeout)
        } else if err.is_connect() {
            NetError::Offline(err.to_string())
        } else {
            NetError::HttpError(err)
        }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: Request) -> Result<Response, NetError> {
        debug!(url = %request.url, method = %request.method, "Fetching resource");

        let timeout = request.timeout.unwrap_or(self.config.default_timeout);

        let mut req_builder = self
            .client
            .request(request.method.clone(), request.url.clone())
            .headers(request.headers.clone())
            .timeout(timeout);

        if request.cache.bypasses_http_cache() {
            req_builder = req_builder
                .header(CACHE_CONTROL, HeaderValue::from_static("no-cache"))
                .header(PRAGMA, HeaderValue::from_static("no-cache"));
        }

        if let Some(body) = request.body {
            req_builder = req_builder.body(body);
        }

        let response = req_builder
            .send()
            .await
            .map_err(|e| self.map_error(e, timeout))?;

        let status = response.status();
        let headers = response.headers().clone();
        let url = response.url().clone();

        let body = response
            .bytes()
            .await
            .map_err(|e| self.map_error(e, timeout))?;

        trace!(
            url = %url,
            status = %status,
            body_len = body.len(),
            "Response received"
        );

        Ok(Response {
            url,
            status,
            headers,
            body,
        })
    }
}
