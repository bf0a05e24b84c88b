//! # PWA Net
//!
//! The network capability used by the offline service worker.
//!
//! ## Design Goals
//!
//! 1. **Buffered snapshots**: a [`Response`] is fully read, so handing one
//!    copy to the page and another to the cache is a plain clone
//! 2. **Injectable network**: everything that talks to the network goes
//!    through the [`Fetcher`] trait, so routing logic can run against fakes
//! 3. **Real HTTP**: [`HttpFetcher`] backs the trait with reqwest

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use mime::Mime;
use thiserror::Error;
use url::Url;

pub mod loader;

pub use loader::{HttpFetcher, LoaderConfig};

/// Errors that can occur in networking.
#[derive(Error, Debug)]
pub enum NetError {
    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Network unreachable: {0}")]
    Offline(String),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),
}

/// Unique identifier for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(u64);

impl RequestId {
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

/// Request mode, as seen by a fetch handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestMode {
    /// Top-level page load.
    Navigate,
    SameOrigin,
    NoCors,
    #[default]
    Cors,
}

/// How the request interacts with HTTP caches along the way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheMode {
    #[default]
    Default,
    NoStore,
    /// Always go to the origin, ignoring any intermediate cache.
    Reload,
    NoCache,
    ForceCache,
}

impl CacheMode {
    /// Whether intermediaries must be told not to answer from their cache.
    pub fn bypasses_http_cache(&self) -> bool {
        matches!(self, CacheMode::Reload | CacheMode::NoCache | CacheMode::NoStore)
    }
}

/// HTTP request.
#[derive(Debug, Clone)]
pub struct Request {
    pub id: RequestId,
    pub url: Url,
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
    pub mode: RequestMode,
    pub cache: CacheMode,
    pub timeout: Option<Duration>,
}

impl Request {
    /// Create a request with an arbitrary method.
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            id: RequestId::new(),
            url,
            method,
            headers: HeaderMap::new(),
            body: None,
            mode: RequestMode::default(),
            cache: CacheMode::default(),
            timeout: None,
        }
    }

    /// Create a GET request.
    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    /// Create a POST request.
    pub fn post(url: Url, body: Bytes) -> Self {
        let mut request = Self::new(Method::POST, url);
        request.body = Some(body);
        request
    }

    /// Create a top-level navigation request.
    pub fn navigate(url: Url) -> Self {
        Self::get(url).mode(RequestMode::Navigate)
    }

    /// Add a header.
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Set timeout.
    pub fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = Some(duration);
        self
    }

    /// Set the request mode.
    pub fn mode(mut self, mode: RequestMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the cache mode.
    pub fn cache_mode(mut self, cache: CacheMode) -> Self {
        self.cache = cache;
        self
    }

    pub fn is_get(&self) -> bool {
        self.method == Method::GET
    }

    pub fn is_navigation(&self) -> bool {
        self.mode == RequestMode::Navigate
    }
}

/// Buffered HTTP response.
#[derive(Debug, Clone)]
pub struct Response {
    pub url: Url,
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl Response {
    /// Create a response with no headers.
    pub fn new(url: Url, status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            url,
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    /// Add a header.
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Check if request was successful (2xx).
    pub fn ok(&self) -> bool {
        self.status.is_success()
    }

    /// Parsed Content-Type header, if any.
    pub fn content_type(&self) -> Option<Mime> {
        self.headers
            .get(http::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<Mime>().ok())
    }

    /// Get the body as text.
    pub fn text(&self) -> Result<String, NetError> {
        String::from_utf8(self.body.to_vec()).map_err(|e| NetError::RequestFailed(e.to_string()))
    }
}

/// Anything that can perform a network fetch.
///
/// A non-2xx response is still a successful fetch; `Err` is reserved for
/// transport-level failures.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, request: Request) -> Result<Response, NetError>;
}
