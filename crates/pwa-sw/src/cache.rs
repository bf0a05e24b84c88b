//! Cache API: named buckets of request/response pairs.
//!
//! ```text
//! CacheStorage (caches)
//!     ├── "pwa-cache-v276"  (superseded, swept on activate)
//!     └── "pwa-cache-v277"  (current)
//!             └── CacheKey (GET + URL) → Response
//! ```
//!
//! The traits are the seam the handlers see; [`MemoryCacheStorage`] is the
//! in-process store used by the host and by tests.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use hashbrown::HashMap;
use pwa_net::{Request, Response};
use tokio::sync::RwLock;
use tracing::trace;
use url::Url;

use crate::error::{Result, ServiceWorkerError};

/// Identity of a cached request.
///
/// Only GET requests are ever cached, so the identity is the request URL
/// with any fragment removed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Key for a GET of `url`.
    pub fn for_url(url: &Url) -> Self {
        let mut url = url.clone();
        url.set_fragment(None);
        Self(url.into())
    }

    /// Key for a request, or `None` if the request is not cacheable.
    pub fn for_request(request: &Request) -> Option<Self> {
        request.is_get().then(|| Self::for_url(&request.url))
    }

    pub fn url(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GET {}", self.0)
    }
}

/// A cached request/response pair.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: CacheKey,
    pub response: Response,
    /// Milliseconds since the Unix epoch.
    pub cached_at: u64,
}

/// A single named bucket.
#[async_trait]
pub trait Cache: Send + Sync {
    fn name(&self) -> &str;

    /// Look up a stored response.
    async fn match_key(&self, key: &CacheKey) -> Result<Option<Response>>;

    /// Store a response, replacing any previous entry for the key.
    ///
    /// Responses that are not 2xx are rejected.
    async fn put(&self, key: CacheKey, response: Response) -> Result<()>;

    async fn delete(&self, key: &CacheKey) -> Result<bool>;

    async fn keys(&self) -> Result<Vec<CacheKey>>;
}

/// The collection of buckets (`caches` global).
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Open a bucket, creating it if it does not exist.
    async fn open(&self, name: &str) -> Result<Arc<dyn Cache>>;

    async fn has(&self, name: &str) -> Result<bool>;

    /// Delete a bucket. Returns whether it existed.
    async fn delete(&self, name: &str) -> Result<bool>;

    /// Bucket names in creation order.
    async fn keys(&self) -> Result<Vec<String>>;
}

// ==================== In-memory cache ====================

/// In-memory bucket.
#[derive(Debug)]
pub struct MemoryCache {
    name: String,
    entries: RwLock<HashMap<CacheKey, CacheEntry>>,
}

impl MemoryCache {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Full entry, including when it was stored.
    pub async fn entry(&self, key: &CacheKey) -> Option<CacheEntry> {
        self.entries.read().await.get(key).cloned()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl Cache for MemoryCache {
    fn name(&self) -> &str {
        &self.name
    }

    async fn match_key(&self, key: &CacheKey) -> Result<Option<Response>> {
        let entries = self.entries.read().await;
        let hit = entries.get(key).map(|e| e.response.clone());
        trace!(cache = %self.name, key = %key, hit = hit.is_some(), "Cache match");
        Ok(hit)
    }

    async fn put(&self, key: CacheKey, response: Response) -> Result<()> {
        if !response.ok() {
            return Err(ServiceWorkerError::Cache(format!(
                "refusing to cache {} response for {}",
                response.status, key
            )));
        }

        let entry = CacheEntry {
            key: key.clone(),
            response,
            cached_at: pwa_common::unix_millis(),
        };
        self.entries.write().await.insert(key, entry);
        Ok(())
    }

    async fn delete(&self, key: &CacheKey) -> Result<bool> {
        Ok(self.entries.write().await.remove(key).is_some())
    }

    async fn keys(&self) -> Result<Vec<CacheKey>> {
        let mut keys: Vec<CacheKey> = self.entries.read().await.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }
}

// ==================== In-memory cache storage ====================

#[derive(Debug, Default)]
struct Buckets {
    by_name: HashMap<String, Arc<MemoryCache>>,
    order: Vec<String>,
}

/// In-memory cache storage.
#[derive(Debug, Default)]
pub struct MemoryCacheStorage {
    buckets: RwLock<Buckets>,
}

impl MemoryCacheStorage {
    /// Create new cache storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Concrete handle to a bucket, if it exists.
    pub async fn bucket(&self, name: &str) -> Option<Arc<MemoryCache>> {
        self.buckets.read().await.by_name.get(name).cloned()
    }
}

#[async_trait]
impl CacheStorage for MemoryCacheStorage {
    async fn open(&self, name: &str) -> Result<Arc<dyn Cache>> {
        let mut buckets = self.buckets.write().await;
        if let Some(bucket) = buckets.by_name.get(name) {
            return Ok(bucket.clone());
        }

        let bucket = Arc::new(MemoryCache::new(name));
        buckets.by_name.insert(name.to_string(), bucket.clone());
        buckets.order.push(name.to_string());
        Ok(bucket)
    }

    async fn has(&self, name: &str) -> Result<bool> {
        Ok(self.buckets.read().await.by_name.contains_key(name))
    }

    async fn delete(&self, name: &str) -> Result<bool> {
        let mut buckets = self.buckets.write().await;
        if buckets.by_name.remove(name).is_some() {
            buckets.order.retain(|n| n != name);
            Ok(true)
        } else {
            Ok(false)
        }
    }

    async fn keys(&self) -> Result<Vec<String>> {
        Ok(self.buckets.read().await.order.clone())
    }
}
