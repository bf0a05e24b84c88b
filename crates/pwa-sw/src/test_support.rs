//! Fakes shared by the unit tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use http::{Method, StatusCode};
use hashbrown::HashMap;
use pwa_net::{CacheMode, Fetcher, NetError, Request, Response};
use url::Url;

use crate::cache::{Cache, CacheKey, CacheStorage, MemoryCacheStorage};
use crate::clients::Clients;
use crate::config::WorkerConfig;
use crate::env::WorkerEnv;
use crate::error::{Result, ServiceWorkerError};

pub const ORIGIN: &str = "https://licensing.example.gov/";

pub fn url(path: &str) -> Url {
    Url::parse(ORIGIN).unwrap().join(path).unwrap()
}

pub fn ok_response(path: &str, body: &str) -> Response {
    Response::new(url(path), StatusCode::OK, body.to_string())
}

#[derive(Clone)]
enum Route {
    Respond(StatusCode, String),
    Fail,
}

/// Scripted network. Unknown URLs fail like an unreachable host.
#[derive(Default)]
pub struct FakeNetwork {
    routes: Mutex<HashMap<String, Route>>,
    offline: AtomicBool,
    calls: Mutex<Vec<(Method, String, CacheMode)>>,
}

impl FakeNetwork {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn respond(&self, path: &str, status: StatusCode, body: &str) {
        self.routes
            .lock()
            .unwrap()
            .insert(url(path).to_string(), Route::Respond(status, body.to_string()));
    }

    pub fn ok(&self, path: &str, body: &str) {
        self.respond(path, StatusCode::OK, body);
    }

    pub fn fail(&self, path: &str) {
        self.routes
            .lock()
            .unwrap()
            .insert(url(path).to_string(), Route::Fail);
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<(Method, String, CacheMode)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Fetcher for FakeNetwork {
    async fn fetch(&self, request: Request) -> std::result::Result<Response, NetError> {
        self.calls.lock().unwrap().push((
            request.method.clone(),
            request.url.to_string(),
            request.cache,
        ));

        if self.offline.load(Ordering::SeqCst) {
            return Err(NetError::Offline(request.url.to_string()));
        }

        let route = self.routes.lock().unwrap().get(request.url.as_str()).cloned();
        match route {
            Some(Route::Respond(status, body)) => Ok(Response::new(request.url, status, body)),
            Some(Route::Fail) | None => Err(NetError::Offline(request.url.to_string())),
        }
    }
}

#[derive(Default)]
pub struct Faults {
    pub fail_open: AtomicBool,
    pub fail_match: AtomicBool,
    pub fail_put: AtomicBool,
    pub fail_keys: AtomicBool,
    pub fail_delete: Mutex<Vec<String>>,
    pub operations: AtomicUsize,
}

impl Faults {
    fn check(&self, flag: &AtomicBool, what: &str) -> Result<()> {
        self.operations.fetch_add(1, Ordering::SeqCst);
        if flag.load(Ordering::SeqCst) {
            Err(ServiceWorkerError::Cache(format!("injected {what} failure")))
        } else {
            Ok(())
        }
    }
}

/// Memory storage with injectable failures and an operation counter.
#[derive(Default)]
pub struct FaultyStorage {
    pub inner: MemoryCacheStorage,
    pub faults: Arc<Faults>,
}

impl FaultyStorage {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn operations(&self) -> usize {
        self.faults.operations.load(Ordering::SeqCst)
    }

    /// Read an entry straight from the inner store, bypassing fault injection.
    pub async fn stored(&self, cache_name: &str, path: &str) -> Option<Response> {
        let bucket = self.inner.bucket(cache_name).await?;
        bucket.match_key(&CacheKey::for_url(&url(path))).await.ok().flatten()
    }

    /// Seed an entry straight into the inner store.
    pub async fn seed(&self, cache_name: &str, path: &str, body: &str) {
        let bucket = self.inner.open(cache_name).await.unwrap();
        bucket
            .put(CacheKey::for_url(&url(path)), ok_response(path, body))
            .await
            .unwrap();
    }
}

struct FaultyCache {
    inner: Arc<dyn Cache>,
    faults: Arc<Faults>,
}

#[async_trait]
impl Cache for FaultyCache {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn match_key(&self, key: &CacheKey) -> Result<Option<Response>> {
        self.faults.check(&self.faults.fail_match, "match")?;
        self.inner.match_key(key).await
    }

    async fn put(&self, key: CacheKey, response: Response) -> Result<()> {
        self.faults.check(&self.faults.fail_put, "put")?;
        self.inner.put(key, response).await
    }

    async fn delete(&self, key: &CacheKey) -> Result<bool> {
        self.inner.delete(key).await
    }

    async fn keys(&self) -> Result<Vec<CacheKey>> {
        self.inner.keys().await
    }
}

#[async_trait]
impl CacheStorage for FaultyStorage {
    async fn open(&self, name: &str) -> Result<Arc<dyn Cache>> {
        self.faults.check(&self.faults.fail_open, "open")?;
        let inner = self.inner.open(name).await?;
        Ok(Arc::new(FaultyCache {
            inner,
            faults: self.faults.clone(),
        }))
    }

    async fn has(&self, name: &str) -> Result<bool> {
        self.inner.has(name).await
    }

    async fn delete(&self, name: &str) -> Result<bool> {
        self.faults.operations.fetch_add(1, Ordering::SeqCst);
        if self.faults.fail_delete.lock().unwrap().iter().any(|n| n == name) {
            return Err(ServiceWorkerError::Cache(format!("injected delete failure for {name}")));
        }
        self.inner.delete(name).await
    }

    async fn keys(&self) -> Result<Vec<String>> {
        self.faults.check(&self.faults.fail_keys, "keys")?;
        self.inner.keys().await
    }
}

pub fn config(version: &str) -> WorkerConfig {
    WorkerConfig::for_origin(Url::parse(ORIGIN).unwrap())
        .with_version(version)
        .with_manifest(["/", "/index.html"])
}

pub fn env(
    config: WorkerConfig,
    network: Arc<FakeNetwork>,
    storage: Arc<FaultyStorage>,
    clients: Arc<Clients>,
) -> WorkerEnv {
    WorkerEnv::new(config, storage, network, clients)
}
