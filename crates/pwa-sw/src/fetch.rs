//! Fetch phase: answer intercepted requests from the network, the cache,
//! or both.

use pwa_net::{Request, Response};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::cache::CacheKey;
use crate::env::WorkerEnv;
use crate::error::{Result, ServiceWorkerError};
use crate::router::{classify, Strategy};

/// Where the returned response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    Network,
    Cache,
}

/// Result of routing one request.
#[derive(Debug)]
pub struct FetchOutcome {
    pub response: Response,
    pub source: ResponseSource,
    pub strategy: Strategy,
    /// Background refresh started when a stale copy was served.
    pub revalidation: Option<JoinHandle<()>>,
}

impl FetchOutcome {
    pub(crate) fn network(strategy: Strategy, response: Response) -> Self {
        Self {
            response,
            source: ResponseSource::Network,
            strategy,
            revalidation: None,
        }
    }

    fn cache(strategy: Strategy, response: Response) -> Self {
        Self {
            response,
            source: ResponseSource::Cache,
            strategy,
            revalidation: None,
        }
    }
}

/// Answer a request intercepted from a controlled page.
///
/// `Err` means neither the network nor the cache could answer; the page
/// sees an ordinary failed fetch.
///
/// # Panics
///
/// Must be polled inside a Tokio runtime. A cache hit on a static asset
/// starts its background refresh with `tokio::spawn`, which panics
/// otherwise.
pub async fn on_fetch(env: &WorkerEnv, request: Request) -> Result<FetchOutcome> {
    let strategy = classify(&env.config, &request);
    trace!(url = %request.url, method = %request.method, strategy = %strategy, "Routing fetch");

    match strategy {
        Strategy::Passthrough => {
            let response = env.network.fetch(request).await?;
            Ok(FetchOutcome::network(strategy, response))
        }
        Strategy::NetworkFirstShell => network_first_shell(env, request).await,
        Strategy::StaleWhileRevalidate => stale_while_revalidate(env, request).await,
        Strategy::NetworkFirst => network_first(env, request).await,
    }
}

async fn network_first_shell(env: &WorkerEnv, request: Request) -> Result<FetchOutcome> {
    let strategy = Strategy::NetworkFirstShell;
    let url = request.url.clone();
    let shell_key = match env.config.shell_url() {
        Ok(shell) => Some(CacheKey::for_url(&shell)),
        Err(e) => {
            warn!(error = %e, "Shell document URL unusable, navigations will not be cached");
            None
        }
    };

    match env.network.fetch(request).await {
        Ok(response) => {
            if let Some(key) = shell_key {
                store(env, key, &response).await;
            }
            Ok(FetchOutcome::network(strategy, response))
        }
        Err(e) => {
            let cached = match shell_key {
                Some(ref key) => lookup(env, key).await,
                None => None,
            };
            match cached {
                Some(shell) => {
                    debug!(url = %url, error = %e, "Navigation failed, serving cached shell");
                    Ok(FetchOutcome::cache(strategy, shell))
                }
                None => {
                    warn!(url = %url, error = %e, "Navigation failed and no shell is cached");
                    Err(ServiceWorkerError::from(e))
                }
            }
        }
    }
}

async fn stale_while_revalidate(env: &WorkerEnv, request: Request) -> Result<FetchOutcome> {
    let strategy = Strategy::StaleWhileRevalidate;
    let key = CacheKey::for_url(&request.url);

    match lookup(env, &key).await {
        Some(cached) => {
            let env = env.clone();
            let revalidation = tokio::spawn(async move { revalidate(env, key, request).await });
            Ok(FetchOutcome {
                revalidation: Some(revalidation),
                ..FetchOutcome::cache(strategy, cached)
            })
        }
        None => {
            let response = env.network.fetch(request).await?;
            store(env, key, &response).await;
            Ok(FetchOutcome::network(strategy, response))
        }
    }
}

async fn revalidate(env: WorkerEnv, key: CacheKey, request: Request) {
    match env.network.fetch(request).await {
        Ok(response) => store(&env, key, &response).await,
        // The stale copy already went out; a failed refresh only means the
        // next hit is stale too.
        Err(e) => debug!(key = %key, error = %e, "Background refresh failed"),
    }
}

async fn network_first(env: &WorkerEnv, request: Request) -> Result<FetchOutcome> {
    let strategy = Strategy::NetworkFirst;
    let key = CacheKey::for_url(&request.url);

    match env.network.fetch(request).await {
        Ok(response) => {
            store(env, key, &response).await;
            Ok(FetchOutcome::network(strategy, response))
        }
        Err(e) => match lookup(env, &key).await {
            Some(cached) => {
                debug!(key = %key, error = %e, "Network failed, serving cached copy");
                Ok(FetchOutcome::cache(strategy, cached))
            }
            None => Err(ServiceWorkerError::from(e)),
        },
    }
}

/// Cache read. Any failure counts as a miss.
async fn lookup(env: &WorkerEnv, key: &CacheKey) -> Option<Response> {
    let cache = match env.current_cache().await {
        Ok(cache) => cache,
        Err(e) => {
            warn!(key = %key, error = %e, "Cache unavailable, treating as miss");
            return None;
        }
    };

    match cache.match_key(key).await {
        Ok(hit) => hit,
        Err(e) => {
            warn!(key = %key, error = %e, "Cache read failed, treating as miss");
            None
        }
    }
}

/// Cache write of a 2xx response. Failures are logged and swallowed.
async fn store(env: &WorkerEnv, key: CacheKey, response: &Response) {
    if !response.ok() {
        trace!(key = %key, status = %response.status, "Not caching unsuccessful response");
        return;
    }

    let cache = match env.current_cache().await {
        Ok(cache) => cache,
        Err(e) => {
            warn!(key = %key, error = %e, "Cache unavailable, serving uncached");
            return;
        }
    };

    let label = key.to_string();
    if let Err(e) = cache.put(key, response.clone()).await {
        warn!(key = %label, error = %e, "Cache write failed, serving uncached");
    }
}
