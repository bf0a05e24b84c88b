//! Install phase: pre-cache the asset manifest.

use futures::future::join_all;
use pwa_net::{CacheMode, Request};
use tracing::{info, warn};

use crate::cache::{Cache, CacheKey};
use crate::env::WorkerEnv;
use crate::error::{Result, ServiceWorkerError};

/// Outcome of one install run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallReport {
    pub cache_name: String,
    /// Manifest paths now in the bucket, in manifest order.
    pub cached: Vec<String>,
    /// Manifest paths that could not be cached, with the reason.
    pub failed: Vec<(String, String)>,
    /// Whether the worker asks to skip the waiting phase.
    pub skip_waiting: bool,
}

impl InstallReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Populate the current bucket with every manifest path.
///
/// Paths are fetched concurrently and independently; a failed path is
/// logged and reported, never fatal. If the bucket cannot even be opened
/// the install still completes, with nothing pre-cached.
pub async fn on_install(env: &WorkerEnv) -> InstallReport {
    let config = &env.config;
    let cache_name = config.cache_name();

    info!(cache = %cache_name, assets = config.manifest.len(), "Installing service worker");

    let mut report = InstallReport {
        cache_name: cache_name.clone(),
        cached: Vec::new(),
        failed: Vec::new(),
        skip_waiting: config.skip_waiting,
    };

    let cache = match env.current_cache().await {
        Ok(cache) => cache,
        Err(e) => {
            warn!(cache = %cache_name, error = %e, "Failed to open cache, nothing pre-cached");
            report.failed = config
                .manifest
                .iter()
                .map(|path| (path.clone(), e.to_string()))
                .collect();
            return report;
        }
    };

    let results = join_all(
        config
            .manifest
            .iter()
            .map(|path| precache(env, cache.as_ref(), path)),
    )
    .await;

    for (path, result) in config.manifest.iter().zip(results) {
        match result {
            Ok(()) => report.cached.push(path.clone()),
            Err(e) => {
                warn!(cache = %cache_name, path = %path, error = %e, "Failed to pre-cache asset");
                report.failed.push((path.clone(), e.to_string()));
            }
        }
    }

    info!(
        cache = %cache_name,
        cached = report.cached.len(),
        failed = report.failed.len(),
        skip_waiting = report.skip_waiting,
        "Install complete"
    );

    report
}

async fn precache(env: &WorkerEnv, cache: &dyn Cache, path: &str) -> Result<()> {
    let url = env.config.resolve(path)?;
    let request = Request::get(url.clone()).cache_mode(CacheMode::Reload);

    let response = env.network.fetch(request).await?;
    if !response.ok() {
        return Err(ServiceWorkerError::Network(format!(
            "{} answered {}",
            url, response.status
        )));
    }

    cache.put(CacheKey::for_url(&url), response).await
}
