//! Capability bundle handed to the lifecycle handlers.

use std::sync::Arc;

use pwa_net::Fetcher;

use crate::cache::{Cache, CacheStorage};
use crate::clients::ClientRegistry;
use crate::config::WorkerConfig;

/// Everything a handler may touch.
///
/// Cloning is cheap; background work takes its own clone.
#[derive(Clone)]
pub struct WorkerEnv {
    pub config: Arc<WorkerConfig>,
    pub caches: Arc<dyn CacheStorage>,
    pub network: Arc<dyn Fetcher>,
    pub clients: Arc<dyn ClientRegistry>,
}

impl WorkerEnv {
    pub fn new(
        config: WorkerConfig,
        caches: Arc<dyn CacheStorage>,
        network: Arc<dyn Fetcher>,
        clients: Arc<dyn ClientRegistry>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            caches,
            network,
            clients,
        }
    }

    /// Environment for another worker version on the same platform.
    pub fn with_config(&self, config: Arc<WorkerConfig>) -> Self {
        Self {
            config,
            ..self.clone()
        }
    }

    /// Open the bucket owned by this worker version.
    pub(crate) async fn current_cache(&self) -> crate::error::Result<Arc<dyn Cache>> {
        self.caches.open(&self.config.cache_name()).await
    }
}

impl std::fmt::Debug for WorkerEnv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerEnv")
            .field("cache_name", &self.config.cache_name())
            .finish_non_exhaustive()
    }
}
