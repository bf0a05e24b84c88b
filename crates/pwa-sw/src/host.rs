//! Platform adapter: owns the registration and turns lifecycle events into
//! calls to the install, fetch and activate handlers.

use std::sync::Arc;

use pwa_net::{Fetcher, Request};
use tokio::sync::{mpsc, Mutex, RwLock};
use tracing::{debug, info};
use url::Url;

use crate::activate::{on_activate, ActivateReport};
use crate::cache::CacheStorage;
use crate::clients::ClientRegistry;
use crate::config::WorkerConfig;
use crate::env::WorkerEnv;
use crate::error::{Result, ServiceWorkerError};
use crate::fetch::{on_fetch, FetchOutcome};
use crate::install::{on_install, InstallReport};
use crate::registration::{ServiceWorkerId, ServiceWorkerRegistration, ServiceWorkerState};
use crate::router::Strategy;

/// Lifecycle notifications for the embedding page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceWorkerEvent {
    /// A new version started installing.
    UpdateFound { worker_id: ServiceWorkerId },
    /// A worker changed state.
    StateChange {
        worker_id: ServiceWorkerId,
        cache_name: String,
        new_state: ServiceWorkerState,
    },
    /// Open pages are now controlled by a different worker.
    ControllerChange { worker_id: ServiceWorkerId },
}

/// Hosts one service worker registration.
///
/// Install and activation runs are serialized; fetches are not.
pub struct ServiceWorkerHost {
    caches: Arc<dyn CacheStorage>,
    network: Arc<dyn Fetcher>,
    clients: Arc<dyn ClientRegistry>,
    registration: RwLock<ServiceWorkerRegistration>,
    /// Held for a whole install or activation run.
    lifecycle: Mutex<()>,
    event_tx: mpsc::UnboundedSender<ServiceWorkerEvent>,
}

impl ServiceWorkerHost {
    /// Create a host for `scope`.
    pub fn new(
        scope: Url,
        caches: Arc<dyn CacheStorage>,
        network: Arc<dyn Fetcher>,
        clients: Arc<dyn ClientRegistry>,
    ) -> (Self, mpsc::UnboundedReceiver<ServiceWorkerEvent>) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        (
            Self {
                caches,
                network,
                clients,
                registration: RwLock::new(ServiceWorkerRegistration::new(scope)),
                lifecycle: Mutex::new(()),
                event_tx,
            },
            event_rx,
        )
    }

    fn env_for(&self, config: Arc<WorkerConfig>) -> WorkerEnv {
        WorkerEnv {
            config,
            caches: self.caches.clone(),
            network: self.network.clone(),
            clients: self.clients.clone(),
        }
    }

    fn emit(&self, event: ServiceWorkerEvent) {
        // Nobody listening is fine.
        let _ = self.event_tx.send(event);
    }

    fn state_change(&self, worker_id: ServiceWorkerId, config: &WorkerConfig, new_state: ServiceWorkerState) {
        debug!(worker = %worker_id, state = %new_state, "Worker state changed");
        self.emit(ServiceWorkerEvent::StateChange {
            worker_id,
            cache_name: config.cache_name(),
            new_state,
        });
    }

    /// Install a new worker version.
    ///
    /// The worker ends up waiting, or active straight away when its install
    /// asked to skip waiting. A call made while another version is still
    /// installing or activating starts once that run has finished.
    pub async fn register(&self, config: WorkerConfig) -> Result<InstallReport> {
        config.validate()?;
        let config = Arc::new(config);
        let _lifecycle = self.lifecycle.lock().await;

        let worker_id = self.registration.write().await.update(config.clone()).id;
        info!(worker = %worker_id, cache = %config.cache_name(), "Registering service worker");
        self.emit(ServiceWorkerEvent::UpdateFound { worker_id });
        self.state_change(worker_id, &config, ServiceWorkerState::Installing);

        let report = on_install(&self.env_for(config.clone())).await;

        {
            let mut registration = self.registration.write().await;
            match registration.installing.as_ref() {
                Some(worker) if worker.id == worker_id => {
                    registration.install_complete()?;
                }
                // Unregistered while installing.
                _ => {
                    return Err(ServiceWorkerError::State {
                        expected: "the worker that was installing",
                        actual: Some(ServiceWorkerState::Redundant),
                    });
                }
            }
        }
        self.state_change(worker_id, &config, ServiceWorkerState::Installed);

        if report.skip_waiting {
            self.run_activation().await?;
        }

        Ok(report)
    }

    /// Force the waiting worker to activate without waiting for pages to
    /// close.
    pub async fn skip_waiting(&self) -> Result<ActivateReport> {
        debug!("Skip waiting requested");
        self.activate().await
    }

    /// Activate the waiting worker.
    pub async fn activate(&self) -> Result<ActivateReport> {
        let _lifecycle = self.lifecycle.lock().await;
        self.run_activation().await
    }

    /// Caller holds `lifecycle`.
    async fn run_activation(&self) -> Result<ActivateReport> {
        let (worker_id, config) = {
            let mut registration = self.registration.write().await;
            let worker = registration.begin_activation()?;
            (worker.id, worker.config.clone())
        };
        self.state_change(worker_id, &config, ServiceWorkerState::Activating);

        let report = on_activate(&self.env_for(config.clone())).await;

        self.registration.write().await.finish_activation(worker_id)?;
        self.state_change(worker_id, &config, ServiceWorkerState::Activated);
        self.emit(ServiceWorkerEvent::ControllerChange { worker_id });

        info!(worker = %worker_id, cache = %config.cache_name(), "Service worker active");
        Ok(report)
    }

    /// Route a request from a page in scope.
    ///
    /// A worker that is still activating already routes fetches. Without
    /// one the request goes straight to the network.
    pub async fn handle_fetch(&self, request: Request) -> Result<FetchOutcome> {
        let active = self
            .registration
            .read()
            .await
            .controller()
            .map(|worker| worker.config.clone());

        match active {
            Some(config) => on_fetch(&self.env_for(config), request).await,
            None => {
                let response = self.network.fetch(request).await?;
                Ok(FetchOutcome::network(Strategy::Passthrough, response))
            }
        }
    }

    /// Drop every worker in the registration.
    pub async fn unregister(&self) {
        self.registration.write().await.unregister();
        info!("Service worker unregistered");
    }

    pub async fn scope(&self) -> Url {
        self.registration.read().await.scope.clone()
    }

    pub async fn active_state(&self) -> Option<ServiceWorkerState> {
        self.registration.read().await.active.as_ref().map(|w| w.state)
    }

    pub async fn waiting_state(&self) -> Option<ServiceWorkerState> {
        self.registration.read().await.waiting.as_ref().map(|w| w.state)
    }

    /// Bucket name of the worker currently controlling pages.
    pub async fn active_cache_name(&self) -> Option<String> {
        self.registration
            .read()
            .await
            .get_active()
            .map(|w| w.cache_name())
    }
}
