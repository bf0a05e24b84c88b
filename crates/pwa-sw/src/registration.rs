//! Worker lifecycle and registration slots.
//!
//! ```text
//! ServiceWorkerRegistration
//!     ├── installing   Installing
//!     ├── waiting      Installed
//!     └── active       Activating → Activated
//! ```
//!
//! A worker displaced from any slot becomes `Redundant`.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::WorkerConfig;
use crate::error::{Result, ServiceWorkerError};

/// Unique identifier for a service worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ServiceWorkerId(u64);

impl ServiceWorkerId {
    fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ServiceWorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sw-{}", self.0)
    }
}

/// Service worker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceWorkerState {
    /// Script loaded, nothing run yet.
    #[default]
    Parsed,
    /// Install handler running.
    Installing,
    /// Installed but waiting for activation.
    Installed,
    /// Activate handler running.
    Activating,
    /// Active and controlling pages.
    Activated,
    /// Replaced by a newer worker or unregistered.
    Redundant,
}

impl fmt::Display for ServiceWorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Parsed => "parsed",
            Self::Installing => "installing",
            Self::Installed => "installed",
            Self::Activating => "activating",
            Self::Activated => "activated",
            Self::Redundant => "redundant",
        };
        f.write_str(s)
    }
}

/// A service worker instance.
#[derive(Debug, Clone)]
pub struct ServiceWorker {
    pub id: ServiceWorkerId,

    /// Version configuration baked into this worker.
    pub config: Arc<WorkerConfig>,

    pub state: ServiceWorkerState,

    /// Time of last state change.
    pub state_changed_at: Instant,
}

impl ServiceWorker {
    pub fn new(config: Arc<WorkerConfig>) -> Self {
        Self {
            id: ServiceWorkerId::new(),
            config,
            state: ServiceWorkerState::Parsed,
            state_changed_at: Instant::now(),
        }
    }

    pub fn set_state(&mut self, state: ServiceWorkerState) {
        self.state = state;
        self.state_changed_at = Instant::now();
    }

    pub fn is_active(&self) -> bool {
        self.state == ServiceWorkerState::Activated
    }

    pub fn is_redundant(&self) -> bool {
        self.state == ServiceWorkerState::Redundant
    }

    pub fn cache_name(&self) -> String {
        self.config.cache_name()
    }
}

/// A service worker registration.
#[derive(Debug)]
pub struct ServiceWorkerRegistration {
    pub scope: Url,
    pub installing: Option<ServiceWorker>,
    pub waiting: Option<ServiceWorker>,
    pub active: Option<ServiceWorker>,
    pub last_update_check: Option<Instant>,
}

impl ServiceWorkerRegistration {
    pub fn new(scope: Url) -> Self {
        Self {
            scope,
            installing: None,
            waiting: None,
            active: None,
            last_update_check: None,
        }
    }

    /// Start installing a new worker version.
    ///
    /// A worker still installing is superseded.
    pub fn update(&mut self, config: Arc<WorkerConfig>) -> &ServiceWorker {
        if let Some(mut old) = self.installing.take() {
            old.set_state(ServiceWorkerState::Redundant);
        }

        let mut worker = ServiceWorker::new(config);
        worker.set_state(ServiceWorkerState::Installing);
        self.last_update_check = Some(Instant::now());
        self.installing.insert(worker)
    }

    /// Transition installing to waiting.
    pub fn install_complete(&mut self) -> Result<ServiceWorkerId> {
        let mut worker = self
            .installing
            .take()
            .ok_or_else(|| ServiceWorkerError::state("an installing worker", None))?;

        if let Some(mut old) = self.waiting.take() {
            old.set_state(ServiceWorkerState::Redundant);
        }

        worker.set_state(ServiceWorkerState::Installed);
        let id = worker.id;
        self.waiting = Some(worker);
        Ok(id)
    }

    /// Move the waiting worker into the active slot as `Activating`.
    ///
    /// The previously active worker becomes redundant.
    pub fn begin_activation(&mut self) -> Result<&ServiceWorker> {
        let mut worker = self.waiting.take().ok_or_else(|| {
            ServiceWorkerError::state("a waiting worker", self.active.as_ref().map(|w| w.state))
        })?;

        if let Some(mut old) = self.active.take() {
            old.set_state(ServiceWorkerState::Redundant);
        }

        worker.set_state(ServiceWorkerState::Activating);
        Ok(self.active.insert(worker))
    }

    /// Finish activation of worker `id`.
    ///
    /// Fails if `id` is no longer the activating worker in the active slot.
    pub fn finish_activation(&mut self, id: ServiceWorkerId) -> Result<ServiceWorkerId> {
        match self.active.as_mut() {
            Some(worker)
                if worker.id == id && worker.state == ServiceWorkerState::Activating =>
            {
                worker.set_state(ServiceWorkerState::Activated);
                Ok(worker.id)
            }
            Some(worker) if worker.id != id => Err(ServiceWorkerError::state(
                "the worker that began activating",
                Some(ServiceWorkerState::Redundant),
            )),
            other => Err(ServiceWorkerError::state(
                "an activating worker",
                other.map(|w| w.state),
            )),
        }
    }

    /// Get the active worker, if it finished activating.
    pub fn get_active(&self) -> Option<&ServiceWorker> {
        self.active.as_ref().filter(|w| w.is_active())
    }

    /// The worker that routes fetches: the active slot, activating or
    /// activated.
    pub fn controller(&self) -> Option<&ServiceWorker> {
        self.active.as_ref().filter(|w| {
            matches!(
                w.state,
                ServiceWorkerState::Activating | ServiceWorkerState::Activated
            )
        })
    }

    /// Unregister (mark every worker redundant).
    pub fn unregister(&mut self) {
        for slot in [&mut self.active, &mut self.waiting, &mut self.installing] {
            if let Some(mut worker) = slot.take() {
                worker.set_state(ServiceWorkerState::Redundant);
            }
        }
    }
}
