//! # PWA Service Worker
//!
//! Offline support for a single-page web application: the shell and its
//! static assets are cached so the app keeps loading without a network.
//!
//! ## Features
//!
//! - **Install**: pre-cache the asset manifest into a versioned bucket
//! - **Fetch**: route each request to a network/cache strategy
//! - **Activate**: delete superseded buckets and take over open pages
//! - **Host**: registration slots and lifecycle events for embedders
//!
//! ## Architecture
//!
//! ```text
//! ServiceWorkerHost
//!     │
//!     ├── ServiceWorkerRegistration
//!     │       ├── installing (ServiceWorker)
//!     │       ├── waiting (ServiceWorker)
//!     │       └── active (ServiceWorker)
//!     │
//!     └── WorkerEnv ──► on_install / on_fetch / on_activate
//!             ├── CacheStorage ── Cache ── CacheKey → Response
//!             ├── Fetcher (pwa-net)
//!             └── ClientRegistry
//! ```
//!
//! ## Routing
//!
//! | Request                  | Strategy                                    |
//! |--------------------------|---------------------------------------------|
//! | not GET                  | network only, cache untouched               |
//! | navigation               | network first, cached shell when offline    |
//! | static asset (by suffix) | cached copy now, refreshed in background    |
//! | other GET                | network first, last cached copy when offline|

pub mod activate;
pub mod cache;
pub mod clients;
pub mod config;
pub mod env;
pub mod error;
pub mod fetch;
pub mod host;
pub mod install;
pub mod registration;
pub mod router;

#[cfg(test)]
mod test_support;

pub use activate::{on_activate, ActivateReport};
pub use cache::{Cache, CacheEntry, CacheKey, CacheStorage, MemoryCache, MemoryCacheStorage};
pub use clients::{Client, ClientRegistry, ClientType, Clients, FrameType, VisibilityState};
pub use config::{WorkerConfig, BUILD_CACHE_VERSION};
pub use env::WorkerEnv;
pub use error::{Result, ServiceWorkerError};
pub use fetch::{on_fetch, FetchOutcome, ResponseSource};
pub use host::{ServiceWorkerEvent, ServiceWorkerHost};
pub use install::{on_install, InstallReport};
pub use registration::{
    ServiceWorker, ServiceWorkerId, ServiceWorkerRegistration, ServiceWorkerState,
};
pub use router::{classify, Strategy};
