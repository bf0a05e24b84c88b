//! Picks a response strategy from the shape of a request.

use std::fmt;

use pwa_net::Request;

use crate::config::WorkerConfig;

/// How a fetch is answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Not a GET: straight to the network, cache untouched.
    Passthrough,
    /// Page load: network first, shell document from cache when offline.
    NetworkFirstShell,
    /// Static asset: cached copy now, refreshed in the background.
    StaleWhileRevalidate,
    /// Any other GET: network first, last cached copy when offline.
    NetworkFirst,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Passthrough => "passthrough",
            Self::NetworkFirstShell => "network-first-shell",
            Self::StaleWhileRevalidate => "stale-while-revalidate",
            Self::NetworkFirst => "network-first",
        };
        f.write_str(s)
    }
}

/// Classify a request. Earlier rules win.
pub fn classify(config: &WorkerConfig, request: &Request) -> Strategy {
    if !request.is_get() {
        Strategy::Passthrough
    } else if request.is_navigation() {
        Strategy::NetworkFirstShell
    } else if config.is_static_asset(&request.url) {
        Strategy::StaleWhileRevalidate
    } else {
        Strategy::NetworkFirst
    }
}
