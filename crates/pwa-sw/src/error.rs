//! Service worker errors.

use thiserror::Error;

use crate::registration::ServiceWorkerState;

/// Errors that can occur in service worker operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceWorkerError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("State error: expected {expected}, found {actual:?}")]
    State {
        expected: &'static str,
        actual: Option<ServiceWorkerState>,
    },

    #[error("Client error: {0}")]
    Client(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl ServiceWorkerError {
    pub(crate) fn state(expected: &'static str, actual: Option<ServiceWorkerState>) -> Self {
        Self::State { expected, actual }
    }
}

impl From<pwa_net::NetError> for ServiceWorkerError {
    fn from(err: pwa_net::NetError) -> Self {
        Self::Network(err.to_string())
    }
}

/// Result type alias for service worker operations.
pub type Result<T> = std::result::Result<T, ServiceWorkerError>;
