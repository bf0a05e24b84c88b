//! Activate phase: sweep superseded buckets and take over open pages.

use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::env::WorkerEnv;

/// Outcome of one activation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivateReport {
    /// The bucket left in place.
    pub kept: String,
    pub deleted: Vec<String>,
    /// Buckets that could not be deleted, with the reason.
    pub failed: Vec<(String, String)>,
    pub claimed: bool,
    /// Ids of the clients that were re-navigated.
    pub navigated: Vec<String>,
}

/// Make sure the current bucket exists, delete every other bucket, claim
/// all clients, and reload them in place so they route through this worker.
///
/// Each step degrades independently: a failed deletion does not stop the
/// sweep, a failed sweep does not stop the claim, and so on.
pub async fn on_activate(env: &WorkerEnv) -> ActivateReport {
    let current = env.config.cache_name();
    info!(cache = %current, "Activating service worker");

    let mut report = ActivateReport {
        kept: current.clone(),
        ..Default::default()
    };

    // The current bucket exists after activation even if install never
    // managed to open it.
    if let Err(e) = env.current_cache().await {
        warn!(cache = %current, error = %e, "Failed to open current cache");
    }

    match env.caches.keys().await {
        Ok(names) => {
            let stale: Vec<String> = names.into_iter().filter(|name| *name != current).collect();
            let results = join_all(stale.iter().map(|name| env.caches.delete(name))).await;

            for (name, result) in stale.into_iter().zip(results) {
                match result {
                    Ok(true) => {
                        info!(cache = %name, "Deleted old cache");
                        report.deleted.push(name);
                    }
                    Ok(false) => debug!(cache = %name, "Old cache already gone"),
                    Err(e) => {
                        warn!(cache = %name, error = %e, "Failed to delete old cache");
                        report.failed.push((name, e.to_string()));
                    }
                }
            }
        }
        Err(e) => warn!(error = %e, "Failed to list caches, skipping cleanup"),
    }

    match env.clients.claim().await {
        Ok(()) => report.claimed = true,
        Err(e) => warn!(error = %e, "Failed to claim clients"),
    }

    match env.clients.list_clients().await {
        Ok(clients) => {
            let results = join_all(
                clients
                    .iter()
                    .map(|client| env.clients.navigate(client, &client.url)),
            )
            .await;

            for (client, result) in clients.into_iter().zip(results) {
                match result {
                    Ok(()) => report.navigated.push(client.id),
                    Err(e) => {
                        warn!(client = %client.id, url = %client.url, error = %e, "Failed to reload client")
                    }
                }
            }
        }
        Err(e) => warn!(error = %e, "Failed to list clients"),
    }

    info!(
        cache = %current,
        deleted = report.deleted.len(),
        failed = report.failed.len(),
        navigated = report.navigated.len(),
        "Activation complete"
    );

    report
}
