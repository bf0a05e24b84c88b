//! # PWA Common
//!
//! Shared plumbing for the offline service worker crates.
//!
//! ## Features
//!
//! - Logging configuration and setup
//! - Wall-clock helpers for cache timestamps

use std::time::{SystemTime, UNIX_EPOCH};

pub mod logging;

pub use logging::{init_logging, LogConfig, LogFormat};

/// Milliseconds since the Unix epoch.
///
/// Clocks set before 1970 report `0` rather than failing.
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
