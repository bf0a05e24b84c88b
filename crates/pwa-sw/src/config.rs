//! Worker configuration.
//!
//! One [`WorkerConfig`] describes one worker version: which bucket is
//! current, which paths are pre-cached at install, and how requests are
//! routed. Changing the manifest means bumping `version`, which gives the
//! new worker a fresh bucket and lets activation sweep the old ones.

use std::path::Path;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Result, ServiceWorkerError};

/// Cache version baked in at build time.
pub const BUILD_CACHE_VERSION: &str = match option_env!("PWA_SW_CACHE_VERSION") {
    Some(version) => version,
    None => "v1",
};

/// Configuration for one worker version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Origin the manifest and shell paths are resolved against.
    pub origin: Url,

    /// Bucket name prefix.
    pub cache_prefix: String,

    /// Version suffix; together with the prefix it names the current bucket.
    pub version: String,

    /// Paths pre-cached at install, in order.
    pub manifest: Vec<String>,

    /// Path of the application shell document.
    pub shell_path: String,

    /// File extensions served stale-while-revalidate.
    pub static_extensions: Vec<String>,

    /// Ask to become active as soon as install finishes.
    pub skip_waiting: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            origin: default_origin(),
            cache_prefix: "pwa-cache".to_string(),
            version: BUILD_CACHE_VERSION.to_string(),
            manifest: [
                "/",
                "/index.html",
                "/manifest.json",
                "/favicon.ico",
                "/logo192.png",
                "/logo512.png",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            shell_path: "/index.html".to_string(),
            static_extensions: [
                "js", "css", "png", "jpg", "jpeg", "gif", "svg", "webp", "ico", "woff", "woff2",
                "ttf", "eot",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            skip_waiting: true,
        }
    }
}

fn default_origin() -> Url {
    Url::parse("http://localhost:3000/").expect("static origin URL is valid")
}

impl WorkerConfig {
    /// Default configuration for the given origin.
    pub fn for_origin(origin: Url) -> Self {
        Self {
            origin,
            ..Default::default()
        }
    }

    /// Set the version suffix.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Replace the asset manifest.
    pub fn with_manifest<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.manifest = paths.into_iter().map(Into::into).collect();
        self
    }

    /// Parse and validate a JSON configuration.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ServiceWorkerError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| ServiceWorkerError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&json)
    }

    /// Name of the bucket this worker version owns.
    pub fn cache_name(&self) -> String {
        format!("{}-{}", self.cache_prefix, self.version)
    }

    /// Resolve a path against the origin.
    pub fn resolve(&self, path: &str) -> Result<Url> {
        self.origin
            .join(path)
            .map_err(|e| ServiceWorkerError::Config(format!("{path}: {e}")))
    }

    /// URL the shell document is cached under.
    pub fn shell_url(&self) -> Result<Url> {
        self.resolve(&self.shell_path)
    }

    /// Whether the URL's last path segment carries an allow-listed extension.
    pub fn is_static_asset(&self, url: &Url) -> bool {
        let file = url.path().rsplit('/').next().unwrap_or_default();
        match file.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => self
                .static_extensions
                .iter()
                .any(|allowed| allowed.eq_ignore_ascii_case(ext)),
            _ => false,
        }
    }

    /// Check the configuration is usable.
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [("cache_prefix", &self.cache_prefix), ("version", &self.version)] {
            if value.is_empty() || value.chars().any(char::is_whitespace) {
                return Err(ServiceWorkerError::Config(format!(
                    "{field} must be non-empty and contain no whitespace"
                )));
            }
        }

        check_path("shell_path", &self.shell_path)?;
        self.shell_url()?;

        let mut seen = hashbrown::HashSet::new();
        for path in &self.manifest {
            check_path("manifest entry", path)?;
            self.resolve(path)?;
            if !seen.insert(path.as_str()) {
                return Err(ServiceWorkerError::Config(format!(
                    "duplicate manifest entry: {path}"
                )));
            }
        }

        Ok(())
    }
}

fn check_path(what: &str, path: &str) -> Result<()> {
    if path.starts_with('/') {
        Ok(())
    } else {
        Err(ServiceWorkerError::Config(format!(
            "{what} must start with '/': {path:?}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = WorkerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.cache_name(), format!("pwa-cache-{BUILD_CACHE_VERSION}"));
        assert!(config.skip_waiting);
    }

    #[test]
    fn test_cache_name_uses_version() {
        let config = WorkerConfig::default().with_version("v277");
        assert_eq!(config.cache_name(), "pwa-cache-v277");
    }

    #[test]
    fn test_shell_url_resolves_against_origin() {
        let config = WorkerConfig::for_origin(Url::parse("https://permits.example.gov/").unwrap());
        assert_eq!(
            config.shell_url().unwrap().as_str(),
            "https://permits.example.gov/index.html"
        );
    }

    #[test]
    fn test_static_asset_detection() {
        let config = WorkerConfig::default();
        let check = |u: &str| config.is_static_asset(&Url::parse(u).unwrap());

        assert!(check("https://example.com/static/js/main.3f2a.js"));
        assert!(check("https://example.com/static/css/main.CSS"));
        assert!(check("https://example.com/fonts/inter.woff2?v=3"));
        assert!(!check("https://example.com/api/inspections"));
        assert!(!check("https://example.com/api/report.json"));
        assert!(!check("https://example.com/"));
        assert!(!check("https://example.com/.js"));
        assert!(!check("https://example.com/js/"));
    }

    #[test]
    fn test_from_json_applies_defaults() {
        let config = WorkerConfig::from_json_str(
            r#"{"origin": "https://example.com/", "version": "v276", "manifest": ["/", "/login"]}"#,
        )
        .unwrap();

        assert_eq!(config.cache_name(), "pwa-cache-v276");
        assert_eq!(config.manifest, vec!["/", "/login"]);
        assert_eq!(config.shell_path, "/index.html");
        assert!(config.static_extensions.iter().any(|e| e == "woff2"));
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let empty_version = WorkerConfig::default().with_version("");
        assert!(matches!(empty_version.validate(), Err(ServiceWorkerError::Config(_))));

        let spaced = WorkerConfig::default().with_version("v 2");
        assert!(spaced.validate().is_err());

        let relative = WorkerConfig::default().with_manifest(["index.html"]);
        assert!(relative.validate().is_err());

        let duplicate = WorkerConfig::default().with_manifest(["/", "/"]);
        assert!(duplicate.validate().is_err());

        let mut shell = WorkerConfig::default();
        shell.shell_path = "index.html".to_string();
        assert!(shell.validate().is_err());
    }

    #[test]
    fn test_from_json_rejects_invalid() {
        assert!(WorkerConfig::from_json_str("{not json").is_err());
        assert!(WorkerConfig::from_json_str(r#"{"manifest": ["nope"]}"#).is_err());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"version": "v9", "skip_waiting": false}}"#).unwrap();

        let config = WorkerConfig::from_file(file.path()).unwrap();
        assert_eq!(config.version, "v9");
        assert!(!config.skip_waiting);

        let missing = WorkerConfig::from_file("/definitely/not/here.json");
        assert!(matches!(missing, Err(ServiceWorkerError::Config(_))));
    }
}
