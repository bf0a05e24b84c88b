//! `tracing` subscriber setup for the worker crates.
//!
//! `RUST_LOG` wins unless a config carries its own filter string.

use std::str::FromStr;

use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    registry::Registry,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// How events are rendered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Multi-field, for a terminal.
    #[default]
    Pretty,
    /// One line per event.
    Compact,
    /// Newline-delimited JSON for log shippers.
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format: {other}")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Used when neither `filter` nor `RUST_LOG` is set or parses.
    pub level: Level,
    pub format: LogFormat,
    /// File and line of each event (pretty output only).
    pub include_location: bool,
    /// Emit span enter/close events, e.g. around a fetch.
    pub include_span_events: bool,
    /// Directive string such as `"pwa_sw=debug,reqwest=warn"`.
    pub filter: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: LogFormat::Pretty,
            include_location: false,
            include_span_events: false,
            filter: None,
        }
    }
}

impl LogConfig {
    /// Routing decisions and offline fallbacks become visible.
    pub fn debug() -> Self {
        Self {
            level: Level::DEBUG,
            include_location: true,
            include_span_events: true,
            ..Default::default()
        }
    }

    /// Per-request detail, including uncached responses.
    pub fn trace() -> Self {
        Self {
            level: Level::TRACE,
            ..Self::debug()
        }
    }

    /// Lifecycle milestones and degraded paths only, as JSON.
    pub fn production() -> Self {
        Self {
            format: LogFormat::Json,
            ..Default::default()
        }
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    fn env_filter(&self) -> EnvFilter {
        let fallback = || EnvFilter::new(self.level.to_string());
        match self.filter {
            Some(ref custom) => EnvFilter::try_new(custom).unwrap_or_else(|_| fallback()),
            None => EnvFilter::try_from_default_env().unwrap_or_else(|_| fallback()),
        }
    }

    fn span_events(&self) -> FmtSpan {
        if self.include_span_events {
            FmtSpan::ENTER | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        }
    }

    fn layer(&self) -> BoxedLayer {
        let filter = self.env_filter();
        match self.format {
            LogFormat::Pretty => fmt::layer()
                .with_target(true)
                .with_file(self.include_location)
                .with_line_number(self.include_location)
                .with_span_events(self.span_events())
                .with_filter(filter)
                .boxed(),
            LogFormat::Compact => fmt::layer()
                .compact()
                .with_target(true)
                .with_span_events(self.span_events())
                .with_filter(filter)
                .boxed(),
            LogFormat::Json => fmt::layer()
                .json()
                .with_span_events(self.span_events())
                .with_filter(filter)
                .boxed(),
        }
    }
}

/// Install the global subscriber.
///
/// Returns `false` if one is already installed; tests sharing a process
/// call this repeatedly.
pub fn init_logging(config: LogConfig) -> bool {
    tracing_subscriber::registry()
        .with(config.layer())
        .try_init()
        .is_ok()
}
