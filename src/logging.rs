//! Logging infrastructure for the bridge
//!
//! Uses `tracing` for structured events; `init_logging` wires a
//! `tracing-subscriber` pipeline in one of three formats, written through a
//! non-blocking stdout/stderr writer or a daily-rotated file.

use std::path::Path;
use std::sync::Mutex;

use once_cell::sync::OnceCell;
use tracing::Level;
use tracing_appender::{non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan, MakeWriter},
    layer::SubscriberExt,
    registry::Registry,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

use crate::config::BridgeConfig;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable format with timestamps
    Pretty,
    /// Compact format for production
    Compact,
    /// JSON format for structured logging
    Json,
}

/// Log output destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogOutput {
    Stdout,
    Stderr,
    /// File with daily rotation
    File { directory: String, prefix: String },
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Minimum log level
    pub level: Level,
    pub format: LogFormat,
    pub output: LogOutput,
    /// Whether to include span events
    pub span_events: bool,
    /// Custom filter directives (e.g., "pythonic=debug,pythonic_runtime=info")
    pub filter: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: LogFormat::Pretty,
            output: LogOutput::Stderr,
            span_events: false,
            filter: None,
        }
    }
}

impl LogConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_output(mut self, output: LogOutput) -> Self {
        self.output = output;
        self
    }

    pub fn with_span_events(mut self, enabled: bool) -> Self {
        self.span_events = enabled;
        self
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

fn format_layer<W>(format: LogFormat, writer: W, span_events: bool) -> BoxedLayer
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let span_events = span_events_config(span_events);
    match format {
        LogFormat::Pretty => fmt::layer()
            .with_writer(writer)
            .pretty()
            .with_span_events(span_events)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .with_writer(writer)
            .compact()
            .with_span_events(span_events)
            .boxed(),
        LogFormat::Json => fmt::layer()
            .with_writer(writer)
            .json()
            .with_span_events(span_events)
            .boxed(),
    }
}

/// Initialize the global logging system
///
/// Returns a `WorkerGuard` that must be kept alive for the duration of the
/// program so all logs are flushed. If a global subscriber is already set
/// the new one is discarded.
pub fn init_logging(config: LogConfig) -> Option<WorkerGuard> {
    let filter = build_filter(&config);

    let (layer, guard) = match &config.output {
        LogOutput::Stdout => {
            let (writer, guard) = tracing_appender::non_blocking(std::io::stdout());
            (format_layer(config.format, writer, config.span_events), guard)
        }
        LogOutput::Stderr => {
            let (writer, guard) = tracing_appender::non_blocking(std::io::stderr());
            (format_layer(config.format, writer, config.span_events), guard)
        }
        LogOutput::File { directory, prefix } => {
            let file_appender = rolling::daily(directory, prefix);
            let (writer, guard) = tracing_appender::non_blocking(file_appender);
            (format_layer(config.format, writer, config.span_events), guard)
        }
    };

    let installed = tracing_subscriber::registry()
        .with(layer.with_filter(filter))
        .try_init()
        .is_ok();
    if !installed {
        tracing::debug!("global subscriber already set; keeping it");
    }
    Some(guard)
}

fn build_filter(config: &LogConfig) -> EnvFilter {
    let base_filter = EnvFilter::from_default_env()
        .add_directive(config.level.into());

    match &config.filter {
        Some(filter_str) => {
            filter_str.split(',')
                .fold(base_filter, |filter, directive| {
                    filter.add_directive(directive.parse().unwrap_or_else(|_| {
                        tracing::warn!("Invalid filter directive: {}", directive);
                        config.level.into()
                    }))
                })
        }
        None => base_filter,
    }
}

fn span_events_config(enabled: bool) -> FmtSpan {
    if enabled {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    }
}

static GUARD: OnceCell<Mutex<Option<WorkerGuard>>> = OnceCell::new();

/// Initialize logging once per process from a bridge configuration
///
/// Later calls are no-ops; returns whether this call did the setup.
pub fn init_from_config(config: &BridgeConfig) -> bool {
    let mut initialized = false;
    GUARD.get_or_init(|| {
        initialized = true;
        Mutex::new(init_logging(config.log_config()))
    });
    initialized
}

/// Flush and stop the background log writer
pub fn shutdown() {
    if let Some(lock) = GUARD.get() {
        if let Ok(mut guard) = lock.lock() {
            guard.take();
        }
    }
}

/// Initialize logging with defaults for development
pub fn init_dev_logging() -> Option<WorkerGuard> {
    init_logging(LogConfig {
        level: Level::DEBUG,
        format: LogFormat::Pretty,
        output: LogOutput::Stderr,
        span_events: true,
        filter: Some("pythonic=debug,pythonic_runtime=debug".to_string()),
    })
}

/// Initialize logging with defaults for production
pub fn init_prod_logging(log_dir: impl AsRef<Path>) -> Option<WorkerGuard> {
    init_logging(LogConfig {
        level: Level::INFO,
        format: LogFormat::Json,
        output: LogOutput::File {
            directory: log_dir.as_ref().to_string_lossy().to_string(),
            prefix: "pythonic".to_string(),
        },
        span_events: false,
        filter: Some("pythonic=info,warn".to_string()),
    })
}

/// Log a host-to-foreign conversion
#[inline]
pub fn log_encode(class: &str, path: &str) {
    tracing::trace!(target: "pythonic::convert", class, path, "encode");
}

/// Log a foreign-to-host conversion
#[inline]
pub fn log_decode(type_name: &str, result: &str) {
    tracing::trace!(target: "pythonic::convert", type_name, result, "decode");
}

/// Log an object store mutation
#[inline]
pub fn log_store(operation: &str, key: u64, count: usize) {
    tracing::debug!(target: "pythonic::store", operation, key, count, "object store");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = LogConfig::new()
            .with_level(Level::DEBUG)
            .with_format(LogFormat::Json)
            .with_span_events(true)
            .with_filter("pythonic=trace");

        assert_eq!(config.level, Level::DEBUG);
        assert_eq!(config.format, LogFormat::Json);
        assert!(config.span_events);
        assert_eq!(config.filter, Some("pythonic=trace".to_string()));
    }

    #[test]
    fn test_log_helpers_do_not_panic() {
        log_encode("double", "array");
        log_decode("float", "double");
        log_store("put", 42, 1);
    }
}
