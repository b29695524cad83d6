//! Bridge configuration
//!
//! Loaded from a `pythonic.toml` file, with environment overrides applied
//! on top:
//! - `PYTHONIC_LOG_LEVEL` - `trace`, `debug`, `info`, `warn` or `error`
//! - `PYTHONIC_LOG_FORMAT` - `pretty`, `compact` or `json`
//! - `PYTHONIC_WRAP_INTEGERS` - `1`/`true` to keep foreign ints opaque

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::Level;

use crate::logging::{LogConfig, LogFormat, LogOutput};

pub const CONFIG_FILE_NAME: &str = "pythonic.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct BridgeConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub conversion: ConversionConfig,

    #[serde(default)]
    pub store: StoreConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,

    #[serde(default)]
    pub format: FormatName,

    /// Log directory; logs go to stderr when unset
    #[serde(default)]
    pub directory: Option<PathBuf>,

    #[serde(default = "default_false")]
    pub span_events: bool,

    /// Extra filter directives, e.g. `"pythonic=debug,pythonic_runtime=info"`
    #[serde(default)]
    pub filter: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FormatName {
    #[default]
    Pretty,
    Compact,
    Json,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionConfig {
    /// Return every foreign `int` as an opaque handle
    #[serde(default = "default_false")]
    pub wrap_integers: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Width of the representation column in store listings
    #[serde(default = "default_repr_width")]
    pub repr_width: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: FormatName::Pretty,
            directory: None,
            span_events: false,
            filter: None,
        }
    }
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            wrap_integers: false,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            repr_width: default_repr_width(),
        }
    }
}

fn default_level() -> String { "info".to_string() }
fn default_false() -> bool { false }
fn default_repr_width() -> usize { 20 }

static DEFAULTS: Lazy<BridgeConfig> =
    Lazy::new(|| BridgeConfig::default().with_env_overrides(|name| std::env::var(name).ok()));

/// Process-wide defaults: built-in values plus environment overrides
pub fn defaults() -> &'static BridgeConfig {
    &DEFAULTS
}

impl BridgeConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self, String> {
        let content = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config: {}", e))?;

        Self::parse(&content)
    }

    /// Parse configuration from a TOML string
    pub fn parse(content: &str) -> Result<Self, String> {
        let config: Self = toml::from_str(content)
            .map_err(|e| format!("Failed to parse config: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), String> {
        parse_level(&self.logging.level)?;
        if self.store.repr_width < 4 {
            return Err(format!(
                "store.repr_width must be at least 4, got {}",
                self.store.repr_width
            ));
        }
        Ok(())
    }

    /// Find `pythonic.toml` in `start` or one of its parents
    pub fn discover_from(start: &Path) -> Self {
        let mut current = Some(start.to_path_buf());

        while let Some(dir) = current {
            let config_path = dir.join(CONFIG_FILE_NAME);
            if config_path.exists() {
                if let Ok(config) = Self::load(&config_path) {
                    return config;
                }
            }
            current = dir.parent().map(|p| p.to_path_buf());
        }

        Self::default()
    }

    /// `discover_from` the current directory
    pub fn discover() -> Self {
        match std::env::current_dir() {
            Ok(dir) => Self::discover_from(&dir),
            Err(_) => Self::default(),
        }
    }

    /// Apply `PYTHONIC_*` overrides looked up through `lookup`
    ///
    /// Unparseable values are ignored with a warning.
    pub fn with_env_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(level) = lookup("PYTHONIC_LOG_LEVEL") {
            match parse_level(&level) {
                Ok(_) => self.logging.level = level.to_ascii_lowercase(),
                Err(e) => tracing::warn!("ignoring PYTHONIC_LOG_LEVEL: {}", e),
            }
        }
        if let Some(format) = lookup("PYTHONIC_LOG_FORMAT") {
            match format.to_ascii_lowercase().as_str() {
                "pretty" => self.logging.format = FormatName::Pretty,
                "compact" => self.logging.format = FormatName::Compact,
                "json" => self.logging.format = FormatName::Json,
                other => tracing::warn!("ignoring PYTHONIC_LOG_FORMAT: unknown format '{}'", other),
            }
        }
        if let Some(wrap) = lookup("PYTHONIC_WRAP_INTEGERS") {
            match wrap.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => self.conversion.wrap_integers = true,
                "0" | "false" | "no" | "off" => self.conversion.wrap_integers = false,
                other => tracing::warn!("ignoring PYTHONIC_WRAP_INTEGERS: '{}'", other),
            }
        }
        self
    }

    /// Logging setup described by this configuration
    pub fn log_config(&self) -> LogConfig {
        let level = parse_level(&self.logging.level).unwrap_or(Level::INFO);
        let format = match self.logging.format {
            FormatName::Pretty => LogFormat::Pretty,
            FormatName::Compact => LogFormat::Compact,
            FormatName::Json => LogFormat::Json,
        };
        let output = match &self.logging.directory {
            Some(directory) => LogOutput::File {
                directory: directory.to_string_lossy().to_string(),
                prefix: "pythonic".to_string(),
            },
            None => LogOutput::Stderr,
        };

        let mut config = LogConfig::new()
            .with_level(level)
            .with_format(format)
            .with_output(output)
            .with_span_events(self.logging.span_events);
        if let Some(filter) = &self.logging.filter {
            config = config.with_filter(filter.clone());
        }
        config
    }

    /// Default configuration as TOML
    pub fn generate_default() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|_| String::from("# Failed to generate default config"))
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<(), String> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize config: {}", e))?;

        fs::write(path, content)
            .map_err(|e| format!("Failed to write config: {}", e))
    }
}

fn parse_level(level: &str) -> Result<Level, String> {
    level
        .parse::<Level>()
        .map_err(|_| format!("unknown log level '{}'", level))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = BridgeConfig::default();
        assert_eq!(config.logging.level, "info");
        assert!(!config.conversion.wrap_integers);
        assert_eq!(config.store.repr_width, 20);
    }

    #[test]
    fn test_parse_partial_config() {
        let toml = r#"
            [conversion]
            wrap_integers = true

            [logging]
            format = "json"
        "#;

        let config = BridgeConfig::parse(toml).unwrap();
        assert!(config.conversion.wrap_integers);
        assert_eq!(config.logging.format, FormatName::Json);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.store.repr_width, 20);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(BridgeConfig::parse("[logging]\nlevel = \"loud\"").is_err());
        assert!(BridgeConfig::parse("[store]\nrepr_width = 2").is_err());
        assert!(BridgeConfig::parse("[store]\nrepr_width = \"wide\"").is_err());
    }

    #[test]
    fn test_env_overrides() {
        let config = BridgeConfig::default().with_env_overrides(|name| match name {
            "PYTHONIC_LOG_LEVEL" => Some("DEBUG".to_string()),
            "PYTHONIC_LOG_FORMAT" => Some("compact".to_string()),
            "PYTHONIC_WRAP_INTEGERS" => Some("1".to_string()),
            _ => None,
        });
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, FormatName::Compact);
        assert!(config.conversion.wrap_integers);

        let unchanged = BridgeConfig::default()
            .with_env_overrides(|_| Some("nonsense".to_string()));
        assert_eq!(unchanged, BridgeConfig::default());
    }

    #[test]
    fn test_log_config_from_bridge_config() {
        let mut config = BridgeConfig::default();
        config.logging.level = "warn".to_string();
        config.logging.directory = Some(PathBuf::from("/tmp/logs"));

        let log = config.log_config();
        assert_eq!(log.level, Level::WARN);
        assert_eq!(
            log.output,
            LogOutput::File {
                directory: "/tmp/logs".to_string(),
                prefix: "pythonic".to_string()
            }
        );
    }

    #[test]
    fn test_save_and_discover() {
        let root = TempDir::new().unwrap();
        let nested = root.path().join("a").join("b");
        fs::create_dir_all(&nested).unwrap();

        let mut config = BridgeConfig::default();
        config.store.repr_width = 32;
        config.save(&root.path().join(CONFIG_FILE_NAME)).unwrap();

        let found = BridgeConfig::discover_from(&nested);
        assert_eq!(found.store.repr_width, 32);
    }

    #[test]
    fn test_generate_default_round_trips() {
        let text = BridgeConfig::generate_default();
        assert_eq!(BridgeConfig::parse(&text).unwrap(), BridgeConfig::default());
    }
}
