//! # Configuration Management
//!
//! Centralized configuration for a capture session.
//!
//! This module provides structured configuration for the capture threads, the
//! frame decoder limits, catalog locations, loot delivery and logging.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()`
//! - Direct instantiation with defaults
//! - Environment overrides via `from_env()`
//!
//! ## Decoder Limits
//! - Fragment total length is capped (1 MiB) before any buffer is allocated
//! - Pending fragment sequences are bounded and expire after a TTL
//! - Value nesting is bounded to keep recursion shallow on hostile input

use crate::core::fragment::FragmentLimits;
use crate::error::{ProtocolError, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::Level;

/// UDP ports the game client talks to
pub const DEFAULT_PORTS: [u16; 3] = [5056, 5055, 4535];

/// Seconds without packets before the session is considered offline
pub const DEFAULT_OFFLINE_TIMEOUT: Duration = Duration::from_secs(5);

/// Interval between liveness checks
pub const DEFAULT_LIVENESS_INTERVAL: Duration = Duration::from_secs(1);

/// Locale used for item names when none is configured
pub const DEFAULT_LOCALE: &str = "EN-US";

/// Main configuration structure that contains all configurable settings
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct SessionConfig {
    /// Capture and liveness configuration
    #[serde(default)]
    pub capture: CaptureConfig,

    /// Frame decoder limits
    #[serde(default)]
    pub decoder: DecoderConfig,

    /// Item and event-code catalog configuration
    #[serde(default)]
    pub catalog: CatalogConfig,

    /// Loot delivery configuration
    #[serde(default)]
    pub sink: SinkConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl SessionConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to open config file: {e}")))?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to read config file: {e}")))?;

        Self::from_toml(&contents)
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to parse TOML: {e}")))
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env();
        Ok(config)
    }

    /// Override fields from `PHOTON_LOOT_*` environment variables
    pub fn apply_env(&mut self) {
        if let Ok(locale) = std::env::var("PHOTON_LOOT_LOCALE") {
            self.catalog.locale = locale;
        }

        if let Ok(path) = std::env::var("PHOTON_LOOT_ITEMS_PATH") {
            self.catalog.items_path = Some(PathBuf::from(path));
        }

        if let Ok(path) = std::env::var("PHOTON_LOOT_EVENT_CODES_PATH") {
            self.catalog.event_codes_path = Some(PathBuf::from(path));
        }

        if let Ok(timeout) = std::env::var("PHOTON_LOOT_OFFLINE_TIMEOUT_MS") {
            if let Ok(val) = timeout.parse::<u64>() {
                self.capture.offline_timeout = Duration::from_millis(val);
            }
        }

        if let Ok(interval) = std::env::var("PHOTON_LOOT_LIVENESS_INTERVAL_MS") {
            if let Ok(val) = interval.parse::<u64>() {
                self.capture.liveness_interval = Duration::from_millis(val);
            }
        }
    }

    /// Apply overrides to the default configuration
    pub fn default_with_overrides<F>(mutator: F) -> Self
    where
        F: FnOnce(&mut Self),
    {
        let mut config = Self::default();
        mutator(&mut config);
        config
    }

    /// Generate example configuration file content
    pub fn example_config() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|_| String::from("# Failed to generate example config"))
    }

    /// Save configuration to a file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, content)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to write config file: {e}")))?;

        Ok(())
    }

    /// Validate the configuration for common issues and misconfigurations
    ///
    /// Returns a list of validation errors. Empty list means configuration is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        errors.extend(self.capture.validate());
        errors.extend(self.decoder.validate());
        errors.extend(self.catalog.validate());
        errors.extend(self.sink.validate());
        errors.extend(self.logging.validate());
        errors
    }

    /// Validate and return Result - convenience method
    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ProtocolError::ConfigError(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}

/// Capture thread and liveness monitor configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// UDP ports the capture backend should filter on
    pub ports: Vec<u16>,

    /// How long the capture thread waits on its source before rechecking shutdown
    #[serde(with = "duration_serde")]
    pub poll_interval: Duration,

    /// Interval between liveness checks
    #[serde(with = "duration_serde")]
    pub liveness_interval: Duration,

    /// Silence after which the session is reported offline
    #[serde(with = "duration_serde")]
    pub offline_timeout: Duration,

    /// Upper bound on joining session threads during stop
    #[serde(with = "duration_serde")]
    pub shutdown_timeout: Duration,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            ports: DEFAULT_PORTS.to_vec(),
            poll_interval: Duration::from_millis(100),
            liveness_interval: DEFAULT_LIVENESS_INTERVAL,
            offline_timeout: DEFAULT_OFFLINE_TIMEOUT,
            shutdown_timeout: Duration::from_secs(2),
        }
    }
}

impl CaptureConfig {
    /// BPF expression selecting the configured UDP ports
    pub fn bpf_filter(&self) -> String {
        let ports = self
            .ports
            .iter()
            .map(|p| format!("port {p}"))
            .collect::<Vec<_>>()
            .join(" or ");
        format!("udp and ({ports})")
    }

    /// Validate capture configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.ports.is_empty() {
            errors.push("At least one capture port must be configured".to_string());
        } else if self.ports.contains(&0) {
            errors.push("Capture port 0 is not valid".to_string());
        }

        if self.poll_interval.as_millis() < 10 {
            errors.push("Poll interval too short (minimum: 10ms)".to_string());
        } else if self.poll_interval.as_secs() > 5 {
            errors.push("Poll interval too long (maximum: 5s)".to_string());
        }

        if self.liveness_interval.as_millis() < 10 {
            errors.push("Liveness interval too short (minimum: 10ms)".to_string());
        }

        if self.offline_timeout <= self.liveness_interval {
            errors.push("Offline timeout must be longer than the liveness interval".to_string());
        } else if self.offline_timeout.as_secs() > 3600 {
            errors.push("Offline timeout too long (maximum: 1 hour)".to_string());
        }

        if self.shutdown_timeout.as_millis() < 100 {
            errors.push("Shutdown timeout too short (minimum: 100ms)".to_string());
        } else if self.shutdown_timeout.as_secs() > 60 {
            errors.push("Shutdown timeout too long (maximum: 60s)".to_string());
        }

        errors
    }
}

/// Frame decoder limits
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DecoderConfig {
    /// Maximum fragment sequences reassembled at once
    pub max_pending_fragments: usize,

    /// Age after which an incomplete sequence is dropped
    #[serde(with = "duration_serde")]
    pub fragment_ttl: Duration,

    /// Largest reassembled message accepted, in bytes
    pub max_fragment_total: usize,

    /// Maximum nesting of arrays, dictionaries and hashtables
    pub max_value_depth: usize,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        let limits = FragmentLimits::default();
        Self {
            max_pending_fragments: limits.max_pending,
            fragment_ttl: limits.ttl,
            max_fragment_total: limits.max_total_length,
            max_value_depth: crate::core::value::DEFAULT_MAX_DEPTH,
        }
    }
}

impl DecoderConfig {
    pub fn fragment_limits(&self) -> FragmentLimits {
        FragmentLimits {
            max_pending: self.max_pending_fragments,
            ttl: self.fragment_ttl,
            max_total_length: self.max_fragment_total,
        }
    }

    /// Validate decoder configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.max_pending_fragments == 0 {
            errors.push("Max pending fragments must be greater than 0".to_string());
        } else if self.max_pending_fragments > 65_536 {
            errors.push(format!(
                "Max pending fragments too large: {} (maximum: 65,536)",
                self.max_pending_fragments
            ));
        }

        if self.fragment_ttl.as_millis() < 100 {
            errors.push("Fragment TTL too short (minimum: 100ms)".to_string());
        }

        if self.max_fragment_total == 0 {
            errors.push("Max fragment total cannot be 0".to_string());
        } else if self.max_fragment_total > 64 * 1024 * 1024 {
            errors.push(format!(
                "Max fragment total too large: {} bytes (maximum: 64 MB)",
                self.max_fragment_total
            ));
        }

        if self.max_value_depth == 0 || self.max_value_depth > 512 {
            errors.push(format!(
                "Invalid max value depth: {} (valid range: 1-512)",
                self.max_value_depth
            ));
        }

        errors
    }
}

/// Catalog configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Locale key used to pick localized item names (e.g. "EN-US", "PT-BR")
    pub locale: String,

    /// Item catalog file (items.json or items.txt format)
    pub items_path: Option<PathBuf>,

    /// Event-code catalog file (JSON object of name -> code)
    pub event_codes_path: Option<PathBuf>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            locale: String::from(DEFAULT_LOCALE),
            items_path: None,
            event_codes_path: None,
        }
    }
}

impl CatalogConfig {
    /// Validate catalog configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.locale.is_empty() {
            errors.push("Locale cannot be empty".to_string());
        }

        for (label, path) in [
            ("Item catalog", &self.items_path),
            ("Event-code catalog", &self.event_codes_path),
        ] {
            if let Some(path) = path {
                if !path.exists() {
                    errors.push(format!("{label} file does not exist: {}", path.display()));
                }
            }
        }

        errors
    }
}

/// Loot delivery configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SinkConfig {
    /// Capacity of bounded channel observers
    pub queue_capacity: usize,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1024,
        }
    }
}

impl SinkConfig {
    /// Validate sink configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.queue_capacity == 0 {
            errors.push("Queue capacity must be greater than 0".to_string());
        } else if self.queue_capacity > 1_000_000 {
            errors.push(format!(
                "Queue capacity too large: {} (max recommended: 1,000,000)",
                self.queue_capacity
            ));
        }

        errors
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Application name for logs
    pub app_name: String,

    /// Log level
    #[serde(with = "log_level_serde")]
    pub log_level: Level,

    /// Whether to use JSON formatting for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            app_name: String::from("photon-loot"),
            log_level: Level::INFO,
            json_format: false,
        }
    }
}

impl LoggingConfig {
    /// Validate logging configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.app_name.is_empty() {
            errors.push("Application name cannot be empty".to_string());
        } else if self.app_name.len() > 64 {
            errors.push(format!(
                "Application name too long: {} characters (maximum: 64)",
                self.app_name.len()
            ));
        }

        errors
    }
}

/// Helper module for Duration serialization/deserialization
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis = duration.as_millis() as u64;
        millis.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

/// Helper module for tracing::Level serialization/deserialization
mod log_level_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::str::FromStr;
    use tracing::Level;

    pub fn serialize<S>(level: &Level, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let level_str = match *level {
            Level::TRACE => "trace",
            Level::DEBUG => "debug",
            Level::INFO => "info",
            Level::WARN => "warn",
            Level::ERROR => "error",
        };
        level_str.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Level, D::Error>
    where
        D: Deserializer<'de>,
    {
        let level_str = String::deserialize(deserializer)?;
        Level::from_str(&level_str)
            .map_err(|_| serde::de::Error::custom(format!("Invalid log level: {level_str}")))
    }
}
