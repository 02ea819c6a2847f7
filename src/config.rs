//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use crate::carbonara::POINTS_PER_SPLIT;
use crate::indexer::ArchivePolicy;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub incoming: IncomingConfig,

    #[serde(default)]
    pub metricd: MetricdConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Aggregate storage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

fn default_data_dir() -> String {
    dirs::data_local_dir()
        .map(|p| p.join("carbonara").to_string_lossy().to_string())
        .unwrap_or_else(|| "./carbonara_data".to_string())
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// Staging area for new measures
#[derive(Debug, Clone, Deserialize)]
pub struct IncomingConfig {
    /// Defaults to `incoming` under the storage data directory
    pub path: Option<String>,

    /// Used when the staging area is created; an existing area keeps its own
    #[serde(default = "default_num_sacks")]
    pub num_sacks: u32,
}

fn default_num_sacks() -> u32 {
    128
}

impl Default for IncomingConfig {
    fn default() -> Self {
        Self {
            path: None,
            num_sacks: default_num_sacks(),
        }
    }
}

/// Processing daemon configuration
#[derive(Debug, Clone, Deserialize)]
pub struct MetricdConfig {
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Seconds between two passes over the sacks
    #[serde(default = "default_processing_delay")]
    pub processing_delay: u64,

    /// Seconds between two backlog reports; 0 disables reporting
    #[serde(default = "default_reporting_delay")]
    pub reporting_delay: u64,

    /// Seconds between two removals of deleted metrics
    #[serde(default = "default_cleanup_delay")]
    pub cleanup_delay: u64,

    /// Workers each sack is assigned to
    #[serde(default = "default_replicas")]
    pub replicas: usize,

    /// Metrics processed concurrently by one worker
    #[serde(default = "default_parallelism")]
    pub parallelism: usize,

    /// Builtin archive policy applied to metrics seen for the first time
    #[serde(default = "default_archive_policy")]
    pub default_archive_policy: String,
}

fn default_workers() -> usize {
    crate::processing::default_parallelism()
}

fn default_processing_delay() -> u64 {
    60
}

fn default_reporting_delay() -> u64 {
    120
}

fn default_cleanup_delay() -> u64 {
    300
}

fn default_replicas() -> usize {
    3
}

fn default_parallelism() -> usize {
    crate::processing::default_parallelism()
}

fn default_archive_policy() -> String {
    "medium".to_string()
}

impl Default for MetricdConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            processing_delay: default_processing_delay(),
            reporting_delay: default_reporting_delay(),
            cleanup_delay: default_cleanup_delay(),
            replicas: default_replicas(),
            parallelism: default_parallelism(),
            default_archive_policy: default_archive_policy(),
        }
    }
}

impl MetricdConfig {
    pub fn processing_interval(&self) -> Duration {
        Duration::from_secs(self.processing_delay)
    }

    pub fn reporting_interval(&self) -> Option<Duration> {
        (self.reporting_delay > 0).then(|| Duration::from_secs(self.reporting_delay))
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_delay)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Self::parse(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })
    }

    fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("carbonara").join("config.toml")),
            Some(PathBuf::from("/etc/carbonara/config.toml")),
            Some(PathBuf::from("./config.toml")),
        ];

        for path_opt in config_paths.iter().flatten() {
            if path_opt.exists() {
                match Self::load_with_env(path_opt) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path_opt);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path_opt, e);
                    }
                }
            }
        }

        tracing::info!("Using default config with environment overrides");
        Self::from_env()
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        if let Ok(data_dir) = std::env::var("CARBONARA_DATA_DIR") {
            self.storage.data_dir = data_dir;
        }

        if let Ok(num_sacks) = std::env::var("CARBONARA_NUM_SACKS") {
            if let Ok(n) = num_sacks.parse() {
                self.incoming.num_sacks = n;
            }
        }

        if let Ok(workers) = std::env::var("CARBONARA_WORKERS") {
            if let Ok(n) = workers.parse() {
                self.metricd.workers = n;
            }
        }

        if let Ok(level) = std::env::var("CARBONARA_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("CARBONARA_LOG_FORMAT") {
            self.logging.format = format;
        }
    }

    /// Directory of the staging area
    pub fn incoming_path(&self) -> PathBuf {
        match &self.incoming.path {
            Some(path) => PathBuf::from(path),
            None => Path::new(&self.storage.data_dir).join("incoming"),
        }
    }

    /// Directory of the raw buffers and aggregates
    pub fn storage_path(&self) -> PathBuf {
        Path::new(&self.storage.data_dir).join("metrics")
    }

    /// Directory of the metric lock files
    pub fn lock_path(&self) -> PathBuf {
        Path::new(&self.storage.data_dir).join("locks")
    }

    /// Check values that would otherwise fail at runtime
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        if self.incoming.num_sacks == 0 {
            return invalid("incoming.num_sacks must be greater than 0".to_string());
        }
        if self.metricd.workers == 0 {
            return invalid("metricd.workers must be greater than 0".to_string());
        }
        if self.metricd.processing_delay == 0 {
            return invalid("metricd.processing_delay must be greater than 0".to_string());
        }
        if self.metricd.parallelism == 0 {
            return invalid("metricd.parallelism must be greater than 0".to_string());
        }
        // Compressed chunks store sample offsets on 2 bytes
        if POINTS_PER_SPLIT > u16::MAX as i64 {
            return invalid(format!(
                "{} points per split do not fit compressed chunk offsets",
                POINTS_PER_SPLIT
            ));
        }
        if ArchivePolicy::builtin(&self.metricd.default_archive_policy).is_none() {
            return invalid(format!(
                "unknown archive policy {:?}",
                self.metricd.default_archive_policy
            ));
        }
        if !matches!(self.logging.format.as_str(), "pretty" | "json") {
            return invalid(format!(
                "logging.format must be \"pretty\" or \"json\", not {:?}",
                self.logging.format
            ));
        }
        Ok(())
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# Carbonara Configuration
#
# Environment variables override these settings:
# - CARBONARA_DATA_DIR
# - CARBONARA_NUM_SACKS
# - CARBONARA_WORKERS
# - CARBONARA_LOG_LEVEL
# - CARBONARA_LOG_FORMAT

[storage]
# Directory holding raw buffers and aggregates
data_dir = "~/.local/share/carbonara"

[incoming]
# Staging directory for new measures (default: <data_dir>/incoming)
# path = "/var/lib/carbonara/incoming"

# Number of sacks new measures are spread over.
# Only used when the staging area is created.
num_sacks = 128

[metricd]
# Number of processing workers (default: number of CPUs)
# workers = 4

# Seconds between two passes over the sacks
processing_delay = 60

# Seconds between two backlog reports (0 disables reporting)
reporting_delay = 120

# Seconds between two removals of deleted metrics
cleanup_delay = 300

# Number of workers each sack is assigned to
replicas = 3

# Metrics processed concurrently by one worker (default: number of CPUs)
# parallelism = 4

# Archive policy of metrics seen for the first time: bool, low, medium, high
default_archive_policy = "medium"

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}
