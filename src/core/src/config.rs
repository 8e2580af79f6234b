use crate::error::{HoistError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default number of concurrent builds
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Hoist configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HoistConfig {
    /// Images definition file (YAML)
    pub images_path: PathBuf,

    /// Builders definition file (YAML)
    pub builders_path: Option<PathBuf>,

    /// Registry credentials file (JSON)
    pub credentials_path: Option<PathBuf>,

    /// Number of builds executed at the same time
    pub concurrency: usize,

    /// Templates used to generate semantic version tags
    pub semantic_version_tags_templates: Vec<String>,

    /// Push images once built
    pub push_images: bool,

    /// Log level
    pub log_level: LogLevel,
}

impl Default for HoistConfig {
    fn default() -> Self {
        Self {
            images_path: PathBuf::from("images.yml"),
            builders_path: None,
            credentials_path: None,
            concurrency: DEFAULT_CONCURRENCY,
            semantic_version_tags_templates: vec![
                "{{ .Major }}".to_string(),
                "{{ .Major }}.{{ .Minor }}".to_string(),
            ],
            push_images: false,
            log_level: LogLevel::Warn,
        }
    }
}

impl HoistConfig {
    /// Load configuration from a YAML file. A missing file yields defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!(path = %path.display(), "Configuration file not found, using defaults");
            return Ok(Self::default());
        }

        let data = std::fs::read_to_string(path)?;
        let config: HoistConfig = serde_yaml::from_str(&data).map_err(|e| {
            HoistError::Config(format!("Failed to parse {}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check configuration invariants.
    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(HoistError::Config(
                "concurrency must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Dispatcher configuration derived from this configuration
    pub fn dispatcher(&self) -> DispatcherConfig {
        DispatcherConfig {
            workers: self.concurrency.max(1),
            ..Default::default()
        }
    }
}

/// Dispatcher configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatcherConfig {
    /// Number of workers (at least 1)
    pub workers: usize,

    /// Interval between monitor samples
    #[serde(with = "duration_secs")]
    pub monitor_interval: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_CONCURRENCY,
            monitor_interval: Duration::from_secs(10),
        }
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(d)?))
    }
}

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Debug => write!(f, "debug"),
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}
