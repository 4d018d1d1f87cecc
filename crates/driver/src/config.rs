use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

/// Where the producer writes by default, relative to the working directory.
pub const DEFAULT_DATA_FILE: &str = "data/project_live.json";

/// Consumer settings, loadable from a TOML file.
///
/// ```toml
/// path = "data/project_live.json"
/// poll_interval_ms = 500
/// color = true
/// chart_width = 40
/// trace_json = "/tmp/snapshots.jsonl"
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConsumerConfig {
    /// File to tail. Must exist before the consumer starts.
    pub path: PathBuf,
    /// Sleep between polls that found nothing new.
    pub poll_interval_ms: u64,
    /// Whether the chart uses ANSI colors.
    pub color: bool,
    /// Columns used by a bar at sentiment 1.0.
    pub chart_width: usize,
    /// Optional JSON-lines file receiving every rendered snapshot.
    pub trace_json: Option<PathBuf>,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_DATA_FILE),
            poll_interval_ms: 500,
            color: true,
            chart_width: 40,
            trace_json: None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

impl ConsumerConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid("poll_interval_ms must be > 0".into()));
        }
        if self.chart_width < 10 {
            return Err(ConfigError::Invalid("chart_width must be at least 10".into()));
        }
        if self.path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("path must not be empty".into()));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}
