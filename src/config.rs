//! Configuration for the tracker.

use crate::monitor::{DistancePolicy, MonitorSettings, WorkerSettings};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Shortest idle sleep a worker will use.
pub const MIN_IDLE_SLEEP: Duration = Duration::from_millis(1);

/// Shortest interval between dashboard updates.
pub const MIN_REPORT_INTERVAL: Duration = Duration::from_secs(1);

/// Main configuration for the tracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding the `event*` device nodes
    pub device_dir: PathBuf,

    /// Sleep between polls of an idle device
    #[serde(rename = "idle_sleep_ms", with = "duration_millis")]
    pub idle_sleep: Duration,

    /// How often the dashboard is printed
    #[serde(rename = "report_interval_secs", with = "duration_secs")]
    pub report_interval: Duration,

    /// Upper bound on monitored devices per session
    pub max_devices: usize,

    /// Which input roles to capture
    pub sources: SourceConfig,

    /// How pointer movement is converted to distance
    pub distance: DistancePolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            device_dir: PathBuf::from("/dev/input"),
            idle_sleep: Duration::from_millis(10),
            report_interval: Duration::from_secs(5),
            max_devices: 64,
            sources: SourceConfig::default(),
            distance: DistancePolicy::default(),
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from `path`, falling back to defaults if it does not exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        Ok(config.clamped())
    }

    /// Raise values that would make workers spin or the dashboard flood.
    pub fn clamped(mut self) -> Self {
        self.idle_sleep = self.idle_sleep.max(MIN_IDLE_SLEEP);
        self.report_interval = self.report_interval.max(MIN_REPORT_INTERVAL);
        self.max_devices = self.max_devices.max(1);
        self
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self).map_err(ConfigError::Serialize)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("knm-tracker")
            .join("config.json")
    }

    /// Engine settings derived from this configuration.
    pub fn monitor_settings(&self) -> MonitorSettings {
        MonitorSettings {
            worker: WorkerSettings {
                idle_sleep: self.idle_sleep.max(MIN_IDLE_SLEEP),
                distance: self.distance,
            },
            max_devices: self.max_devices.max(1),
            capture_keyboard: self.sources.keyboard,
            capture_mouse: self.sources.mouse,
        }
    }
}

/// Configuration for which input roles to capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub keyboard: bool,
    pub mouse: bool,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            keyboard: true,
            mouse: true,
        }
    }
}

impl SourceConfig {
    /// Parse source configuration from a comma-separated string.
    pub fn from_csv(s: &str) -> Self {
        let sources: Vec<String> = s.split(',').map(|s| s.trim().to_lowercase()).collect();

        Self {
            keyboard: sources.iter().any(|s| s == "keyboard" || s == "all"),
            mouse: sources.iter().any(|s| s == "mouse" || s == "all"),
        }
    }

    /// Check if at least one source is enabled.
    pub fn any_enabled(&self) -> bool {
        self.keyboard || self.mouse
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Serialize error: {0}")]
    Serialize(#[source] serde_json::Error),
}

/// Serde support for Duration as whole seconds.
pub(crate) mod duration_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

/// Serde support for Duration as whole milliseconds.
pub(crate) mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        // Saturates at u64::MAX.
        u64::try_from(duration.as_millis())
            .unwrap_or(u64::MAX)
            .serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
