//! Configuration management for Rollcall
//!
//! Handles loading and validation of TOML configuration files.

use crate::error::ConfigError;
use crate::scheduler::SchedulerSettings;
use crate::threshold::{ThresholdConfig, ThresholdMode};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Expected class sizes outside this range are almost certainly typos.
pub const MAX_STUDENT_COUNT: u32 = 100;

/// Main configuration structure for Rollcall
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// Capture-related settings
    #[serde(default)]
    pub capture: CaptureConfig,

    /// Storage-related settings
    #[serde(default)]
    pub storage: StorageConfig,

    /// Attendance threshold settings
    #[serde(default)]
    pub attendance: AttendanceConfig,
}

/// Capture configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CaptureConfig {
    /// Monitor showing the conference gallery, 1-based (default: 1)
    #[serde(default = "default_monitor")]
    pub monitor: u32,

    /// Seconds between scheduler ticks (default: 1)
    #[serde(default = "default_tick_seconds")]
    pub tick_seconds: u64,

    /// Cooldown in seconds after an unsatisfied attempt (default: 10)
    #[serde(default = "default_backoff_seconds")]
    pub backoff_seconds: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            monitor: default_monitor(),
            tick_seconds: default_tick_seconds(),
            backoff_seconds: default_backoff_seconds(),
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Base data directory for artifacts and journals (default: ~/.rollcall/)
    #[serde(
        default = "default_data_dir",
        deserialize_with = "deserialize_data_dir"
    )]
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// Attendance threshold configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AttendanceConfig {
    /// Number of students expected in the gallery (default: 1)
    #[serde(default = "default_student_count")]
    pub student_count: u32,

    /// Comparison mode: "exact" or "flexible" (default: flexible)
    #[serde(default)]
    pub mode: ThresholdMode,
}

impl Default for AttendanceConfig {
    fn default() -> Self {
        Self {
            student_count: default_student_count(),
            mode: ThresholdMode::default(),
        }
    }
}

// Default value functions
fn default_monitor() -> u32 {
    1
}

fn default_tick_seconds() -> u64 {
    1
}

fn default_backoff_seconds() -> u64 {
    10
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".rollcall")
}

fn default_student_count() -> u32 {
    1
}

/// Expands tilde (~) in a path to the home directory
fn expand_tilde(path: &Path) -> PathBuf {
    let path_str = path.to_string_lossy();
    if let Some(rest) = path_str.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    } else if path_str == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    path.to_path_buf()
}

/// Custom deserializer for data_dir that expands tilde
fn deserialize_data_dir<'de, D>(deserializer: D) -> Result<PathBuf, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let path_str = String::deserialize(deserializer)?;
    let path = PathBuf::from(path_str);
    Ok(expand_tilde(&path))
}

impl Config {
    /// Validates the configuration values
    ///
    /// # Errors
    /// Returns `ConfigError::InvalidValue` if:
    /// - `capture.monitor` is 0
    /// - `capture.tick_seconds` is 0
    /// - `capture.backoff_seconds` is smaller than `capture.tick_seconds`
    /// - `attendance.student_count` is 0 or above [`MAX_STUDENT_COUNT`]
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capture.monitor == 0 {
            return Err(ConfigError::InvalidValue(
                "monitor is numbered from 1".to_string(),
            ));
        }

        if self.capture.tick_seconds == 0 {
            return Err(ConfigError::InvalidValue(
                "tick_seconds must be > 0".to_string(),
            ));
        }

        if self.capture.backoff_seconds < self.capture.tick_seconds {
            return Err(ConfigError::InvalidValue(
                "backoff_seconds must be >= tick_seconds".to_string(),
            ));
        }

        if self.attendance.student_count == 0 || self.attendance.student_count > MAX_STUDENT_COUNT
        {
            return Err(ConfigError::InvalidValue(format!(
                "student_count must be between 1 and {MAX_STUDENT_COUNT}"
            )));
        }

        Ok(())
    }

    /// Threshold policy derived from the attendance section.
    pub fn threshold_config(&self) -> ThresholdConfig {
        ThresholdConfig::new(self.attendance.student_count, self.attendance.mode)
    }

    /// Scheduler intervals derived from the capture section.
    pub fn scheduler_settings(&self) -> SchedulerSettings {
        SchedulerSettings {
            tick_interval: Duration::from_secs(self.capture.tick_seconds),
            backoff: Duration::from_secs(self.capture.backoff_seconds),
        }
    }
}

/// Returns the default configuration file path (`~/.rollcall/config.toml`)
pub fn get_default_config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".rollcall")
        .join("config.toml")
}

/// Loads configuration from the specified path
///
/// If the file doesn't exist, creates a default configuration file.
/// If the file is invalid or contains invalid values, returns default
/// configuration.
///
/// # Errors
/// Only IO errors during file creation are fatal; parse and validation
/// problems fall back to the default configuration with a warning.
pub fn load_config_from_path(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let default_config = Config::default();
        let toml_str = toml::to_string_pretty(&default_config)
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;
        fs::write(path, &toml_str)?;

        tracing::info!("Created default configuration file at {:?}", path);
        return Ok(default_config);
    }

    let content = fs::read_to_string(path)?;

    let config: Config = match toml::from_str(&content) {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!(
                "Failed to parse configuration file {:?}: {}. Using default configuration.",
                path,
                e
            );
            return Ok(Config::default());
        }
    };

    if let Err(e) = config.validate() {
        tracing::warn!(
            "Invalid configuration in {:?}: {}. Using default configuration.",
            path,
            e
        );
        return Ok(Config::default());
    }

    Ok(config)
}

/// Loads configuration from the default path (`~/.rollcall/config.toml`)
///
/// Convenience wrapper around `load_config_from_path`.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from_path(&get_default_config_path())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.capture.monitor, 1);
        assert_eq!(config.capture.tick_seconds, 1);
        assert_eq!(config.capture.backoff_seconds, 10);
        assert_eq!(config.attendance.student_count, 1);
        assert_eq!(config.attendance.mode, ThresholdMode::Flexible);
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml_str = toml::to_string(&config).expect("Failed to serialize");
        assert!(toml_str.contains("monitor"));
        assert!(toml_str.contains("student_count"));
        assert!(toml_str.contains("flexible"));
    }

    #[test]
    fn test_config_deserialization() {
        let toml_str = r#"
[capture]
monitor = 2
tick_seconds = 2
backoff_seconds = 15

[attendance]
student_count = 21
mode = "exact"
"#;
        let config: Config = toml::from_str(toml_str).expect("Failed to parse");
        assert_eq!(config.capture.monitor, 2);
        assert_eq!(config.capture.tick_seconds, 2);
        assert_eq!(config.capture.backoff_seconds, 15);
        assert_eq!(config.attendance.student_count, 21);
        assert_eq!(config.attendance.mode, ThresholdMode::Exact);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let toml_str = r#"
[attendance]
student_count = 30
"#;
        let config: Config = toml::from_str(toml_str).expect("Failed to parse");
        assert_eq!(config.attendance.student_count, 30);
        // Other values should use defaults
        assert_eq!(config.attendance.mode, ThresholdMode::Flexible);
        assert_eq!(config.capture.monitor, 1);
        assert_eq!(config.capture.backoff_seconds, 10);
    }

    #[test]
    fn test_derived_threshold_policy() {
        let toml_str = r#"
[attendance]
student_count = 21
"#;
        let config: Config = toml::from_str(toml_str).expect("Failed to parse");
        let policy = config.threshold_config();
        assert_eq!(policy.threshold(), 22);
        assert_eq!(policy.required(), 20);
    }

    #[test]
    fn test_derived_scheduler_settings() {
        let config = Config::default();
        let settings = config.scheduler_settings();
        assert_eq!(settings.tick_interval, Duration::from_secs(1));
        assert_eq!(settings.backoff, Duration::from_secs(10));
    }

    // === Validation ===

    #[test]
    fn test_validate_valid_config() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_monitor_zero_fails() {
        let mut config = Config::default();
        config.capture.monitor = 0;
        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("monitor"));
    }

    #[test]
    fn test_validate_tick_zero_fails() {
        let mut config = Config::default();
        config.capture.tick_seconds = 0;
        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("tick_seconds"));
    }

    #[test]
    fn test_validate_backoff_shorter_than_tick_fails() {
        let mut config = Config::default();
        config.capture.tick_seconds = 2;
        config.capture.backoff_seconds = 1;
        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("backoff_seconds"));
    }

    #[test]
    fn test_validate_student_count_range() {
        let mut config = Config::default();

        config.attendance.student_count = 1;
        assert!(config.validate().is_ok());

        config.attendance.student_count = MAX_STUDENT_COUNT;
        assert!(config.validate().is_ok());

        config.attendance.student_count = 0;
        assert!(config.validate().is_err());

        config.attendance.student_count = MAX_STUDENT_COUNT + 1;
        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("student_count"));
    }

    // === Loading ===

    #[test]
    fn test_load_config_creates_default_when_missing() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");

        assert!(!config_path.exists());

        let config = load_config_from_path(&config_path).unwrap();

        assert_eq!(config.capture.monitor, 1);
        assert_eq!(config.attendance.student_count, 1);

        // File should be created
        assert!(config_path.exists());

        let content = fs::read_to_string(&config_path).unwrap();
        assert!(content.contains("[capture]"));
        assert!(content.contains("[attendance]"));
    }

    #[test]
    fn test_load_config_reads_existing_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");

        let custom_config = r#"
[capture]
monitor = 3

[attendance]
student_count = 25
"#;
        fs::write(&config_path, custom_config).unwrap();

        let config = load_config_from_path(&config_path).unwrap();

        assert_eq!(config.capture.monitor, 3);
        assert_eq!(config.attendance.student_count, 25);
        // Defaults for unspecified values
        assert_eq!(config.capture.backoff_seconds, 10);
    }

    #[test]
    fn test_load_config_invalid_toml_returns_default() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");

        fs::write(&config_path, "this is not valid toml {{{").unwrap();

        // Should return default config with a warning, not an error
        let config = load_config_from_path(&config_path).unwrap();
        assert_eq!(config.capture.monitor, 1);
    }

    #[test]
    fn test_load_config_invalid_values_returns_default() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");

        let invalid_config = r#"
[capture]
monitor = 0

[attendance]
student_count = 500
"#;
        fs::write(&config_path, invalid_config).unwrap();

        let config = load_config_from_path(&config_path).unwrap();
        assert_eq!(config.capture.monitor, 1);
        assert_eq!(config.attendance.student_count, 1);
    }

    #[test]
    fn test_get_default_config_path() {
        let path = get_default_config_path();
        assert!(path.ends_with("config.toml"));
        assert!(path.to_string_lossy().contains(".rollcall"));
    }

    #[test]
    fn test_tilde_expansion_in_data_dir() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");

        let config_with_tilde = r#"
[storage]
data_dir = "~/.rollcall"
"#;
        fs::write(&config_path, config_with_tilde).unwrap();

        let config = load_config_from_path(&config_path).unwrap();

        let home = dirs::home_dir().expect("Failed to get home directory");
        assert_eq!(config.storage.data_dir, home.join(".rollcall"));
        assert!(config.storage.data_dir.is_absolute());
        assert!(!config.storage.data_dir.to_string_lossy().starts_with('~'));
    }

    #[test]
    fn test_tilde_expansion_with_subdirectories() {
        let toml_str = r#"
[storage]
data_dir = "~/records/rollcall_data"
"#;
        let config: Config = toml::from_str(toml_str).expect("Failed to parse");

        let home = dirs::home_dir().expect("Failed to get home directory");
        assert_eq!(config.storage.data_dir, home.join("records/rollcall_data"));
        assert!(config.storage.data_dir.is_absolute());
    }

    #[test]
    fn test_absolute_path_unchanged() {
        let toml_str = r#"
[storage]
data_dir = "/srv/rollcall"
"#;
        let config: Config = toml::from_str(toml_str).expect("Failed to parse");

        assert_eq!(config.storage.data_dir, PathBuf::from("/srv/rollcall"));
    }
}
