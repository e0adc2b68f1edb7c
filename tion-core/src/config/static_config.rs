//! Static configuration loaded once at startup
//!
//! This configuration is read-only after the driver is built.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{Result, TionError};
use crate::types::{DeviceAddress, SIMULATED_ADDRESS};

/// Environment variable that overrides the configured device address
pub const ADDRESS_ENV: &str = "TION_ADDRESS";

/// Supported device families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    /// Tion Breezer 3S
    #[default]
    S3,
}

impl ModelKind {
    pub fn name(&self) -> &'static str {
        match self {
            ModelKind::S3 => "s3",
        }
    }
}

impl std::str::FromStr for ModelKind {
    type Err = TionError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "s3" | "3s" => Ok(ModelKind::S3),
            other => Err(TionError::Config(format!("Unknown device model: {}", other))),
        }
    }
}

/// Which device to talk to and how to find it
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Hardware address, or `"dummy"` for a simulated device
    pub address: String,
    /// Device family
    pub model: ModelKind,
    /// Index of the Bluetooth adapter to use
    pub adapter: usize,
    /// How long to scan when looking up the peripheral, in seconds
    pub scan_secs: u64,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            address: SIMULATED_ADDRESS.to_string(),
            model: ModelKind::default(),
            adapter: 0,
            scan_secs: 5,
        }
    }
}

/// Retry policy for device actions
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts per action, including the first one
    pub max_attempts: u32,
    /// Pause after a failed connect, in milliseconds
    pub connect_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            connect_backoff_ms: 2000,
        }
    }
}

impl RetryConfig {
    pub fn connect_backoff(&self) -> Duration {
        Duration::from_millis(self.connect_backoff_ms)
    }
}

/// Deadlines applied at the transport boundary
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Deadline for each transport call, in milliseconds
    pub transport_ms: u64,
    /// How long to wait for a notification after a request, in milliseconds
    pub notification_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            transport_ms: 5000,
            notification_ms: 1000,
        }
    }
}

impl TimeoutConfig {
    pub fn transport(&self) -> Duration {
        Duration::from_millis(self.transport_ms)
    }

    pub fn notification(&self) -> Duration {
        Duration::from_millis(self.notification_ms)
    }
}

/// Static configuration for the Tion driver.
///
/// Located at `~/.config/tion/config.toml` by default.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StaticConfig {
    /// Device selection
    pub device: DeviceConfig,

    /// Retry policy
    pub retry: RetryConfig,

    /// Transport deadlines
    pub timeouts: TimeoutConfig,
}

impl StaticConfig {
    /// Parse StaticConfig from TOML string.
    pub fn from_toml(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Serialize StaticConfig to TOML string.
    pub fn to_toml(&self) -> std::result::Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Load from `path`, falling back to defaults when the file does not exist.
    ///
    /// The loaded configuration is validated and `TION_ADDRESS` is applied.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            debug!("Reading configuration from {}", path.display());
            let content = std::fs::read_to_string(path)?;
            Self::from_toml(&content)?
        } else {
            info!(
                "No configuration at {}, using defaults",
                path.display()
            );
            Self::default()
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        if let Ok(address) = std::env::var(ADDRESS_ENV) {
            debug!("Device address overridden by {}", ADDRESS_ENV);
            self.device.address = address;
        }
    }

    /// Reject settings the driver cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.device.address.trim().is_empty() {
            return Err(TionError::Config("device.address must not be empty".to_string()));
        }
        if self.retry.max_attempts == 0 {
            return Err(TionError::Config(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.timeouts.transport_ms == 0 || self.timeouts.notification_ms == 0 {
            return Err(TionError::Config(
                "timeouts must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Parsed device address
    pub fn device_address(&self) -> DeviceAddress {
        DeviceAddress::parse(&self.device.address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_static_config() {
        let config = StaticConfig::default();
        assert_eq!(config.device.address, "dummy");
        assert_eq!(config.device.model, ModelKind::S3);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.connect_backoff(), Duration::from_secs(2));
        assert!(config.device_address().is_simulated());
    }

    #[test]
    fn test_static_config_serialization() {
        let config = StaticConfig::default();
        let toml_str = config.to_toml().unwrap();

        assert!(toml_str.contains("[device]"));
        assert!(toml_str.contains("[retry]"));
        assert!(toml_str.contains("[timeouts]"));
        assert!(toml_str.contains("model = \"s3\""));
    }

    #[test]
    fn test_static_config_deserialization() {
        let toml_str = r#"
            [device]
            address = "AA:BB:CC:DD:EE:FF"
            model = "s3"
            adapter = 1

            [retry]
            max_attempts = 5
            connect_backoff_ms = 250

            [timeouts]
            notification_ms = 3000
        "#;

        let config = StaticConfig::from_toml(toml_str).unwrap();
        assert_eq!(config.device.address, "AA:BB:CC:DD:EE:FF");
        assert_eq!(config.device.adapter, 1);
        assert_eq!(config.device.scan_secs, 5);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.connect_backoff(), Duration::from_millis(250));
        assert_eq!(config.timeouts.notification(), Duration::from_secs(3));
        assert_eq!(config.timeouts.transport_ms, 5000);
        assert!(!config.device_address().is_simulated());
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = StaticConfig::from_toml("").unwrap();
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.timeouts.notification_ms, 1000);
    }

    #[test]
    fn test_unknown_model_rejected() {
        let result = StaticConfig::from_toml("[device]\nmodel = \"lite\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_model_kind_from_str() {
        assert_eq!("S3".parse::<ModelKind>().unwrap(), ModelKind::S3);
        assert_eq!("3s".parse::<ModelKind>().unwrap(), ModelKind::S3);
        assert!("lite".parse::<ModelKind>().is_err());
        assert_eq!(ModelKind::S3.name().parse::<ModelKind>().unwrap(), ModelKind::S3);
    }

    #[test]
    fn test_validate_rejects_zero_attempts() {
        let mut config = StaticConfig::default();
        config.retry.max_attempts = 0;
        assert!(matches!(config.validate(), Err(TionError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_zero_timeouts() {
        let mut config = StaticConfig::default();
        config.timeouts.transport_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = StaticConfig::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.retry.max_attempts, 3);
    }

    #[test]
    fn test_load_invalid_file_is_config_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[retry]\nmax_attempts = \"three\"").unwrap();

        let result = StaticConfig::load(file.path());
        assert!(matches!(result, Err(TionError::Config(_))));
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[retry]\nmax_attempts = 0").unwrap();

        let result = StaticConfig::load(file.path());
        assert!(matches!(result, Err(TionError::Config(_))));
    }
}
