//! Configuration for tvctl
//!
//! Supports JSON and TOML files. Missing sections and keys fall back to
//! defaults, so a file only needs the values that differ, e.g.
//!
//! ```toml
//! [connection]
//! port = "/dev/ttyUSB1"
//!
//! [protocol]
//! power_on_query_delay_ms = 7000
//! ```

use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tvctl_communication::controller::DEFAULT_PORT;
use tvctl_communication::{ControllerConfig, FlowControl, LineConfig, SerialParity};

/// Serial connection settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionSettings {
    /// Serial device path
    pub port: String,
    /// Baud rate
    pub baud_rate: u32,
    /// Data bits (5-8)
    pub data_bits: u8,
    /// Stop bits (1-2)
    pub stop_bits: u8,
    /// Parity
    pub parity: SerialParity,
    /// Flow control
    pub flow_control: FlowControl,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        let line = LineConfig::default();
        Self {
            port: DEFAULT_PORT.to_string(),
            baud_rate: line.baud_rate,
            data_bits: line.data_bits,
            stop_bits: line.stop_bits,
            parity: line.parity,
            flow_control: line.flow_control,
        }
    }
}

impl ConnectionSettings {
    /// Serial line attributes described by these settings
    pub fn line_config(&self) -> LineConfig {
        LineConfig {
            baud_rate: self.baud_rate,
            data_bits: self.data_bits,
            stop_bits: self.stop_bits,
            parity: self.parity,
            flow_control: self.flow_control,
        }
    }
}

/// Protocol timing settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolSettings {
    /// Delay after power-on before querying volume, in milliseconds
    pub power_on_query_delay_ms: u64,
    /// Minimum gap between request/ack cycles, in milliseconds
    pub command_gap_ms: u64,
    /// Ack timeout, in milliseconds
    pub ack_timeout_ms: u64,
    /// Command queue capacity
    pub queue_capacity: usize,
}

impl Default for ProtocolSettings {
    fn default() -> Self {
        let defaults = ControllerConfig::default();
        Self {
            power_on_query_delay_ms: defaults.power_on_query_delay.as_millis() as u64,
            command_gap_ms: defaults.command_gap.as_millis() as u64,
            ack_timeout_ms: defaults.ack_timeout.as_millis() as u64,
            queue_capacity: defaults.queue_capacity,
        }
    }
}

/// Complete application configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Connection settings
    pub connection: ConnectionSettings,
    /// Protocol timing
    pub protocol: ProtocolSettings,
}

impl Config {
    /// Create new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Platform config file location, `<config dir>/tvctl/config.toml`
    pub fn default_path() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join("tvctl").join("config.toml"))
            .ok_or_else(|| {
                ConfigError::UnsupportedPlatform("no configuration directory".to_string()).into()
            })
    }

    /// Load config from file (JSON or TOML)
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;

        let config: Self = match Format::of(path)? {
            Format::Json => serde_json::from_str(&content)?,
            Format::Toml => toml::from_str(&content)?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Load config from file, or defaults when the file does not exist
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::load_from_file(path)
    }

    /// Save config to file (JSON or TOML)
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        self.validate()?;

        let content = match Format::of(path)? {
            Format::Json => serde_json::to_string_pretty(self)?,
            Format::Toml => toml::to_string_pretty(self)?,
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        let out_of_range = |key: &str, value: String| ConfigError::ValueOutOfRange {
            key: key.to_string(),
            value,
        };

        if self.connection.port.trim().is_empty() {
            return Err(out_of_range("connection.port", "\"\"".to_string()));
        }

        tvctl_communication::communication::serial::validate_line_config(
            &self.connection.line_config(),
        )
        .map_err(|reason| out_of_range("connection", reason))?;

        if self.protocol.ack_timeout_ms == 0 {
            return Err(out_of_range("protocol.ack_timeout_ms", "0".to_string()));
        }

        if self.protocol.queue_capacity == 0 {
            return Err(out_of_range("protocol.queue_capacity", "0".to_string()));
        }

        Ok(())
    }

    /// Controller configuration described by this config
    pub fn controller_config(&self) -> ControllerConfig {
        ControllerConfig {
            port: self.connection.port.clone(),
            line: self.connection.line_config(),
            power_on_query_delay: Duration::from_millis(self.protocol.power_on_query_delay_ms),
            command_gap: Duration::from_millis(self.protocol.command_gap_ms),
            ack_timeout: Duration::from_millis(self.protocol.ack_timeout_ms),
            queue_capacity: self.protocol.queue_capacity,
        }
    }
}

enum Format {
    Json,
    Toml,
}

impl Format {
    fn of(path: &Path) -> std::result::Result<Self, ConfigError> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Ok(Format::Json),
            Some("toml") => Ok(Format::Toml),
            other => Err(ConfigError::UnsupportedFormat(
                other.unwrap_or("<none>").to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_protocol() {
        let config = Config::default();
        assert_eq!(config.connection.port, "/dev/ttyUSB0");
        assert_eq!(config.connection.baud_rate, 9600);
        assert_eq!(config.protocol.power_on_query_delay_ms, 5000);
        assert!(config.validate().is_ok());

        let controller = config.controller_config();
        assert_eq!(controller.power_on_query_delay, Duration::from_secs(5));
        assert_eq!(controller.line, LineConfig::default());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [connection]
            port = "/dev/ttyUSB3"
            parity = "even"
            "#,
        )
        .unwrap();

        assert_eq!(config.connection.port, "/dev/ttyUSB3");
        assert_eq!(config.connection.parity, SerialParity::Even);
        assert_eq!(config.connection.baud_rate, 9600);
        assert_eq!(config.protocol, ProtocolSettings::default());
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = Config::default();
        config.connection.data_bits = 9;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.protocol.ack_timeout_ms = 0;
        assert_eq!(
            config.validate(),
            Err(ConfigError::ValueOutOfRange {
                key: "protocol.ack_timeout_ms".to_string(),
                value: "0".to_string()
            })
        );

        let mut config = Config::default();
        config.connection.port = " ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_extension() {
        assert!(matches!(
            Format::of(Path::new("tvctl.yaml")),
            Err(ConfigError::UnsupportedFormat(_))
        ));
    }
}
