//! # Configuration Management
//!
//! Centralized configuration for device exchanges.
//!
//! This module provides structured configuration for the framing layer (channel,
//! packet size, channel-implicit transports), the command helpers (class byte,
//! chunk size) and logging.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()`
//! - Direct instantiation with defaults
//! - Environment-specific overrides via `from_env()`
//!
//! ## Channel Identifier
//! Devices in the field answer on channel `0x0101`; some older firmware and
//! tooling use `0x8001`. Both are exposed as constants and the default is
//! `0x0101`. Set `device.channel` to talk to the other variant.

use crate::error::{LedgerError, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Duration;
use tracing::Level;

/// Channel used by current device firmware
pub const DEFAULT_CHANNEL: u16 = 0x0101;

/// Channel used by legacy firmware
pub const LEGACY_CHANNEL: u16 = 0x8001;

/// HID report size
pub const DEFAULT_PACKET_SIZE: usize = 64;

/// Class byte prepended by the command helpers
pub const DEFAULT_CLA: u8 = 0x80;

/// Largest data block per chunked command (fits the one-byte Lc field)
pub const DEFAULT_CHUNK_SIZE: usize = 250;

/// Upper bound for the one-byte Lc field
pub const MAX_CHUNK_SIZE: usize = 255;

/// Main configuration structure that contains all configurable settings
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct LedgerConfig {
    /// Framing and transport settings
    #[serde(default)]
    pub device: DeviceConfig,

    /// Command helper settings
    #[serde(default)]
    pub commands: CommandConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl LedgerConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)
            .map_err(|e| LedgerError::ConfigError(format!("Failed to open config file: {e}")))?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| LedgerError::ConfigError(format!("Failed to read config file: {e}")))?;

        Self::from_toml(&contents)
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| LedgerError::ConfigError(format!("Failed to parse TOML: {e}")))
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(channel) = std::env::var("LEDGER_APDU_CHANNEL") {
            config.device.channel = parse_u16(&channel).ok_or_else(|| {
                LedgerError::ConfigError(format!("Invalid LEDGER_APDU_CHANNEL: {channel}"))
            })?;
        }

        if let Ok(size) = std::env::var("LEDGER_APDU_PACKET_SIZE") {
            config.device.packet_size = size.parse::<usize>().map_err(|_| {
                LedgerError::ConfigError(format!("Invalid LEDGER_APDU_PACKET_SIZE: {size}"))
            })?;
        }

        if let Ok(implicit) = std::env::var("LEDGER_APDU_CHANNEL_IMPLICIT") {
            config.device.channel_implicit = implicit.parse::<bool>().map_err(|_| {
                LedgerError::ConfigError(format!(
                    "Invalid LEDGER_APDU_CHANNEL_IMPLICIT: {implicit}"
                ))
            })?;
        }

        if let Ok(timeout) = std::env::var("LEDGER_APDU_READ_TIMEOUT_MS") {
            let millis = timeout.parse::<u64>().map_err(|_| {
                LedgerError::ConfigError(format!("Invalid LEDGER_APDU_READ_TIMEOUT_MS: {timeout}"))
            })?;
            config.device.read_timeout = Duration::from_millis(millis);
        }

        if let Ok(level) = std::env::var("LEDGER_APDU_LOG_LEVEL") {
            config.logging.log_level = level.parse::<Level>().map_err(|_| {
                LedgerError::ConfigError(format!("Invalid LEDGER_APDU_LOG_LEVEL: {level}"))
            })?;
        }

        Ok(config)
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
            .map_err(|e| LedgerError::ConfigError(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, content)
            .map_err(|e| LedgerError::ConfigError(format!("Failed to write config file: {e}")))?;

        Ok(())
    }

    /// Validate the configuration for common issues and misconfigurations
    ///
    /// Returns a list of validation errors. Empty list means configuration is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        errors.extend(self.device.validate());
        errors.extend(self.commands.validate());
        errors.extend(self.logging.validate());

        errors
    }

    /// Validate and return Result - convenience method
    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(LedgerError::ConfigError(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}

/// Accepts `0x8001` style hex or plain decimal.
fn parse_u16(value: &str) -> Option<u16> {
    let value = value.trim();
    match value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
    {
        Some(hex) => u16::from_str_radix(hex, 16).ok(),
        None => value.parse::<u16>().ok(),
    }
}

/// Framing settings shared by both ends of an exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Channel stamped on every packet unless `channel_implicit`
    pub channel: u16,

    /// Size of every packet on the wire
    pub packet_size: usize,

    /// Transport demultiplexes channels itself (BLE style); no channel field
    pub channel_implicit: bool,

    /// How long a transport may wait for one inbound frame (0 = block)
    #[serde(with = "duration_serde")]
    pub read_timeout: Duration,

    /// Reject commands whose Lc byte disagrees with the trailing data length
    pub strict_length_check: bool,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            channel: DEFAULT_CHANNEL,
            packet_size: DEFAULT_PACKET_SIZE,
            channel_implicit: false,
            read_timeout: Duration::ZERO,
            strict_length_check: true,
        }
    }
}

impl DeviceConfig {
    /// Framing for a channel-implicit transport
    pub fn channel_implicit(packet_size: usize) -> Self {
        Self {
            packet_size,
            channel_implicit: true,
            ..Self::default()
        }
    }

    /// Builder-style channel override
    pub fn with_channel(mut self, channel: u16) -> Self {
        self.channel = channel;
        self
    }

    /// Builder-style packet size override
    pub fn with_packet_size(mut self, packet_size: usize) -> Self {
        self.packet_size = packet_size;
        self
    }

    /// `None` when the transport blocks indefinitely.
    pub fn read_timeout(&self) -> Option<Duration> {
        (!self.read_timeout.is_zero()).then_some(self.read_timeout)
    }

    /// Validate framing configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        let min_size = crate::core::packet::min_response_frame_len(self.channel_implicit);
        if self.packet_size < crate::core::packet::MIN_PACKET_SIZE {
            errors.push("Packet size must be at least 3".to_string());
        } else if self.packet_size < min_size {
            errors.push(format!(
                "Packet size too small: {} (minimum for this framing: {min_size})",
                self.packet_size
            ));
        } else if self.packet_size > u16::MAX as usize {
            errors.push(format!(
                "Packet size too large: {} (maximum: {})",
                self.packet_size,
                u16::MAX
            ));
        }

        if self.read_timeout.as_secs() > 3600 {
            errors.push("Read timeout too long (maximum: 1 hour)".to_string());
        }

        errors
    }
}

/// Settings for the command helpers built on top of `exchange`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct CommandConfig {
    /// Class byte of every helper command
    pub cla: u8,

    /// Maximum data bytes per chunk for sign/hash/echo
    pub chunk_size: usize,
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            cla: DEFAULT_CLA,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl CommandConfig {
    /// Validate command helper configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.chunk_size == 0 {
            errors.push("Chunk size must be greater than 0".to_string());
        } else if self.chunk_size > MAX_CHUNK_SIZE {
            errors.push(format!(
                "Chunk size too large: {} (maximum: {MAX_CHUNK_SIZE})",
                self.chunk_size
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
            app_name: String::from("ledger-apdu"),
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
