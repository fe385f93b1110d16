//! # Configuration Management Module
//!
//! TOML configuration for the board link, with defaults for every value so the
//! application runs without a file.
//!
//! ## Configuration Structure
//!
//! - [`DeviceConfig`] - which serial device to open and how lines are terminated
//! - [`LoggingConfig`] - log level and optional log file
//!
//! ## Usage
//!
//! ```rust,no_run
//! use boardlink::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml").await?;
//!     println!("Match policy: {:?}", config.match_policy());
//!
//!     Config::create_default("config.toml").await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration File Format
//!
//! ```toml
//! [device]
//! # port = "/dev/ttyACM0"
//! match_policy = "manufacturer"
//! manufacturer = "Arduino"
//! vendor_id = "2341"
//! product_id = "0043"
//! line_ending = "lf"
//!
//! [logging]
//! level = "info"
//! # file = "boardlink.log"
//! ```
//!
//! ## Device Selection Precedence
//!
//! `--port` CLI argument > `ARDUINO_PORT` environment variable > `device.port` >
//! auto-discovery. Empty values are treated as unset (see [`resolve_port_override`]).

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;

use crate::serial::discovery::{
    DEFAULT_MANUFACTURER_MARKER, DEFAULT_PRODUCT_ID, DEFAULT_VENDOR_ID,
};
use crate::serial::{Delimiter, MatchPolicy};

/// Environment variable holding an explicit device path.
pub const PORT_ENV_VAR: &str = "ARDUINO_PORT";

const LOG_LEVELS: [&str; 6] = ["off", "error", "warn", "info", "debug", "trace"];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Which port auto-discovery accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPolicyKind {
    #[default]
    Manufacturer,
    UsbId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Explicit device path; skips enumeration entirely when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<String>,
    #[serde(default)]
    pub match_policy: MatchPolicyKind,
    /// Substring of the USB manufacturer string (case-sensitive).
    #[serde(default = "default_manufacturer")]
    pub manufacturer: String,
    /// 4-digit hex, used with `match_policy = "usb_id"`.
    #[serde(default = "default_vendor_id")]
    pub vendor_id: String,
    #[serde(default = "default_product_id")]
    pub product_id: String,
    #[serde(default)]
    pub line_ending: Delimiter,
}

fn default_manufacturer() -> String {
    DEFAULT_MANUFACTURER_MARKER.to_string()
}

fn default_vendor_id() -> String {
    DEFAULT_VENDOR_ID.to_string()
}

fn default_product_id() -> String {
    DEFAULT_PRODUCT_ID.to_string()
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            port: None,
            match_policy: MatchPolicyKind::default(),
            manufacturer: default_manufacturer(),
            vendor_id: default_vendor_id(),
            product_id: default_product_id(),
            line_ending: Delimiter::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub async fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path, e))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse config file {}: {}", path, e))?;

        config.validate()?;
        Ok(config)
    }

    /// Load `path` if it exists, otherwise fall back to defaults. A file that exists
    /// but does not parse is still an error. The flag is `false` when defaults were
    /// used; this runs before logging is set up, so the caller reports it.
    pub async fn load_or_default(path: &str) -> Result<(Self, bool)> {
        if Path::new(path).exists() {
            Ok((Self::load(path).await?, true))
        } else {
            Ok((Config::default(), false))
        }
    }

    /// Create a default configuration file
    pub async fn create_default(path: &str) -> Result<()> {
        let config = Config::default();
        let content = toml::to_string_pretty(&config)
            .map_err(|e| anyhow!("Failed to serialize default config: {}", e))?;

        fs::write(path, content)
            .await
            .map_err(|e| anyhow!("Failed to write config file {}: {}", path, e))?;

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let level = self.logging.level.to_ascii_lowercase();
        if !LOG_LEVELS.contains(&level.as_str()) {
            return Err(anyhow!(
                "Invalid logging.level '{}' (expected one of {})",
                self.logging.level,
                LOG_LEVELS.join(", ")
            ));
        }
        match self.device.match_policy {
            MatchPolicyKind::Manufacturer => {
                if self.device.manufacturer.trim().is_empty() {
                    return Err(anyhow!("device.manufacturer must not be empty"));
                }
            }
            MatchPolicyKind::UsbId => {
                for (name, value) in [
                    ("vendor_id", &self.device.vendor_id),
                    ("product_id", &self.device.product_id),
                ] {
                    if !is_usb_id(value) {
                        return Err(anyhow!(
                            "device.{} '{}' is not a 4-digit hex id",
                            name,
                            value
                        ));
                    }
                }
            }
        }
        Ok(())
    }

    pub fn match_policy(&self) -> MatchPolicy {
        match self.device.match_policy {
            MatchPolicyKind::Manufacturer => MatchPolicy::Manufacturer {
                marker: self.device.manufacturer.clone(),
            },
            MatchPolicyKind::UsbId => MatchPolicy::UsbId {
                vendor_id: self.device.vendor_id.to_ascii_lowercase(),
                product_id: self.device.product_id.to_ascii_lowercase(),
            },
        }
    }
}

fn is_usb_id(value: &str) -> bool {
    value.len() == 4 && value.chars().all(|c| c.is_ascii_hexdigit())
}

/// Pick the explicit device path: CLI, then environment, then config file.
/// Blank values fall through to the next source.
pub fn resolve_port_override(
    cli: Option<&str>,
    env: Option<&str>,
    config: Option<&str>,
) -> Option<String> {
    [cli, env, config]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|p| !p.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_an_uno() {
        let config = Config::default();
        assert_eq!(config.device.match_policy, MatchPolicyKind::Manufacturer);
        assert_eq!(config.device.line_ending, Delimiter::Lf);
        assert_eq!(
            config.match_policy(),
            MatchPolicy::Manufacturer {
                marker: "Arduino".into()
            }
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [device]
            match_policy = "usb_id"
            vendor_id = "2A03"
            line_ending = "crlf"
            "#,
        )
        .unwrap();
        assert_eq!(config.device.line_ending, Delimiter::Crlf);
        assert_eq!(config.logging.level, "info");
        assert_eq!(
            config.match_policy(),
            MatchPolicy::UsbId {
                vendor_id: "2a03".into(),
                product_id: "0043".into()
            }
        );
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.logging.level = "loud".into();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.device.match_policy = MatchPolicyKind::UsbId;
        config.device.product_id = "43".into();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.device.manufacturer = "  ".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_port_precedence() {
        assert_eq!(
            resolve_port_override(Some("/dev/a"), Some("/dev/b"), Some("/dev/c")),
            Some("/dev/a".to_string())
        );
        assert_eq!(
            resolve_port_override(None, Some("COM4"), Some("/dev/c")),
            Some("COM4".to_string())
        );
        assert_eq!(
            resolve_port_override(Some(""), Some("  "), Some("/dev/c")),
            Some("/dev/c".to_string())
        );
        assert_eq!(resolve_port_override(None, None, None), None);
    }
}
