//! CLI configuration.
//!
//! Configuration is loaded in the following order (later overrides earlier):
//! 1. Default values
//! 2. YAML config file (if specified via --config or COMMPACK_CONFIG)
//! 3. Environment variables
//! 4. Command-line flags (applied by the caller)

use commpack_link::LinkConfig;
use commpack_protocol::{LengthField, Versions, DEFAULT_DATA_VERSION, DEFAULT_MAIN_VERSION};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "COMMPACK_CONFIG";

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Frame format settings.
    pub protocol: ProtocolConfig,
    /// Serial link settings.
    pub link: LinkSettings,
}

impl Config {
    /// Loads configuration from `path` (or `COMMPACK_CONFIG`), then applies
    /// environment variable overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from));

        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };

        config.apply_overrides(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        serde_yaml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Applies overrides looked up by variable name. Unparseable values are
    /// ignored.
    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        self.protocol.apply_overrides(&var);
        self.link.apply_overrides(&var);
    }

    /// Checks values that deserialize fine but cannot be used.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.link.read_buffer_size == 0 {
            return Err(ConfigError::Validation(
                "link.read_buffer_size must be greater than 0".to_string(),
            ));
        }
        if self.link.max_payload == Some(0) {
            return Err(ConfigError::Validation(
                "link.max_payload must be greater than 0".to_string(),
            ));
        }
        if self.link.read_timeout_ms == 0 || self.link.write_timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "link timeouts must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Serializes the configuration as YAML.
    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        serde_yaml::to_string(self).map_err(|e| ConfigError::Serialize(e.to_string()))
    }
}

/// Frame format configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    /// Protocol major version.
    pub main_version: u8,
    /// Payload schema version.
    pub data_version: u8,
    /// Width of the length field (`u8` or `u16`).
    pub length_field: LengthField,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            main_version: DEFAULT_MAIN_VERSION,
            data_version: DEFAULT_DATA_VERSION,
            length_field: LengthField::default(),
        }
    }
}

impl ProtocolConfig {
    fn apply_overrides(&mut self, var: &impl Fn(&str) -> Option<String>) {
        if let Some(v) = var("COMMPACK_MAIN_VERSION").as_deref().and_then(parse_u8) {
            self.main_version = v;
        }
        if let Some(v) = var("COMMPACK_DATA_VERSION").as_deref().and_then(parse_u8) {
            self.data_version = v;
        }
        if let Some(field) = var("COMMPACK_LENGTH_FIELD").and_then(|v| v.parse().ok()) {
            self.length_field = field;
        }
    }

    pub fn versions(&self) -> Versions {
        Versions::new(self.main_version, self.data_version)
    }
}

/// Serial link configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkSettings {
    /// Device path, e.g. `/dev/ttyUSB0`. Must already be configured
    /// (baud rate, raw mode) by the operating system.
    pub device: Option<PathBuf>,
    /// Reply timeout in milliseconds.
    pub read_timeout_ms: u64,
    /// Write timeout in milliseconds.
    pub write_timeout_ms: u64,
    /// Read buffer size in bytes.
    pub read_buffer_size: usize,
    /// Largest payload a received frame header may declare. Defaults to the
    /// length field's capacity.
    pub max_payload: Option<usize>,
}

impl Default for LinkSettings {
    fn default() -> Self {
        Self {
            device: None,
            read_timeout_ms: 1000,
            write_timeout_ms: 1000,
            read_buffer_size: 256,
            max_payload: None,
        }
    }
}

impl LinkSettings {
    fn apply_overrides(&mut self, var: &impl Fn(&str) -> Option<String>) {
        if let Some(device) = var("COMMPACK_DEVICE").filter(|d| !d.is_empty()) {
            self.device = Some(PathBuf::from(device));
        }
        if let Some(ms) = var("COMMPACK_READ_TIMEOUT_MS").and_then(|v| v.parse().ok()) {
            self.read_timeout_ms = ms;
        }
        if let Some(ms) = var("COMMPACK_WRITE_TIMEOUT_MS").and_then(|v| v.parse().ok()) {
            self.write_timeout_ms = ms;
        }
        if let Some(max) = var("COMMPACK_MAX_PAYLOAD").and_then(|v| v.parse().ok()) {
            self.max_payload = Some(max);
        }
    }

    /// Builds the link configuration for the given frame format.
    pub fn link_config(&self, protocol: &ProtocolConfig) -> LinkConfig {
        let config = LinkConfig::new(protocol.length_field)
            .with_read_timeout(Duration::from_millis(self.read_timeout_ms))
            .with_write_timeout(Duration::from_millis(self.write_timeout_ms))
            .with_read_buffer_size(self.read_buffer_size);
        match self.max_payload {
            Some(max) => config.with_max_payload(max),
            None => config,
        }
    }
}

/// Parses a byte given in decimal or with a `0x` prefix.
pub fn parse_u8(s: &str) -> Option<u8> {
    let s = s.trim();
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16).ok(),
        None => s.parse().ok(),
    }
}

/// Configuration error.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{}': {message}", .path.display())]
    Parse { path: PathBuf, message: String },

    #[error("configuration validation failed: {0}")]
    Validation(String),

    #[error("failed to serialize config: {0}")]
    Serialize(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.protocol.versions(), Versions::new(0x10, 0x10));
        assert_eq!(config.protocol.length_field, LengthField::U16);
        assert!(config.link.device.is_none());
        config.validate().unwrap();
    }

    #[test]
    fn test_yaml_roundtrip() {
        let config = Config::default();
        let yaml = config.to_yaml().unwrap();
        let parsed: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_from_file_partial() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "protocol:\n  main_version: 32\n  length_field: u8\nlink:\n  device: /dev/ttyUSB1"
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.protocol.main_version, 0x20);
        assert_eq!(config.protocol.data_version, DEFAULT_DATA_VERSION);
        assert_eq!(config.protocol.length_field, LengthField::U8);
        assert_eq!(config.link.device, Some(PathBuf::from("/dev/ttyUSB1")));
        assert_eq!(config.link.read_timeout_ms, 1000);
    }

    #[test]
    fn test_from_file_missing() {
        let result = Config::from_file("/nonexistent/commpack.yaml");
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }

    #[test]
    fn test_from_file_invalid() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "protocol:\n  length_field: u32").unwrap();

        let result = Config::from_file(file.path());
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_overrides() {
        let mut config = Config::default();
        config.apply_overrides(vars(&[
            ("COMMPACK_MAIN_VERSION", "0x21"),
            ("COMMPACK_DATA_VERSION", "17"),
            ("COMMPACK_LENGTH_FIELD", "u8"),
            ("COMMPACK_DEVICE", "/dev/ttyACM0"),
            ("COMMPACK_READ_TIMEOUT_MS", "250"),
            ("COMMPACK_MAX_PAYLOAD", "64"),
        ]));

        assert_eq!(config.protocol.versions(), Versions::new(0x21, 0x11));
        assert_eq!(config.protocol.length_field, LengthField::U8);
        assert_eq!(config.link.device, Some(PathBuf::from("/dev/ttyACM0")));
        assert_eq!(config.link.read_timeout_ms, 250);
        assert_eq!(config.link.write_timeout_ms, 1000);
        assert_eq!(config.link.max_payload, Some(64));
    }

    #[test]
    fn test_invalid_overrides_ignored() {
        let mut config = Config::default();
        config.apply_overrides(vars(&[
            ("COMMPACK_MAIN_VERSION", "0x100"),
            ("COMMPACK_DATA_VERSION", "abc"),
            ("COMMPACK_LENGTH_FIELD", "u64"),
            ("COMMPACK_READ_TIMEOUT_MS", "-5"),
        ]));
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_validation() {
        let mut config = Config::default();
        config.link.read_buffer_size = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Validation(_))
        ));

        let mut config = Config::default();
        config.link.write_timeout_ms = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.link.max_payload = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_error_messages() {
        let err = ConfigError::Serialize("bad value".to_string());
        assert_eq!(err.to_string(), "failed to serialize config: bad value");

        let err = ConfigError::Validation("x".to_string());
        assert!(err.to_string().starts_with("configuration validation failed"));
    }

    #[test]
    fn test_link_config() {
        let mut config = Config::default();
        config.protocol.length_field = LengthField::U8;
        config.link.read_timeout_ms = 20;

        let link = config.link.link_config(&config.protocol);
        assert_eq!(link.length_field, LengthField::U8);
        assert_eq!(link.read_timeout, Duration::from_millis(20));
        assert_eq!(link.read_buffer_size, 256);
        assert_eq!(link.max_payload, None);

        config.link.max_payload = Some(32);
        assert_eq!(config.link.link_config(&config.protocol).max_payload, Some(32));
    }

    #[test]
    fn test_parse_u8() {
        assert_eq!(parse_u8("16"), Some(16));
        assert_eq!(parse_u8("0x10"), Some(16));
        assert_eq!(parse_u8(" 0XFF "), Some(255));
        assert_eq!(parse_u8("256"), None);
        assert_eq!(parse_u8("0x"), None);
    }
}
