//! Configuration for the telnet server

use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::codec::{Encoding, DEFAULT_BUFFER_SIZE};
use crate::net::{AddressFilter, ConnectionFilter, ManagerSettings};

/// Server configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Port the demo server listens on
    pub port: u16,
    /// Address the demo server binds to
    pub bind_address: IpAddr,
    /// Maximum number of open connections
    pub max_connections: usize,
    /// Idle time in milliseconds before the idle event
    pub warning_timeout_ms: u64,
    /// Idle time in milliseconds after the warning before the timeout event
    pub disconnect_timeout_ms: u64,
    /// Time in milliseconds between housekeeping sweeps
    pub housekeeping_interval_ms: u64,
    /// Time in milliseconds a TCP write may block on a peer that stopped
    /// reading before it fails, 0 for no limit
    pub write_timeout_ms: u64,
    /// Admission filter
    pub connection_filter: FilterConfig,
    /// Shell every connection starts with
    pub login_shell: String,
    pub input_mode: InputMode,
    /// Character encoding of every session
    pub encoding: Encoding,
    /// Initial size of the decoder buffers
    pub decoder_buffer_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 6666,
            bind_address: IpAddr::from([0, 0, 0, 0]),
            max_connections: 25,
            warning_timeout_ms: 3_600_000,
            disconnect_timeout_ms: 60_000,
            housekeeping_interval_ms: 1_000,
            write_timeout_ms: 30_000,
            connection_filter: FilterConfig::None,
            login_shell: String::from("echo"),
            input_mode: InputMode::Character,
            encoding: Encoding::Utf8,
            decoder_buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

/// How input is delivered to shells
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputMode {
    #[default]
    Character,
    Line,
}

/// Admission filter selection
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FilterConfig {
    /// Admit every peer
    #[default]
    None,
    /// Admit only the listed peers
    Allow { addresses: Vec<IpAddr> },
    /// Admit every peer except the listed ones
    Deny { addresses: Vec<IpAddr> },
}

impl FilterConfig {
    /// Build the configured filter, if any
    pub fn build(&self) -> Option<Box<dyn ConnectionFilter>> {
        match self {
            FilterConfig::None => None,
            FilterConfig::Allow { addresses } => Some(Box::new(AddressFilter::allow_only(
                addresses.iter().copied(),
            ))),
            FilterConfig::Deny { addresses } => {
                Some(Box::new(AddressFilter::deny(addresses.iter().copied())))
            }
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load configuration from default location or return default config
    pub fn load_or_default() -> Self {
        // Try to load from ~/.config/telnetd/config.json
        if let Some(config_path) = default_path() {
            if config_path.exists() {
                match Self::load(&config_path) {
                    Ok(config) => return config,
                    Err(e) => tracing::warn!(
                        path = %config_path.display(),
                        "Ignoring configuration: {}",
                        e
                    ),
                }
            }
        }
        Self::default()
    }

    /// Check values that would make the server misbehave
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.login_shell.trim().is_empty() {
            return Err(ConfigError::MissingLoginShell);
        }
        let positive = [
            ("warning_timeout_ms", self.warning_timeout_ms),
            ("disconnect_timeout_ms", self.disconnect_timeout_ms),
            ("housekeeping_interval_ms", self.housekeeping_interval_ms),
            ("decoder_buffer_size", self.decoder_buffer_size as u64),
        ];
        for (field, value) in positive {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    field,
                    reason: "must be greater than zero",
                });
            }
        }
        Ok(())
    }

    /// Write timeout for accepted TCP streams
    pub fn write_timeout(&self) -> Option<Duration> {
        (self.write_timeout_ms > 0).then(|| Duration::from_millis(self.write_timeout_ms))
    }

    /// Connection manager settings derived from this configuration
    pub fn manager_settings(&self) -> ManagerSettings {
        ManagerSettings {
            max_connections: self.max_connections,
            warning_timeout: Duration::from_millis(self.warning_timeout_ms),
            disconnect_timeout: Duration::from_millis(self.disconnect_timeout_ms),
            housekeeping_interval: Duration::from_millis(self.housekeeping_interval_ms),
            login_shell: self.login_shell.clone(),
            line_mode: self.input_mode == InputMode::Line,
            encoding: self.encoding,
            decoder_buffer_size: self.decoder_buffer_size,
        }
    }
}

/// Get the default configuration file path
pub fn default_path() -> Option<PathBuf> {
    std::env::var("HOME").ok().map(|home| {
        PathBuf::from(home)
            .join(".config")
            .join("telnetd")
            .join("config.json")
    })
}

/// Configuration error
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("No login shell configured")]
    MissingLoginShell,
    #[error("Login shell {0:?} is not registered")]
    UnknownShell(String),
    #[error("Invalid value for {field}: {reason}")]
    InvalidValue {
        field: &'static str,
        reason: &'static str,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.port, 6666);
        assert_eq!(config.max_connections, 25);
        assert_eq!(config.login_shell, "echo");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization() {
        let config = Config {
            connection_filter: FilterConfig::Deny {
                addresses: vec!["10.1.1.1".parse().unwrap()],
            },
            encoding: Encoding::Latin1,
            ..Config::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        let restored: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(config, restored);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let json = r#"{
            "max_connections": 2,
            "input_mode": "line",
            "connection_filter": { "type": "allow", "addresses": ["127.0.0.1"] }
        }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.max_connections, 2);
        assert_eq!(config.port, 6666);
        assert_eq!(config.input_mode, InputMode::Line);

        let filter = config.connection_filter.build().unwrap();
        assert!(filter.is_allowed("127.0.0.1".parse().unwrap()));
        assert!(!filter.is_allowed("10.0.0.1".parse().unwrap()));
    }

    #[test]
    fn test_validate() {
        let config = Config {
            login_shell: "  ".to_string(),
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::MissingLoginShell)));

        let config = Config {
            housekeeping_interval_ms: 0,
            ..Config::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue {
                field: "housekeeping_interval_ms",
                ..
            })
        ));
    }

    #[test]
    fn test_manager_settings() {
        let config = Config {
            warning_timeout_ms: 1500,
            input_mode: InputMode::Line,
            ..Config::default()
        };
        let settings = config.manager_settings();
        assert_eq!(settings.warning_timeout, Duration::from_millis(1500));
        assert!(settings.line_mode);
        assert_eq!(settings.login_shell, "echo");
    }

    #[test]
    fn test_write_timeout() {
        assert_eq!(
            Config::default().write_timeout(),
            Some(Duration::from_secs(30))
        );
        let config = Config {
            write_timeout_ms: 0,
            ..Config::default()
        };
        assert_eq!(config.write_timeout(), None);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let config = Config {
            port: 2323,
            ..Config::default()
        };
        config.save(&path).unwrap();
        assert_eq!(Config::load(&path).unwrap(), config);
    }

    #[test]
    fn test_load_rejects_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "login_shell": "" }"#).unwrap();
        assert!(matches!(
            Config::load(&path),
            Err(ConfigError::MissingLoginShell)
        ));
        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(Config::load(&path), Err(ConfigError::Json(_))));
    }
}
