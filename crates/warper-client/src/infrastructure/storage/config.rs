//! TOML-based configuration for the session client.
//!
//! Reads and writes [`AppConfig`] at the platform-appropriate path:
//! - Windows:  `%APPDATA%\Warper\config.toml`
//! - Linux:    `~/.config/warper/config.toml`
//! - macOS:    `~/Library/Application Support/Warper/config.toml`
//!
//! ```toml
//! [connection]
//! protocol = "wifi"
//! ip = "192.168.0.10"
//! port = 6000
//! usb_port = 0
//! timeout_ms = 5000
//!
//! [macros]
//! save_write_delay_ms = 6000
//!
//! [logging]
//! log_level = "debug"
//! ```
//!
//! # Serde default values
//!
//! Every section and every field has a default, so an empty file, a missing
//! file, or a file written by an older version all load cleanly.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use warper_core::SwitchProtocol;

use crate::application::macros::MacroTimings;
use crate::infrastructure::connection::socket::DEFAULT_SOCKET_PORT;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be serialized to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level configuration stored on disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub connection: ConnectionConfig,
    #[serde(default)]
    pub macros: MacroTimings,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Which console to talk to and how.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConnectionConfig {
    #[serde(default)]
    pub protocol: SwitchProtocol,
    /// Console IP address.  Ignored over USB.
    #[serde(default = "default_ip")]
    pub ip: String,
    /// TCP port of the console service.  Ignored over USB.
    #[serde(default = "default_port")]
    pub port: u16,
    /// USB bus port of the console; `0` takes the first one found.
    #[serde(default)]
    pub usb_port: u16,
    /// Upper bound on a single transport exchange.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl ConnectionConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// `tracing` filter used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_ip() -> String {
    "192.168.0.1".to_string()
}
fn default_port() -> u16 {
    DEFAULT_SOCKET_PORT
}
fn default_timeout_ms() -> u64 {
    5_000
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            protocol: SwitchProtocol::default(),
            ip: default_ip(),
            port: default_port(),
            usb_port: 0,
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Determines the platform-appropriate directory for the config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] when the base directory cannot
/// be determined from the environment.
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    platform_config_dir().ok_or(ConfigError::NoPlatformConfigDir)
}

/// Resolves the full path to the config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] if the base directory cannot be
/// determined.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join("config.toml"))
}

/// Loads the config from the platform path.
///
/// # Errors
///
/// See [`load_config_from`].
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from(&config_file_path()?)
}

/// Loads the config from `path`, returning defaults if the file does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config_from(path: &Path) -> Result<AppConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(AppConfig::default()),
        Err(e) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Persists `config` to the platform path.
///
/// # Errors
///
/// See [`save_config_to`].
pub fn save_config(config: &AppConfig) -> Result<(), ConfigError> {
    save_config_to(config, &config_file_path()?)
}

/// Writes `config` to `path`, creating the parent directory if needed.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system failures or
/// [`ConfigError::Serialize`] if serialization fails.
pub fn save_config_to(config: &AppConfig, path: &Path) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("Warper"))
    }

    #[cfg(target_os = "linux")]
    {
        // XDG_CONFIG_HOME or ~/.config
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("warper"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("Warper")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("warper-config-test-{}-{name}", std::process::id()))
            .join("config.toml")
    }

    #[test]
    fn test_default_config_targets_wifi_on_port_6000() {
        // Arrange / Act
        let cfg = AppConfig::default();

        // Assert
        assert_eq!(cfg.connection.protocol, SwitchProtocol::WiFi);
        assert_eq!(cfg.connection.port, 6000);
        assert_eq!(cfg.connection.timeout(), Duration::from_secs(5));
        assert_eq!(cfg.logging.log_level, "info");
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let cfg: AppConfig = toml::from_str("").expect("deserialize empty");
        assert_eq!(cfg, AppConfig::default());
    }

    #[test]
    fn test_partial_sections_override_only_named_fields() {
        // Arrange
        let toml_str = r#"
[connection]
protocol = "usb"
usb_port = 2

[macros]
save_write_delay_ms = 6000
"#;

        // Act
        let cfg: AppConfig = toml::from_str(toml_str).expect("deserialize partial");

        // Assert
        assert_eq!(cfg.connection.protocol, SwitchProtocol::Usb);
        assert_eq!(cfg.connection.usb_port, 2);
        assert_eq!(cfg.connection.port, 6000);
        assert_eq!(cfg.connection.ip, "192.168.0.1");
        assert_eq!(cfg.macros.save_write_delay_ms, 6_000);
        assert_eq!(cfg.macros.save_close_delay_ms, 800);
        assert_eq!(cfg.logging.log_level, "info");
    }

    #[test]
    fn test_config_serializes_and_deserializes_round_trip() {
        // Arrange
        let mut cfg = AppConfig::default();
        cfg.connection.ip = "10.0.0.42".to_string();
        cfg.macros.mark_spawn_first_delay_ms = 600;

        // Act
        let toml_str = toml::to_string_pretty(&cfg).expect("serialize");
        let restored: AppConfig = toml::from_str(&toml_str).expect("deserialize");

        // Assert
        assert_eq!(cfg, restored);
    }

    #[test]
    fn test_unknown_protocol_is_a_parse_error() {
        let result: Result<AppConfig, toml::de::Error> =
            toml::from_str("[connection]\nprotocol = \"bluetooth\"");
        assert!(result.is_err());
    }

    #[test]
    fn test_load_missing_file_returns_defaults() {
        let path = scratch_path("missing");

        let cfg = load_config_from(&path).expect("missing file is not an error");

        assert_eq!(cfg, AppConfig::default());
    }

    #[test]
    fn test_save_then_load_from_disk() {
        // Arrange
        let path = scratch_path("save-load");
        let mut cfg = AppConfig::default();
        cfg.logging.log_level = "debug".to_string();

        // Act
        save_config_to(&cfg, &path).expect("save");
        let loaded = load_config_from(&path).expect("load");

        // Assert
        assert_eq!(loaded, cfg);
        if let Some(dir) = path.parent() {
            let _ = std::fs::remove_dir_all(dir);
        }
    }

    #[test]
    fn test_malformed_file_reports_parse_error() {
        let path = scratch_path("malformed");
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).unwrap();
        }
        std::fs::write(&path, "[[[ not valid toml").unwrap();

        let result = load_config_from(&path);

        assert!(matches!(result, Err(ConfigError::Parse(_))));
        if let Some(dir) = path.parent() {
            let _ = std::fs::remove_dir_all(dir);
        }
    }
}
