//! TOML-based configuration persistence.
//!
//! Reads and writes [`AppConfig`] at
//! `$XDG_CONFIG_HOME/touchpad-remote/config.toml`, falling back to
//! `~/.config/touchpad-remote/config.toml`.
//!
//! ```toml
//! [gesture]
//! sensitivity = 2.0
//! scroll_sensitivity = 0.05
//!
//! [display]
//! target_id = 2
//! width = 2560
//! height = 1440
//!
//! [injection]
//! priority = ["event_device", "shell"]
//! shell_program = "input"
//! ```
//!
//! Every section and field is optional.  Missing fields take the values of
//! the `default_*` functions below, so an empty file and no file at all
//! behave the same.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use touchpad_core::{GestureConfig, TargetId};

use crate::application::input_service::ServiceSettings;
use crate::application::pointer_sink::{BackendKind, InjectionMode};

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Neither `XDG_CONFIG_HOME` nor `HOME` is set.
    #[error("could not determine config directory")]
    NoConfigDir,

    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level configuration stored on disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub gesture: GestureConfig,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub injection: InjectionConfig,
    #[serde(default)]
    pub service: ServiceConfig,
}

/// The display that receives injected events.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DisplayConfig {
    /// Platform display identifier.
    #[serde(default)]
    pub target_id: i32,
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
}

/// Backend selection and per-backend settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InjectionConfig {
    /// Probe order.  Unknown names fail parsing; duplicates are ignored.
    #[serde(default = "default_priority")]
    pub priority: Vec<BackendKind>,
    /// Virtual-HID control device.
    #[serde(default = "default_uhid_path")]
    pub uhid_path: PathBuf,
    /// Name the virtual mouse registers under.
    #[serde(default = "default_device_name")]
    pub device_name: String,
    /// Event node to write instead of auto-detecting one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_node: Option<PathBuf>,
    /// Unix socket of the privileged injection helper.  No socket, no backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub helper_socket: Option<PathBuf>,
    /// Modes tried, in order, when probing the privileged helper.
    #[serde(default = "default_mode_candidates")]
    pub mode_candidates: Vec<i32>,
    /// Program used for taps and key events.
    #[serde(default = "default_shell_program")]
    pub shell_program: String,
    /// Deadline for helper programs and helper socket calls.
    #[serde(default = "default_command_timeout_ms")]
    pub command_timeout_ms: u64,
    /// How long to wait for a created virtual device to appear.
    #[serde(default = "default_device_wait_ms")]
    pub device_wait_ms: u64,
    #[serde(default = "default_device_poll_ms")]
    pub device_poll_ms: u64,
    /// Delay between press and release of a click.
    #[serde(default = "default_click_delay_ms")]
    pub click_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServiceConfig {
    /// `tracing` filter used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_width() -> u32 {
    1920
}
fn default_height() -> u32 {
    1080
}
fn default_priority() -> Vec<BackendKind> {
    BackendKind::PRIORITY.to_vec()
}
fn default_uhid_path() -> PathBuf {
    PathBuf::from("/dev/uhid")
}
fn default_device_name() -> String {
    "Touchpad Remote Mouse".to_string()
}
fn default_mode_candidates() -> Vec<i32> {
    vec![0, 1, 2]
}
fn default_shell_program() -> String {
    "input".to_string()
}
fn default_command_timeout_ms() -> u64 {
    3000
}
fn default_device_wait_ms() -> u64 {
    500
}
fn default_device_poll_ms() -> u64 {
    20
}
fn default_click_delay_ms() -> u64 {
    16
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            target_id: 0,
            width: default_width(),
            height: default_height(),
        }
    }
}

impl Default for InjectionConfig {
    fn default() -> Self {
        Self {
            priority: default_priority(),
            uhid_path: default_uhid_path(),
            device_name: default_device_name(),
            event_node: None,
            helper_socket: None,
            mode_candidates: default_mode_candidates(),
            shell_program: default_shell_program(),
            command_timeout_ms: default_command_timeout_ms(),
            device_wait_ms: default_device_wait_ms(),
            device_poll_ms: default_device_poll_ms(),
            click_delay_ms: default_click_delay_ms(),
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl DisplayConfig {
    pub fn target(&self) -> TargetId {
        TargetId(self.target_id)
    }
}

impl InjectionConfig {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }

    pub fn device_wait(&self) -> Duration {
        Duration::from_millis(self.device_wait_ms)
    }

    /// Poll interval, never zero so the wait loop always yields.
    pub fn device_poll(&self) -> Duration {
        Duration::from_millis(self.device_poll_ms.max(1))
    }

    pub fn modes(&self) -> Vec<InjectionMode> {
        self.mode_candidates.iter().copied().map(InjectionMode).collect()
    }

    pub fn service_settings(&self) -> ServiceSettings {
        ServiceSettings {
            priority: self.priority.clone(),
            click_delay: Duration::from_millis(self.click_delay_ms),
            input_program: self.shell_program.clone(),
        }
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Directory holding the config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoConfigDir`] when neither `XDG_CONFIG_HOME` nor
/// `HOME` is set.
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    let base = std::env::var_os("XDG_CONFIG_HOME")
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))
        .ok_or(ConfigError::NoConfigDir)?;
    Ok(base.join("touchpad-remote"))
}

pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join("config.toml"))
}

/// Loads the config from its default location, or defaults if absent.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from(&config_file_path()?)
}

/// Loads `path`, returning `AppConfig::default()` if it does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config_from(path: &Path) -> Result<AppConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(AppConfig::default()),
        Err(source) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

pub fn save_config(config: &AppConfig) -> Result<(), ConfigError> {
    save_config_to(config, &config_file_path()?)
}

/// Writes `config` to `path` as pretty TOML, creating parent directories.
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

// ── Tests ─────────────────────────────────────────────────────────────────────
