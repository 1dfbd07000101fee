//! Persisted defaults

use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};

use rig_engine::{EscapeScheme, LineEnding};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::serial::{LineConfig, Parity};

const APP_DIR: &str = "sendrig";
const SETTINGS_FILE: &str = "settings.json";

/// Defaults remembered between runs
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    /// Last serial device used
    #[serde(default)]
    pub port: Option<String>,
    /// Baud rate
    #[serde(default = "default_baud")]
    pub baud_rate: u32,
    /// Data bits (5-8)
    #[serde(default = "default_data_bits")]
    pub data_bits: u8,
    /// Stop bits (1 or 2)
    #[serde(default = "default_stop_bits")]
    pub stop_bits: u8,
    #[serde(default)]
    pub parity: Parity,
    /// Escape scheme for typed payloads
    #[serde(default)]
    pub escape: EscapeScheme,
    /// Send `\r\n` for every `\n`
    #[serde(default)]
    pub precede_lf_with_cr: bool,
    /// Terminate payloads that lack a trailing newline
    #[serde(default = "default_true")]
    pub append_missing_newline: bool,
    /// Write send/recv events to a log file
    #[serde(default = "default_true")]
    pub save_log: bool,
    /// Where log files go; the home directory when unset
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

fn default_baud() -> u32 {
    115200
}

fn default_data_bits() -> u8 {
    8
}

fn default_stop_bits() -> u8 {
    1
}

fn default_true() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            port: None,
            baud_rate: default_baud(),
            data_bits: default_data_bits(),
            stop_bits: default_stop_bits(),
            parity: Parity::None,
            escape: EscapeScheme::Raw,
            precede_lf_with_cr: false,
            append_missing_newline: true,
            save_log: true,
            log_dir: None,
        }
    }
}

/// Failures persisting settings
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("could not determine a config directory")]
    NoConfigDir,

    #[error("failed to create {}: {source}", .path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to serialize settings: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// `<XDG_CONFIG_HOME>/sendrig`, or `<home>/.config/sendrig` when the
/// variable is unset or relative
fn config_dir_from(xdg_config_home: Option<OsString>, home: Option<PathBuf>) -> Option<PathBuf> {
    xdg_config_home
        .map(PathBuf::from)
        .filter(|path| path.is_absolute())
        .or_else(|| home.map(|h| h.join(".config")))
        .map(|base| base.join(APP_DIR))
}

impl Settings {
    pub fn settings_path() -> Option<PathBuf> {
        config_dir_from(std::env::var_os("XDG_CONFIG_HOME"), dirs::home_dir())
            .map(|dir| dir.join(SETTINGS_FILE))
    }

    /// Load from the default location; defaults when missing or unreadable
    pub fn load() -> Self {
        Self::settings_path()
            .map(|path| Self::load_from(&path))
            .unwrap_or_default()
    }

    pub fn load_from(path: &Path) -> Self {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Self::default(),
            Err(e) => {
                warn!("Ignoring settings at {}: {}", path.display(), e);
                return Self::default();
            }
        };
        serde_json::from_str(&text).unwrap_or_else(|e| {
            warn!("Ignoring malformed settings at {}: {}", path.display(), e);
            Self::default()
        })
    }

    pub fn save(&self) -> Result<PathBuf, SettingsError> {
        let path = Self::settings_path().ok_or(SettingsError::NoConfigDir)?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), SettingsError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| SettingsError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(|source| SettingsError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Serial line settings for `port`
    pub fn line_config(&self, port: String) -> LineConfig {
        LineConfig {
            port,
            baud_rate: self.baud_rate,
            data_bits: self.data_bits,
            stop_bits: self.stop_bits,
            parity: self.parity,
        }
    }

    pub fn line_ending(&self) -> LineEnding {
        LineEnding {
            precede_lf_with_cr: self.precede_lf_with_cr,
            append_missing_newline: self.append_missing_newline,
        }
    }

    /// Directory new log files are created in
    pub fn log_directory(&self) -> Option<PathBuf> {
        self.log_dir.clone().or_else(dirs::home_dir)
    }
}
