//! Settings file parsing and validation
//!
//! Settings live in `settings.toml` next to the profile directory. Every
//! field has a default, so a missing file or a partial one is fine.

use std::fmt::{self, Display};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::{fs, io};

use directories::ProjectDirs;
use log::LevelFilter;
use serde::{Deserialize, Serialize};

const APP_NAME: &str = "tunnel_rs";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub storage: StorageSettings,
    pub tunnel: TunnelSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Where profile records live; `<config dir>/profiles` when unset.
    pub profile_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TunnelSettings {
    /// Where generated `wg-quick` files are written while a tunnel is up.
    pub runtime_dir: PathBuf,
    /// Use the userspace implementation even if the kernel module is loaded.
    pub force_userspace: bool,
    pub userspace_implementation: String,
    /// Upper bound for a single `wg-quick` invocation.
    pub command_timeout_secs: u64,
}

impl Default for TunnelSettings {
    fn default() -> Self {
        Self {
            runtime_dir: PathBuf::from("/run/tunnel-rs"),
            force_userspace: false,
            userspace_implementation: "wireguard-go".into(),
            command_timeout_secs: 20,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    IoError(io::Error),
    Parse(toml::de::Error),
    Invalid(String),
}

impl From<io::Error> for ConfigError {
    fn from(err: io::Error) -> ConfigError {
        ConfigError::IoError(err)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> ConfigError {
        ConfigError::Parse(err)
    }
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Failed to parse settings: {}", e),
            ConfigError::Invalid(msg) => write!(f, "Invalid settings: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", APP_NAME)
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&contents)
    }

    /// `<config dir>/settings.toml` if it exists, defaults otherwise.
    pub fn load_or_default() -> Result<Self, ConfigError> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(path),
            _ => Ok(Self::default()),
        }
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let settings: Settings = toml::from_str(contents)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn default_path() -> Option<PathBuf> {
        project_dirs().map(|p| p.config_dir().join("settings.toml"))
    }

    /// The configured profile directory, or the per-user default.
    pub fn profile_dir(&self) -> Option<PathBuf> {
        self.storage
            .profile_dir
            .clone()
            .or_else(|| project_dirs().map(|p| p.config_dir().join("profiles")))
    }

    pub fn log_level(&self) -> LevelFilter {
        LevelFilter::from_str(&self.logging.level).unwrap_or(LevelFilter::Info)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.tunnel.command_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "tunnel.command_timeout_secs must be > 0".into(),
            ));
        }
        if self.tunnel.userspace_implementation.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "tunnel.userspace_implementation cannot be empty".into(),
            ));
        }
        if LevelFilter::from_str(&self.logging.level).is_err() {
            return Err(ConfigError::Invalid(format!(
                "logging.level '{}' is not a log level",
                self.logging.level
            )));
        }
        Ok(())
    }
}
