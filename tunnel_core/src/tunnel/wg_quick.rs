//! `wg-quick` backed tunnel adapter
//!
//! Each profile's configuration is written to `<runtime_dir>/<iface>.conf`
//! and handed to `wg-quick up`/`down`. The interface name is derived from the
//! profile id, since `wg-quick` takes it from the file name.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info, warn};
use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::adapter::TunnelAdapter;
use crate::config::TunnelSettings;
use crate::core::errors::TunnelError;
use crate::storage::profile::{ProfileId, TunnelConfig};

const KERNEL_MODULE_PATH: &str = "/sys/module/wireguard";
const USERSPACE_ENV: &str = "WG_QUICK_USERSPACE_IMPLEMENTATION";
/// Linux `IFNAMSIZ` minus the terminating NUL.
const MAX_IFACE_LEN: usize = 15;
/// Prefix kept from long ids; `=` plus 8 hex digits fill the rest.
const HASHED_PREFIX_LEN: usize = 6;
const HASH_BYTES: usize = 4;

/// Which WireGuard implementation `wg-quick` drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterKind {
    Kernel,
    Userspace,
}

/// Kernel module when it is loaded and not overridden, userspace otherwise.
pub fn select_backend(settings: &TunnelSettings) -> AdapterKind {
    select_backend_with(settings, Path::new(KERNEL_MODULE_PATH).exists())
}

fn select_backend_with(settings: &TunnelSettings, kernel_module_loaded: bool) -> AdapterKind {
    if kernel_module_loaded && !settings.force_userspace {
        AdapterKind::Kernel
    } else {
        if settings.force_userspace {
            debug!("Forcing userspace backend on user request");
        }
        AdapterKind::Userspace
    }
}

/// Derives an interface name from a profile id.
///
/// Ids that fit in 15 bytes are used as they are. Longer ids keep a short
/// prefix followed by `=` and 8 hex digits of the SHA-256 of the whole id.
/// Profile ids never contain `=`, so a hashed name cannot equal a verbatim one.
pub fn interface_name(id: &ProfileId) -> Result<String, TunnelError> {
    let raw = id.as_str();
    let valid = !raw.is_empty()
        && !raw.starts_with('.')
        && raw
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '+' | '.' | '-'));
    if !valid {
        return Err(TunnelError::InvalidInterface(raw.to_string()));
    }
    if raw.len() <= MAX_IFACE_LEN {
        return Ok(raw.to_string());
    }
    let digest = Sha256::digest(raw.as_bytes());
    Ok(format!(
        "{}={}",
        &raw[..HASHED_PREFIX_LEN],
        hex::encode(&digest[..HASH_BYTES])
    ))
}

pub struct WgQuickAdapter {
    kind: AdapterKind,
    program: PathBuf,
    runtime_dir: PathBuf,
    userspace_implementation: String,
    timeout: Duration,
}

impl WgQuickAdapter {
    pub fn new(kind: AdapterKind, settings: &TunnelSettings) -> Self {
        Self {
            kind,
            program: PathBuf::from("wg-quick"),
            runtime_dir: settings.runtime_dir.clone(),
            userspace_implementation: settings.userspace_implementation.clone(),
            timeout: Duration::from_secs(settings.command_timeout_secs),
        }
    }

    /// Picks the backend with [`select_backend`].
    pub fn from_settings(settings: &TunnelSettings) -> Self {
        let kind = select_backend(settings);
        info!("Using {:?} WireGuard backend", kind);
        Self::new(kind, settings)
    }

    /// Run something other than `wg-quick` from `PATH`.
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Whether the configured program can be found.
    pub fn is_available(&self) -> bool {
        which::which(&self.program).is_ok()
    }

    fn config_path(&self, iface: &str) -> PathBuf {
        self.runtime_dir.join(format!("{iface}.conf"))
    }

    async fn write_config(&self, path: &Path, config: &TunnelConfig) -> Result<(), TunnelError> {
        tokio::fs::create_dir_all(&self.runtime_dir).await?;
        let mut options = tokio::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        options.mode(0o600);
        let mut file = options.open(path).await?;
        file.write_all(config.as_str().as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    async fn run(&self, action: &str, path: &Path) -> Result<(), TunnelError> {
        let command = format!("{} {} {}", self.program.display(), action, path.display());
        let mut cmd = Command::new(&self.program);
        cmd.arg(action).arg(path).kill_on_drop(true);
        if self.kind == AdapterKind::Userspace {
            cmd.env(USERSPACE_ENV, &self.userspace_implementation);
        }

        debug!("Running {}", command);
        let output = match tokio::time::timeout(self.timeout, cmd.output()).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(TunnelError::Timeout {
                    command,
                    secs: self.timeout.as_secs(),
                })
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
            return Err(TunnelError::CommandFailed { command, stderr });
        }
        Ok(())
    }
}

#[async_trait]
impl TunnelAdapter for WgQuickAdapter {
    async fn bring_up(&self, id: &ProfileId, config: &TunnelConfig) -> Result<(), TunnelError> {
        let iface = interface_name(id)?;
        let path = self.config_path(&iface);
        info!("Bringing up WireGuard interface {} for '{}'", iface, id);

        self.write_config(&path, config).await?;
        if let Err(e) = self.run("up", &path).await {
            let _ = tokio::fs::remove_file(&path).await;
            return Err(e);
        }
        info!("WireGuard interface {} is up", iface);
        Ok(())
    }

    async fn bring_down(&self, id: &ProfileId, config: &TunnelConfig) -> Result<(), TunnelError> {
        let iface = interface_name(id)?;
        let path = self.config_path(&iface);
        info!("Bringing down WireGuard interface {} for '{}'", iface, id);

        // wg-quick down needs the file; it may be gone after a restart.
        if tokio::fs::metadata(&path).await.is_err() {
            self.write_config(&path, config).await?;
        }
        let result = self.run("down", &path).await;
        if let Err(e) = tokio::fs::remove_file(&path).await {
            warn!("Could not remove {:?}: {}", path, e);
        }
        result?;
        info!("WireGuard interface {} is down", iface);
        Ok(())
    }
}
