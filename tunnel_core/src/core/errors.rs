use std::fmt::{self, Display};

use crate::storage::profile::ProfileId;

/// Failures reported by a [`ProfileStore`](crate::storage::store::ProfileStore).
#[derive(Debug)]
pub enum StoreError {
    IoError(std::io::Error),
    Serde(serde_json::Error),
    Other(String),
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> StoreError {
        StoreError::IoError(err)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> StoreError {
        StoreError::Serde(err)
    }
}

impl Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::IoError(e) => write!(f, "IO error: {}", e),
            StoreError::Serde(e) => write!(f, "Malformed record: {}", e),
            StoreError::Other(msg) => write!(f, "Store error: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::IoError(e) => Some(e),
            StoreError::Serde(e) => Some(e),
            StoreError::Other(_) => None,
        }
    }
}

/// Failures reported by a [`TunnelAdapter`](crate::tunnel::adapter::TunnelAdapter).
///
/// Cloneable so the same failure can be recorded in the profile state and
/// handed back to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TunnelError {
    CommandFailed { command: String, stderr: String },
    Timeout { command: String, secs: u64 },
    InvalidInterface(String),
    IoError(String),
    Other(String),
}

impl From<std::io::Error> for TunnelError {
    fn from(err: std::io::Error) -> TunnelError {
        TunnelError::IoError(err.to_string())
    }
}

impl Display for TunnelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TunnelError::CommandFailed { command, stderr } => {
                write!(f, "'{}' failed: {}", command, stderr.trim())
            }
            TunnelError::Timeout { command, secs } => {
                write!(f, "'{}' did not finish within {}s", command, secs)
            }
            TunnelError::InvalidInterface(name) => {
                write!(f, "Cannot derive an interface name from '{}'", name)
            }
            TunnelError::IoError(msg) => write!(f, "IO error: {}", msg),
            TunnelError::Other(msg) => write!(f, "Tunnel error: {}", msg),
        }
    }
}

impl std::error::Error for TunnelError {}

/// The errors a caller of the [`ConnectionController`](crate::ConnectionController) sees.
#[derive(Debug)]
pub enum ProfileError {
    UnknownProfile(ProfileId),
    AlreadyExists(ProfileId),
    InvalidId(String),
    PersistenceFailure(StoreError),
    TunnelFailure(TunnelError),
    /// The task running the operation was torn down with the runtime.
    Interrupted(String),
}

impl From<StoreError> for ProfileError {
    fn from(err: StoreError) -> ProfileError {
        ProfileError::PersistenceFailure(err)
    }
}

impl From<TunnelError> for ProfileError {
    fn from(err: TunnelError) -> ProfileError {
        ProfileError::TunnelFailure(err)
    }
}

impl Display for ProfileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProfileError::UnknownProfile(id) => write!(f, "No profile with id '{}'", id),
            ProfileError::AlreadyExists(id) => {
                write!(f, "A profile with id '{}' already exists", id)
            }
            ProfileError::InvalidId(raw) => write!(f, "Invalid profile id '{}'", raw),
            ProfileError::PersistenceFailure(e) => write!(f, "Persistence failure: {}", e),
            ProfileError::TunnelFailure(e) => write!(f, "Tunnel failure: {}", e),
            ProfileError::Interrupted(msg) => write!(f, "Operation interrupted: {}", msg),
        }
    }
}

impl std::error::Error for ProfileError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ProfileError::PersistenceFailure(e) => Some(e),
            ProfileError::TunnelFailure(e) => Some(e),
            _ => None,
        }
    }
}
