use std::fmt::{self, Display};
use std::{fs, io, path::Path};

use serde::{Deserialize, Serialize};

use crate::core::errors::ProfileError;
use crate::core::state::ConnectionState;

const MAX_ID_LEN: usize = 64;

/// Stable identifier of a profile.
///
/// Ids double as store keys, so they are limited to `[A-Za-z0-9_.-]` and may
/// not start with a dot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProfileId(String);

impl ProfileId {
    pub fn new(raw: impl Into<String>) -> Result<Self, ProfileError> {
        let raw = raw.into();
        let valid = !raw.is_empty()
            && raw.len() <= MAX_ID_LEN
            && !raw.starts_with('.')
            && raw
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.');
        if valid {
            Ok(Self(raw))
        } else {
            Err(ProfileError::InvalidId(raw))
        }
    }

    /// A fresh random (UUID v4) id.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ProfileId {
    type Error = ProfileError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        ProfileId::new(raw)
    }
}

impl From<ProfileId> for String {
    fn from(id: ProfileId) -> String {
        id.0
    }
}

impl Display for ProfileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque tunnel configuration, the text of a `wg-quick` config file.
///
/// Nothing outside the tunnel adapter looks inside it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TunnelConfig(String);

impl TunnelConfig {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn from_file(path: impl AsRef<Path>) -> io::Result<Self> {
        fs::read_to_string(path).map(Self)
    }

    pub fn write_to(&self, path: impl AsRef<Path>) -> io::Result<()> {
        fs::write(path, &self.0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A named tunnel configuration plus its live connection state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub id: ProfileId,
    pub name: String,
    pub config: TunnelConfig,
    pub state: ConnectionState,
    /// Place in the registry's list, assigned when the profile is created.
    pub(crate) position: u64,
}

impl Profile {
    /// A new, disconnected profile with a generated id.
    pub fn new(name: impl Into<String>, config: TunnelConfig) -> Self {
        Self::with_id(ProfileId::generate(), name, config)
    }

    pub fn with_id(id: ProfileId, name: impl Into<String>, config: TunnelConfig) -> Self {
        Self {
            id,
            name: name.into(),
            config,
            state: ConnectionState::Disconnected,
            position: 0,
        }
    }

    /// Builds a profile from a `.conf` file; the name defaults to the file stem.
    pub fn from_config_file(path: impl AsRef<Path>, name: Option<String>) -> io::Result<Self> {
        let path = path.as_ref();
        let config = TunnelConfig::from_file(path)?;
        let name = name.unwrap_or_else(|| {
            path.file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default()
        });
        Ok(Self::new(name, config))
    }

    /// The durable part of the profile.
    pub fn record(&self) -> ProfileRecord {
        ProfileRecord {
            name: self.name.clone(),
            config: self.config.clone(),
            position: self.position,
        }
    }

    pub(crate) fn from_record(id: ProfileId, record: ProfileRecord) -> Self {
        let mut profile = Self::with_id(id, record.name, record.config);
        profile.position = record.position;
        profile
    }
}

/// What a store keeps for each profile. Connection state is never persisted.
///
/// JSON looks like `{ "name": "Home", "config": "[Interface]\n...", "position": 3 }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileRecord {
    pub name: String,
    pub config: TunnelConfig,
    /// Creation order; records written without one sort first, by id.
    #[serde(default)]
    pub position: u64,
}
