use std::collections::BTreeMap;
use std::{fs, io, path::PathBuf};

use async_trait::async_trait;
use log::{debug, warn};
use tokio::sync::Mutex;

use super::profile::{ProfileId, ProfileRecord};
use crate::core::errors::StoreError;

/// Durable home of profile records, keyed by id.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Every stored record. Order is not significant; callers sort by
    /// [`ProfileRecord::position`].
    async fn read_all(&self) -> Result<Vec<(ProfileId, ProfileRecord)>, StoreError>;

    /// Create or overwrite a record.
    async fn write(&self, id: &ProfileId, record: &ProfileRecord) -> Result<(), StoreError>;

    /// Delete a record. Deleting a missing record succeeds.
    async fn delete(&self, id: &ProfileId) -> Result<(), StoreError>;
}

/// One pretty-printed `<id>.json` file per profile.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    /// A store rooted at `dir`, created if missing. The per-user default
    /// comes from [`Settings::profile_dir`](crate::Settings::profile_dir).
    pub fn at(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn file_for(&self, id: &ProfileId) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    fn read_dir_blocking(dir: PathBuf) -> Result<Vec<(ProfileId, ProfileRecord)>, StoreError> {
        let mut out = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if !path.extension().is_some_and(|e| e == "json") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let id = match ProfileId::new(stem) {
                Ok(id) => id,
                Err(e) => {
                    warn!("Skipping {:?}: {e}", path);
                    continue;
                }
            };
            let parsed = fs::File::open(&path).map_err(StoreError::from).and_then(|f| {
                serde_json::from_reader::<_, ProfileRecord>(io::BufReader::new(f))
                    .map_err(StoreError::from)
            });
            match parsed {
                Ok(record) => out.push((id, record)),
                Err(e) => warn!("Could not read {:?}: {e}", path),
            }
        }
        out.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(out)
    }

    fn write_blocking(path: PathBuf, record: ProfileRecord) -> Result<(), StoreError> {
        // Write next to the target and rename, so readers never see half a record.
        let tmp = path.with_extension("json.tmp");
        {
            let file = fs::File::create(&tmp)?;
            serde_json::to_writer_pretty(&file, &record)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}

async fn blocking<T, F>(f: F) -> Result<T, StoreError>
where
    F: FnOnce() -> Result<T, StoreError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| StoreError::Other(format!("store task failed: {e}")))?
}

#[async_trait]
impl ProfileStore for JsonFileStore {
    async fn read_all(&self) -> Result<Vec<(ProfileId, ProfileRecord)>, StoreError> {
        let dir = self.dir.clone();
        blocking(move || Self::read_dir_blocking(dir)).await
    }

    async fn write(&self, id: &ProfileId, record: &ProfileRecord) -> Result<(), StoreError> {
        let path = self.file_for(id);
        let record = record.clone();
        debug!("Writing profile record {:?}", path);
        blocking(move || Self::write_blocking(path, record)).await
    }

    async fn delete(&self, id: &ProfileId) -> Result<(), StoreError> {
        let path = self.file_for(id);
        blocking(move || match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        })
        .await
    }
}

/// Keeps records in memory only; nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<BTreeMap<ProfileId, ProfileRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProfileStore for MemoryStore {
    async fn read_all(&self) -> Result<Vec<(ProfileId, ProfileRecord)>, StoreError> {
        let records = self.records.lock().await;
        Ok(records
            .iter()
            .map(|(id, record)| (id.clone(), record.clone()))
            .collect())
    }

    async fn write(&self, id: &ProfileId, record: &ProfileRecord) -> Result<(), StoreError> {
        self.records.lock().await.insert(id.clone(), record.clone());
        Ok(())
    }

    async fn delete(&self, id: &ProfileId) -> Result<(), StoreError> {
        self.records.lock().await.remove(id);
        Ok(())
    }
}
