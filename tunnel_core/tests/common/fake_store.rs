use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use tunnel_core::core::StoreError;
use tunnel_core::{ProfileId, ProfileRecord, ProfileStore};

use super::journal::{Call, Journal};

/// In-memory store that journals writes and deletes and can be told to fail.
pub struct FakeStore {
    journal: Journal,
    records: Mutex<BTreeMap<ProfileId, ProfileRecord>>,
    fail_writes: Mutex<bool>,
    fail_deletes: Mutex<bool>,
}

impl FakeStore {
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            records: Mutex::new(BTreeMap::new()),
            fail_writes: Mutex::new(false),
            fail_deletes: Mutex::new(false),
        }
    }

    pub fn fail_writes(&self, fail: bool) {
        *self.fail_writes.lock().unwrap() = fail;
    }

    pub fn fail_deletes(&self, fail: bool) {
        *self.fail_deletes.lock().unwrap() = fail;
    }

    /// Seed a record without journaling it.
    pub fn insert(&self, id: ProfileId, record: ProfileRecord) {
        self.records.lock().unwrap().insert(id, record);
    }

    pub fn record(&self, id: &str) -> Option<ProfileRecord> {
        let id = ProfileId::new(id).ok()?;
        self.records.lock().unwrap().get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }
}

#[async_trait]
impl ProfileStore for FakeStore {
    async fn read_all(&self) -> Result<Vec<(ProfileId, ProfileRecord)>, StoreError> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .map(|(id, record)| (id.clone(), record.clone()))
            .collect())
    }

    async fn write(&self, id: &ProfileId, record: &ProfileRecord) -> Result<(), StoreError> {
        self.journal.record(Call::Write {
            id: id.to_string(),
            config: record.config.as_str().to_string(),
        });
        if *self.fail_writes.lock().unwrap() {
            return Err(StoreError::Other("disk full".into()));
        }
        self.records
            .lock()
            .unwrap()
            .insert(id.clone(), record.clone());
        Ok(())
    }

    async fn delete(&self, id: &ProfileId) -> Result<(), StoreError> {
        self.journal.record(Call::Delete { id: id.to_string() });
        if *self.fail_deletes.lock().unwrap() {
            return Err(StoreError::Other("read-only filesystem".into()));
        }
        self.records.lock().unwrap().remove(id);
        Ok(())
    }
}
