use std::ops::Deref;
use std::sync::Arc;

use log::debug;
use tokio::sync::{mpsc, Mutex};

use crate::storage::profile::{Profile, ProfileId};

/// Read-only, ordered view of the registry at one point in time.
///
/// Built fresh for every mutation, so holding one never aliases the
/// registry's own list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileSnapshot {
    profiles: Arc<Vec<Profile>>,
}

impl ProfileSnapshot {
    fn capture(profiles: &[Profile]) -> Self {
        Self {
            profiles: Arc::new(profiles.to_vec()),
        }
    }

    pub fn get(&self, id: &ProfileId) -> Option<&Profile> {
        self.profiles.iter().find(|p| &p.id == id)
    }

    pub fn ids(&self) -> Vec<ProfileId> {
        self.profiles.iter().map(|p| p.id.clone()).collect()
    }
}

impl Deref for ProfileSnapshot {
    type Target = [Profile];

    fn deref(&self) -> &[Profile] {
        &self.profiles
    }
}

impl<'a> IntoIterator for &'a ProfileSnapshot {
    type Item = &'a Profile;
    type IntoIter = std::slice::Iter<'a, Profile>;

    fn into_iter(self) -> Self::IntoIter {
        self.profiles.iter()
    }
}

/// Receives a full [`ProfileSnapshot`] after every registry mutation, in
/// mutation order. Nothing is coalesced or dropped.
pub struct ProfileWatcher {
    rx: mpsc::UnboundedReceiver<ProfileSnapshot>,
}

impl ProfileWatcher {
    /// Waits for the next snapshot. `None` once the registry is gone.
    pub async fn changed(&mut self) -> Option<ProfileSnapshot> {
        self.rx.recv().await
    }

    /// Returns an already delivered snapshot without waiting.
    pub fn try_changed(&mut self) -> Option<ProfileSnapshot> {
        self.rx.try_recv().ok()
    }
}

struct RegistryInner {
    profiles: Vec<Profile>,
    observers: Vec<mpsc::UnboundedSender<ProfileSnapshot>>,
}

impl RegistryInner {
    /// Called with the lock held, so observers see mutations in order.
    fn publish(&mut self) {
        let snapshot = ProfileSnapshot::capture(&self.profiles);
        self.observers.retain(|tx| tx.send(snapshot.clone()).is_ok());
    }
}

/// Insertion-ordered collection of profiles, unique by id.
///
/// Reads are open to everyone; mutation is reserved for the
/// [`ConnectionController`](crate::ConnectionController).
pub struct ProfileRegistry {
    inner: Mutex<RegistryInner>,
}

impl Default for ProfileRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ProfileRegistry {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(RegistryInner {
                profiles: Vec::new(),
                observers: Vec::new(),
            }),
        }
    }

    pub async fn snapshot(&self) -> ProfileSnapshot {
        let inner = self.inner.lock().await;
        ProfileSnapshot::capture(&inner.profiles)
    }

    /// A copy of the profile, if registered.
    pub async fn get(&self, id: &ProfileId) -> Option<Profile> {
        let inner = self.inner.lock().await;
        inner.profiles.iter().find(|p| &p.id == id).cloned()
    }

    pub async fn contains(&self, id: &ProfileId) -> bool {
        let inner = self.inner.lock().await;
        inner.profiles.iter().any(|p| &p.id == id)
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.profiles.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.profiles.is_empty()
    }

    /// Registers an observer. The current snapshot is delivered immediately.
    pub async fn subscribe(&self) -> ProfileWatcher {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.inner.lock().await;
        let _ = tx.send(ProfileSnapshot::capture(&inner.profiles));
        inner.observers.push(tx);
        ProfileWatcher { rx }
    }

    /// Replaces the entry with the same id in place, or appends a new one.
    pub(crate) async fn upsert(&self, profile: Profile) {
        let mut inner = self.inner.lock().await;
        match inner.profiles.iter_mut().find(|p| p.id == profile.id) {
            Some(slot) => {
                debug!("Registry: update '{}' ({})", profile.id, profile.state);
                *slot = profile;
            }
            None => {
                debug!("Registry: insert '{}' ({})", profile.id, profile.state);
                inner.profiles.push(profile);
            }
        }
        inner.publish();
    }

    /// Removes the entry if present. Absent ids are a silent no-op.
    pub(crate) async fn remove(&self, id: &ProfileId) -> Option<Profile> {
        let mut inner = self.inner.lock().await;
        let index = inner.profiles.iter().position(|p| &p.id == id)?;
        let removed = inner.profiles.remove(index);
        debug!("Registry: remove '{}'", id);
        inner.publish();
        Some(removed)
    }
}
