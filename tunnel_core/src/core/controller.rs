use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use log::{debug, error, info, warn};
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::errors::ProfileError;
use super::registry::{ProfileRegistry, ProfileSnapshot, ProfileWatcher};
use super::state::{plan, ConnectionState, Plan, Request};
use crate::storage::profile::{Profile, ProfileId};
use crate::storage::store::ProfileStore;
use crate::tunnel::adapter::TunnelAdapter;

/// Where [`ConnectionController::save`] puts a profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveTarget {
    /// Register a new profile under its own id.
    Create,
    /// Replace the profile with this id, keeping the id.
    Replace(ProfileId),
}

struct ControllerInner {
    registry: ProfileRegistry,
    store: Arc<dyn ProfileStore>,
    adapter: Arc<dyn TunnelAdapter>,
    /// One fair mutex per profile id. Waiters are served in arrival order.
    locks: Mutex<HashMap<ProfileId, Arc<Mutex<()>>>>,
    next_position: AtomicU64,
}

/// Owns the profile registry and drives every state transition.
///
/// Operations on the same profile are serialized: a request that arrives
/// while another one is in flight waits for it to reach a stable state and
/// is then evaluated against that state. Operations on different profiles
/// run independently.
///
/// Cloning is cheap; all clones share one registry and one set of
/// collaborators.
#[derive(Clone)]
pub struct ConnectionController {
    inner: Arc<ControllerInner>,
}

impl ConnectionController {
    /// A controller with an empty registry.
    pub fn new(store: Arc<dyn ProfileStore>, adapter: Arc<dyn TunnelAdapter>) -> Self {
        Self {
            inner: Arc::new(ControllerInner {
                registry: ProfileRegistry::new(),
                store,
                adapter,
                locks: Mutex::new(HashMap::new()),
                next_position: AtomicU64::new(0),
            }),
        }
    }

    /// A controller populated from the store. Every profile starts `Disconnected`.
    pub async fn load(
        store: Arc<dyn ProfileStore>,
        adapter: Arc<dyn TunnelAdapter>,
    ) -> Result<Self, ProfileError> {
        let mut records = store.read_all().await?;
        records.sort_by(|a, b| (a.1.position, &a.0).cmp(&(b.1.position, &b.0)));
        let controller = Self::new(store, adapter);
        if let Some((_, last)) = records.last() {
            controller
                .inner
                .next_position
                .store(last.position + 1, Ordering::SeqCst);
        }
        info!("Loaded {} profile(s) from the store", records.len());
        for (id, record) in records {
            controller
                .inner
                .registry
                .upsert(Profile::from_record(id, record))
                .await;
        }
        Ok(controller)
    }

    /// Ordered, read-only copy of every profile.
    pub async fn list_profiles(&self) -> ProfileSnapshot {
        self.inner.registry.snapshot().await
    }

    /// Snapshot after every registry mutation, starting with the current one.
    pub async fn subscribe(&self) -> ProfileWatcher {
        self.inner.registry.subscribe().await
    }

    /// A detached copy to edit and hand back to [`save`](Self::save).
    pub async fn copy_for_editing(&self, id: &ProfileId) -> Option<Profile> {
        self.inner.registry.get(id).await
    }

    /// Bring a profile's tunnel up. No-op if it is already up.
    pub async fn connect(&self, id: &ProfileId) -> Result<(), ProfileError> {
        let this = self.clone();
        let id = id.clone();
        run_detached(async move { this.connect_serialized(&id).await }).await
    }

    /// Tear a profile's tunnel down. Always ends `Disconnected`.
    pub async fn disconnect(&self, id: &ProfileId) -> Result<(), ProfileError> {
        let this = self.clone();
        let id = id.clone();
        run_detached(async move { this.disconnect_serialized(&id).await }).await
    }

    /// Persist a new profile or a replacement for an existing one.
    ///
    /// Replacing a live profile disconnects it, persists, and reconnects with
    /// the new configuration. Returns the id the profile is stored under.
    pub async fn save(
        &self,
        target: SaveTarget,
        profile: Profile,
    ) -> Result<ProfileId, ProfileError> {
        let this = self.clone();
        run_detached(async move {
            match target {
                SaveTarget::Create => this.create(profile).await,
                SaveTarget::Replace(id) => this.replace(id, profile).await,
            }
        })
        .await
    }

    /// Disconnect if needed, delete from the store, and forget the profile.
    ///
    /// The registry entry is removed even when the store delete fails; the
    /// failure is still returned.
    pub async fn remove(&self, id: &ProfileId) -> Result<(), ProfileError> {
        let this = self.clone();
        let id = id.clone();
        run_detached(async move { this.remove_serialized(&id).await }).await
    }

    async fn connect_serialized(&self, id: &ProfileId) -> Result<(), ProfileError> {
        let (_guard, profile) = self.lock_existing(id).await?;
        match plan(&profile.state, Request::Connect) {
            Plan::BringUp => self.run_connect(profile).await,
            _ => {
                debug!("connect '{}': already {}", id, profile.state);
                Ok(())
            }
        }
    }

    async fn disconnect_serialized(&self, id: &ProfileId) -> Result<(), ProfileError> {
        let (_guard, profile) = self.lock_existing(id).await?;
        match plan(&profile.state, Request::Disconnect) {
            Plan::BringDown => {
                self.run_disconnect(profile).await;
            }
            _ => debug!("disconnect '{}': already {}", id, profile.state),
        }
        Ok(())
    }

    async fn remove_serialized(&self, id: &ProfileId) -> Result<(), ProfileError> {
        let (guard, profile) = self.lock_existing(id).await?;

        if profile.state.is_live() {
            info!("remove '{}': disconnecting first", id);
            self.run_disconnect(profile).await;
        }

        let deleted = self.inner.store.delete(id).await;
        self.inner.registry.remove(id).await;
        self.release_lock(id, guard).await;

        match deleted {
            Ok(()) => {
                info!("Removed profile '{}'", id);
                Ok(())
            }
            Err(e) => {
                error!("Removed profile '{}' but the store delete failed: {}", id, e);
                Err(ProfileError::PersistenceFailure(e))
            }
        }
    }

    async fn create(&self, mut profile: Profile) -> Result<ProfileId, ProfileError> {
        let id = profile.id.clone();
        let guard = self.lock_profile(&id).await;
        if self.inner.registry.contains(&id).await {
            return Err(ProfileError::AlreadyExists(id));
        }
        profile.position = self.inner.next_position.fetch_add(1, Ordering::SeqCst);

        if let Err(e) = self.inner.store.write(&id, &profile.record()).await {
            self.release_lock(&id, guard).await;
            return Err(ProfileError::PersistenceFailure(e));
        }
        self.publish(profile, ConnectionState::Disconnected).await;
        info!("Created profile '{}'", id);
        Ok(id)
    }

    async fn replace(
        &self,
        id: ProfileId,
        mut profile: Profile,
    ) -> Result<ProfileId, ProfileError> {
        let (_guard, existing) = self.lock_existing(&id).await?;
        if profile.id != id {
            debug!("save '{}': ignoring replacement id '{}'", id, profile.id);
            profile.id = id.clone();
        }
        profile.position = existing.position;

        let was_live = existing.state.is_live();
        if was_live {
            info!("save '{}': reconnecting with the new configuration", id);
            self.run_disconnect(existing).await;
        }

        // On failure the registry keeps the old profile; a forced
        // disconnect above stays in effect.
        self.inner.store.write(&id, &profile.record()).await?;
        let saved = self.publish(profile, ConnectionState::Disconnected).await;
        info!("Saved profile '{}'", id);

        if was_live {
            self.run_connect(saved).await?;
        }
        Ok(id)
    }

    async fn run_connect(&self, profile: Profile) -> Result<(), ProfileError> {
        let id = profile.id.clone();
        info!("Connecting '{}'", id);
        let profile = self.publish(profile, ConnectionState::Connecting).await;

        match self.inner.adapter.bring_up(&id, &profile.config).await {
            Ok(()) => {
                self.publish(profile, ConnectionState::Connected).await;
                info!("Connected '{}'", id);
                Ok(())
            }
            Err(e) => {
                error!("Connecting '{}' failed: {}", id, e);
                self.publish(profile, ConnectionState::Error(e.to_string()))
                    .await;
                Err(ProfileError::TunnelFailure(e))
            }
        }
    }

    /// Teardown is best-effort: the profile ends `Disconnected` whatever the
    /// adapter says.
    async fn run_disconnect(&self, profile: Profile) -> Profile {
        let id = profile.id.clone();
        info!("Disconnecting '{}'", id);
        let profile = self.publish(profile, ConnectionState::Disconnecting).await;

        if let Err(e) = self.inner.adapter.bring_down(&id, &profile.config).await {
            warn!("Tearing down '{}' reported an error: {}", id, e);
        }
        let profile = self.publish(profile, ConnectionState::Disconnected).await;
        info!("Disconnected '{}'", id);
        profile
    }

    async fn publish(&self, mut profile: Profile, state: ConnectionState) -> Profile {
        profile.state = state;
        self.inner.registry.upsert(profile.clone()).await;
        profile
    }

    /// Takes the profile's lock and reads its settled state.
    async fn lock_existing(
        &self,
        id: &ProfileId,
    ) -> Result<(OwnedMutexGuard<()>, Profile), ProfileError> {
        let guard = self.lock_profile(id).await;
        match self.inner.registry.get(id).await {
            Some(profile) => {
                if profile.state.is_transient() {
                    // only after an operation task died mid-transition
                    warn!("'{}' was left {}, settling it now", id, profile.state);
                }
                Ok((guard, profile))
            }
            None => {
                self.release_lock(id, guard).await;
                Err(ProfileError::UnknownProfile(id.clone()))
            }
        }
    }

    async fn lock_profile(&self, id: &ProfileId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.inner.locks.lock().await;
            locks.entry(id.clone()).or_default().clone()
        };
        lock.lock_owned().await
    }

    /// Drops the lock entry of an unregistered id unless someone is queued on it.
    async fn release_lock(&self, id: &ProfileId, guard: OwnedMutexGuard<()>) {
        let mut locks = self.inner.locks.lock().await;
        if let Some(lock) = locks.get(id) {
            // one reference in the map, one held by our guard
            if Arc::strong_count(lock) <= 2 {
                locks.remove(id);
            }
        }
        drop(guard);
    }

    #[cfg(test)]
    async fn tracked_locks(&self) -> usize {
        self.inner.locks.lock().await.len()
    }
}

/// Runs an operation on its own task so a caller that stops waiting cannot
/// strand a profile in a transient state.
async fn run_detached<T, F>(operation: F) -> Result<T, ProfileError>
where
    F: Future<Output = Result<T, ProfileError>> + Send + 'static,
    T: Send + 'static,
{
    match tokio::spawn(operation).await {
        Ok(result) => result,
        Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
        Err(e) => Err(ProfileError::Interrupted(e.to_string())),
    }
}
