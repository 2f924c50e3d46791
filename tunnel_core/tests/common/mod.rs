#![allow(dead_code)]

pub mod fake_adapter;
pub mod fake_store;
pub mod journal;

use std::sync::Arc;

use log::LevelFilter;
use tokio::time::{timeout, Duration};
use tunnel_core::{
    ConnectionController, ConnectionState, Profile, ProfileId, ProfileSnapshot, ProfileWatcher,
    SaveTarget, TunnelConfig,
};

use fake_adapter::FakeAdapter;
use fake_store::FakeStore;
use journal::Journal;

/// Logs appear only with `-- --nocapture` or when the test fails.
pub fn init_test_logging() {
    let _ = env_logger::Builder::from_default_env()
        .filter_level(LevelFilter::Debug)
        .is_test(true)
        .try_init();
}

/// A controller wired to fakes that share one call journal.
pub struct Harness {
    pub controller: ConnectionController,
    pub adapter: Arc<FakeAdapter>,
    pub store: Arc<FakeStore>,
    pub journal: Journal,
}

impl Harness {
    pub fn new() -> Self {
        init_test_logging();
        let journal = Journal::default();
        let adapter = Arc::new(FakeAdapter::new(journal.clone()));
        let store = Arc::new(FakeStore::new(journal.clone()));
        let controller = ConnectionController::new(store.clone(), adapter.clone());
        Self {
            controller,
            adapter,
            store,
            journal,
        }
    }

    /// Creates a profile and clears the journal so tests only see what follows.
    pub async fn with_profile(self, id: &str, name: &str, config: &str) -> Self {
        self.controller
            .save(SaveTarget::Create, profile(id, name, config))
            .await
            .expect("creating the fixture profile should succeed");
        self.journal.clear();
        self
    }

    pub async fn state_of(&self, id: &str) -> Option<ConnectionState> {
        self.controller
            .copy_for_editing(&pid(id))
            .await
            .map(|p| p.state)
    }
}

pub fn pid(raw: &str) -> ProfileId {
    ProfileId::new(raw).expect("test ids are valid")
}

pub fn profile(id: &str, name: &str, config: &str) -> Profile {
    Profile::with_id(pid(id), name, TunnelConfig::new(config))
}

/// Waits (bounded) until a snapshot satisfies `pred`, turning hangs into failures.
pub async fn wait_for(
    watcher: &mut ProfileWatcher,
    mut pred: impl FnMut(&ProfileSnapshot) -> bool,
) -> ProfileSnapshot {
    timeout(Duration::from_secs(2), async {
        loop {
            let snapshot = watcher
                .changed()
                .await
                .expect("registry dropped while waiting");
            if pred(&snapshot) {
                return snapshot;
            }
        }
    })
    .await
    .expect("timed out waiting for the registry")
}

/// Every state `id` passed through, in order, collapsing repeats.
pub fn drain_states(watcher: &mut ProfileWatcher, id: &str) -> Vec<ConnectionState> {
    let id = pid(id);
    let mut states: Vec<ConnectionState> = Vec::new();
    while let Some(snapshot) = watcher.try_changed() {
        if let Some(p) = snapshot.get(&id) {
            if states.last() != Some(&p.state) {
                states.push(p.state.clone());
            }
        }
    }
    states
}
