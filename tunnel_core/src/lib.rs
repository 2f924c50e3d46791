pub mod config;
pub mod core;
pub mod storage;
pub mod tunnel;
pub mod utils;

// re‑export ergonomic entry points
pub use crate::config::Settings;
pub use crate::core::{
    ConnectionController, ConnectionState, ProfileError, ProfileSnapshot, ProfileWatcher,
    SaveTarget,
};
pub use crate::storage::{
    JsonFileStore, MemoryStore, Profile, ProfileId, ProfileRecord, ProfileStore, TunnelConfig,
};
pub use crate::tunnel::{TunnelAdapter, WgQuickAdapter};
