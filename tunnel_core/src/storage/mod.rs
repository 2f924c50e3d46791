pub mod profile;
pub mod store;

pub use profile::{Profile, ProfileId, ProfileRecord, TunnelConfig};
pub use store::{JsonFileStore, MemoryStore, ProfileStore};
