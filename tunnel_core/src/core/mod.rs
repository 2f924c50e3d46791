pub mod controller;
pub mod errors;
pub mod registry;
pub mod state;

pub use controller::{ConnectionController, SaveTarget};
pub use errors::{ProfileError, StoreError, TunnelError};
pub use registry::{ProfileRegistry, ProfileSnapshot, ProfileWatcher};
pub use state::ConnectionState;
