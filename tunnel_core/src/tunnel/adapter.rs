use async_trait::async_trait;

use crate::core::errors::TunnelError;
use crate::storage::profile::{ProfileId, TunnelConfig};

/// Brings tunnels up and down.
///
/// Implementations bound their own calls; the controller waits for whatever
/// they return and treats a timeout like any other failure.
#[async_trait]
pub trait TunnelAdapter: Send + Sync {
    async fn bring_up(&self, id: &ProfileId, config: &TunnelConfig) -> Result<(), TunnelError>;

    /// Best-effort teardown. Errors are reported, never escalated.
    async fn bring_down(&self, id: &ProfileId, config: &TunnelConfig) -> Result<(), TunnelError>;
}
