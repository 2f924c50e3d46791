use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::Semaphore;
use tunnel_core::core::TunnelError;
use tunnel_core::{ProfileId, TunnelAdapter, TunnelConfig};

use super::journal::{Call, Journal};

/// Records every call in the journal instead of touching the network.
///
/// `bring_up` can be made to fail, or held at a gate until the test
/// releases it, to observe the `Connecting` window.
pub struct FakeAdapter {
    journal: Journal,
    fail_up: Mutex<Option<String>>,
    fail_down: Mutex<bool>,
    gate: Mutex<Option<std::sync::Arc<Semaphore>>>,
}

impl FakeAdapter {
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            fail_up: Mutex::new(None),
            fail_down: Mutex::new(false),
            gate: Mutex::new(None),
        }
    }

    /// Every following `bring_up` fails with `reason`.
    pub fn fail_up(&self, reason: &str) {
        *self.fail_up.lock().unwrap() = Some(reason.to_string());
    }

    pub fn succeed_up(&self) {
        *self.fail_up.lock().unwrap() = None;
    }

    pub fn fail_down(&self) {
        *self.fail_down.lock().unwrap() = true;
    }

    /// `bring_up` blocks until a permit is added to the returned semaphore.
    pub fn gate_up(&self) -> std::sync::Arc<Semaphore> {
        let gate = std::sync::Arc::new(Semaphore::new(0));
        *self.gate.lock().unwrap() = Some(gate.clone());
        gate
    }
}

#[async_trait]
impl TunnelAdapter for FakeAdapter {
    async fn bring_up(&self, id: &ProfileId, config: &TunnelConfig) -> Result<(), TunnelError> {
        self.journal.record(Call::BringUp {
            id: id.to_string(),
            config: config.as_str().to_string(),
        });

        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.acquire()
                .await
                .map_err(|e| TunnelError::Other(e.to_string()))?
                .forget();
        }

        match self.fail_up.lock().unwrap().clone() {
            Some(reason) => Err(TunnelError::Other(reason)),
            None => Ok(()),
        }
    }

    async fn bring_down(&self, id: &ProfileId, config: &TunnelConfig) -> Result<(), TunnelError> {
        self.journal.record(Call::BringDown {
            id: id.to_string(),
            config: config.as_str().to_string(),
        });
        if *self.fail_down.lock().unwrap() {
            return Err(TunnelError::CommandFailed {
                command: "wg-quick down".into(),
                stderr: "interface vanished".into(),
            });
        }
        Ok(())
    }
}
