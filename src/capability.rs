//! Capability store boundary.
//!
//! Monitors mirror their published availability into two boolean
//! capabilities kept inverse of each other: `alarm_connectivity`
//! (true = offline) and `onoff` (true = online). The store itself is
//! an external collaborator; the in-memory implementation here backs
//! the standalone agent and the tests.

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;

/// Alarm-style capability: true while the device is offline.
pub const CAP_ALARM_CONNECTIVITY: &str = "alarm_connectivity";
/// On/off-style capability: true while the device is online.
pub const CAP_ONOFF: &str = "onoff";

#[derive(Debug, Error)]
pub enum CapabilityError {
    #[error("unknown capability: {0}")]
    UnknownCapability(String),
    #[error("capability store rejected write: {0}")]
    Rejected(String),
}

#[async_trait]
pub trait CapabilityStore: Send + Sync {
    async fn set_capability_value(
        &self,
        device: &str,
        capability: &str,
        value: bool,
    ) -> Result<(), CapabilityError>;

    async fn get_capability_value(&self, device: &str, capability: &str) -> Option<bool>;
}

/// Process-local capability store.
#[derive(Default)]
pub struct MemoryCapabilityStore {
    values: RwLock<HashMap<(String, String), bool>>,
}

impl MemoryCapabilityStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CapabilityStore for MemoryCapabilityStore {
    async fn set_capability_value(
        &self,
        device: &str,
        capability: &str,
        value: bool,
    ) -> Result<(), CapabilityError> {
        if capability != CAP_ALARM_CONNECTIVITY && capability != CAP_ONOFF {
            return Err(CapabilityError::UnknownCapability(capability.to_string()));
        }
        let mut values = self.values.write().await;
        values.insert((device.to_string(), capability.to_string()), value);
        Ok(())
    }

    async fn get_capability_value(&self, device: &str, capability: &str) -> Option<bool> {
        let values = self.values.read().await;
        values
            .get(&(device.to_string(), capability.to_string()))
            .copied()
    }
}
