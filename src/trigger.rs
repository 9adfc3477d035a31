//! Trigger sink boundary.
//!
//! When a device's published availability flips, the monitor notifies
//! the trigger sink so the surrounding application can dispatch its
//! automation events. Notifications are fire-and-forget: a sink that
//! fails logs the failure itself and never propagates it back into
//! the monitor loop.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::warn;

/// Identity of a monitored device, as passed to the trigger sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceRef {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerEvent {
    CameOnline(DeviceRef),
    WentOffline(DeviceRef),
}

#[async_trait]
pub trait TriggerSink: Send + Sync {
    async fn device_came_online(&self, device: &DeviceRef);
    async fn device_went_offline(&self, device: &DeviceRef);
}

/// Sink that forwards events over an mpsc channel to a dispatch task.
pub struct ChannelTriggerSink {
    tx: mpsc::Sender<TriggerEvent>,
}

impl ChannelTriggerSink {
    pub fn new(tx: mpsc::Sender<TriggerEvent>) -> Self {
        Self { tx }
    }

    async fn send(&self, event: TriggerEvent) {
        if let Err(e) = self.tx.send(event).await {
            warn!(error = %e, "Trigger event dropped, dispatch channel closed.");
        }
    }
}

#[async_trait]
impl TriggerSink for ChannelTriggerSink {
    async fn device_came_online(&self, device: &DeviceRef) {
        self.send(TriggerEvent::CameOnline(device.clone())).await;
    }

    async fn device_went_offline(&self, device: &DeviceRef) {
        self.send(TriggerEvent::WentOffline(device.clone())).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn events_arrive_on_the_channel() {
        let (tx, mut rx) = mpsc::channel(4);
        let sink = ChannelTriggerSink::new(tx);
        let device = DeviceRef {
            name: "nas".to_string(),
        };

        sink.device_came_online(&device).await;
        sink.device_went_offline(&device).await;

        assert_eq!(rx.recv().await, Some(TriggerEvent::CameOnline(device.clone())));
        assert_eq!(rx.recv().await, Some(TriggerEvent::WentOffline(device)));
    }

    #[tokio::test]
    async fn closed_channel_does_not_panic() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sink = ChannelTriggerSink::new(tx);
        sink.device_came_online(&DeviceRef {
            name: "nas".to_string(),
        })
        .await;
    }
}
