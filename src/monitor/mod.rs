//! Per-device monitoring engine.
//!
//! Each monitored device gets one tokio task running a single loop:
//! sleep a jittered delay, run one probe cycle, re-arm. The loop also
//! listens for live settings patches (which re-validate the changed
//! fields and probe again immediately instead of waiting out the stale
//! interval) and for the agent-wide shutdown signal. Because the loop
//! owns its one sleep arm, there is never more than one pending probe
//! per device and cycles run strictly sequentially.

pub mod probe;
pub mod state;
pub mod verdict;

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::capability::{CapabilityStore, CAP_ALARM_CONNECTIVITY, CAP_ONOFF};
use crate::config::{DeviceConfig, SettingsPatch};
use crate::diag::{DiagLog, SEV_DEBUG, SEV_ERROR, SEV_INFO};
use crate::trigger::{DeviceRef, TriggerSink};
use probe::ProbeOutcome;
use state::{AvailabilityState, Decision};

/// Delay before the very first probe, jittered so a fleet of devices
/// booting together does not probe in lockstep.
pub const STARTUP_DELAY: Duration = Duration::from_secs(2);

/// Port probed for devices with no configured port. Nothing is
/// expected to listen here; a refusal alone proves the host is up.
pub const DEFAULT_PROBE_PORT: u16 = 1;

pub const JITTER_FRACTION: f64 = 0.1;

/// Randomize a delay by ±10%, floored at zero.
pub fn with_jitter(base: Duration) -> Duration {
    let delta: f64 = rand::rng().random_range(-JITTER_FRACTION..=JITTER_FRACTION);
    let millis = (base.as_millis() as f64 * (1.0 + delta)).round().max(0.0);
    Duration::from_millis(millis as u64)
}

/// Control handle for a running monitor. Dropping it closes the patch
/// channel and tears the monitor down.
pub struct MonitorHandle {
    patch_tx: mpsc::Sender<SettingsPatch>,
    task: JoinHandle<()>,
}

impl MonitorHandle {
    /// Deliver a settings change. Returns false if the monitor has
    /// already stopped.
    pub async fn update_settings(&self, patch: SettingsPatch) -> bool {
        self.patch_tx.send(patch).await.is_ok()
    }

    pub async fn join(self) {
        let _ = self.task.await;
    }
}

pub struct DeviceMonitor {
    device: DeviceRef,
    config: DeviceConfig,
    state: AvailabilityState,
    capabilities: Arc<dyn CapabilityStore>,
    triggers: Arc<dyn TriggerSink>,
    diag: Arc<DiagLog>,
}

impl DeviceMonitor {
    fn new(
        config: DeviceConfig,
        capabilities: Arc<dyn CapabilityStore>,
        triggers: Arc<dyn TriggerSink>,
        diag: Arc<DiagLog>,
    ) -> Self {
        Self {
            device: DeviceRef {
                name: config.name.clone(),
            },
            state: AvailabilityState::new(config.failure_threshold),
            config,
            capabilities,
            triggers,
            diag,
        }
    }

    /// Spawn the monitor task for one device.
    pub fn spawn(
        config: DeviceConfig,
        capabilities: Arc<dyn CapabilityStore>,
        triggers: Arc<dyn TriggerSink>,
        diag: Arc<DiagLog>,
        shutdown_rx: watch::Receiver<()>,
    ) -> MonitorHandle {
        let (patch_tx, patch_rx) = mpsc::channel(8);
        let monitor = Self::new(config, capabilities, triggers, diag);
        let task = tokio::spawn(monitor.run(patch_rx, shutdown_rx));
        MonitorHandle { patch_tx, task }
    }

    async fn run(
        mut self,
        mut patch_rx: mpsc::Receiver<SettingsPatch>,
        mut shutdown_rx: watch::Receiver<()>,
    ) {
        self.diag
            .append(&format!("Booting device {}", self.config.name), SEV_INFO);
        self.bootstrap_capabilities().await;

        let mut delay = with_jitter(STARTUP_DELAY);
        loop {
            tokio::select! {
                biased;

                _ = shutdown_rx.changed() => {
                    info!(device = %self.config.name, "Monitor received shutdown signal.");
                    break;
                }

                patch = patch_rx.recv() => {
                    match patch {
                        Some(patch) => {
                            let changed = self.apply_patch(&patch);
                            if !changed.is_empty() {
                                // new settings take effect now, not after the stale interval
                                self.run_cycle().await;
                            }
                            delay = with_jitter(self.config.check_interval());
                        }
                        None => {
                            info!(device = %self.config.name, "Settings channel closed, stopping monitor.");
                            break;
                        }
                    }
                }

                _ = tokio::time::sleep(delay) => {
                    self.run_cycle().await;
                    delay = with_jitter(self.config.check_interval());
                }
            }
        }
    }

    fn apply_patch(&mut self, patch: &SettingsPatch) -> Vec<&'static str> {
        let changed = self.config.apply_patch(patch);
        if changed.contains(&"failure_threshold") {
            self.state.set_failure_threshold(self.config.failure_threshold);
        }
        changed
    }

    /// Seed the capability pair for devices the store has never seen.
    async fn bootstrap_capabilities(&self) {
        let seen = self
            .capabilities
            .get_capability_value(&self.config.name, CAP_ALARM_CONNECTIVITY)
            .await
            .is_some();
        if seen {
            return;
        }
        self.set_capability(CAP_ALARM_CONNECTIVITY, true).await;
        self.set_capability(CAP_ONOFF, false).await;
    }

    /// One full probe cycle: probe, interpret, update state, publish.
    async fn run_cycle(&mut self) {
        if !self.config.host_is_valid() {
            warn!(device = %self.config.name, "Skipping check: invalid host.");
            self.diag.append(
                &format!("Skipping check for device {}: invalid host", self.config.name),
                SEV_ERROR,
            );
            return;
        }

        let kind = if self.config.has_defined_port() { "TCP" } else { "IP" };
        self.diag.append(
            &format!("Checking {kind} device {}", self.config.display_name()),
            SEV_INFO,
        );
        debug!(
            device = %self.config.name,
            host = %self.config.host,
            port = ?self.config.port,
            "Running probe cycle."
        );

        let port = self.config.port.unwrap_or(DEFAULT_PROBE_PORT);
        let outcome = probe::probe(&self.config.host, port, self.config.probe_timeout()).await;
        self.handle_outcome(outcome).await;
    }

    async fn handle_outcome(&mut self, outcome: ProbeOutcome) {
        let verdict = verdict::interpret(&outcome, self.config.has_defined_port());
        if verdict.notable {
            warn!(device = %self.config.name, outcome = %outcome, "Probe returned a notable outcome.");
            self.diag.append(
                &format!("Probe {outcome} for device {}", self.config.display_name()),
                SEV_INFO,
            );
        }

        match self.state.apply(verdict.online) {
            Decision::PublishOnline => self.publish(true).await,
            Decision::PublishOffline => self.publish(false).await,
            Decision::StillOnline => {
                self.diag.append(
                    &format!("Device still Online {}", self.config.display_name()),
                    SEV_DEBUG,
                );
            }
            Decision::StillOffline => {
                self.diag.append(
                    &format!("Device still Offline {}", self.config.display_name()),
                    SEV_DEBUG,
                );
            }
            Decision::OfflinePostponed { checks_remaining } => {
                self.diag.append(
                    &format!(
                        "{} offline postponed for {checks_remaining} more checks",
                        self.config.display_name()
                    ),
                    SEV_INFO,
                );
            }
        }
    }

    /// Publish an availability transition: capability writes first,
    /// then the diagnostic record, then the trigger notification.
    /// Store failures are logged but the in-memory state stays
    /// authoritative.
    async fn publish(&mut self, online: bool) {
        self.set_capability(CAP_ALARM_CONNECTIVITY, !online).await;
        self.set_capability(CAP_ONOFF, online).await;

        let label = if online { "Online" } else { "Offline" };
        info!(device = %self.config.name, online, "Device availability changed.");
        self.diag.append(
            &format!("**** Device is now {label} {}", self.config.display_name()),
            SEV_INFO,
        );

        if online {
            self.triggers.device_came_online(&self.device).await;
        } else {
            self.triggers.device_went_offline(&self.device).await;
        }
    }

    async fn set_capability(&self, capability: &str, value: bool) {
        if let Err(e) = self
            .capabilities
            .set_capability_value(&self.config.name, capability, value)
            .await
        {
            error!(device = %self.config.name, capability, error = %e, "Failed to update capability.");
            self.diag.append(
                &format!(
                    "Failed to update {capability} for device {}: {e}",
                    self.config.name
                ),
                SEV_ERROR,
            );
        }
    }
}
